//! JSON-RPC 2.0 protocol engine.
//!
//! Stateless parse/serialize functions over raw bytes and JSON values.
//! JSON syntax errors map to `ParseError`; structural violations (bad
//! version, missing fields, empty batches, a response carrying both
//! `result` and `error`) map to `InvalidRequest`.

use serde_json::Value;

use crate::error::RpcError;
use crate::types::{Request, RequestId, Response};

/// True iff the top-level value is a batch (a JSON array).
pub fn is_batch_request(value: &Value) -> bool {
    value.is_array()
}

/// Parse one request body: a single envelope or a batch.
///
/// A single request comes back as a one-element vector. Batch-ness of the
/// raw value is not preserved here; callers that need it (the server must
/// echo an array for array input) check [`is_batch_request`] on the parsed
/// value and use [`parse_request_value`].
pub fn parse_request(body: &[u8]) -> Result<Vec<Request>, RpcError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| RpcError::parse_error(format!("invalid JSON: {err}")))?;
    parse_request_value(&value)
}

/// Parse an already-decoded top-level JSON value into requests.
pub fn parse_request_value(value: &Value) -> Result<Vec<Request>, RpcError> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Err(RpcError::invalid_request("batch request must not be empty"));
            }
            items.iter().map(Request::from_value).collect()
        }
        _ => Ok(vec![Request::from_value(value)?]),
    }
}

pub fn serialize_request(request: &Request) -> String {
    request.to_value().to_string()
}

pub fn serialize_batch_request(requests: &[Request]) -> String {
    Value::Array(requests.iter().map(Request::to_value).collect()).to_string()
}

/// Parse a single response envelope (client side).
pub fn parse_response(body: &[u8]) -> Result<Response, RpcError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| RpcError::parse_error(format!("invalid JSON: {err}")))?;
    if value.is_array() {
        return Err(RpcError::invalid_request(
            "expected a single response, got a batch",
        ));
    }
    Response::from_value(&value)
}

/// Parse a batch response envelope (client side).
pub fn parse_batch_response(body: &[u8]) -> Result<Vec<Response>, RpcError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| RpcError::parse_error(format!("invalid JSON: {err}")))?;
    let items = value
        .as_array()
        .ok_or_else(|| RpcError::invalid_request("expected a response batch"))?;
    items.iter().map(Response::from_value).collect()
}

pub fn serialize_response(response: &Response) -> String {
    response.to_value().to_string()
}

pub fn serialize_batch_response(responses: &[Response]) -> String {
    Value::Array(responses.iter().map(Response::to_value).collect()).to_string()
}

/// Best-effort id recovery from a malformed envelope, for in-band error
/// responses. Anything unusable collapses to null.
pub fn recover_id(value: &Value) -> RequestId {
    match value.get("id") {
        Some(id) => RequestId::from_value(id).unwrap_or(RequestId::Null),
        None => RequestId::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_single_request() {
        let requests = parse_request(br#"{"jsonrpc":"2.0","method":"ping","id":1}"#).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method(), "ping");
        assert!(requests[0].has_id());
    }

    #[test]
    fn parse_notification_request() {
        let requests =
            parse_request(br#"{"jsonrpc":"2.0","method":"update","params":[1,2,3]}"#).unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].has_id());
    }

    #[test]
    fn parse_batch_request_preserves_order() {
        let body = br#"[
            {"jsonrpc":"2.0","method":"add","params":[1,2],"id":1},
            {"jsonrpc":"2.0","method":"notify","params":["hello"]},
            {"jsonrpc":"2.0","method":"multiply","params":[3,4],"id":2}
        ]"#;
        let requests = parse_request(body).unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].method(), "add");
        assert!(requests[0].has_id());
        assert!(!requests[1].has_id());
        assert_eq!(requests[2].id(), Some(&RequestId::Number(2)));
    }

    #[test]
    fn empty_batch_is_invalid() {
        let err = parse_request(b"[]").unwrap_err();
        assert_eq!(err.code, -32600);
    }

    #[test]
    fn syntax_errors_are_parse_errors() {
        let err = parse_request(br#"{"jsonrpc":"2.0","method":"x","#).unwrap_err();
        assert_eq!(err.code, -32700);
    }

    #[test]
    fn structural_errors_are_invalid_requests() {
        for body in [
            br#"{"jsonrpc":"1.0","method":"test","id":1}"#.as_slice(),
            br#"{"jsonrpc":"2.0","params":[],"id":1}"#.as_slice(),
            br#"{"jsonrpc":"2.0","method":"x","id":{}}"#.as_slice(),
        ] {
            let err = parse_request(body).unwrap_err();
            assert_eq!(err.code, -32600);
        }
    }

    #[test]
    fn serialize_request_round_trips() {
        let request = Request::new("add", json!([10, 20]), 1);
        let parsed = parse_request(serialize_request(&request).as_bytes()).unwrap();
        assert_eq!(parsed, vec![request]);
    }

    #[test]
    fn serialize_notification_omits_id() {
        let note = Request::notification("update", json!(["hello"]));
        let wire = serialize_request(&note);
        assert!(wire.contains(r#""jsonrpc":"2.0""#));
        assert!(wire.contains(r#""method":"update""#));
        assert!(!wire.contains(r#""id""#));
    }

    #[test]
    fn serialize_batch_request_is_an_array() {
        let requests = vec![
            Request::new("add", json!([1, 2]), 1),
            Request::new("subtract", json!([5, 3]), 2),
        ];
        let wire = serialize_batch_request(&requests);
        assert!(wire.starts_with('['));
        assert!(wire.ends_with(']'));
        assert_eq!(parse_request(wire.as_bytes()).unwrap(), requests);
    }

    #[test]
    fn parse_response_with_result() {
        let response = parse_response(br#"{"jsonrpc":"2.0","result":42,"id":1}"#).unwrap();
        assert!(!response.is_error());
        assert_eq!(response.result(), Some(&json!(42)));
        assert_eq!(response.id(), &RequestId::Number(1));
    }

    #[test]
    fn parse_response_with_error() {
        let body = br#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found"},"id":1}"#;
        let response = parse_response(body).unwrap();
        assert!(response.is_error());
        let error = response.error().unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "Method not found");
    }

    #[test]
    fn parse_batch_response_mixes_results_and_errors() {
        let body = br#"[
            {"jsonrpc":"2.0","result":3,"id":1},
            {"jsonrpc":"2.0","result":2,"id":2},
            {"jsonrpc":"2.0","error":{"code":-32601,"message":"Not found"},"id":3}
        ]"#;
        let responses = parse_batch_response(body).unwrap();
        assert_eq!(responses.len(), 3);
        assert!(!responses[0].is_error());
        assert_eq!(responses[1].result(), Some(&json!(2)));
        assert!(responses[2].is_error());
    }

    #[test]
    fn serialize_response_round_trips() {
        let ok = Response::success(json!(30), RequestId::Number(1));
        assert_eq!(
            parse_response(serialize_response(&ok).as_bytes()).unwrap(),
            ok
        );

        let failed = Response::failure(
            RpcError::invalid_params("argument shape"),
            RequestId::Number(1),
        );
        let wire = serialize_response(&failed);
        assert!(wire.contains(r#""code":-32602"#));
        assert!(wire.contains(r#""id":1"#));
        assert!(!wire.contains(r#""result""#));
    }

    #[test]
    fn serialize_empty_batch_response() {
        assert_eq!(serialize_batch_response(&[]), "[]");
    }

    #[test]
    fn batch_detection() {
        assert!(is_batch_request(&json!([{"jsonrpc": "2.0"}])));
        assert!(!is_batch_request(&json!({"jsonrpc": "2.0"})));
    }

    #[test]
    fn id_recovery_is_best_effort() {
        assert_eq!(
            recover_id(&json!({"id": 7, "method": "x"})),
            RequestId::Number(7)
        );
        assert_eq!(
            recover_id(&json!({"id": "r1"})),
            RequestId::String("r1".to_string())
        );
        assert_eq!(recover_id(&json!({"id": 1.5})), RequestId::Null);
        assert_eq!(recover_id(&json!({"method": "x"})), RequestId::Null);
        assert_eq!(recover_id(&json!([1, 2])), RequestId::Null);
    }
}
