use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::RpcError;
use crate::JSONRPC_VERSION;

/// A request id: string, integer, or null.
///
/// `Null` is a *present* id whose wire value is JSON null. Per JSON-RPC 2.0
/// this still denotes a full request that receives a response — only the
/// complete absence of the `id` field makes a notification, which
/// [`Request`] encodes as `id: None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
    Null,
}

impl RequestId {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RequestId::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RequestId::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RequestId::Null)
    }

    pub(crate) fn to_value(&self) -> Value {
        match self {
            RequestId::Number(n) => Value::from(*n),
            RequestId::String(s) => Value::String(s.clone()),
            RequestId::Null => Value::Null,
        }
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, RpcError> {
        match value {
            Value::Null => Ok(RequestId::Null),
            Value::String(s) => Ok(RequestId::String(s.clone())),
            Value::Number(n) => n
                .as_i64()
                .map(RequestId::Number)
                .ok_or_else(|| RpcError::invalid_request("id must be an integer")),
            _ => Err(RpcError::invalid_request(
                "id must be a string, integer, or null",
            )),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{}", s),
            RequestId::Null => write!(f, "null"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

/// A JSON-RPC request. Immutable once constructed.
///
/// `id == None` means the wire form omits the field entirely: a
/// notification. `Some(RequestId::Null)` is a full request with a null id.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: String,
    params: Value,
    id: Option<RequestId>,
}

impl Request {
    /// Build a request that expects a response.
    pub fn new(method: impl Into<String>, params: Value, id: impl Into<RequestId>) -> Self {
        Self {
            method: method.into(),
            params,
            id: Some(id.into()),
        }
    }

    /// Build a notification: no id, no response.
    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
            id: None,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    pub fn id(&self) -> Option<&RequestId> {
        self.id.as_ref()
    }

    /// Distinguishes requests from notifications. True even when the id
    /// value is JSON null.
    pub fn has_id(&self) -> bool {
        self.id.is_some()
    }

    /// The id a response to this request must carry.
    pub fn response_id(&self) -> RequestId {
        self.id.clone().unwrap_or(RequestId::Null)
    }

    /// Validate and decode one request envelope.
    pub fn from_value(value: &Value) -> Result<Self, RpcError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RpcError::invalid_request("request must be an object"))?;

        validate_version(obj)?;

        let method = match obj.get("method") {
            Some(Value::String(m)) => m.clone(),
            Some(_) => return Err(RpcError::invalid_request("method must be a string")),
            None => return Err(RpcError::invalid_request("missing method")),
        };
        if method.is_empty() {
            return Err(RpcError::invalid_request("method must not be empty"));
        }

        let params = match obj.get("params") {
            None | Some(Value::Null) => Value::Null,
            Some(p @ (Value::Array(_) | Value::Object(_))) => p.clone(),
            Some(_) => {
                return Err(RpcError::invalid_request(
                    "params must be an array, object, or null",
                ))
            }
        };

        let id = match obj.get("id") {
            None => None,
            Some(v) => Some(RequestId::from_value(v)?),
        };

        Ok(Self { method, params, id })
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(
            "jsonrpc".to_string(),
            Value::String(JSONRPC_VERSION.to_string()),
        );
        obj.insert("method".to_string(), Value::String(self.method.clone()));
        if !self.params.is_null() {
            obj.insert("params".to_string(), self.params.clone());
        }
        if let Some(id) = &self.id {
            obj.insert("id".to_string(), id.to_value());
        }
        Value::Object(obj)
    }
}

/// A JSON-RPC response: either a result or an error, never both.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    kind: ResponseKind,
    id: RequestId,
}

#[derive(Debug, Clone, PartialEq)]
enum ResponseKind {
    Success(Value),
    Failure(RpcError),
}

impl Response {
    pub fn success(result: Value, id: RequestId) -> Self {
        Self {
            kind: ResponseKind::Success(result),
            id,
        }
    }

    pub fn failure(error: RpcError, id: RequestId) -> Self {
        Self {
            kind: ResponseKind::Failure(error),
            id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, ResponseKind::Failure(_))
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.kind {
            ResponseKind::Success(value) => Some(value),
            ResponseKind::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RpcError> {
        match &self.kind {
            ResponseKind::Success(_) => None,
            ResponseKind::Failure(error) => Some(error),
        }
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.kind {
            ResponseKind::Success(value) => Ok(value),
            ResponseKind::Failure(error) => Err(error),
        }
    }

    /// Validate and decode one response envelope.
    pub fn from_value(value: &Value) -> Result<Self, RpcError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RpcError::invalid_request("response must be an object"))?;

        validate_version(obj)?;

        let id = match obj.get("id") {
            Some(v) => RequestId::from_value(v)?,
            None => return Err(RpcError::invalid_request("response is missing an id")),
        };

        match (obj.get("result"), obj.get("error")) {
            (Some(result), None) => Ok(Self::success(result.clone(), id)),
            (None, Some(error)) => {
                let error: RpcError = serde_json::from_value(error.clone())
                    .map_err(|_| RpcError::invalid_request("malformed error object"))?;
                Ok(Self::failure(error, id))
            }
            _ => Err(RpcError::invalid_request(
                "response must carry exactly one of result or error",
            )),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(
            "jsonrpc".to_string(),
            Value::String(JSONRPC_VERSION.to_string()),
        );
        match &self.kind {
            ResponseKind::Success(result) => {
                obj.insert("result".to_string(), result.clone());
            }
            ResponseKind::Failure(error) => {
                obj.insert(
                    "error".to_string(),
                    serde_json::to_value(error).unwrap_or(Value::Null),
                );
            }
        }
        obj.insert("id".to_string(), self.id.to_value());
        Value::Object(obj)
    }
}

fn validate_version(obj: &Map<String, Value>) -> Result<(), RpcError> {
    match obj.get("jsonrpc") {
        Some(Value::String(v)) if v == JSONRPC_VERSION => Ok(()),
        Some(_) => Err(RpcError::invalid_request("jsonrpc version must be \"2.0\"")),
        None => Err(RpcError::invalid_request("missing jsonrpc version")),
    }
}
