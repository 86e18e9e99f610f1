//! HTTP response builders for the JSON-RPC endpoint.
//!
//! JSON-RPC level failures travel in-band over a 200 transport response;
//! only transport-level rejections (wrong method, wrong media type) use
//! non-2xx statuses.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{ALLOW, CONTENT_TYPE};
use hyper::{Response as HttpResponse, StatusCode};

use rill_jsonrpc::{protocol, RequestId, Response, RpcError};

pub(crate) type Body = Full<Bytes>;

/// 200 with a serialized JSON body.
pub(crate) fn json(body: String) -> HttpResponse<Body> {
    HttpResponse::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// 200 carrying an in-band JSON-RPC error response.
pub(crate) fn rpc_error(error: RpcError, id: RequestId) -> HttpResponse<Body> {
    json(protocol::serialize_response(&Response::failure(error, id)))
}

/// 204 for notifications: no body at all.
pub(crate) fn no_content() -> HttpResponse<Body> {
    HttpResponse::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// 405 for anything that is not a POST.
pub(crate) fn method_not_allowed() -> HttpResponse<Body> {
    HttpResponse::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header(ALLOW, "POST")
        .header(CONTENT_TYPE, "text/plain")
        .body(Full::new(Bytes::from("Method Not Allowed")))
        .unwrap()
}

/// 415 when the content type does not include `application/json`.
pub(crate) fn unsupported_media_type() -> HttpResponse<Body> {
    HttpResponse::builder()
        .status(StatusCode::UNSUPPORTED_MEDIA_TYPE)
        .header(CONTENT_TYPE, "text/plain")
        .body(Full::new(Bytes::from(
            "Unsupported Media Type: Content-Type must be application/json",
        )))
        .unwrap()
}
