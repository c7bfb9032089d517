//! Response envelope, error documents, and common headers.

use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use http::header::{CONTENT_TYPE, HeaderValue, SERVER};
use http::{Response, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use serde::de::IgnoredAny;

use crate::backend::BackendResponse;
use crate::error::ProxyError;

/// Body of every proxy response: an envelope, a relayed backend body, or an
/// error document, always fully buffered.
pub type ProxyResponseBody = Full<Bytes>;

/// Content type of proxy-generated documents.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Content type of the DynamoDB JSON protocol.
pub const AMZ_JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.0";

/// Header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-dynaproxy-requestid";

/// Header carrying the handler's elapsed time in milliseconds.
pub const ELAPSED_HEADER: &str = "x-dynaproxy-elapsed-ms";

/// Value of the `server` header.
pub const SERVER_NAME: &str = "dynaproxy";

/// Output formatting arguments taken from the query string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseOptions {
    /// Emit only the backend body, without the envelope.
    pub compact: bool,
    /// Pretty-print the emitted JSON.
    pub indent: bool,
}

impl ResponseOptions {
    /// Read `compact` and `indent` from a raw query string.
    ///
    /// A flag is set when its value is `1` or `true`. Unrelated arguments
    /// are ignored.
    #[must_use]
    pub fn from_query(query: Option<&str>) -> Self {
        let mut options = Self::default();
        let Some(query) = query else {
            return options;
        };
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "compact" => options.compact = is_flag_set(&value),
                "indent" => options.indent = is_flag_set(&value),
                _ => {}
            }
        }
        options
    }

    /// Map of the flags, as reported by the status endpoint.
    #[must_use]
    pub fn describe() -> serde_json::Value {
        serde_json::json!({
            "compact": "1 to emit only the backend body",
            "indent": "1 to pretty-print the emitted JSON",
        })
    }
}

fn is_flag_set(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Wall-clock and monotonic start of one request.
#[derive(Debug, Clone, Copy)]
pub struct RequestClock {
    started_at: DateTime<Utc>,
    started: Instant,
}

impl RequestClock {
    /// Start timing now.
    #[must_use]
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Milliseconds since the request started.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// RFC 3339 start timestamp.
    #[must_use]
    pub fn started_at(&self) -> String {
        self.started_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Envelope<'a> {
    name: &'a str,
    status_code: u16,
    body: serde_json::Value,
    run: RunInfo<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RunInfo<'a> {
    start_time: String,
    elapsed_ms: u64,
    request_id: &'a str,
}

/// Shape a successful handler result into the HTTP response.
///
/// Without `compact`, the body is wrapped in an envelope carrying the
/// endpoint name, status, and run metadata. With `compact`, the body is
/// emitted verbatim, or re-indented when `indent` is also set.
///
/// # Errors
///
/// Returns an internal error when `body` is not a JSON document.
pub fn route_response(
    name: &str,
    status: StatusCode,
    body: &[u8],
    clock: &RequestClock,
    options: ResponseOptions,
    request_id: &str,
) -> Result<Response<ProxyResponseBody>, ProxyError> {
    let rendered = if options.compact {
        if options.indent {
            let value: serde_json::Value = parse_json(name, body)?;
            to_json(&value, true)?
        } else {
            serde_json::from_slice::<IgnoredAny>(body)
                .map_err(|e| ProxyError::internal(format!("{name} response is not JSON: {e}")))?;
            body.to_vec()
        }
    } else {
        let envelope = Envelope {
            name,
            status_code: status.as_u16(),
            body: parse_json(name, body)?,
            run: RunInfo {
                start_time: clock.started_at(),
                elapsed_ms: clock.elapsed_ms(),
                request_id,
            },
        };
        to_json(&envelope, options.indent)?
    };

    let mut response = Response::new(Full::new(Bytes::from(rendered)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    if let Ok(hv) = HeaderValue::from_str(&clock.elapsed_ms().to_string()) {
        response.headers_mut().insert(ELAPSED_HEADER, hv);
    }
    Ok(response)
}

fn parse_json(name: &str, body: &[u8]) -> Result<serde_json::Value, ProxyError> {
    serde_json::from_slice(body)
        .map_err(|e| ProxyError::internal(format!("{name} response is not JSON: {e}")))
}

fn to_json<T: Serialize>(value: &T, indent: bool) -> Result<Vec<u8>, ProxyError> {
    let encoded = if indent {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    };
    encoded.map_err(|e| ProxyError::internal(format!("cannot encode response: {e}")))
}

/// Serialize a rejection into a JSON error document.
///
/// ```json
/// {"Error": "BadRequest", "Message": "method GET not supported, expected POST"}
/// ```
#[must_use]
pub fn error_to_json(error: &ProxyError) -> Vec<u8> {
    let doc = serde_json::json!({
        "Error": error.kind.as_str(),
        "Message": error.message,
    });
    serde_json::to_vec(&doc).unwrap_or_default()
}

/// Convert a rejection into a complete HTTP error response.
#[must_use]
pub fn error_to_response(error: &ProxyError) -> Response<ProxyResponseBody> {
    let mut response = Response::new(Full::new(Bytes::from(error_to_json(error))));
    *response.status_mut() = error.kind.status_code();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    response
}

/// Relay a backend error status and body unchanged.
#[must_use]
pub fn backend_error_response(backend: BackendResponse) -> Response<ProxyResponseBody> {
    let mut response = Response::new(Full::new(backend.body));
    *response.status_mut() = backend.status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(AMZ_JSON_CONTENT_TYPE));
    response
}

/// Stamp the headers every response carries.
pub fn add_common_headers(response: &mut Response<ProxyResponseBody>, request_id: &str) {
    if let Ok(hv) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, hv);
    }
    response
        .headers_mut()
        .insert(SERVER, HeaderValue::from_static(SERVER_NAME));
}

/// Body bytes of a finished response, for tests.
#[cfg(test)]
pub(crate) async fn body_bytes(response: Response<ProxyResponseBody>) -> Bytes {
    use http_body_util::BodyExt;

    response
        .into_body()
        .collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_response_options() {
        let opts = ResponseOptions::from_query(Some("compact=1&indent=true&other=x"));
        assert!(opts.compact);
        assert!(opts.indent);

        let opts = ResponseOptions::from_query(Some("compact=0"));
        assert!(!opts.compact);
        assert_eq!(ResponseOptions::from_query(None), ResponseOptions::default());
    }

    #[tokio::test]
    async fn test_should_wrap_body_in_envelope() {
        let clock = RequestClock::start();
        let resp = route_response(
            "GetItem",
            StatusCode::OK,
            br#"{"Item":{"id":{"S":"1"}}}"#,
            &clock,
            ResponseOptions::default(),
            "req-1",
        )
        .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], JSON_CONTENT_TYPE);
        assert!(resp.headers().contains_key(ELAPSED_HEADER));

        let value: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(value["Name"], "GetItem");
        assert_eq!(value["StatusCode"], 200);
        assert_eq!(value["Body"]["Item"]["id"]["S"], "1");
        assert_eq!(value["Run"]["RequestId"], "req-1");
        assert!(value["Run"]["StartTime"].is_string());
    }

    #[tokio::test]
    async fn test_should_emit_compact_body_verbatim() {
        let raw: &[u8] = br#"{ "Count" : 0 }"#;
        let opts = ResponseOptions {
            compact: true,
            indent: false,
        };
        let resp =
            route_response("Scan", StatusCode::OK, raw, &RequestClock::start(), opts, "r")
                .unwrap();
        assert_eq!(body_bytes(resp).await.as_ref(), raw);
    }

    #[tokio::test]
    async fn test_should_indent_compact_body() {
        let opts = ResponseOptions {
            compact: true,
            indent: true,
        };
        let resp = route_response(
            "Scan",
            StatusCode::OK,
            br#"{"Count":0}"#,
            &RequestClock::start(),
            opts,
            "r",
        )
        .unwrap();
        let text = String::from_utf8(body_bytes(resp).await.to_vec()).unwrap();
        assert_eq!(text, "{\n  \"Count\": 0\n}");
    }

    #[test]
    fn test_should_reject_non_json_backend_body() {
        let err = route_response(
            "Scan",
            StatusCode::OK,
            b"<html>",
            &RequestClock::start(),
            ResponseOptions::default(),
            "r",
        )
        .unwrap_err();
        assert_eq!(err.kind, crate::error::ProxyErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_should_format_error_response() {
        let resp = error_to_response(&ProxyError::not_found("no route for /nope"));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let value: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(value["Error"], "NotFound");
        assert_eq!(value["Message"], "no route for /nope");
    }

    #[tokio::test]
    async fn test_should_relay_backend_error_unchanged() {
        let body = r#"{"__type":"com.amazonaws.dynamodb.v20120810#ResourceNotFoundException"}"#;
        let resp = backend_error_response(BackendResponse::new(StatusCode::BAD_REQUEST, body));
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.headers()[CONTENT_TYPE], AMZ_JSON_CONTENT_TYPE);
        assert_eq!(body_bytes(resp).await.as_ref(), body.as_bytes());
    }

    #[test]
    fn test_should_stamp_common_headers() {
        let mut resp = error_to_response(&ProxyError::internal("x"));
        add_common_headers(&mut resp, "abc");
        assert_eq!(resp.headers()[REQUEST_ID_HEADER], "abc");
        assert_eq!(resp.headers()[SERVER], SERVER_NAME);
    }
}
