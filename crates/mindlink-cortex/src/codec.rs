//! Cortex JSON-RPC 2.0 frame encoding and decoding.
//!
//! The Cortex service speaks JSON-RPC 2.0 over WebSocket text frames.
//! Requests flow from client to service; responses (matched by `id`) and
//! unsolicited telemetry notifications flow back interleaved on the same
//! connection.
//!
//! # Frame formats
//!
//! ```text
//! Request:       {"id":<n>,"jsonrpc":"2.0","method":"<m>","params":{...}}
//! Response:      {"id":<n>,"jsonrpc":"2.0","result":{...}}
//! Error:         {"id":<n>,"jsonrpc":"2.0","error":{"code":<c>,"message":"<m>"}}
//! Notification:  {"pow":[...],"sid":"<session>","time":<t>}
//! ```
//!
//! Telemetry notifications carry no `id` member; that absence is what
//! classifies a frame. All encoding/decoding in this module is pure
//! parsing -- no I/O is performed.

use serde::Deserialize;
use serde_json::{json, Value};

use mindlink_core::{Error, Result, SessionHandle, StreamKind};

// ---------------------------------------------------------------------------
// Method names
// ---------------------------------------------------------------------------

/// Cortex API method names.
pub mod methods {
    pub const GET_CORTEX_INFO: &str = "getCortexInfo";
    pub const REQUEST_ACCESS: &str = "requestAccess";
    pub const AUTHORIZE: &str = "authorize";
    pub const QUERY_HEADSETS: &str = "queryHeadsets";
    pub const CREATE_SESSION: &str = "createSession";
    pub const SUBSCRIBE: &str = "subscribe";
    pub const UNSUBSCRIBE: &str = "unsubscribe";
    pub const UPDATE_SESSION: &str = "updateSession";
}

// ---------------------------------------------------------------------------
// Request encoding
// ---------------------------------------------------------------------------

/// Encode a JSON-RPC 2.0 request with the given correlation id.
pub fn encode_request(id: u64, method: &str, params: Option<&Value>) -> String {
    let mut request = json!({
        "id": id,
        "jsonrpc": "2.0",
        "method": method,
    });
    if let Some(params) = params {
        request["params"] = params.clone();
    }
    request.to_string()
}

// ---------------------------------------------------------------------------
// Param builders
//
// Each builder returns the `params` object for one Cortex method. The
// `id`/`jsonrpc`/`method` envelope is added by `encode_request` when the
// client layer assigns a correlation id.
// ---------------------------------------------------------------------------

/// Build `requestAccess` params.
pub fn request_access_params(client_id: &str, client_secret: &str) -> Value {
    json!({
        "clientId": client_id,
        "clientSecret": client_secret,
    })
}

/// Build `authorize` params.
pub fn authorize_params(client_id: &str, client_secret: &str) -> Value {
    json!({
        "clientId": client_id,
        "clientSecret": client_secret,
    })
}

/// Build `queryHeadsets` params (empty object).
pub fn query_headsets_params() -> Value {
    json!({})
}

/// Build `createSession` params for an active ("open") session.
pub fn create_session_params(token: &str, headset_id: &str) -> Value {
    json!({
        "cortexToken": token,
        "headset": headset_id,
        "status": "open",
    })
}

/// Build `subscribe` params for the given streams.
pub fn subscribe_params(handle: &SessionHandle, streams: &[StreamKind]) -> Value {
    json!({
        "cortexToken": handle.token.as_str(),
        "session": handle.session_id,
        "streams": streams.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
    })
}

/// Build `unsubscribe` params for the given streams.
pub fn unsubscribe_params(handle: &SessionHandle, streams: &[StreamKind]) -> Value {
    // Same shape as subscribe; the method name carries the intent.
    subscribe_params(handle, streams)
}

/// Build `updateSession` params that close the session.
pub fn close_session_params(handle: &SessionHandle) -> Value {
    json!({
        "cortexToken": handle.token.as_str(),
        "session": handle.session_id,
        "status": "close",
    })
}

// ---------------------------------------------------------------------------
// Frame decoding
// ---------------------------------------------------------------------------

/// A JSON-RPC error object from a response frame.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// A decoded JSON-RPC response, correlated to a request by `id`.
#[derive(Debug, Clone)]
pub struct RpcResponse {
    /// Correlation id echoed from the request.
    pub id: u64,
    /// The `result` member, if the call succeeded.
    pub result: Option<Value>,
    /// The `error` member, if the call failed.
    pub error: Option<RpcError>,
    /// The complete frame as parsed JSON, for logging and diagnostics.
    pub raw: Value,
}

impl RpcResponse {
    /// Whether the response carries an `error` member.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// An unsolicited telemetry frame (no `id` member).
#[derive(Debug, Clone)]
pub struct Notification {
    /// The complete frame as parsed JSON.
    pub raw: Value,
}

impl Notification {
    /// The service-side timestamp (`time` member), if present.
    pub fn time(&self) -> Option<f64> {
        self.raw.get("time").and_then(Value::as_f64)
    }

    /// The session id (`sid` member), if present.
    pub fn sid(&self) -> Option<&str> {
        self.raw.get("sid").and_then(Value::as_str)
    }

    /// The named stream payload member, if present.
    pub fn stream_payload(&self, stream: StreamKind) -> Option<&Value> {
        self.raw.get(stream.as_str())
    }
}

/// A decoded inbound frame: either a correlated response or telemetry.
#[derive(Debug, Clone)]
pub enum Frame {
    Response(RpcResponse),
    Notification(Notification),
}

/// Parse one inbound text frame.
///
/// A frame with a numeric `id` member is a response; any other JSON object
/// is a telemetry notification. Non-JSON or non-object frames are a
/// protocol error.
pub fn parse_frame(text: &str) -> Result<Frame> {
    let raw: Value = serde_json::from_str(text)
        .map_err(|e| Error::Protocol(format!("invalid JSON frame: {}", e)))?;

    if !raw.is_object() {
        return Err(Error::Protocol(format!(
            "expected a JSON object frame, got: {}",
            raw
        )));
    }

    match raw.get("id").and_then(Value::as_u64) {
        Some(id) => {
            let error = match raw.get("error") {
                Some(e) => Some(
                    RpcError::deserialize(e)
                        .map_err(|e| Error::Protocol(format!("malformed error member: {}", e)))?,
                ),
                None => None,
            };
            Ok(Frame::Response(RpcResponse {
                id,
                result: raw.get("result").cloned(),
                error,
                raw,
            }))
        }
        None => Ok(Frame::Notification(Notification { raw })),
    }
}

// ---------------------------------------------------------------------------
// Band-power payload shapes
// ---------------------------------------------------------------------------

/// Tabular band-power payload: declared column labels plus value rows.
#[derive(Debug, Clone, Deserialize)]
pub struct PowTable {
    #[serde(default)]
    pub cols: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<f64>>,
}

/// The band-power (`pow`) payload, in any of the shapes the service emits.
///
/// Firmware revisions have shipped three encodings of the same data: a
/// flat numeric vector, a table with declared columns, and a single-element
/// list wrapping such a table. Deserialization tries each in order.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PowPayload {
    Flat(Vec<f64>),
    Table(PowTable),
    TableList(Vec<PowTable>),
}

impl PowPayload {
    /// The declared column labels, if this shape carries any.
    pub fn columns(&self) -> Option<&[String]> {
        match self {
            PowPayload::Flat(_) => None,
            PowPayload::Table(t) => (!t.cols.is_empty()).then_some(t.cols.as_slice()),
            PowPayload::TableList(list) => list
                .first()
                .and_then(|t| (!t.cols.is_empty()).then_some(t.cols.as_slice())),
        }
    }

    /// Flatten to the single numeric vector all shapes encode.
    ///
    /// Tabular shapes contribute their first value row; an empty table
    /// yields an empty vector.
    pub fn into_flat(self) -> Vec<f64> {
        match self {
            PowPayload::Flat(values) => values,
            PowPayload::Table(t) => t.values.into_iter().next().unwrap_or_default(),
            PowPayload::TableList(list) => list
                .into_iter()
                .next()
                .and_then(|t| t.values.into_iter().next())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindlink_core::AuthToken;

    fn test_handle() -> SessionHandle {
        SessionHandle {
            session_id: "sess-1".to_string(),
            headset_id: "EPOCX-1234".to_string(),
            token: AuthToken::new("tok".to_string()),
        }
    }

    #[test]
    fn encode_request_with_params() {
        let params = json!({"clientId": "a", "clientSecret": "b"});
        let encoded = encode_request(7, methods::REQUEST_ACCESS, Some(&params));
        let parsed: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(parsed["id"], 7);
        assert_eq!(parsed["jsonrpc"], "2.0");
        assert_eq!(parsed["method"], "requestAccess");
        assert_eq!(parsed["params"]["clientId"], "a");
    }

    #[test]
    fn encode_request_without_params() {
        let encoded = encode_request(1, methods::GET_CORTEX_INFO, None);
        let parsed: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(parsed["id"], 1);
        assert_eq!(parsed["method"], "getCortexInfo");
        assert!(parsed.get("params").is_none());
    }

    #[test]
    fn parse_success_response() {
        let frame = parse_frame(r#"{"id":3,"jsonrpc":"2.0","result":{"cortexToken":"xyz"}}"#)
            .unwrap();
        match frame {
            Frame::Response(resp) => {
                assert_eq!(resp.id, 3);
                assert!(!resp.is_error());
                assert_eq!(resp.result.unwrap()["cortexToken"], "xyz");
            }
            Frame::Notification(_) => panic!("expected response"),
        }
    }

    #[test]
    fn parse_error_response() {
        let frame =
            parse_frame(r#"{"id":4,"jsonrpc":"2.0","error":{"code":-32001,"message":"denied"}}"#)
                .unwrap();
        match frame {
            Frame::Response(resp) => {
                assert_eq!(resp.id, 4);
                let err = resp.error.unwrap();
                assert_eq!(err.code, -32001);
                assert_eq!(err.message, "denied");
            }
            Frame::Notification(_) => panic!("expected response"),
        }
    }

    #[test]
    fn parse_telemetry_notification() {
        let frame =
            parse_frame(r#"{"pow":[1.0,2.0],"sid":"s","time":1234.5}"#).unwrap();
        match frame {
            Frame::Notification(n) => {
                assert_eq!(n.time(), Some(1234.5));
                assert_eq!(n.sid(), Some("s"));
                assert!(n.stream_payload(StreamKind::Pow).is_some());
                assert!(n.stream_payload(StreamKind::Eeg).is_none());
            }
            Frame::Response(_) => panic!("expected notification"),
        }
    }

    #[test]
    fn parse_invalid_json_is_protocol_error() {
        let result = parse_frame("not json at all");
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn parse_non_object_is_protocol_error() {
        let result = parse_frame("[1,2,3]");
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn subscribe_params_shape() {
        let params = subscribe_params(&test_handle(), &[StreamKind::Pow, StreamKind::Eeg]);
        assert_eq!(params["cortexToken"], "tok");
        assert_eq!(params["session"], "sess-1");
        assert_eq!(params["streams"], json!(["pow", "eeg"]));
    }

    #[test]
    fn close_session_params_shape() {
        let params = close_session_params(&test_handle());
        assert_eq!(params["status"], "close");
        assert_eq!(params["session"], "sess-1");
    }

    #[test]
    fn pow_payload_flat() {
        let payload: PowPayload = serde_json::from_value(json!([1.0, 2.0, 3.0])).unwrap();
        assert!(payload.columns().is_none());
        assert_eq!(payload.into_flat(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn pow_payload_table() {
        let payload: PowPayload = serde_json::from_value(json!({
            "cols": ["AF3/theta", "AF3/alpha"],
            "values": [[0.5, 0.6]],
        }))
        .unwrap();
        assert_eq!(payload.columns().unwrap().len(), 2);
        assert_eq!(payload.into_flat(), vec![0.5, 0.6]);
    }

    #[test]
    fn pow_payload_table_list() {
        let payload: PowPayload = serde_json::from_value(json!([{
            "cols": ["AF3/theta"],
            "values": [[0.5]],
        }]))
        .unwrap();
        assert_eq!(payload.columns().unwrap(), ["AF3/theta".to_string()]);
        assert_eq!(payload.into_flat(), vec![0.5]);
    }

    #[test]
    fn pow_payload_empty_table_flattens_empty() {
        let payload: PowPayload =
            serde_json::from_value(json!({"cols": [], "values": []})).unwrap();
        assert!(payload.columns().is_none());
        assert!(payload.into_flat().is_empty());
    }
}
