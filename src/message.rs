//! JSON-RPC messages exchanged with a service node.
//!
//! The node speaks a JSON-RPC 2.0 dialect: requests carry a `method`, optional
//! `params` and a hex string `id` (absent for notifications); responses carry
//! the echoed `id` and exactly one of `result` or `error`.
//!
//! ```text
//! {"method":"ping_service","params":{"timestamp":1700000000000},"jsonrpc":"2.0","id":"0000000000000001"}
//! {"result":{},"jsonrpc":"2.0","id":"0000000000000001"}
//! {"error":{"code":-1,"message":"no license"},"jsonrpc":"2.0","id":"0000000000000001"}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Protocol version tag stamped on every outbound message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Method names understood by service nodes.
pub mod method {
    /// License activation handshake.
    pub const ACTIVATE: &str = "activate_request";
    /// Liveness probe sent to the node.
    pub const PING_SERVICE: &str = "ping_service";
    /// Hand the node its working directories.
    pub const PREPARE_SERVICE: &str = "prepare_service";
    /// Ask the node to shut down.
    pub const STOP_SERVICE: &str = "stop_service";
    /// Ask the node to upload its own log.
    pub const GET_LOG_SERVICE: &str = "get_log_service";
    /// Start a stream from a configuration object.
    pub const START_STREAM: &str = "start_stream";
    /// Stop a running stream.
    pub const STOP_STREAM: &str = "stop_stream";
    /// Restart a running stream.
    pub const RESTART_STREAM: &str = "restart_stream";
    /// Ask the node to upload a stream's log.
    pub const GET_LOG_STREAM: &str = "get_log_stream";
    /// Liveness probe sent by the node; answered automatically.
    pub const PING_CLIENT: &str = "ping_client";
    /// Periodic per-stream statistics pushed by the node.
    pub const STATISTIC_STREAM: &str = "statistic_stream";
    /// Stream input sources changed.
    pub const CHANGED_SOURCE_STREAM: &str = "changed_source_stream";
    /// Periodic node statistics pushed by the node.
    pub const STATISTIC_SERVICE: &str = "statistic_service";
    /// Stream status change pushed by the node.
    pub const STATUS_STREAM: &str = "status_stream";
}

/// Correlation identifier in its wire form.
///
/// Identifiers minted locally are the lowercase hex of the big-endian
/// 8-byte sequence number. Identifiers received from the peer are kept
/// verbatim so replies echo them exactly.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Build an identifier from a sequence number.
    ///
    /// # Examples
    ///
    /// ```
    /// use nodewire::message::RequestId;
    ///
    /// assert_eq!(RequestId::from_seq(258).as_str(), "0000000000000102");
    /// ```
    #[must_use]
    pub fn from_seq(seq: u64) -> Self { Self(format!("{seq:016x}")) }

    /// Recover the sequence number of a locally minted identifier.
    #[must_use]
    pub fn seq(&self) -> Option<u64> {
        if self.0.len() != 16 {
            return None;
        }
        u64::from_str_radix(&self.0, 16).ok()
    }

    /// Return the wire text.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<u64> for RequestId {
    fn from(seq: u64) -> Self { Self::from_seq(seq) }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self { Self(value.to_owned()) }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self { Self(value) }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Current UTC time in milliseconds, as carried by ping payloads.
#[must_use]
pub fn utc_timestamp_millis() -> i64 { chrono::Utc::now().timestamp_millis() }

pub(crate) fn timestamp_params() -> Value { json!({ "timestamp": utc_timestamp_millis() }) }

/// An RPC request or notification.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    /// Correlation identifier; `None` marks a notification.
    pub id: Option<RequestId>,
    /// Operation name.
    pub method: String,
    /// Method-specific payload.
    pub params: Option<Value>,
}

impl Request {
    /// Create a request that expects a response.
    #[must_use]
    pub fn new(id: RequestId, method: impl Into<String>, params: Value) -> Self {
        Self {
            id: Some(id),
            method: method.into(),
            params: Some(params),
        }
    }

    /// Create a fire-and-forget notification.
    #[must_use]
    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: None,
            method: method.into(),
            params: Some(params),
        }
    }

    /// Returns `true` when no response is expected.
    #[must_use]
    pub fn is_notification(&self) -> bool { self.id.is_none() }

    /// Serialise to wire JSON.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::Json`] if the params cannot be serialised.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> { encode_request(self) }
}

/// Structured failure carried by an error response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable description.
    pub message: String,
}

/// An RPC response.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    /// Identifier of the request being answered.
    pub id: Option<RequestId>,
    /// Success payload.
    pub result: Option<Value>,
    /// Failure payload.
    pub error: Option<RpcError>,
}

impl Response {
    /// Create a success response.
    #[must_use]
    pub fn message(id: Option<RequestId>, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    #[must_use]
    pub fn error(id: Option<RequestId>, error: RpcError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Returns `true` for a success response.
    #[must_use]
    pub fn is_message(&self) -> bool { self.error.is_none() && self.result.is_some() }

    /// Returns `true` for an error response.
    #[must_use]
    pub fn is_error(&self) -> bool { self.error.is_some() }

    /// Serialise to wire JSON.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::EmptyResponse`] if neither `result` nor `error`
    /// is set.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> { encode_response(self) }
}

/// A decoded inbound message.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// A request or notification from the peer.
    Request(Request),
    /// A response to one of our requests.
    Response(Response),
}

/// Errors raised while serialising a message.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// A response had neither `result` nor `error`.
    #[error("response has neither result nor error")]
    EmptyResponse,
    /// JSON serialisation failed.
    #[error("failed to serialise message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while parsing an inbound payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not valid JSON.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The payload is valid JSON but not an object.
    #[error("malformed message: expected a JSON object")]
    NotAnObject,
    /// The object has none of `method`, `result` or `error`.
    #[error("malformed message: no method, result or error")]
    Unrecognised,
    /// A known key holds a value of the wrong shape.
    #[error("malformed message: invalid `{field}` field")]
    InvalidField {
        /// Offending key.
        field: &'static str,
    },
}

#[derive(Serialize)]
struct WireRequest<'a> {
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Value>,
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a RequestId>,
}

#[derive(Serialize)]
struct WireResult<'a> {
    result: &'a Value,
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a RequestId>,
}

#[derive(Serialize)]
struct WireError<'a> {
    error: &'a RpcError,
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a RequestId>,
}

/// Serialise a request; the `id` key is omitted for notifications and the
/// `params` key when the request has none. An explicit `null` is kept.
///
/// # Errors
///
/// Returns [`EncodeError::Json`] if serialisation fails.
pub fn encode_request(request: &Request) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec(&WireRequest {
        method: &request.method,
        params: request.params.as_ref(),
        jsonrpc: JSONRPC_VERSION,
        id: request.id.as_ref(),
    })?)
}

/// Serialise a response. An `error` takes precedence over a `result`.
///
/// # Errors
///
/// Returns [`EncodeError::EmptyResponse`] if neither field is set, or
/// [`EncodeError::Json`] if serialisation fails.
pub fn encode_response(response: &Response) -> Result<Vec<u8>, EncodeError> {
    let id = response.id.as_ref();
    let bytes = match (&response.error, &response.result) {
        (Some(error), _) => serde_json::to_vec(&WireError {
            error,
            jsonrpc: JSONRPC_VERSION,
            id,
        })?,
        (None, Some(result)) => serde_json::to_vec(&WireResult {
            result,
            jsonrpc: JSONRPC_VERSION,
            id,
        })?,
        (None, None) => return Err(EncodeError::EmptyResponse),
    };
    Ok(bytes)
}

/// Parse an inbound payload into a [`Message`].
///
/// A `method` key makes the message a request; otherwise a `result` key
/// makes it a success response and an `error` key an error response.
///
/// # Errors
///
/// Returns a [`DecodeError`] describing why the payload was rejected.
///
/// # Examples
///
/// ```
/// use nodewire::message::{Message, decode};
///
/// let msg = decode(br#"{"result":{},"jsonrpc":"2.0","id":"0000000000000000"}"#)
///     .expect("valid response");
/// assert!(matches!(msg, Message::Response(resp) if resp.is_message()));
/// ```
pub fn decode(bytes: &[u8]) -> Result<Message, DecodeError> {
    let Value::Object(mut object) = serde_json::from_slice::<Value>(bytes)? else {
        return Err(DecodeError::NotAnObject);
    };
    let id = take_id(&mut object)?;

    if let Some(method) = object.remove("method") {
        let Value::String(method) = method else {
            return Err(DecodeError::InvalidField { field: "method" });
        };
        let params = object.remove("params");
        return Ok(Message::Request(Request { id, method, params }));
    }
    if let Some(result) = object.remove("result") {
        return Ok(Message::Response(Response::message(id, result)));
    }
    if let Some(error) = object.remove("error") {
        let error = serde_json::from_value::<RpcError>(error)
            .map_err(|_| DecodeError::InvalidField { field: "error" })?;
        return Ok(Message::Response(Response::error(id, error)));
    }
    Err(DecodeError::Unrecognised)
}

fn take_id(object: &mut Map<String, Value>) -> Result<Option<RequestId>, DecodeError> {
    match object.remove("id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) => Ok(Some(RequestId::from(id))),
        Some(Value::Number(id)) => Ok(Some(RequestId::from(id.to_string()))),
        Some(_) => Err(DecodeError::InvalidField { field: "id" }),
    }
}
