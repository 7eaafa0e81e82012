//! Gremlin Server wire framing.
//!
//! Binary request frames are `[mime length: u8][mime bytes][payload]`; the
//! server uses the mime type to pick a deserializer. Response frames carry a
//! JSON envelope:
//!
//! ```json
//! {
//!   "requestId": "…",
//!   "status": { "code": 206, "message": "", "attributes": {} },
//!   "result": { "data": [ … ], "meta": {} }
//! }
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use gremlin_core::RequestId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GremlinError, Result};

/// Response status codes the dispatcher distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusCode {
    /// 200: final result bundle.
    Success,
    /// 204: success with no results.
    NoContent,
    /// 206: one chunk of a streamed result; more frames follow.
    PartialContent,
    /// 407: the server wants a SASL challenge response first.
    Authenticate,
    /// Anything else, treated as an error terminus.
    Other(i64),
}

impl From<i64> for StatusCode {
    fn from(code: i64) -> Self {
        match code {
            200 => Self::Success,
            204 => Self::NoContent,
            206 => Self::PartialContent,
            407 => Self::Authenticate,
            other => Self::Other(other),
        }
    }
}

impl StatusCode {
    /// Numeric code as sent on the wire.
    pub fn code(self) -> i64 {
        match self {
            Self::Success => 200,
            Self::NoContent => 204,
            Self::PartialContent => 206,
            Self::Authenticate => 407,
            Self::Other(code) => code,
        }
    }
}

/// Frame a request body for the wire.
pub fn encode_request<T: Serialize + ?Sized>(mime: &str, body: &T) -> Result<Bytes> {
    let mime_len = u8::try_from(mime.len())
        .map_err(|_| GremlinError::InvalidRequest(format!("mime type too long: {mime}")))?;
    let json = serde_json::to_vec(body)?;

    let mut buf = BytesMut::with_capacity(1 + mime.len() + json.len());
    buf.put_u8(mime_len);
    buf.put_slice(mime.as_bytes());
    buf.put_slice(&json);
    Ok(buf.freeze())
}

/// Split a request frame into its mime type and payload.
///
/// The inverse of [`encode_request`]; servers and test doubles use it to
/// read what the driver sent.
pub fn split_request(frame: &[u8]) -> Result<(&str, &[u8])> {
    let (&len, rest) = frame
        .split_first()
        .ok_or_else(|| GremlinError::InvalidRequest("empty frame".into()))?;
    let len = usize::from(len);
    if rest.len() < len {
        return Err(GremlinError::InvalidRequest(format!(
            "mime length {len} exceeds frame of {} bytes",
            frame.len()
        )));
    }
    let (mime, payload) = rest.split_at(len);
    let mime = std::str::from_utf8(mime)
        .map_err(|e| GremlinError::InvalidRequest(format!("mime type is not UTF-8: {e}")))?;
    Ok((mime, payload))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    request_id: RequestId,
    status: Status,
    #[serde(default)]
    result: ResultBody,
}

// Any integer is accepted; codes outside the HTTP range are still errors.
#[derive(Deserialize)]
struct Status {
    code: i64,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Default, Deserialize)]
struct ResultBody {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    meta: Value,
}

/// One decoded inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryResponse {
    /// Request this frame answers.
    pub request_id: RequestId,
    /// Numeric status code.
    pub status_code: i64,
    /// Status message (empty when the server sent none).
    pub status_message: String,
    /// `result.data`, usually an array of serialized results.
    pub data: Value,
    /// `result.meta`.
    pub meta: Value,
    /// The whole envelope as received.
    pub raw: Value,
}

impl QueryResponse {
    /// Status code classified for dispatch.
    pub fn status(&self) -> StatusCode {
        StatusCode::from(self.status_code)
    }

    /// Append this frame's results to `out`.
    ///
    /// Array data is flattened; a scalar is pushed as one item and `null`
    /// adds nothing.
    pub fn collect_into(&self, out: &mut Vec<Value>) {
        match &self.data {
            Value::Array(items) => out.extend(items.iter().cloned()),
            Value::Null => {}
            other => out.push(other.clone()),
        }
    }
}

/// Decode a raw inbound frame into a [`QueryResponse`].
///
/// Fails with [`GremlinError::MalformedResponse`] when the bytes are not
/// UTF-8, not JSON, or missing `requestId` / `status.code`.
pub fn decode_response(frame: &[u8]) -> Result<QueryResponse> {
    let text = std::str::from_utf8(frame)
        .map_err(|e| GremlinError::MalformedResponse(format!("not UTF-8: {e}")))?;
    let raw: Value = serde_json::from_str(text)
        .map_err(|e| GremlinError::MalformedResponse(format!("not JSON: {e}")))?;
    let envelope = Envelope::deserialize(&raw)
        .map_err(|e| GremlinError::MalformedResponse(format!("bad envelope: {e}")))?;

    Ok(QueryResponse {
        request_id: envelope.request_id,
        status_code: envelope.status.code,
        status_message: envelope.status.message.unwrap_or_default(),
        data: envelope.result.data,
        meta: envelope.result.meta,
        raw,
    })
}
