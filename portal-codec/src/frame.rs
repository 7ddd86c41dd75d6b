//! Length-prefixed JSON framing for portal messages.
//!
//! A frame is a 4-byte big-endian body length followed by a JSON body.

use crate::error::{CodecError, CodecResult};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Default upper bound on a frame body (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const LEN_PREFIX: usize = 4;

pub fn write_frame<T: Serialize>(message: &T, max: usize) -> CodecResult<Vec<u8>> {
    let body = serde_json::to_vec(message)?;
    if body.len() > max || body.len() > u32::MAX as usize {
        return Err(CodecError::FrameTooLarge {
            len: body.len(),
            max,
        });
    }
    let mut frame = Vec::with_capacity(LEN_PREFIX + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

pub fn read_frame<T: DeserializeOwned>(bytes: &[u8], max: usize) -> CodecResult<T> {
    let Some((prefix, body)) = bytes.split_first_chunk::<LEN_PREFIX>() else {
        return Err(CodecError::MalformedFrame(format!(
            "{} bytes is shorter than the length prefix",
            bytes.len()
        )));
    };
    let len = u32::from_be_bytes(*prefix) as usize;
    if len > max {
        return Err(CodecError::FrameTooLarge { len, max });
    }
    if body.len() != len {
        return Err(CodecError::MalformedFrame(format!(
            "declared {len} body bytes, got {}",
            body.len()
        )));
    }
    serde_json::from_slice(body).map_err(|e| CodecError::MalformedFrame(e.to_string()))
}
