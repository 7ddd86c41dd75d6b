//! Policies deciding which opaque values can cross a tier boundary.

use crate::error::{CodecError, CodecResult};
use portal_model::OpaqueValue;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Decides how opaque field values are encoded.
///
/// Built-in scalars (null, bool, integers, floats, text, JSON) are always
/// direct; entities and lists always decompose into child records. Anything
/// else reaches the policy, and an unsupported type is an error rather than
/// a silent drop.
pub trait SerializationPolicy: Send + Sync {
    fn is_directly_encodable(&self, type_name: &str) -> bool {
        let _ = type_name;
        false
    }

    fn encode_opaque(&self, value: &OpaqueValue) -> CodecResult<serde_json::Value> {
        Err(CodecError::Unsupported {
            type_name: value.type_name().to_string(),
        })
    }

    fn decode_opaque(&self, type_name: &str, data: serde_json::Value) -> CodecResult<OpaqueValue> {
        let _ = data;
        Err(CodecError::Unsupported {
            type_name: type_name.to_string(),
        })
    }
}

/// Rejects every opaque value.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictPolicy;

impl SerializationPolicy for StrictPolicy {}

type EncodeFn = Arc<dyn Fn(&OpaqueValue) -> CodecResult<serde_json::Value> + Send + Sync>;
type DecodeFn = Arc<dyn Fn(serde_json::Value) -> CodecResult<Box<dyn Any + Send + Sync>> + Send + Sync>;

struct OpaqueCodec {
    encode: EncodeFn,
    decode: DecodeFn,
}

/// Policy backed by serde: each registered type name maps to a Rust type
/// that is encoded as JSON.
#[derive(Default)]
pub struct OpaqueRegistry {
    codecs: HashMap<String, OpaqueCodec>,
}

impl OpaqueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` under `type_name`.
    pub fn register<T>(&mut self, type_name: &str) -> &mut Self
    where
        T: Serialize + DeserializeOwned + Any + Send + Sync,
    {
        let name = type_name.to_string();
        let encode: EncodeFn = Arc::new(move |value: &OpaqueValue| {
            let inner = value.downcast_ref::<T>().ok_or_else(|| {
                CodecError::Serialization(format!(
                    "opaque value tagged '{}' does not hold the registered type",
                    value.type_name()
                ))
            })?;
            Ok(serde_json::to_value(inner)?)
        });
        let decode: DecodeFn = Arc::new(|data| {
            let value: T = serde_json::from_value(data)?;
            Ok(Box::new(value))
        });
        self.codecs.insert(name, OpaqueCodec { encode, decode });
        self
    }
}

impl SerializationPolicy for OpaqueRegistry {
    fn is_directly_encodable(&self, type_name: &str) -> bool {
        self.codecs.contains_key(type_name)
    }

    fn encode_opaque(&self, value: &OpaqueValue) -> CodecResult<serde_json::Value> {
        let codec = self
            .codecs
            .get(value.type_name())
            .ok_or_else(|| CodecError::Unsupported {
                type_name: value.type_name().to_string(),
            })?;
        (codec.encode)(value)
    }

    fn decode_opaque(&self, type_name: &str, data: serde_json::Value) -> CodecResult<OpaqueValue> {
        let codec = self
            .codecs
            .get(type_name)
            .ok_or_else(|| CodecError::Unsupported {
                type_name: type_name.to_string(),
            })?;
        let boxed = (codec.decode)(data)?;
        Ok(OpaqueValue::from_boxed(type_name, boxed))
    }
}
