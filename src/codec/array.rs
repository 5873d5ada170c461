use crate::error::SqlBridgeError;
use crate::value::{EngineValue, HostType, HostValue, TypeTag};

use super::{Codec, Codecs, Requested, mismatch, wrong_host};

/// Engine arrays element-by-element through the registry. Registered last:
/// it must not shadow any scalar codec, and recursion needs the full set.
pub(super) struct ArrayCodec;

impl Codec for ArrayCodec {
    fn host_type(&self) -> HostType {
        HostType::List
    }

    fn claims(&self, tag: &TypeTag) -> bool {
        matches!(tag, TypeTag::Array)
    }

    fn decode(&self, value: &EngineValue, codecs: &Codecs) -> Result<HostValue, SqlBridgeError> {
        match value {
            EngineValue::Array(items) => {
                let mut decoded = Vec::with_capacity(items.len());
                for item in items {
                    let element = codecs.decode(item, &item.tag(), Requested::Any)?;
                    decoded.push(element.unwrap_or(HostValue::Null));
                }
                Ok(HostValue::List(decoded))
            }
            other => Err(mismatch("array", other)),
        }
    }

    fn encode(&self, value: HostValue, codecs: &Codecs) -> Result<EngineValue, SqlBridgeError> {
        match value {
            HostValue::List(items) => {
                let mut encoded = Vec::with_capacity(items.len());
                for item in items {
                    if item.is_null() {
                        encoded.push(EngineValue::Null);
                    } else {
                        encoded.push(codecs.encode(item)?);
                    }
                }
                Ok(EngineValue::Array(encoded))
            }
            other => Err(wrong_host(HostType::List, &other)),
        }
    }
}
