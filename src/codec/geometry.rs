use crate::error::SqlBridgeError;
use crate::value::{EngineValue, HostType, HostValue, Point, TypeTag};

use super::{Codec, Codecs, mismatch, wrong_host};

/// Planar points, available behind the `geometry` feature.
pub(super) struct GeometryCodec;

impl Codec for GeometryCodec {
    fn host_type(&self) -> HostType {
        HostType::Geometry
    }

    fn claims(&self, tag: &TypeTag) -> bool {
        matches!(tag, TypeTag::Geometry)
    }

    fn decode(&self, value: &EngineValue, _codecs: &Codecs) -> Result<HostValue, SqlBridgeError> {
        match value {
            EngineValue::Geometry(point) => Ok(HostValue::Geometry(*point)),
            other => Err(mismatch("geometry", other)),
        }
    }

    fn encode(&self, value: HostValue, _codecs: &Codecs) -> Result<EngineValue, SqlBridgeError> {
        match value {
            HostValue::Geometry(point) => Ok(EngineValue::Geometry(point)),
            other => Err(wrong_host(HostType::Geometry, &other)),
        }
    }
}
