//! Value types crossing the two boundaries of the crate: [`EngineValue`] is
//! the engine-side currency, [`HostValue`] the application-side one. Codecs
//! translate between them.

pub mod engine;
pub mod host;
pub mod interval;
#[cfg(feature = "geometry")]
pub mod point;

pub use engine::{BlobValue, ClobValue, EngineValue, TypeTag};
pub use host::{HostDecode, HostType, HostValue};
pub use interval::{IntervalQualifier, MonthSpan, SqlInterval};
#[cfg(feature = "geometry")]
pub use point::Point;
