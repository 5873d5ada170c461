use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SqlBridgeError;

/// Two-dimensional point, the only geometry shape carried across the engine
/// boundary. Serialized as WKT (`POINT (x y)`) when an engine stores
/// geometries as text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "POINT ({} {})", self.x, self.y)
    }
}

impl FromStr for Point {
    type Err = SqlBridgeError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let malformed =
            || SqlBridgeError::ConversionError(format!("malformed point literal: {text}"));
        let trimmed = text.trim();
        let body = trimmed
            .strip_prefix("POINT")
            .or_else(|| trimmed.strip_prefix("point"))
            .ok_or_else(malformed)?
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(malformed)?;
        let (x, y) = body.trim().split_once(char::is_whitespace).ok_or_else(malformed)?;
        Ok(Self {
            x: x.trim().parse().map_err(|_| malformed())?,
            y: y.trim().parse().map_err(|_| malformed())?,
        })
    }
}
