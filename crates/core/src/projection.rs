//! Projection metadata carried alongside raster grids

use serde::{Deserialize, Serialize};
use std::fmt;

/// Spatial reference of a raster, kept as the text the source provided
/// (WKT or an `EPSG:<code>` authority string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Projection {
    definition: String,
}

impl Projection {
    /// Wrap a projection definition (WKT, `EPSG:<code>`, ...)
    pub fn new(definition: impl Into<String>) -> Self {
        Self {
            definition: definition.into().trim().to_string(),
        }
    }

    /// Projection from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self::new(format!("EPSG:{code}"))
    }

    /// The definition string
    pub fn as_str(&self) -> &str {
        &self.definition
    }

    /// EPSG code when the definition is an `EPSG:<code>` string
    pub fn epsg(&self) -> Option<u32> {
        let (authority, code) = self.definition.split_once(':')?;
        if authority.eq_ignore_ascii_case("epsg") {
            code.trim().parse().ok()
        } else {
            None
        }
    }

    /// Whether two projections describe the same reference system
    pub fn is_equivalent(&self, other: &Projection) -> bool {
        match (self.epsg(), other.epsg()) {
            (Some(a), Some(b)) => a == b,
            _ => self.definition == other.definition,
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // WKT strings get long; show the head only
        if self.definition.chars().count() > 60 {
            let head: String = self.definition.chars().take(60).collect();
            write!(f, "{head}...")
        } else {
            write!(f, "{}", self.definition)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epsg_parse() {
        assert_eq!(Projection::from_epsg(32613).epsg(), Some(32613));
        assert_eq!(Projection::new("epsg: 4326").epsg(), Some(4326));
        assert_eq!(Projection::new("PROJCS[\"WGS 84 / UTM 13N\"]").epsg(), None);
    }

    #[test]
    fn test_equivalence() {
        let a = Projection::from_epsg(5070);
        let b = Projection::new("EPSG:5070");
        let c = Projection::new("PROJCS[\"Albers\"]");
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&c));
        assert!(c.is_equivalent(&c.clone()));
    }
}
