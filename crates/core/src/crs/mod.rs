//! Coordinate reference systems
//!
//! SiteSim never reprojects: a CRS travels with a raster so that layers
//! derived from it (random points, buffers) can be tagged with the same one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    wkt: Option<String>,
    epsg: Option<u32>,
    proj: Option<String>,
}

impl CRS {
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Authority identifier such as `EPSG:4326`, when an EPSG code is known
    pub fn authid(&self) -> Option<String> {
        self.epsg.map(|code| format!("EPSG:{code}"))
    }

    /// Whether two descriptors name the same CRS
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }
        false
    }

    /// Short human-readable identifier
    pub fn identifier(&self) -> String {
        if let Some(authid) = self.authid() {
            return authid;
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            let head: String = wkt.chars().take(50).collect();
            return format!("WKT:{head}");
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authid() {
        assert_eq!(CRS::from_epsg(32719).authid().as_deref(), Some("EPSG:32719"));
        assert_eq!(CRS::from_proj("+proj=longlat").authid(), None);
    }

    #[test]
    fn test_crs_equivalence() {
        assert!(CRS::from_epsg(4326).is_equivalent(&CRS::wgs84()));
        assert!(!CRS::from_epsg(4326).is_equivalent(&CRS::from_wkt("GEOGCS[...]")));
    }

    #[test]
    fn test_identifier_truncates_wkt() {
        let crs = CRS::from_wkt("x".repeat(80));
        assert_eq!(crs.identifier().len(), "WKT:".len() + 50);
    }
}
