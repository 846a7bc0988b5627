//! Vector features and in-memory vector layers

use crate::crs::CRS;
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Numeric value; `None` for Null, strings, booleans and NaN
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) if !v.is_nan() => Some(*v),
            _ => None,
        }
    }
}

impl From<Option<f64>> for AttributeValue {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) if !v.is_nan() => AttributeValue::Float(v),
            _ => AttributeValue::Null,
        }
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Option<Geometry<f64>>,
    pub properties: HashMap<String, AttributeValue>,
    pub id: Option<u64>,
}

impl Feature {
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: Some(geometry.into()),
            properties: HashMap::new(),
            id: None,
        }
    }

    /// A feature with no geometry
    pub fn empty() -> Self {
        Self {
            geometry: None,
            properties: HashMap::new(),
            id: None,
        }
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// Numeric attribute; missing and Null fields both read as `None`
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get_property(key).and_then(AttributeValue::as_f64)
    }
}

/// Collection of features
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self { features: Vec::new() }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Feature> {
        self.features.iter_mut()
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

/// Geometry type a layer is declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
    Polygon,
}

impl GeometryKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::Polygon => "Polygon",
        }
    }
}

/// An in-memory vector layer: named, typed, tagged with a CRS.
#[derive(Debug, Clone)]
pub struct VectorLayer {
    name: String,
    crs: Option<CRS>,
    geometry_kind: GeometryKind,
    features: FeatureCollection,
    next_fid: u64,
}

impl VectorLayer {
    pub fn new(name: impl Into<String>, geometry_kind: GeometryKind, crs: Option<CRS>) -> Self {
        Self {
            name: name.into(),
            crs,
            geometry_kind,
            features: FeatureCollection::new(),
            next_fid: 1,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn geometry_kind(&self) -> GeometryKind {
        self.geometry_kind
    }

    /// Memory-provider style URI, e.g. `Point?crs=EPSG:4326`
    pub fn uri(&self) -> String {
        match self.crs.as_ref().and_then(CRS::authid) {
            Some(authid) => format!("{}?crs={}", self.geometry_kind.name(), authid),
            None => self.geometry_kind.name().to_string(),
        }
    }

    /// Append a feature, assigning the next feature id when it has none.
    /// Returns the feature's id.
    pub fn add_feature(&mut self, mut feature: Feature) -> u64 {
        let fid = match feature.id {
            Some(fid) => {
                self.next_fid = self.next_fid.max(fid + 1);
                fid
            }
            None => {
                let fid = self.next_fid;
                self.next_fid += 1;
                fid
            }
        };
        feature.id = Some(fid);
        self.features.push(feature);
        fid
    }

    pub fn features(&self) -> &FeatureCollection {
        &self.features
    }

    pub fn features_mut(&mut self) -> &mut FeatureCollection {
        &mut self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::Point;

    #[test]
    fn test_add_feature_assigns_ids() {
        let mut layer = VectorLayer::new("points", GeometryKind::Point, Some(CRS::wgs84()));
        let a = layer.add_feature(Feature::new(Point::new(0.0, 0.0)));
        let b = layer.add_feature(Feature::new(Point::new(1.0, 1.0)));
        assert_eq!((a, b), (1, 2));
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.uri(), "Point?crs=EPSG:4326");
    }

    #[test]
    fn test_explicit_id_advances_counter() {
        let mut layer = VectorLayer::new("zones", GeometryKind::Polygon, None);
        let mut feature = Feature::empty();
        feature.id = Some(10);
        layer.add_feature(feature);
        assert_eq!(layer.add_feature(Feature::empty()), 11);
        assert_eq!(layer.uri(), "Polygon");
    }

    #[test]
    fn test_null_attributes_read_as_none() {
        let mut feature = Feature::empty();
        feature.set_property("mean_mean", AttributeValue::from(None));
        feature.set_property("max_max", AttributeValue::Float(3.5));
        feature.set_property("count", AttributeValue::Int(4));

        assert_eq!(feature.get_f64("mean_mean"), None);
        assert_eq!(feature.get_f64("missing"), None);
        assert_eq!(feature.get_f64("max_max"), Some(3.5));
        assert_eq!(feature.get_f64("count"), Some(4.0));
        assert!(AttributeValue::from(Some(f64::NAN)).is_null());
    }
}
