//! Project: a registry of named map layers.
//!
//! Layers are owned by the project and addressed by [`LayerId`]. Names need
//! not be unique; name lookups return matches in insertion order.

use crate::error::{Error, Result};
use crate::io::read_geotiff;
use crate::raster::Raster;
use crate::vector::VectorLayer;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Unique identifier for a layer in a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u64);

impl LayerId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// A named single-band raster layer.
#[derive(Debug, Clone)]
pub struct RasterLayer {
    pub name: String,
    pub source: Option<PathBuf>,
    pub band: usize,
    pub raster: Raster<f64>,
}

impl RasterLayer {
    pub fn new(name: impl Into<String>, raster: Raster<f64>) -> Self {
        Self {
            name: name.into(),
            source: None,
            band: 1,
            raster,
        }
    }

    /// Load `band` (1-based) of a GeoTIFF; the layer name defaults to the file stem.
    pub fn load(path: impl AsRef<Path>, name: Option<&str>, band: usize) -> Result<Self> {
        let path = path.as_ref();
        let raster: Raster<f64> = read_geotiff(path, Some(band))?;
        let name = match name {
            Some(name) => name.to_string(),
            None => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        };
        info!(
            "Loaded raster layer '{}' ({} x {}, band {})",
            name,
            raster.cols(),
            raster.rows(),
            band
        );

        Ok(Self {
            name,
            source: Some(path.to_path_buf()),
            band,
            raster,
        })
    }
}

/// Any layer a project can hold.
#[derive(Debug, Clone)]
pub enum MapLayer {
    Raster(RasterLayer),
    Vector(VectorLayer),
}

impl MapLayer {
    pub fn name(&self) -> &str {
        match self {
            Self::Raster(layer) => &layer.name,
            Self::Vector(layer) => layer.name(),
        }
    }

    pub fn as_raster(&self) -> Option<&RasterLayer> {
        match self {
            Self::Raster(layer) => Some(layer),
            Self::Vector(_) => None,
        }
    }

    pub fn as_vector(&self) -> Option<&VectorLayer> {
        match self {
            Self::Vector(layer) => Some(layer),
            Self::Raster(_) => None,
        }
    }
}

impl From<RasterLayer> for MapLayer {
    fn from(layer: RasterLayer) -> Self {
        Self::Raster(layer)
    }
}

impl From<VectorLayer> for MapLayer {
    fn from(layer: VectorLayer) -> Self {
        Self::Vector(layer)
    }
}

/// The project holds all registered layers.
#[derive(Debug, Default)]
pub struct Project {
    layers: HashMap<LayerId, MapLayer>,
    /// Insertion order
    layer_order: Vec<LayerId>,
    next_id: u64,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a layer and return its id.
    pub fn add_layer(&mut self, layer: impl Into<MapLayer>) -> LayerId {
        self.next_id += 1;
        let id = LayerId(self.next_id);
        let layer = layer.into();
        debug!("Registered layer '{}' as {:?}", layer.name(), id);
        self.layer_order.push(id);
        self.layers.insert(id, layer);
        id
    }

    pub fn map_layer(&self, id: LayerId) -> Option<&MapLayer> {
        self.layers.get(&id)
    }

    /// All layers named `name`, in insertion order.
    pub fn map_layers_by_name(&self, name: &str) -> Vec<(LayerId, &MapLayer)> {
        self.layer_order
            .iter()
            .filter_map(|id| self.layers.get(id).map(|layer| (*id, layer)))
            .filter(|(_, layer)| layer.name() == name)
            .collect()
    }

    /// First layer named `name`, which must be a raster.
    pub fn raster_layer_by_name(&self, name: &str) -> Result<&RasterLayer> {
        let (_, layer) = self
            .map_layers_by_name(name)
            .into_iter()
            .next()
            .ok_or_else(|| Error::LayerNotFound(name.to_string()))?;

        layer.as_raster().ok_or_else(|| Error::LayerKind {
            name: name.to_string(),
            expected: "raster",
        })
    }

    /// Unregister a layer, handing it back to the caller.
    pub fn remove_map_layer(&mut self, id: LayerId) -> Option<MapLayer> {
        let layer = self.layers.remove(&id)?;
        self.layer_order.retain(|&i| i != id);
        debug!("Removed layer '{}' ({:?})", layer.name(), id);
        Some(layer)
    }

    /// Layer names in insertion order.
    pub fn layer_names(&self) -> Vec<&str> {
        self.layer_order
            .iter()
            .filter_map(|id| self.layers.get(id))
            .map(MapLayer::name)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
