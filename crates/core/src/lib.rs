//! # SiteSim Core
//!
//! Core types and I/O for SiteSim:
//! - `Raster<T>`: generic georeferenced raster grid
//! - `GeoTransform` and `Extent`: georeferencing
//! - `CRS`: coordinate reference system descriptor
//! - `VectorLayer`: in-memory features with attributes
//! - `Project`: registry of named layers
//! - GeoTIFF I/O

pub mod crs;
pub mod error;
pub mod io;
pub mod project;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use project::{LayerId, MapLayer, Project, RasterLayer};
pub use raster::{Extent, GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::project::{Project, RasterLayer};
    pub use crate::raster::{Extent, GeoTransform, Raster, RasterElement};
    pub use crate::vector::{AttributeValue, Feature, GeometryKind, VectorLayer};
    pub use crate::Algorithm;
}

/// Core trait for analysis algorithms.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    type Input;
    type Output;
    type Params: Default;
    type Error: std::error::Error;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
