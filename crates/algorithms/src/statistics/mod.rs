//! Statistical analysis of rasters
//!
//! - **zonal**: statistics of raster cells inside polygon zones

pub mod zonal;

pub use zonal::{zonal_statistics_layer, zone_summary, ZonalParams, ZonalStatistic, ZonalSummary};
