//! # SiteSim Algorithms
//!
//! Analysis building blocks for SiteSim:
//!
//! - **sampling**: uniform random points over a raster extent
//! - **vector**: circular buffers around points
//! - **statistics**: zonal statistics of raster cells inside polygons
//! - **montecarlo**: repeated random siting with aggregated zonal mean/max

pub(crate) mod maybe_rayon;

pub mod montecarlo;
pub mod sampling;
pub mod statistics;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::montecarlo::{
        monte_carlo_sampling, safe_average, summarize, MonteCarloParams, MonteCarloRun,
        MonteCarloSampling, MonteCarloSummary, SimulationOutcome, SiteRecord,
    };
    pub use crate::sampling::{random_point_layer, random_points};
    pub use crate::statistics::{zonal_statistics_layer, ZonalParams, ZonalStatistic, ZonalSummary};
    pub use crate::vector::{buffer_layer, buffer_points, BufferParams};
    pub use sitesim_core::prelude::*;
}
