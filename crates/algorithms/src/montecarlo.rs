//! Monte Carlo site sampling
//!
//! Each simulation scatters random points over the raster extent, buffers
//! them into circular sites and records the zonal mean and max of every
//! site. The run then aggregates:
//!
//! - global mean/max average: the average over simulations of each
//!   simulation's average site mean/max;
//! - site mean/max average: the average over every site of every simulation.
//!
//! Sites with no valid raster cells carry no mean or max and are left out of
//! every average. A simulation with no valid sites contributes nothing to
//! the global averages.
//!
//! Every simulation draws from its own RNG seeded from the run seed and its
//! index, so a seeded run gives the same numbers sequentially or in parallel.

use crate::maybe_rayon::*;
use crate::sampling::random_point_layer;
use crate::statistics::zonal::{zonal_statistics_layer, ZonalParams, ZonalStatistic};
use crate::vector::{buffer_layer, BufferParams};
use geo::Geometry;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use sitesim_core::raster::Raster;
use sitesim_core::{Algorithm, Error, Result};
use tracing::{debug, info};

/// Attribute written by the zonal mean pass
pub const MEAN_FIELD: &str = "mean_mean";
/// Attribute written by the zonal max pass
pub const MAX_FIELD: &str = "max_max";

/// Parameters for a Monte Carlo run
#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloParams {
    /// Number of simulations
    pub simulations: usize,
    /// Random sites per simulation
    pub points_per_simulation: usize,
    /// Site radius in raster CRS units
    pub buffer_distance: f64,
    /// Segments approximating each site circle
    pub segments: usize,
    /// Raster band the values came from (1-based)
    pub band: usize,
    /// Run seed; drawn at random when absent
    pub seed: Option<u64>,
}

impl Default for MonteCarloParams {
    fn default() -> Self {
        Self {
            simulations: 100,
            points_per_simulation: 300,
            buffer_distance: 0.009,
            segments: 20,
            band: 1,
            seed: None,
        }
    }
}

impl MonteCarloParams {
    pub fn validate(&self) -> Result<()> {
        if self.simulations == 0 {
            return Err(Error::InvalidParameter {
                name: "simulations",
                value: "0".into(),
                reason: "at least one simulation is required".into(),
            });
        }
        if !self.buffer_distance.is_finite() || self.buffer_distance < 0.0 {
            return Err(Error::InvalidParameter {
                name: "buffer_distance",
                value: self.buffer_distance.to_string(),
                reason: "must be a finite, non-negative number".into(),
            });
        }
        if self.band == 0 {
            return Err(Error::InvalidParameter {
                name: "band",
                value: "0".into(),
                reason: "bands are numbered from 1".into(),
            });
        }
        Ok(())
    }

    fn buffer_params(&self) -> BufferParams {
        BufferParams {
            distance: self.buffer_distance,
            segments: self.segments,
        }
    }
}

/// One random site of one simulation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteRecord {
    pub simulation: usize,
    pub site: u64,
    pub x: f64,
    pub y: f64,
    pub mean: Option<f64>,
    pub max: Option<f64>,
}

/// Result of a single simulation
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub index: usize,
    pub sites: Vec<SiteRecord>,
    /// Average of the non-null site means, if any
    pub mean_average: Option<f64>,
    /// Average of the non-null site maxes, if any
    pub max_average: Option<f64>,
}

impl SimulationOutcome {
    /// Build an outcome from its sites, computing the simulation averages
    pub fn from_sites(index: usize, sites: Vec<SiteRecord>) -> Self {
        let means: Vec<f64> = sites.iter().filter_map(|s| s.mean).collect();
        let maxs: Vec<f64> = sites.iter().filter_map(|s| s.max).collect();
        Self {
            index,
            mean_average: safe_average(&means),
            max_average: safe_average(&maxs),
            sites,
        }
    }

    pub fn site_means(&self) -> impl Iterator<Item = f64> + '_ {
        self.sites.iter().filter_map(|s| s.mean)
    }

    pub fn site_maxs(&self) -> impl Iterator<Item = f64> + '_ {
        self.sites.iter().filter_map(|s| s.max)
    }
}

/// Aggregate figures of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonteCarloSummary {
    pub simulations: usize,
    /// Average of per-simulation mean averages
    pub global_mean_avg: Option<f64>,
    /// Average of per-simulation max averages
    pub global_max_avg: Option<f64>,
    /// Average of every site mean across all simulations
    pub site_mean_avg: Option<f64>,
    /// Average of every site max across all simulations
    pub site_max_avg: Option<f64>,
    /// Simulations that contributed to `global_mean_avg`
    pub mean_contributors: usize,
    /// Simulations that contributed to `global_max_avg`
    pub max_contributors: usize,
    pub site_mean_count: usize,
    pub site_max_count: usize,
}

/// A complete run: seed, per-simulation outcomes (ordered by index) and summary
#[derive(Debug, Clone)]
pub struct MonteCarloRun {
    pub seed: u64,
    pub outcomes: Vec<SimulationOutcome>,
    pub summary: MonteCarloSummary,
}

/// Arithmetic mean, `None` for an empty slice
pub fn safe_average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Aggregate simulation outcomes into the run summary
pub fn summarize(outcomes: &[SimulationOutcome]) -> MonteCarloSummary {
    let mean_averages: Vec<f64> = outcomes.iter().filter_map(|o| o.mean_average).collect();
    let max_averages: Vec<f64> = outcomes.iter().filter_map(|o| o.max_average).collect();
    let site_means: Vec<f64> = outcomes.iter().flat_map(|o| o.site_means()).collect();
    let site_maxs: Vec<f64> = outcomes.iter().flat_map(|o| o.site_maxs()).collect();

    MonteCarloSummary {
        simulations: outcomes.len(),
        global_mean_avg: safe_average(&mean_averages),
        global_max_avg: safe_average(&max_averages),
        site_mean_avg: safe_average(&site_means),
        site_max_avg: safe_average(&site_maxs),
        mean_contributors: mean_averages.len(),
        max_contributors: max_averages.len(),
        site_mean_count: site_means.len(),
        site_max_count: site_maxs.len(),
    }
}

/// Seed of simulation `index` within a run (SplitMix64 of the combined value)
pub fn simulation_seed(run_seed: u64, index: usize) -> u64 {
    let mut z = run_seed.wrapping_add((index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Run simulation `index` of a run seeded with `run_seed`.
///
/// The point and buffer layers live only for the duration of the call.
pub fn run_simulation(
    raster: &Raster<f64>,
    params: &MonteCarloParams,
    run_seed: u64,
    index: usize,
) -> Result<SimulationOutcome> {
    let mut rng = StdRng::seed_from_u64(simulation_seed(run_seed, index));

    let points = random_point_layer(
        format!("points_sim_{index}"),
        &raster.extent(),
        raster.crs().cloned(),
        params.points_per_simulation,
        &mut rng,
    )?;
    let mut sites = buffer_layer(&points, &params.buffer_params(), format!("buffered_sim_{index}"))?;

    let mean = ZonalParams::new("mean_", params.band, vec![ZonalStatistic::Mean]);
    let max = ZonalParams::new("max_", params.band, vec![ZonalStatistic::Max]);
    zonal_statistics_layer(&mut sites, raster, &mean)?;
    zonal_statistics_layer(&mut sites, raster, &max)?;

    let records: Vec<SiteRecord> = points
        .features()
        .iter()
        .zip(sites.features().iter())
        .map(|(point, zone)| {
            let (x, y) = match &point.geometry {
                Some(Geometry::Point(p)) => (p.x(), p.y()),
                _ => (f64::NAN, f64::NAN),
            };
            SiteRecord {
                simulation: index,
                site: zone.id.unwrap_or_default(),
                x,
                y,
                mean: zone.get_f64(MEAN_FIELD),
                max: zone.get_f64(MAX_FIELD),
            }
        })
        .collect();

    let outcome = SimulationOutcome::from_sites(index, records);
    debug!(
        "Simulation {}: {} sites, mean avg {:?}, max avg {:?}",
        index,
        outcome.sites.len(),
        outcome.mean_average,
        outcome.max_average
    );
    Ok(outcome)
}

/// Run every simulation and aggregate the results.
pub fn monte_carlo_sampling(raster: &Raster<f64>, params: &MonteCarloParams) -> Result<MonteCarloRun> {
    monte_carlo_sampling_with_progress(raster, params, |_| {})
}

/// Like [`monte_carlo_sampling`], calling `on_simulation_done` with each
/// finished simulation index (in completion order).
pub fn monte_carlo_sampling_with_progress<F>(
    raster: &Raster<f64>,
    params: &MonteCarloParams,
    on_simulation_done: F,
) -> Result<MonteCarloRun>
where
    F: Fn(usize) + Sync + Send,
{
    params.validate()?;

    let seed = params.seed.unwrap_or_else(rand::random);
    info!(
        "Running {} simulations of {} sites (radius {}, seed {})",
        params.simulations, params.points_per_simulation, params.buffer_distance, seed
    );

    let outcomes: Vec<SimulationOutcome> = (0..params.simulations)
        .into_par_iter()
        .map(|index| {
            let outcome = run_simulation(raster, params, seed, index);
            on_simulation_done(index);
            outcome
        })
        .collect::<Result<Vec<_>>>()?;

    let summary = summarize(&outcomes);
    Ok(MonteCarloRun {
        seed,
        outcomes,
        summary,
    })
}

/// Monte Carlo site sampling algorithm
#[derive(Debug, Clone, Default)]
pub struct MonteCarloSampling;

impl Algorithm for MonteCarloSampling {
    type Input = Raster<f64>;
    type Output = MonteCarloRun;
    type Params = MonteCarloParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Monte Carlo Site Sampling"
    }

    fn description(&self) -> &'static str {
        "Estimate raster mean and max under random siting by repeated buffered point sampling"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        monte_carlo_sampling(&input, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sitesim_core::GeoTransform;

    fn site(simulation: usize, mean: Option<f64>, max: Option<f64>) -> SiteRecord {
        SiteRecord {
            simulation,
            site: 1,
            x: 0.0,
            y: 0.0,
            mean,
            max,
        }
    }

    #[test]
    fn test_safe_average() {
        assert_eq!(safe_average(&[]), None);
        assert_eq!(safe_average(&[2.0, 4.0]), Some(3.0));
    }

    #[test]
    fn test_global_and_site_averages_differ() {
        // simulation 0: means 1, 2, 3 -> avg 2; simulation 1: mean 10 -> avg 10
        let outcomes = vec![
            SimulationOutcome::from_sites(
                0,
                vec![
                    site(0, Some(1.0), Some(5.0)),
                    site(0, Some(2.0), Some(6.0)),
                    site(0, Some(3.0), None),
                ],
            ),
            SimulationOutcome::from_sites(1, vec![site(1, Some(10.0), Some(20.0))]),
        ];

        let summary = summarize(&outcomes);
        assert_relative_eq!(summary.global_mean_avg.unwrap(), 6.0);
        assert_relative_eq!(summary.site_mean_avg.unwrap(), 4.0);
        assert_relative_eq!(summary.global_max_avg.unwrap(), (5.5 + 20.0) / 2.0);
        assert_relative_eq!(summary.site_max_avg.unwrap(), 31.0 / 3.0);
        assert_eq!(summary.site_mean_count, 4);
        assert_eq!(summary.site_max_count, 3);
        assert_eq!(summary.mean_contributors, 2);
    }

    #[test]
    fn test_simulation_without_valid_sites_is_skipped() {
        let outcomes = vec![
            SimulationOutcome::from_sites(0, vec![site(0, None, None)]),
            SimulationOutcome::from_sites(1, vec![site(1, Some(4.0), Some(8.0))]),
        ];

        let summary = summarize(&outcomes);
        assert_eq!(summary.simulations, 2);
        assert_eq!(summary.mean_contributors, 1);
        assert_eq!(summary.max_contributors, 1);
        assert_eq!(summary.global_mean_avg, Some(4.0));
        assert_eq!(summary.site_max_avg, Some(8.0));
    }

    #[test]
    fn test_all_null_gives_none() {
        let outcomes = vec![SimulationOutcome::from_sites(0, vec![site(0, None, None)])];
        let summary = summarize(&outcomes);
        assert_eq!(summary.global_mean_avg, None);
        assert_eq!(summary.global_max_avg, None);
        assert_eq!(summary.site_mean_avg, None);
        assert_eq!(summary.site_max_avg, None);
    }

    #[test]
    fn test_simulation_seeds_are_distinct() {
        let seeds: std::collections::HashSet<u64> = (0..1000).map(|i| simulation_seed(42, i)).collect();
        assert_eq!(seeds.len(), 1000);
        assert_ne!(simulation_seed(1, 0), simulation_seed(2, 0));
    }

    #[test]
    fn test_constant_raster() {
        let mut raster = Raster::filled(50, 50, 7.0);
        raster.set_transform(GeoTransform::new(0.0, 50.0, 1.0, -1.0));

        let params = MonteCarloParams {
            simulations: 4,
            points_per_simulation: 20,
            buffer_distance: 2.0,
            seed: Some(9),
            ..Default::default()
        };
        let run = monte_carlo_sampling(&raster, &params).unwrap();

        assert_eq!(run.seed, 9);
        assert_eq!(run.outcomes.len(), 4);
        assert!(run.outcomes.iter().enumerate().all(|(i, o)| o.index == i));
        assert_eq!(run.summary.global_mean_avg, Some(7.0));
        assert_eq!(run.summary.site_max_avg, Some(7.0));
        assert_eq!(run.summary.site_mean_count, 80);
    }

    #[test]
    fn test_invalid_params() {
        let raster: Raster<f64> = Raster::new(2, 2);
        let params = MonteCarloParams {
            simulations: 0,
            ..Default::default()
        };
        assert!(matches!(
            monte_carlo_sampling(&raster, &params),
            Err(Error::InvalidParameter { name: "simulations", .. })
        ));
    }

    #[test]
    fn test_algorithm_trait() {
        let mut raster = Raster::filled(10, 10, 1.0);
        raster.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));
        let params = MonteCarloParams {
            simulations: 2,
            points_per_simulation: 5,
            buffer_distance: 1.0,
            seed: Some(1),
            ..Default::default()
        };

        let algo = MonteCarloSampling;
        assert_eq!(algo.name(), "Monte Carlo Site Sampling");
        let run = algo.execute(raster, params).unwrap();
        assert_eq!(run.summary.simulations, 2);
    }
}
