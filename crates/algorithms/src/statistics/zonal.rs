//! Zonal statistics over polygon layers
//!
//! For each polygon feature, the raster cells whose centres fall inside the
//! polygon are aggregated and the results written back to the feature as
//! attributes named `{prefix}{statistic}` (e.g. `mean_mean`).
//!
//! Zones that contain at most one valid cell centre fall back to every cell
//! the polygon overlaps, each weighted by the overlapped fraction of the cell.

use crate::maybe_rayon::*;
use geo::{Area, BooleanOps, BoundingRect, Contains, Geometry, MultiPolygon, Point, Rect};
use sitesim_core::raster::Raster;
use sitesim_core::vector::{AttributeValue, VectorLayer};
use sitesim_core::{Error, Result};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Available zonal statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZonalStatistic {
    Count,
    Sum,
    Mean,
    Median,
    StdDev,
    Min,
    Max,
    Range,
    Minority,
    Majority,
    Variety,
}

impl ZonalStatistic {
    /// Attribute name suffix for this statistic
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Median => "median",
            Self::StdDev => "stdev",
            Self::Min => "min",
            Self::Max => "max",
            Self::Range => "range",
            Self::Minority => "minority",
            Self::Majority => "majority",
            Self::Variety => "variety",
        }
    }
}

/// Parameters for zonal statistics
#[derive(Debug, Clone)]
pub struct ZonalParams {
    /// Prepended to each statistic's suffix to form the attribute name
    pub prefix: String,
    /// Raster band the values came from (1-based)
    pub band: usize,
    pub statistics: Vec<ZonalStatistic>,
}

impl Default for ZonalParams {
    fn default() -> Self {
        Self {
            prefix: "_".to_string(),
            band: 1,
            statistics: vec![ZonalStatistic::Count, ZonalStatistic::Sum, ZonalStatistic::Mean],
        }
    }
}

impl ZonalParams {
    pub fn new(prefix: impl Into<String>, band: usize, statistics: Vec<ZonalStatistic>) -> Self {
        Self {
            prefix: prefix.into(),
            band,
            statistics,
        }
    }

    /// Attribute name for `statistic`
    pub fn field_name(&self, statistic: ZonalStatistic) -> String {
        format!("{}{}", self.prefix, statistic.suffix())
    }
}

/// All statistics of one zone.
///
/// Optional fields are `None` when no cell contributed.
#[derive(Debug, Clone, PartialEq)]
pub struct ZonalSummary {
    /// Number of contributing cells
    pub count: usize,
    /// Sum of weights (equals `count` unless the overlap fallback was used)
    pub weight: f64,
    pub sum: f64,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub range: Option<f64>,
    pub median: Option<f64>,
    pub minority: Option<f64>,
    pub majority: Option<f64>,
    pub variety: usize,
}

impl ZonalSummary {
    /// Summary of a zone with no contributing cells
    pub fn empty() -> Self {
        Self {
            count: 0,
            weight: 0.0,
            sum: 0.0,
            mean: None,
            std_dev: None,
            min: None,
            max: None,
            range: None,
            median: None,
            minority: None,
            majority: None,
            variety: 0,
        }
    }

    /// Compute every statistic from `(value, weight)` pairs.
    ///
    /// Sum, mean and standard deviation are weighted; min, max, median and
    /// the categorical statistics look at values only.
    pub fn from_weighted(values: &[(f64, f64)]) -> Self {
        let weight: f64 = values.iter().map(|&(_, w)| w).sum();
        if values.is_empty() || weight <= 0.0 {
            return Self::empty();
        }

        let sum: f64 = values.iter().map(|&(v, w)| v * w).sum();
        let mean = sum / weight;
        let variance = values
            .iter()
            .map(|&(v, w)| w * (v - mean) * (v - mean))
            .sum::<f64>()
            / weight;

        let mut sorted: Vec<f64> = values.iter().map(|&(v, _)| v).collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let n = sorted.len();
        let min = sorted[0];
        let max = sorted[n - 1];
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };

        // value bits -> (value, accumulated weight)
        let mut frequencies: HashMap<u64, (f64, f64)> = HashMap::new();
        for &(v, w) in values {
            frequencies.entry(v.to_bits()).or_insert((v, 0.0)).1 += w;
        }
        let by_frequency = |a: &(f64, f64), b: &(f64, f64)| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal))
        };
        // ties resolve to the smaller value in both directions
        let majority = frequencies.values().copied().max_by(by_frequency).map(|(v, _)| v);
        let minority = frequencies
            .values()
            .copied()
            .min_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal))
            })
            .map(|(v, _)| v);

        Self {
            count: n,
            weight,
            sum,
            mean: Some(mean),
            std_dev: Some(variance.sqrt()),
            min: Some(min),
            max: Some(max),
            range: Some(max - min),
            median: Some(median),
            minority,
            majority,
            variety: frequencies.len(),
        }
    }

    /// Attribute value for one statistic
    pub fn value(&self, statistic: ZonalStatistic) -> AttributeValue {
        match statistic {
            ZonalStatistic::Count => AttributeValue::Int(self.count as i64),
            ZonalStatistic::Variety => AttributeValue::Int(self.variety as i64),
            ZonalStatistic::Sum => AttributeValue::Float(self.sum),
            ZonalStatistic::Mean => self.mean.into(),
            ZonalStatistic::Median => self.median.into(),
            ZonalStatistic::StdDev => self.std_dev.into(),
            ZonalStatistic::Min => self.min.into(),
            ZonalStatistic::Max => self.max.into(),
            ZonalStatistic::Range => self.range.into(),
            ZonalStatistic::Minority => self.minority.into(),
            ZonalStatistic::Majority => self.majority.into(),
        }
    }
}

/// Compute zonal statistics for every feature of a polygon layer.
///
/// Writes one attribute per requested statistic. Features without polygon
/// geometry are empty zones: Count, Sum and Variety are 0, every other
/// statistic is Null.
/// Returns the number of zones that had at least one contributing cell.
pub fn zonal_statistics_layer(layer: &mut VectorLayer, raster: &Raster<f64>, params: &ZonalParams) -> Result<usize> {
    if params.band == 0 {
        return Err(Error::InvalidParameter {
            name: "band",
            value: "0".into(),
            reason: "bands are numbered from 1".into(),
        });
    }
    if !raster.transform().is_axis_aligned() {
        return Err(Error::Algorithm(
            "zonal statistics require an unrotated raster".into(),
        ));
    }

    let fields: Vec<(ZonalStatistic, String)> = params
        .statistics
        .iter()
        .map(|&s| (s, params.field_name(s)))
        .collect();

    let features = &mut layer.features_mut().features;
    let summaries: Vec<ZonalSummary> = (&*features)
        .into_par_iter()
        .map(|feature| match &feature.geometry {
            Some(geometry) => zone_summary(geometry, raster),
            None => ZonalSummary::empty(),
        })
        .collect();

    let mut with_data = 0;
    for (feature, summary) in features.iter_mut().zip(&summaries) {
        if summary.count > 0 {
            with_data += 1;
        }
        for (statistic, field) in &fields {
            feature.set_property(field.clone(), summary.value(*statistic));
        }
    }

    debug!(
        "Zonal statistics '{}': {}/{} zones with data",
        params.prefix,
        with_data,
        summaries.len()
    );
    Ok(with_data)
}

/// Statistics of the raster cells inside one zone.
///
/// Non-areal geometries yield an empty summary.
pub fn zone_summary(geometry: &Geometry<f64>, raster: &Raster<f64>) -> ZonalSummary {
    let zone: MultiPolygon<f64> = match geometry {
        Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon.clone()]),
        Geometry::MultiPolygon(polygons) => polygons.clone(),
        Geometry::Rect(rect) => MultiPolygon::new(vec![rect.to_polygon()]),
        _ => return ZonalSummary::empty(),
    };

    let Some(window) = cell_window(&zone, raster) else {
        return ZonalSummary::empty();
    };

    let centres = centre_values(&zone, raster, &window);
    if centres.len() > 1 {
        return ZonalSummary::from_weighted(&centres);
    }
    ZonalSummary::from_weighted(&overlap_values(&zone, raster, &window))
}

/// Half-open cell index ranges covered by a zone's bounding box
struct CellWindow {
    rows: std::ops::Range<usize>,
    cols: std::ops::Range<usize>,
}

fn cell_window(zone: &MultiPolygon<f64>, raster: &Raster<f64>) -> Option<CellWindow> {
    let bbox = zone.bounding_rect()?;
    let (c0, r0) = raster.geo_to_pixel(bbox.min().x, bbox.max().y);
    let (c1, r1) = raster.geo_to_pixel(bbox.max().x, bbox.min().y);
    if !(c0.is_finite() && r0.is_finite() && c1.is_finite() && r1.is_finite()) {
        return None;
    }

    let clamp = |v: f64, len: usize| v.max(0.0).min(len as f64) as usize;
    let (rows, cols) = raster.shape();

    let col_start = clamp(c0.min(c1).floor(), cols);
    let col_end = clamp(c0.max(c1).ceil(), cols);
    let row_start = clamp(r0.min(r1).floor(), rows);
    let row_end = clamp(r0.max(r1).ceil(), rows);

    if col_start >= col_end || row_start >= row_end {
        return None;
    }
    Some(CellWindow {
        rows: row_start..row_end,
        cols: col_start..col_end,
    })
}

fn centre_values(zone: &MultiPolygon<f64>, raster: &Raster<f64>, window: &CellWindow) -> Vec<(f64, f64)> {
    let mut values = Vec::new();
    for row in window.rows.clone() {
        for col in window.cols.clone() {
            let Some(value) = raster.value_at(row, col) else {
                continue;
            };
            let (x, y) = raster.pixel_to_geo(col, row);
            if zone.contains(&Point::new(x, y)) {
                values.push((value, 1.0));
            }
        }
    }
    values
}

fn overlap_values(zone: &MultiPolygon<f64>, raster: &Raster<f64>, window: &CellWindow) -> Vec<(f64, f64)> {
    let transform = raster.transform();
    let cell_area = transform.cell_area();
    if cell_area <= 0.0 {
        return Vec::new();
    }

    let mut values = Vec::new();
    for row in window.rows.clone() {
        for col in window.cols.clone() {
            let Some(value) = raster.value_at(row, col) else {
                continue;
            };
            let (x0, y0) = transform.pixel_to_geo_corner(col, row);
            let (x1, y1) = transform.pixel_to_geo_corner(col + 1, row + 1);
            let cell = MultiPolygon::new(vec![Rect::new((x0, y0), (x1, y1)).to_polygon()]);

            let overlap = zone.intersection(&cell).unsigned_area();
            let weight = overlap / cell_area;
            if weight > 1e-12 {
                values.push((value, weight));
            }
        }
    }
    values
}
