//! Profile statistics.
//!
//! Pure functions over the samples of one dive. Vendors often leave summary
//! fields empty; whatever the samples can tell us fills the gaps when a
//! dive is committed.

use crate::models::{Dive, Sample};

/// Summary derived from a sample sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileStats {
    pub max_depth_mm: i32,
    /// Time-weighted mean depth
    pub mean_depth_mm: i32,
    /// Time of the last sample
    pub duration_s: u32,
    pub min_temperature_mk: Option<u32>,
    /// Most O2 cells reporting in any one sample
    pub o2_sensor_count: u32,
}

impl ProfileStats {
    /// `None` when there are no samples.
    pub fn compute(samples: &[Sample]) -> Option<Self> {
        let last = samples.last()?;

        let mut max_depth_mm = 0;
        let mut weighted_depth_sum: f64 = 0.0;
        let mut weight_sum: f64 = 0.0;
        let mut min_temperature_mk: Option<u32> = None;
        let mut o2_sensor_count = 0;

        for (i, sample) in samples.iter().enumerate() {
            max_depth_mm = max_depth_mm.max(sample.depth_mm);

            // Weight each depth by the interval it stands for
            let dt = if i + 1 < samples.len() {
                samples[i + 1].time_s.saturating_sub(sample.time_s) as f64
            } else if i > 0 {
                sample.time_s.saturating_sub(samples[i - 1].time_s) as f64
            } else {
                1.0
            };
            weighted_depth_sum += sample.depth_mm as f64 * dt;
            weight_sum += dt;

            if let Some(mk) = sample.temperature_mk {
                min_temperature_mk = Some(min_temperature_mk.map_or(mk, |min| min.min(mk)));
            }
            o2_sensor_count = o2_sensor_count.max(sample.o2_sensor_count());
        }

        let mean_depth_mm = if weight_sum > 0.0 {
            (weighted_depth_sum / weight_sum).round() as i32
        } else {
            0
        };

        Some(ProfileStats {
            max_depth_mm,
            mean_depth_mm,
            duration_s: last.time_s,
            min_temperature_mk,
            o2_sensor_count,
        })
    }
}

/// Fill summary fields the source left empty. Recorded values always win.
pub fn fill_missing(dive: &mut Dive) {
    if dive.dc.duration_s == 0 {
        dive.dc.duration_s = dive.duration_s;
    }
    if let Some(stats) = ProfileStats::compute(&dive.dc.samples) {
        let dc = &mut dive.dc;
        if dc.max_depth_mm == 0 {
            dc.max_depth_mm = stats.max_depth_mm;
        }
        if dc.mean_depth_mm == 0 {
            dc.mean_depth_mm = stats.mean_depth_mm;
        }
        if dc.duration_s == 0 {
            dc.duration_s = stats.duration_s;
        }
        if dc.water_temp_mk.is_none() {
            dc.water_temp_mk = stats.min_temperature_mk;
        }
        if dc.o2_sensor_count == 0 {
            dc.o2_sensor_count = stats.o2_sensor_count;
        }
    }

    if dive.duration_s == 0 {
        dive.duration_s = dive.dc.duration_s;
    }
}
