//! Unit conversions used while mapping vendor rows onto the dive model.
//!
//! The model stores integers in the smallest practical unit: millimetres,
//! millikelvin, millibar, millilitres and permille.

/// 0 °C in millikelvin.
pub const ZERO_C_IN_MKELVIN: u32 = 273_150;

/// mbar per psi.
const MBAR_PER_PSI: f64 = 68.947_572_9;

/// mm per foot.
const MM_PER_FOOT: f64 = 304.8;

/// Unit system a source records its values in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, uniffi::Enum)]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn is_metric(&self) -> bool {
        matches!(self, UnitSystem::Metric)
    }

    /// Depth in the source unit (m or ft) to millimetres.
    pub fn depth_to_mm(&self, depth: f64) -> i32 {
        match self {
            UnitSystem::Metric => metres_to_mm(depth),
            UnitSystem::Imperial => feet_to_mm(depth),
        }
    }

    /// Temperature in the source unit (°C or °F) to millikelvin.
    pub fn temperature_to_mkelvin(&self, temp: f64) -> Option<u32> {
        match self {
            UnitSystem::Metric => celsius_to_mkelvin(temp),
            UnitSystem::Imperial => fahrenheit_to_mkelvin(temp),
        }
    }
}

pub fn metres_to_mm(m: f64) -> i32 {
    (m * 1000.0).round() as i32
}

pub fn feet_to_mm(ft: f64) -> i32 {
    (ft * MM_PER_FOOT).round() as i32
}

/// Temperatures below absolute zero are meaningless and yield `None`.
pub fn celsius_to_mkelvin(c: f64) -> Option<u32> {
    let mk = (c * 1000.0 + ZERO_C_IN_MKELVIN as f64).round();
    (mk >= 0.0).then_some(mk as u32)
}

pub fn fahrenheit_to_mkelvin(f: f64) -> Option<u32> {
    celsius_to_mkelvin((f - 32.0) / 1.8)
}

pub fn psi_to_mbar(psi: f64) -> u32 {
    (psi * MBAR_PER_PSI).round().max(0.0) as u32
}

pub fn bar_to_mbar(bar: f64) -> u32 {
    (bar * 1000.0).round().max(0.0) as u32
}

/// A gas fraction (0.0–1.0) to permille.
pub fn fraction_to_permille(fraction: f64) -> u32 {
    (fraction * 1000.0).round().max(0.0) as u32
}

/// A gas percentage (0–100) to permille.
pub fn percent_to_permille(percent: f64) -> u32 {
    (percent * 10.0).round().max(0.0) as u32
}
