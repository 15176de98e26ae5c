//! Gas switch reconstruction.
//!
//! Some vendors never record a gas switch; they only log the mix breathed
//! at every sample. Switches are recovered by watching that mix change.

use crate::builder::DiveScope;
use crate::models::{EventKind, GasMix};

/// A 99 % oxygen entry is the vendor's rounding of pure oxygen.
pub fn normalise(mix: GasMix) -> GasMix {
    let mix = mix.clamped();
    if mix.o2_permille == 990 && mix.he_permille == 0 {
        GasMix::new(1000, 0)
    } else {
        mix
    }
}

/// Record a switch to `mix` at `time_s`. The event points at the cylinder
/// holding that mix when the dive has one.
pub fn add_gaschange(dive: &mut DiveScope<'_>, time_s: u32, mix: GasMix, cylinder: Option<usize>) {
    let mut event = dive.begin_event(time_s, EventKind::GasChange);
    event.value = Some(mix.gaschange_value());
    event.cylinder = cylinder.map(|index| index as u32);
    event.end();
}

/// Turns a time-ordered stream of breathed mixes into cylinders and
/// gaschange events.
#[derive(Debug, Default)]
pub struct GasSwitchDetector {
    previous: Option<GasMix>,
}

impl GasSwitchDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the mix breathed at `time_s`. Returns the index of the cylinder
    /// holding it, registering a new cylinder when none matches.
    pub fn observe(&mut self, dive: &mut DiveScope<'_>, time_s: u32, mix: GasMix) -> Option<usize> {
        let mix = normalise(mix);
        let cylinder = match dive.find_cylinder(mix) {
            Some(index) => Some(index),
            None => {
                let mut cylinder = dive.begin_cylinder();
                cylinder.gasmix = mix;
                cylinder.end()
            }
        };

        if self.previous.is_some_and(|previous| previous != mix) {
            add_gaschange(dive, time_s, mix, cylinder);
        }
        self.previous = Some(mix);
        cylinder
    }
}
