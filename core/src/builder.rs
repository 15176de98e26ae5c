//! Assembling dives.
//!
//! A [`LogbookBuilder`] hands out one [`DiveScope`] at a time. The scope in
//! turn hands out guards for the records nested in a dive: a cylinder, a
//! sample, an event or the device settings. Every guard mutably borrows the
//! scope, so only one nested record can be open at once, and a record can
//! only be written through its open guard.
//!
//! ```ignore
//! let mut builder = LogbookBuilder::new();
//! let mut dive = builder.begin_dive(12, 1_600_000_000);
//! dive.notes = Some("Shore dive".to_string());
//! let mut sample = dive.begin_sample(0);
//! sample.depth_mm = 1_200;
//! sample.end();
//! dive.end();
//! let logbook = builder.finish();
//! ```

use std::mem;
use std::ops::{Deref, DerefMut};

use log::{debug, warn};

use crate::models::{Cylinder, DeviceSettings, Dive, Event, EventKind, Logbook, Sample};
use crate::stats;

/// Owns the logbook while an import appends to it.
#[derive(Debug, Default)]
pub struct LogbookBuilder {
    logbook: Logbook,
}

impl LogbookBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logbook(&self) -> &Logbook {
        &self.logbook
    }

    pub fn finish(self) -> Logbook {
        self.logbook
    }

    /// Open a dive. It reaches the logbook only through [`DiveScope::end`].
    pub fn begin_dive(&mut self, number: u32, when: i64) -> DiveScope<'_> {
        DiveScope {
            logbook: &mut self.logbook,
            dive: Dive::new(number, when),
            committed: false,
        }
    }
}

/// The dive being imported.
pub struct DiveScope<'b> {
    logbook: &'b mut Logbook,
    dive: Dive,
    committed: bool,
}

impl<'b> DiveScope<'b> {
    /// Attach the dive to the named site, creating the site on first use.
    /// Blank names are ignored.
    pub fn set_site(&mut self, name: &str) {
        if name.trim().is_empty() {
            return;
        }
        self.dive.dive_site = Some(self.logbook.find_or_create_site(name));
    }

    pub fn begin_cylinder(&mut self) -> CylinderScope<'_> {
        CylinderScope {
            dive: &mut self.dive,
            cylinder: Cylinder::default(),
            slot: None,
            open: true,
        }
    }

    /// Reopen an already registered cylinder; committing replaces it.
    pub fn revise_cylinder(&mut self, index: usize) -> Option<CylinderScope<'_>> {
        let cylinder = self.dive.cylinders.get(index)?.clone();
        Some(CylinderScope {
            dive: &mut self.dive,
            cylinder,
            slot: Some(index),
            open: true,
        })
    }

    pub fn begin_sample(&mut self, time_s: u32) -> SampleScope<'_> {
        SampleScope {
            dive: &mut self.dive,
            sample: Sample {
                time_s,
                ..Sample::default()
            },
            open: true,
        }
    }

    pub fn begin_event(&mut self, time_s: u32, kind: EventKind) -> EventScope<'_> {
        EventScope {
            dive: &mut self.dive,
            event: Event::new(time_s, kind),
            open: true,
        }
    }

    pub fn begin_settings(&mut self) -> SettingsScope<'_> {
        SettingsScope {
            logbook: &mut *self.logbook,
            dive: &mut self.dive,
            settings: DeviceSettings::default(),
            open: true,
        }
    }

    /// Derive what the samples can tell about the dive and append it to the
    /// logbook.
    pub fn end(mut self) {
        stats::fill_missing(&mut self.dive);
        let dive = mem::take(&mut self.dive);
        debug!(
            "dive {} imported: {} samples, {} events, {} cylinders",
            dive.number,
            dive.dc.samples.len(),
            dive.dc.events.len(),
            dive.cylinders.len()
        );
        self.logbook.dives.push(dive);
        self.committed = true;
    }
}

impl Deref for DiveScope<'_> {
    type Target = Dive;

    fn deref(&self) -> &Dive {
        &self.dive
    }
}

impl DerefMut for DiveScope<'_> {
    fn deref_mut(&mut self) -> &mut Dive {
        &mut self.dive
    }
}

impl Drop for DiveScope<'_> {
    fn drop(&mut self) {
        if !self.committed {
            debug!("discarding unfinished dive {}", self.dive.number);
        }
    }
}

pub struct CylinderScope<'d> {
    dive: &'d mut Dive,
    cylinder: Cylinder,
    slot: Option<usize>,
    open: bool,
}

impl CylinderScope<'_> {
    /// Commit the cylinder and return its index, or `None` when the
    /// cylinder table is full.
    pub fn end(mut self) -> Option<usize> {
        self.commit()
    }

    fn commit(&mut self) -> Option<usize> {
        self.open = false;
        let cylinder = mem::take(&mut self.cylinder);
        match self.slot {
            Some(index) => self.dive.replace_cylinder(index, cylinder),
            None => {
                let index = self.dive.add_cylinder(cylinder);
                if index.is_none() {
                    warn!(
                        "dive {}: cylinder table full, ignoring cylinder",
                        self.dive.number
                    );
                }
                index
            }
        }
    }
}

impl Deref for CylinderScope<'_> {
    type Target = Cylinder;

    fn deref(&self) -> &Cylinder {
        &self.cylinder
    }
}

impl DerefMut for CylinderScope<'_> {
    fn deref_mut(&mut self) -> &mut Cylinder {
        &mut self.cylinder
    }
}

impl Drop for CylinderScope<'_> {
    fn drop(&mut self) {
        if self.open {
            self.commit();
        }
    }
}

pub struct SampleScope<'d> {
    dive: &'d mut Dive,
    sample: Sample,
    open: bool,
}

impl SampleScope<'_> {
    /// Commit the sample. Returns false when it was dropped because its
    /// time does not advance past the previous sample.
    pub fn end(mut self) -> bool {
        self.commit()
    }

    fn commit(&mut self) -> bool {
        self.open = false;
        let sample = mem::take(&mut self.sample);
        let time_s = sample.time_s;
        let added = self.dive.add_sample(sample);
        if !added {
            warn!(
                "dive {}: dropping sample at {}s, time does not advance",
                self.dive.number, time_s
            );
        }
        added
    }
}

impl Deref for SampleScope<'_> {
    type Target = Sample;

    fn deref(&self) -> &Sample {
        &self.sample
    }
}

impl DerefMut for SampleScope<'_> {
    fn deref_mut(&mut self) -> &mut Sample {
        &mut self.sample
    }
}

impl Drop for SampleScope<'_> {
    fn drop(&mut self) {
        if self.open {
            self.commit();
        }
    }
}

pub struct EventScope<'d> {
    dive: &'d mut Dive,
    event: Event,
    open: bool,
}

impl EventScope<'_> {
    pub fn end(mut self) {
        self.commit();
    }

    fn commit(&mut self) {
        self.open = false;
        let event = Event::new(self.event.time_s, self.event.kind);
        let event = mem::replace(&mut self.event, event);
        self.dive.add_event(event);
    }
}

impl Deref for EventScope<'_> {
    type Target = Event;

    fn deref(&self) -> &Event {
        &self.event
    }
}

impl DerefMut for EventScope<'_> {
    fn deref_mut(&mut self) -> &mut Event {
        &mut self.event
    }
}

impl Drop for EventScope<'_> {
    fn drop(&mut self) {
        if self.open {
            self.commit();
        }
    }
}

/// Device settings of the dive computer that recorded the dive. Committing
/// registers the device with the logbook and stamps it on the dive.
pub struct SettingsScope<'d> {
    logbook: &'d mut Logbook,
    dive: &'d mut Dive,
    settings: DeviceSettings,
    open: bool,
}

impl SettingsScope<'_> {
    pub fn end(mut self) {
        self.commit();
    }

    fn commit(&mut self) {
        self.open = false;
        let settings = mem::take(&mut self.settings);
        let registered = self.logbook.merge_device(settings);
        self.dive.merge_device(&registered);
    }
}

impl Deref for SettingsScope<'_> {
    type Target = DeviceSettings;

    fn deref(&self) -> &DeviceSettings {
        &self.settings
    }
}

impl DerefMut for SettingsScope<'_> {
    fn deref_mut(&mut self) -> &mut DeviceSettings {
        &mut self.settings
    }
}

impl Drop for SettingsScope<'_> {
    fn drop(&mut self) {
        if self.open {
            self.commit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GasMix, MAX_CYLINDERS};

    #[test]
    fn test_dive_is_committed_on_end() {
        let mut builder = LogbookBuilder::new();
        let mut dive = builder.begin_dive(7, 1_600_000_000);
        dive.notes = Some("Reef".to_string());
        dive.end();

        let logbook = builder.finish();
        assert_eq!(logbook.dives.len(), 1);
        assert_eq!(logbook.dives[0].number, 7);
        assert_eq!(logbook.dives[0].when, 1_600_000_000);
        assert_eq!(logbook.dives[0].notes.as_deref(), Some("Reef"));
    }

    #[test]
    fn test_dropped_dive_is_discarded() {
        let mut builder = LogbookBuilder::new();
        {
            let mut dive = builder.begin_dive(1, 0);
            dive.begin_sample(0).end();
        }
        builder.begin_dive(2, 60).end();
        let numbers: Vec<_> = builder.logbook().dives.iter().map(|d| d.number).collect();
        assert_eq!(numbers, vec![2]);
    }

    #[test]
    fn test_sub_scopes_commit_on_end_and_drop() {
        let mut builder = LogbookBuilder::new();
        let mut dive = builder.begin_dive(1, 0);

        let mut cylinder = dive.begin_cylinder();
        cylinder.gasmix = GasMix::new(320, 0);
        cylinder.size_ml = Some(11_100);
        assert_eq!(cylinder.end(), Some(0));

        {
            let mut sample = dive.begin_sample(10);
            sample.depth_mm = 3_000;
        }
        {
            let mut event = dive.begin_event(10, EventKind::Bookmark);
            event.value = Some(4);
        }
        dive.end();

        let dive = &builder.logbook().dives[0];
        assert_eq!(dive.cylinders[0].gasmix.o2_permille, 320);
        assert_eq!(dive.dc.samples[0].depth_mm, 3_000);
        assert_eq!(dive.dc.events[0].kind, EventKind::Bookmark);
        assert_eq!(dive.dc.events[0].value, Some(4));
    }

    #[test]
    fn test_end_derives_summary_fields() {
        let mut builder = LogbookBuilder::new();
        let mut dive = builder.begin_dive(1, 0);
        for (t, depth) in [(0, 0), (30, 6_000), (60, 0)] {
            let mut sample = dive.begin_sample(t);
            sample.depth_mm = depth;
            sample.end();
        }
        dive.end();

        let dive = &builder.logbook().dives[0];
        assert_eq!(dive.dc.max_depth_mm, 6_000);
        assert_eq!(dive.dc.duration_s, 60);
        assert_eq!(dive.duration_s, 60);
    }

    #[test]
    fn test_non_advancing_sample_is_dropped() {
        let mut builder = LogbookBuilder::new();
        let mut dive = builder.begin_dive(1, 0);
        assert!(dive.begin_sample(0).end());
        assert!(dive.begin_sample(20).end());
        assert!(!dive.begin_sample(20).end());
        assert!(!dive.begin_sample(10).end());
        assert_eq!(dive.dc.samples.len(), 2);
    }

    #[test]
    fn test_revise_cylinder_replaces_in_place() {
        let mut builder = LogbookBuilder::new();
        let mut dive = builder.begin_dive(1, 0);
        let mut cylinder = dive.begin_cylinder();
        cylinder.size_ml = Some(12_000);
        cylinder.end();

        let mut cylinder = dive.revise_cylinder(0).unwrap();
        assert_eq!(cylinder.size_ml, Some(12_000));
        cylinder.start_mbar = Some(200_000);
        assert_eq!(cylinder.end(), Some(0));

        assert!(dive.revise_cylinder(1).is_none());
        assert_eq!(dive.cylinders.len(), 1);
        assert_eq!(dive.cylinders[0].size_ml, Some(12_000));
        assert_eq!(dive.cylinders[0].start_mbar, Some(200_000));
    }

    #[test]
    fn test_full_cylinder_table() {
        let mut builder = LogbookBuilder::new();
        let mut dive = builder.begin_dive(1, 0);
        for i in 0..MAX_CYLINDERS {
            assert_eq!(dive.begin_cylinder().end(), Some(i));
        }
        assert_eq!(dive.begin_cylinder().end(), None);
    }

    #[test]
    fn test_settings_register_device() {
        let mut builder = LogbookBuilder::new();
        for number in 1..=2 {
            let mut dive = builder.begin_dive(number, 0);
            let mut settings = dive.begin_settings();
            settings.model = Some("Suunto Vyper".to_string());
            settings.serial = Some("31337".to_string());
            settings.end();
            dive.end();
        }

        let logbook = builder.finish();
        assert_eq!(logbook.devices.len(), 1);
        for dive in &logbook.dives {
            assert_eq!(dive.dc.model.as_deref(), Some("Suunto Vyper"));
            assert_eq!(dive.dc.device_id, Some(31337));
        }
    }

    #[test]
    fn test_sites_are_shared() {
        let mut builder = LogbookBuilder::new();
        for number in 1..=2 {
            let mut dive = builder.begin_dive(number, 0);
            dive.set_site("Blue Hole");
            dive.end();
        }
        let mut dive = builder.begin_dive(3, 0);
        dive.set_site("  ");
        dive.end();

        let logbook = builder.finish();
        assert_eq!(logbook.sites.len(), 1);
        assert_eq!(logbook.dives[0].dive_site, Some(0));
        assert_eq!(logbook.dives[1].dive_site, Some(0));
        assert_eq!(logbook.dives[2].dive_site, None);
    }
}
