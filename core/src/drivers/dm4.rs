//! Suunto Dive Manager 4.
//!
//! DM4 joins every dive with its single mixture. The profile lives in three
//! parallel blobs. Marks and tags come from their own tables. DM5 inherits
//! the mark and tag handling, so those pieces are shared from here.

use crate::builder::{DiveScope, LogbookBuilder};
use crate::decode::{decode_parallel_arrays, ParallelArrays, ProfilePoint};
use crate::error::ImportError;
use crate::models::{EventKind, GasMix};
use crate::source::Row;
use crate::units::{bar_to_mbar, celsius_to_mkelvin, metres_to_mm, percent_to_permille};

use super::{dive_number, positive, Driver, SecondaryQuery, Session};

// StartTime counts 100 ns ticks since 0001-01-01; the query turns it into
// Unix seconds.
const DIVES: &str = "select D.DiveId,StartTime/10000000-62135596800,Note,Duration,\
SourceSerialNumber,Source,MaxDepth,SampleInterval,StartTemperature,BottomTemperature,\
D.StartPressure,D.EndPressure,Size,CylinderWorkPressure,SurfacePressure,DiveTime,\
SampleInterval,ProfileBlob,TemperatureBlob,PressureBlob,Oxygen,Helium,\
MIX.StartPressure,MIX.EndPressure FROM Dive AS D JOIN DiveMixture AS MIX ON D.DiveId=MIX.DiveId";

pub(crate) const EVENTS: SecondaryQuery = SecondaryQuery {
    name: "dm4_events",
    template: "select * from Mark where DiveId = {id}",
};

pub(crate) const TAGS: SecondaryQuery = SecondaryQuery {
    name: "dm4_tags",
    template: "select Text from DiveTag where DiveId = {id}",
};

pub(crate) mod col {
    pub const ID: usize = 0;
    pub const START: usize = 1;
    pub const NOTE: usize = 2;
    pub const DURATION: usize = 3;
    pub const SERIAL: usize = 4;
    pub const MODEL: usize = 5;
    pub const MAX_DEPTH: usize = 6;
    pub const AIR_TEMP: usize = 8;
    pub const WATER_TEMP: usize = 9;
    pub const DIVE_START_PRESSURE: usize = 10;
    pub const DIVE_END_PRESSURE: usize = 11;
    pub const SIZE: usize = 12;
    pub const WORK_PRESSURE: usize = 13;
    pub const SURFACE_PRESSURE: usize = 14;
    pub const DC_DURATION: usize = 15;
    pub const INTERVAL: usize = 16;
    pub const PROFILE: usize = 17;
    pub const TEMPERATURES: usize = 18;
    pub const PRESSURES: usize = 19;
    pub const OXYGEN: usize = 20;
    pub const HELIUM: usize = 21;
    pub const MIX_START_PRESSURE: usize = 22;
    pub const MIX_END_PRESSURE: usize = 23;
}

pub struct Dm4;

impl Driver for Dm4 {
    fn name(&self) -> &'static str {
        "dm4_dives"
    }

    fn primary_query(&self) -> &'static str {
        DIVES
    }

    fn import_dive(
        &self,
        session: &Session<'_>,
        logbook: &mut LogbookBuilder,
        row: &dyn Row,
    ) -> Result<(), ImportError> {
        let id = row.int(col::ID);
        let mut dive = logbook.begin_dive(dive_number(id), row.int(col::START));

        read_summary(&mut dive, row);
        read_device(&mut dive, row);
        read_cylinder(&mut dive, row);
        if !row.is_null(col::SURFACE_PRESSURE) {
            dive.dc.surface_pressure_mbar = Some(bar_to_mbar(row.real(col::SURFACE_PRESSURE)));
        }
        import_parallel_profile(&mut dive, row);

        import_marks(session, &mut dive, id)?;
        import_tags(session, &mut dive, id)?;
        dive.end();
        Ok(())
    }
}

/// Fields DM4 and DM5 dives share column for column.
pub(crate) fn read_summary(dive: &mut DiveScope<'_>, row: &dyn Row) {
    dive.notes = row.non_empty_text(col::NOTE);
    // Duration runs a little longer than DiveTime; the dive keeps the
    // former and the computer the latter.
    if let Some(duration) = positive(row.int(col::DURATION)) {
        dive.duration_s = duration;
    }
    if let Some(duration) = positive(row.int(col::DC_DURATION)) {
        dive.dc.duration_s = duration;
    }
    if !row.is_null(col::MAX_DEPTH) {
        dive.dc.max_depth_mm = metres_to_mm(row.real(col::MAX_DEPTH));
    }
    if !row.is_null(col::AIR_TEMP) {
        dive.dc.air_temp_mk = celsius_to_mkelvin(row.int(col::AIR_TEMP) as f64);
    }
    if !row.is_null(col::WATER_TEMP) {
        dive.dc.water_temp_mk = celsius_to_mkelvin(row.int(col::WATER_TEMP) as f64);
    }
}

pub(crate) fn read_device(dive: &mut DiveScope<'_>, row: &dyn Row) {
    let mut settings = dive.begin_settings();
    settings.serial = row.non_empty_text(col::SERIAL);
    settings.model = row.non_empty_text(col::MODEL);
    settings.end();
}

/// The joined mixture. The start pressure prefers the mixture's value, the
/// end pressure the dive's.
fn read_cylinder(dive: &mut DiveScope<'_>, row: &dyn Row) {
    let mut cylinder = dive.begin_cylinder();
    cylinder.start_mbar = positive(row.int(col::MIX_START_PRESSURE))
        .or_else(|| positive(row.int(col::DIVE_START_PRESSURE)));
    cylinder.end_mbar = positive(row.int(col::DIVE_END_PRESSURE))
        .or_else(|| positive(row.int(col::MIX_END_PRESSURE)));
    let size_ml = (row.real(col::SIZE) * 1000.0).round() as i64;
    cylinder.size_ml = positive(size_ml);
    cylinder.working_pressure_mbar = positive(row.int(col::WORK_PRESSURE));
    cylinder.gasmix = GasMix::new(
        percent_to_permille(row.real(col::OXYGEN)),
        percent_to_permille(row.real(col::HELIUM)),
    );
    cylinder.end();
}

/// Append decoded profile points as samples. Returns how many points there
/// were.
pub(crate) fn add_profile_points(dive: &mut DiveScope<'_>, points: &[ProfilePoint]) -> usize {
    for point in points {
        let mut sample = dive.begin_sample(point.time_s);
        sample.depth_mm = point.depth_mm;
        sample.temperature_mk = point.temperature_mk;
        sample.pressure_mbar = point.pressure_mbar;
        sample.end();
    }
    points.len()
}

/// Decode the parallel profile blobs of a DM4 style row.
pub(crate) fn import_parallel_profile(dive: &mut DiveScope<'_>, row: &dyn Row) -> usize {
    let arrays = ParallelArrays {
        profile: row.blob(col::PROFILE),
        temperature: row.blob(col::TEMPERATURES),
        pressure: row.blob(col::PRESSURES),
    };
    let interval_s = positive(row.int(col::INTERVAL)).unwrap_or(0);
    let points = decode_parallel_arrays(
        &arrays,
        interval_s,
        dive.duration_s,
        dive.dc.max_depth_mm,
    );
    add_profile_points(dive, &points)
}

/// Event kind and value for a DM4/DM5 mark code. `None` for marks that
/// are not imported.
fn mark_event(code: i64, value: Option<i64>) -> Option<(EventKind, Option<i32>)> {
    let kind = match code {
        1 | 266 => EventKind::SafetyStopMandatory,
        3 | 20 => EventKind::Deco,
        4 | 17 => EventKind::Ascent,
        5 | 6 | 22 | 32 => EventKind::Violation,
        7 => EventKind::BelowFloor,
        8 => EventKind::DiveTime,
        9 => EventKind::MaxDepth,
        10 | 11 => EventKind::Olf,
        12 => EventKind::Po2,
        13 => EventKind::AirTime,
        18 => EventKind::Ceiling,
        // 257 marks the dive becoming active again after a surfacing.
        19 | 257 => EventKind::Surface,
        30 => EventKind::TissueWarning,
        37 => EventKind::TankPressure,
        258 => {
            return Some(match value {
                Some(heading) => (EventKind::Heading, Some(heading as i32)),
                None => (EventKind::Bookmark, None),
            })
        }
        259 => EventKind::DeepStop,
        260 => EventKind::DeepStopCleared,
        // Safety stop deactivated; DM5 itself keeps it off the profile.
        267 => return None,
        other => return Some((EventKind::Unknown, Some(other as i32))),
    };
    Some((kind, None))
}

pub(crate) fn import_marks(
    session: &Session<'_>,
    dive: &mut DiveScope<'_>,
    id: i64,
) -> Result<(), ImportError> {
    session.run(&EVENTS, id, &mut |row| {
        if row.is_null(2) {
            return Ok(());
        }
        let value = (!row.is_null(3)).then(|| row.int(3));
        if let Some((kind, value)) = mark_event(row.int(2), value) {
            let time_s = row.int(1).clamp(0, u32::MAX as i64) as u32;
            let mut event = dive.begin_event(time_s, kind);
            event.value = value;
            event.end();
        }
        Ok(())
    })
}

pub(crate) fn import_tags(
    session: &Session<'_>,
    dive: &mut DiveScope<'_>,
    id: i64,
) -> Result<(), ImportError> {
    session.run(&TAGS, id, &mut |row| {
        if let Some(tag) = row.text(0) {
            dive.add_tag(&tag);
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::LogbookFormat;
    use crate::import::{import_logbook, ImportOptions};
    use crate::sqlite::memory_db;

    const SCHEMA: &str = "
        CREATE TABLE Dive (DiveId INTEGER, StartTime INTEGER, Note TEXT, Duration INTEGER,
            SourceSerialNumber TEXT, Source TEXT, MaxDepth REAL, SampleInterval INTEGER,
            StartTemperature INTEGER, BottomTemperature INTEGER, StartPressure INTEGER,
            EndPressure INTEGER, Size REAL, CylinderWorkPressure INTEGER, SurfacePressure REAL,
            DiveTime INTEGER, ProfileBlob BLOB, TemperatureBlob BLOB, PressureBlob BLOB);
        CREATE TABLE DiveMixture (DiveId INTEGER, Oxygen INTEGER, Helium INTEGER,
            StartPressure INTEGER, EndPressure INTEGER);
        CREATE TABLE Mark (MarkId INTEGER, Time INTEGER, Type INTEGER, Value INTEGER,
            DiveId INTEGER);
        CREATE TABLE DiveTag (DiveId INTEGER, Text TEXT);";

    // 2020-09-13T12:26:40Z in DM4 ticks.
    const START_TICKS: i64 = (1_600_000_000 + 62_135_596_800) * 10_000_000;

    fn logbook_db() -> rusqlite::Connection {
        let conn = memory_db(SCHEMA);
        conn.execute(
            "INSERT INTO Dive VALUES (1, ?1, 'Wreck', 180, '2510', 'Suunto D4i', 12.5, 60,
                24, 18, 0, 60000, 12, 232000, 1.013, 170,
                X'00000000000020410000A040', X'141210', X'400D030030E6020020BF0200')",
            [START_TICKS],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO Dive VALUES (2, ?1, NULL, 120, '2510', 'Suunto D4i', 8, 60,
                NULL, NULL, 200000, 50000, NULL, NULL, NULL, NULL, NULL, NULL, NULL)",
            [START_TICKS + 36_000_000_000],
        )
        .unwrap();
        conn.execute_batch(
            "INSERT INTO DiveMixture VALUES (1, 32, 0, 210000, 0), (2, 21, 0, 0, 0);
             INSERT INTO Mark VALUES
                (1, 60, 258, 90, 1), (2, 30, 4, NULL, 1), (3, 90, 267, NULL, 1),
                (4, 100, 999, NULL, 1), (5, 120, 258, NULL, 1);
             INSERT INTO DiveTag VALUES (1, 'wreck'), (1, 'deep'), (1, 'wreck');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_mark_codes() {
        assert_eq!(mark_event(1, None), Some((EventKind::SafetyStopMandatory, None)));
        assert_eq!(mark_event(266, None), Some((EventKind::SafetyStopMandatory, None)));
        assert_eq!(mark_event(32, None), Some((EventKind::Violation, None)));
        assert_eq!(mark_event(257, None), Some((EventKind::Surface, None)));
        assert_eq!(mark_event(258, Some(270)), Some((EventKind::Heading, Some(270))));
        assert_eq!(mark_event(258, None), Some((EventKind::Bookmark, None)));
        assert_eq!(mark_event(267, None), None);
        assert_eq!(mark_event(14, None), Some((EventKind::Unknown, Some(14))));
    }

    #[test]
    fn test_dm4_import() {
        let conn = logbook_db();
        let logbook =
            import_logbook(&conn, "dm4.db", LogbookFormat::Dm4, &ImportOptions::default())
                .unwrap();
        assert_eq!(logbook.dives.len(), 2);

        let dive = logbook.dives.iter().find(|d| d.number == 1).unwrap();
        assert_eq!(dive.when, 1_600_000_000);
        assert_eq!(dive.notes.as_deref(), Some("Wreck"));
        assert_eq!(dive.duration_s, 180);
        assert_eq!(dive.dc.duration_s, 170);
        assert_eq!(dive.dc.max_depth_mm, 12_500);
        assert_eq!(dive.dc.air_temp_mk, Some(297_150));
        assert_eq!(dive.dc.water_temp_mk, Some(291_150));
        assert_eq!(dive.dc.surface_pressure_mbar, Some(1_013));
        assert_eq!(dive.dc.model.as_deref(), Some("Suunto D4i"));
        assert_eq!(dive.dc.device_id, Some(2510));

        assert_eq!(dive.cylinders.len(), 1);
        let cylinder = &dive.cylinders[0];
        assert_eq!(cylinder.gasmix, GasMix::new(320, 0));
        assert_eq!(cylinder.start_mbar, Some(210_000));
        assert_eq!(cylinder.end_mbar, Some(60_000));
        assert_eq!(cylinder.size_ml, Some(12_000));
        assert_eq!(cylinder.working_pressure_mbar, Some(232_000));

        let depths: Vec<_> = dive.dc.samples.iter().map(|s| s.depth_mm).collect();
        assert_eq!(depths, vec![0, 10_000, 5_000]);
        let temps: Vec<_> = dive.dc.samples.iter().map(|s| s.temperature_mk).collect();
        assert_eq!(temps, vec![Some(293_150), Some(291_150), Some(289_150)]);
        let pressures: Vec<_> = dive.dc.samples.iter().map(|s| s.pressure_mbar).collect();
        assert_eq!(pressures, vec![Some(200_000), Some(190_000), Some(180_000)]);
        assert_eq!(dive.dc.mean_depth_mm, 5_000);

        let events: Vec<_> = dive
            .dc
            .events
            .iter()
            .map(|e| (e.time_s, e.kind, e.value))
            .collect();
        assert_eq!(
            events,
            vec![
                (30, EventKind::Ascent, None),
                (60, EventKind::Heading, Some(90)),
                (100, EventKind::Unknown, Some(999)),
                (120, EventKind::Bookmark, None),
            ]
        );
        assert_eq!(dive.tags, vec!["wreck", "deep"]);

        assert_eq!(logbook.devices.len(), 1);
    }

    #[test]
    fn test_missing_profile_sits_at_max_depth() {
        let conn = logbook_db();
        let logbook =
            import_logbook(&conn, "dm4.db", LogbookFormat::Dm4, &ImportOptions::default())
                .unwrap();
        let dive = logbook.dives.iter().find(|d| d.number == 2).unwrap();
        assert_eq!(dive.when, 1_600_003_600);
        assert_eq!(dive.dc.samples.len(), 2);
        assert!(dive.dc.samples.iter().all(|s| s.depth_mm == 8_000));
        assert!(dive.dc.samples.iter().all(|s| s.temperature_mk.is_none()));
        // No DiveTime recorded: the computer takes the dive's duration.
        assert_eq!(dive.dc.duration_s, 120);
        assert_eq!(dive.cylinders[0].start_mbar, Some(200_000));
        assert_eq!(dive.cylinders[0].end_mbar, Some(50_000));
        assert_eq!(dive.cylinders[0].size_ml, None);
    }
}
