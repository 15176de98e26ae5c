//! DivingLog.
//!
//! One `Logbook` row per dive. The first cylinder lives on that row, further
//! ones in the `Tank` table, and the profile is a set of fixed-width text
//! columns sampled at `ProfileInt` seconds.

use crate::builder::{DiveScope, LogbookBuilder};
use crate::decode::{decode_divinglog_profile, DivingLogColumns, DivingLogPoint};
use crate::error::ImportError;
use crate::gas::add_gaschange;
use crate::models::{Cylinder, DiveMode, EventKind};
use crate::source::Row;
use crate::units::{bar_to_mbar, celsius_to_mkelvin, metres_to_mm};

use super::{dive_number, positive, Driver, SecondaryQuery, Session};

const DIVES: &str = "select Number,strftime('%s',Divedate || ' ' || ifnull(Entrytime,'00:00')),\
Country || ' - ' || City || ' - ' || Place,Buddy,Comments,Depth,Divetime,Divemaster,Airtemp,\
Watertemp,Weight,Divesuit,Computer,ID,Visibility,SupplyType \
from Logbook where UUID not in (select UUID from DeletedRecords)";

const MODEL: &str = "Divinglog import";

const CYLINDER0: SecondaryQuery = SecondaryQuery {
    name: "divinglog_cylinder0",
    template: "select 0,TankSize,PresS,PresE,PresW,O2,He,DblTank from Logbook where ID = {id}",
};

const CYLINDERS: SecondaryQuery = SecondaryQuery {
    name: "divinglog_cylinders",
    template: "select TankID,TankSize,PresS,PresE,PresW,O2,He,DblTank from Tank \
where LogID = {id} order by TankID",
};

const PROFILE: SecondaryQuery = SecondaryQuery {
    name: "divinglog_profile",
    template: "select ProfileInt,Profile,Profile2,Profile3,Profile4,Profile5 from Logbook \
where ID = {id}",
};

pub struct DivingLog;

impl Driver for DivingLog {
    fn name(&self) -> &'static str {
        "divinglog_dives"
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
        let id = row.int(13);
        let mut dive = logbook.begin_dive(dive_number(row.int(0)), row.int(1));

        if let Some(site) = row.text(2) {
            dive.set_site(&site);
        }
        dive.buddy = row.non_empty_text(3);
        dive.notes = row.non_empty_text(4);
        if !row.is_null(5) {
            dive.dc.max_depth_mm = metres_to_mm(row.real(5));
        }
        if let Some(minutes) = positive(row.int(6)) {
            dive.dc.duration_s = minutes.saturating_mul(60);
        }
        dive.divemaster = row.non_empty_text(7);
        if !row.is_null(8) {
            dive.dc.air_temp_mk = celsius_to_mkelvin(row.int(8) as f64);
        }
        if !row.is_null(9) {
            dive.dc.water_temp_mk = celsius_to_mkelvin(row.int(9) as f64);
        }
        dive.weight_g = positive(row.int(10).saturating_mul(1000));
        dive.suit = row.non_empty_text(11);
        dive.visibility = row.text(14).and_then(|v| visibility(&v));

        let mut settings = dive.begin_settings();
        settings.model = Some(row.non_empty_text(12).unwrap_or_else(|| MODEL.to_string()));
        settings.end();

        for query in [&CYLINDER0, &CYLINDERS] {
            session.run(query, id, &mut |row| {
                import_cylinder(&mut dive, row);
                Ok(())
            })?;
        }

        if let Some(mode) = row.text(15).and_then(|v| supply_type(&v)) {
            dive.dc.dive_mode = mode;
        }

        session.run(&PROFILE, id, &mut |row| {
            import_profile(&mut dive, row);
            Ok(())
        })?;

        dive.end();
        Ok(())
    }
}

/// Good, medium and bad on the 0-5 scale.
fn visibility(value: &str) -> Option<u8> {
    match value.chars().next()? {
        '1' => Some(5),
        '2' => Some(3),
        '3' => Some(1),
        _ => None,
    }
}

fn supply_type(value: &str) -> Option<DiveMode> {
    match value.chars().next()? {
        '1' => Some(DiveMode::SemiClosed),
        '2' => Some(DiveMode::ClosedCircuit),
        _ => None,
    }
}

/// A tank whose id is already registered revises that cylinder; the
/// legacy single-tank fields usually describe tank 0 again.
fn import_cylinder(dive: &mut DiveScope<'_>, row: &dyn Row) {
    let tank = row.int(0);
    let registered = usize::try_from(tank)
        .ok()
        .filter(|&index| index < dive.cylinders.len());
    match registered {
        Some(index) => {
            if let Some(mut cylinder) = dive.revise_cylinder(index) {
                fill_cylinder(&mut cylinder, row);
                cylinder.end();
            }
        }
        None => {
            let mut cylinder = dive.begin_cylinder();
            fill_cylinder(&mut cylinder, row);
            cylinder.end();
        }
    }
}

fn fill_cylinder(cylinder: &mut Cylinder, row: &dyn Row) {
    let factor = if row.int(7) > 0 { 2 } else { 1 };
    if let Some(litres) = positive(row.int(1)) {
        cylinder.size_ml = Some(litres.saturating_mul(1000 * factor));
    }
    if let Some(bar) = positive(row.int(2)) {
        cylinder.start_mbar = Some(bar_to_mbar(bar as f64));
    }
    if let Some(bar) = positive(row.int(3)) {
        cylinder.end_mbar = Some(bar_to_mbar(bar as f64));
    }
    if let Some(bar) = positive(row.int(4)) {
        cylinder.working_pressure_mbar = Some(bar_to_mbar(bar as f64));
    }
    if let Some(percent) = positive(row.int(5)) {
        cylinder.gasmix.o2_permille = (percent * 10).min(1000);
    }
    if let Some(percent) = positive(row.int(6)) {
        cylinder.gasmix.he_permille = (percent * 10).min(1000);
    }
}

/// Without a sampling interval every record would land at time zero, so
/// the profile is skipped.
fn import_profile(dive: &mut DiveScope<'_>, row: &dyn Row) {
    let Some(interval_s) = positive(row.int(0)) else {
        return;
    };
    let Some(profile) = row.text(1) else {
        return;
    };
    let tanks = row.text(2);
    let heart = row.text(3);
    let deco = row.text(4);
    let rebreather = row.text(5);
    let columns = DivingLogColumns {
        profile: &profile,
        tanks: tanks.as_deref(),
        heart: heart.as_deref(),
        deco: deco.as_deref(),
        rebreather: rebreather.as_deref(),
    };

    let mut current_tank = None;
    for point in decode_divinglog_profile(interval_s, &columns) {
        let DivingLogPoint {
            sample: decoded,
            flags,
            tank,
        } = point;
        let time_s = decoded.time_s;

        let mut sample = dive.begin_sample(time_s);
        *sample = decoded;
        sample.end();

        if let Some(tank) = tank.filter(|&tank| Some(tank) != current_tank) {
            let index = tank as usize;
            let cylinder = (index < dive.cylinders.len()).then_some(index);
            // An unknown tank reads as air.
            let mix = cylinder
                .map(|index| dive.cylinders[index].gasmix)
                .unwrap_or_default();
            add_gaschange(dive, time_s, mix, cylinder);
            current_tank = Some(tank);
        }

        let warnings = [
            (flags.rbt_warning, EventKind::Rbt),
            (flags.ascent_warning, EventKind::Ascent),
            (flags.deco_stop_ignored, EventKind::Violation),
            (flags.work_warning, EventKind::Workload),
        ];
        for (_, kind) in warnings.into_iter().filter(|(set, _)| *set) {
            dive.begin_event(time_s, kind).end();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::LogbookFormat;
    use crate::import::{import_logbook, ImportOptions};
    use crate::models::{GasMix, Logbook, MAX_CYLINDERS};
    use crate::sqlite::memory_db;

    const SCHEMA: &str = "
        CREATE TABLE Logbook (ID INTEGER, Number INTEGER, Divedate TEXT, Entrytime TEXT,
            Country TEXT, City TEXT, Place TEXT, Buddy TEXT, Comments TEXT, Depth REAL,
            Divetime INTEGER, Divemaster TEXT, Airtemp INTEGER, Watertemp INTEGER,
            Weight INTEGER, Divesuit TEXT, Computer TEXT, Visibility TEXT, SupplyType INTEGER,
            UUID TEXT, TankSize INTEGER, PresS INTEGER, PresE INTEGER, PresW INTEGER,
            O2 INTEGER, He INTEGER, DblTank INTEGER, ProfileInt INTEGER, Profile TEXT,
            Profile2 TEXT, Profile3 TEXT, Profile4 TEXT, Profile5 TEXT);
        CREATE TABLE DeletedRecords (UUID TEXT);
        CREATE TABLE Tank (LogID INTEGER, TankID INTEGER, TankSize INTEGER, PresS INTEGER,
            PresE INTEGER, PresW INTEGER, O2 INTEGER, He INTEGER, DblTank INTEGER);";

    fn import() -> Logbook {
        let conn = memory_db(SCHEMA);
        conn.execute_batch(
            "INSERT INTO Logbook VALUES
                (10, 1, '2020-09-13', '12:26', 'Egypt', 'Hurghada', 'Abu Ramada', 'Sam',
                 'Current', 18.5, 40, 'Mo', 28, 24, 6, 'Shorty', NULL, '1', 2, 'a',
                 12, 200, 50, 232, 32, 0, 0, 20,
                 '000000000000004500010000010000000000',
                 '250210000992402000005023019001040', NULL, NULL, NULL),
                (11, 2, '2020-09-14', NULL, NULL, NULL, NULL, NULL, NULL, 9.0, 25, NULL,
                 NULL, NULL, 0, NULL, 'Galileo', '3 - bad', 1, 'b',
                 NULL, NULL, NULL, NULL, NULL, NULL, NULL, 10, NULL, NULL, NULL, NULL, NULL),
                (12, 3, '2020-09-15', NULL, NULL, NULL, NULL, NULL, NULL, 9.0, 25, NULL,
                 NULL, NULL, 0, NULL, NULL, NULL, NULL, 'gone',
                 NULL, NULL, NULL, NULL, NULL, NULL, NULL, 10, NULL, NULL, NULL, NULL, NULL);
             INSERT INTO DeletedRecords VALUES ('gone');
             INSERT INTO Tank VALUES
                (10, 0, 12, 210, 60, 232, 32, 0, 0),
                (10, 1, 7, 200, 100, 200, 50, 0, 1),
                (11, 0, 10, 200, 0, 0, 21, 0, 0), (11, 1, 10, 0, 0, 0, 0, 0, 0),
                (11, 2, 10, 0, 0, 0, 0, 0, 0), (11, 3, 10, 0, 0, 0, 0, 0, 0),
                (11, 4, 10, 0, 0, 0, 0, 0, 0), (11, 5, 10, 0, 0, 0, 0, 0, 0),
                (11, 6, 10, 0, 0, 0, 0, 0, 0), (11, 7, 10, 0, 0, 0, 0, 0, 0),
                (11, 8, 10, 0, 0, 0, 0, 0, 0);",
        )
        .unwrap();
        import_logbook(&conn, "log.sql", LogbookFormat::DivingLog, &ImportOptions::default())
            .unwrap()
    }

    #[test]
    fn test_divinglog_dive() {
        let logbook = import();
        let numbers: Vec<_> = logbook.dives.iter().map(|d| d.number).collect();
        assert_eq!(numbers, vec![1, 2]);

        let dive = &logbook.dives[0];
        assert_eq!(dive.when, 1_599_999_960);
        assert_eq!(logbook.sites[0].name, "Egypt - Hurghada - Abu Ramada");
        assert_eq!(dive.dive_site, Some(0));
        assert_eq!(dive.buddy.as_deref(), Some("Sam"));
        assert_eq!(dive.notes.as_deref(), Some("Current"));
        assert_eq!(dive.divemaster.as_deref(), Some("Mo"));
        assert_eq!(dive.suit.as_deref(), Some("Shorty"));
        assert_eq!(dive.weight_g, Some(6_000));
        assert_eq!(dive.visibility, Some(5));
        assert_eq!(dive.dc.max_depth_mm, 18_500);
        assert_eq!(dive.dc.duration_s, 2_400);
        assert_eq!(dive.dc.air_temp_mk, Some(301_150));
        assert_eq!(dive.dc.water_temp_mk, Some(297_150));
        assert_eq!(dive.dc.dive_mode, DiveMode::ClosedCircuit);
        assert_eq!(dive.dc.model.as_deref(), Some("Divinglog import"));
    }

    #[test]
    fn test_registered_tank_is_revised() {
        let logbook = import();
        let cylinders = &logbook.dives[0].cylinders;
        assert_eq!(cylinders.len(), 2);
        assert_eq!(cylinders[0].gasmix, GasMix::new(320, 0));
        assert_eq!(cylinders[0].size_ml, Some(12_000));
        assert_eq!(cylinders[0].start_mbar, Some(210_000));
        assert_eq!(cylinders[0].end_mbar, Some(60_000));
        assert_eq!(cylinders[0].working_pressure_mbar, Some(232_000));
        assert_eq!(cylinders[1].gasmix, GasMix::new(500, 0));
        assert_eq!(cylinders[1].size_ml, Some(14_000));
    }

    #[test]
    fn test_tanks_beyond_capacity_are_ignored() {
        let logbook = import();
        let dive = &logbook.dives[1];
        assert_eq!(dive.cylinders.len(), MAX_CYLINDERS);
        assert_eq!(dive.cylinders[0].gasmix, GasMix::new(210, 0));
        assert_eq!(dive.cylinders[0].start_mbar, Some(200_000));
        assert_eq!(dive.visibility, Some(1));
        assert_eq!(dive.dc.dive_mode, DiveMode::SemiClosed);
        assert_eq!(dive.dc.model.as_deref(), Some("Galileo"));
        assert_eq!(dive.dive_site, None);
        assert!(dive.dc.samples.is_empty());
        assert_eq!(dive.when, 1_600_041_600);
    }

    #[test]
    fn test_profile_flags_and_tank_switches() {
        let logbook = import();
        let dive = &logbook.dives[0];

        let depths: Vec<_> = dive
            .dc
            .samples
            .iter()
            .map(|s| (s.time_s, s.depth_mm))
            .collect();
        assert_eq!(depths, vec![(0, 0), (20, 4_500), (40, 10_000)]);
        assert_eq!(dive.dc.samples[0].pressure_mbar, Some(210_000));
        assert_eq!(dive.dc.samples[0].temperature_mk, Some(298_150));
        assert_eq!(dive.dc.samples[1].rbt_s, Some(3_000));
        assert!(!dive.dc.samples[1].in_deco);

        let events: Vec<_> = dive
            .dc
            .events
            .iter()
            .map(|e| (e.time_s, e.kind, e.value, e.cylinder))
            .collect();
        assert_eq!(
            events,
            vec![
                (0, EventKind::GasChange, Some(32), Some(0)),
                (20, EventKind::Ascent, None, None),
                (40, EventKind::GasChange, Some(50), Some(1)),
            ]
        );
    }

    const UNTIMED_DIVE: &str = "INSERT INTO Logbook VALUES
        (20, 4, '2020-09-16', NULL, NULL, NULL, NULL, NULL, NULL, 5.0, 10, NULL, NULL, NULL,
         0, NULL, NULL, NULL, NULL, 'z', NULL, NULL, NULL, NULL, NULL, NULL, NULL, 0,
         '000000000000004500010000', NULL, NULL, NULL, NULL);";

    #[test]
    fn test_profile_without_interval_is_skipped() {
        let conn = memory_db(SCHEMA);
        conn.execute_batch(UNTIMED_DIVE).unwrap();
        let logbook =
            import_logbook(&conn, "log.sql", LogbookFormat::DivingLog, &ImportOptions::default())
                .unwrap();

        let dive = &logbook.dives[0];
        assert_eq!(dive.number, 4);
        assert!(dive.dc.samples.is_empty());
        assert!(dive.dc.events.is_empty());
        assert_eq!(dive.dc.max_depth_mm, 5_000);
        assert_eq!(dive.dc.duration_s, 600);
    }

    #[test]
    fn test_missing_tank_table_is_reported() {
        let without_tanks = SCHEMA.split("CREATE TABLE Tank").next().unwrap_or_default();
        let conn = memory_db(without_tanks);
        conn.execute_batch(UNTIMED_DIVE).unwrap();
        let err =
            import_logbook(&conn, "log.sql", LogbookFormat::DivingLog, &ImportOptions::default())
                .unwrap_err();
        assert_eq!(err.query(), Some("divinglog_cylinders"));
    }
}
