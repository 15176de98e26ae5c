//! Atomic Aquatics Cobalt.
//!
//! Cobalt records absolute pressures instead of depths; the queries turn
//! them into millimetres against the dive's surface pressure. Temperatures
//! are Fahrenheit and tank pressures psi. Buddy, visibility, location and
//! site are list entries linked to the dive.

use crate::builder::{DiveScope, LogbookBuilder};
use crate::error::ImportError;
use crate::models::GasMix;
use crate::source::Row;
use crate::units::{percent_to_permille, psi_to_mbar, UnitSystem};

use super::{dive_number, positive, Driver, SecondaryQuery, Session};

// Columns 3 and 4 are literal placeholders.
const DIVES: &str = "select Id,strftime('%s',DiveStartTime),LocationId,'buddy','notes',Units,\
(MaxDepthPressure*10000/SurfacePressure)-10000,DiveMinutes,SurfacePressure,SerialNumber,'model' \
from Dive where IsViewDeleted = 0";

const MODEL: &str = "Cobalt import";

const CYLINDERS: SecondaryQuery = SecondaryQuery {
    name: "cobalt_cylinders",
    template: "select FO2,FHe,StartingPressure,EndingPressure,TankSize,TankPressure,TotalConsumption \
from GasMixes where DiveID={id} and StartingPressure>0 and EndingPressure > 0 group by FO2,FHe",
};

const BUDDY: SecondaryQuery = SecondaryQuery {
    name: "cobalt_buddy",
    template: "select l.Data from Items AS i, List AS l ON i.Value1=l.Id where i.DiveId={id} and l.Type=4",
};

const VISIBILITY: SecondaryQuery = SecondaryQuery {
    name: "cobalt_visibility",
    template: "select l.Data from Items AS i, List AS l ON i.Value1=l.Id where i.DiveId={id} and l.Type=3",
};

const LOCATION: SecondaryQuery = SecondaryQuery {
    name: "cobalt_location",
    template: "select l.Data from Items AS i, List AS l ON i.Value1=l.Id where i.DiveId={id} and l.Type=0",
};

const SITE: SecondaryQuery = SecondaryQuery {
    name: "cobalt_site",
    template: "select l.Data from Items AS i, List AS l ON i.Value1=l.Id where i.DiveId={id} and l.Type=1",
};

const PROFILE: SecondaryQuery = SecondaryQuery {
    name: "cobalt_profile",
    template: "select runtime*60,(DepthPressure*10000/SurfacePressure)-10000,p.Temperature \
from Dive AS d JOIN TrackPoints AS p ON d.Id=p.DiveId where d.Id={id}",
};

pub struct Cobalt;

impl Driver for Cobalt {
    fn name(&self) -> &'static str {
        "cobalt_dives"
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
        let id = row.int(0);
        let mut dive = logbook.begin_dive(dive_number(id), row.int(1));

        // The Units column has no known encoding; samples are imperial.
        let units = UnitSystem::Imperial;

        if !row.is_null(6) {
            dive.dc.max_depth_mm = row.int(6).clamp(0, i32::MAX as i64) as i32;
        }
        if let Some(minutes) = positive(row.int(7)) {
            dive.dc.duration_s = minutes.saturating_mul(60);
        }
        dive.dc.surface_pressure_mbar = positive(row.int(8));

        if let Some(serial) = row.non_empty_text(9) {
            let mut settings = dive.begin_settings();
            settings.serial = Some(serial);
            settings.model = Some(MODEL.to_string());
            settings.end();
        }

        session.run(&CYLINDERS, id, &mut |row| {
            let mut cylinder = dive.begin_cylinder();
            cylinder.gasmix = GasMix::new(
                percent_to_permille(row.int(0) as f64),
                percent_to_permille(row.int(1) as f64),
            );
            cylinder.start_mbar = psi(row, 2);
            cylinder.end_mbar = psi(row, 3);
            cylinder.size_ml = positive(row.int(4).saturating_mul(100));
            cylinder.working_pressure_mbar = psi(row, 5);
            cylinder.gas_used_ml = positive(row.int(6).saturating_mul(1000));
            cylinder.end();
            Ok(())
        })?;

        session.run(&BUDDY, id, &mut |row| {
            if let Some(buddy) = row.non_empty_text(0) {
                dive.buddy = Some(buddy);
            }
            Ok(())
        })?;

        // Free-text visibility has no mapping onto the star rating.
        session.run(&VISIBILITY, id, &mut |_| Ok(()))?;

        let mut place = SiteName::default();
        for query in [&LOCATION, &SITE] {
            session.run(query, id, &mut |row| {
                if let Some(part) = row.non_empty_text(0) {
                    place.push(&mut dive, part);
                }
                Ok(())
            })?;
        }

        session.run(&PROFILE, id, &mut |row| {
            let time_s = row.int(0).clamp(0, u32::MAX as i64) as u32;
            let mut sample = dive.begin_sample(time_s);
            if !row.is_null(1) {
                sample.depth_mm = row.int(1).clamp(i32::MIN as i64, i32::MAX as i64) as i32;
            }
            if !row.is_null(2) {
                sample.temperature_mk = units.temperature_to_mkelvin(row.real(2));
            }
            sample.end();
            Ok(())
        })?;

        dive.end();
        Ok(())
    }
}

fn psi(row: &dyn Row, index: usize) -> Option<u32> {
    positive(row.int(index)).map(|p| psi_to_mbar(p as f64))
}

/// Location and site arrive as separate list entries; the dive site is
/// named once both parts are known.
#[derive(Debug, Default)]
struct SiteName {
    first: Option<String>,
}

impl SiteName {
    fn push(&mut self, dive: &mut DiveScope<'_>, part: String) {
        match self.first.take() {
            Some(first) => dive.set_site(&format!("{first} / {part}")),
            None => self.first = Some(part),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::LogbookFormat;
    use crate::import::{import_logbook, ImportOptions};
    use crate::models::Logbook;
    use crate::sqlite::memory_db;

    const SCHEMA: &str = "
        CREATE TABLE Dive (Id INTEGER, DiveStartTime TEXT, LocationId INTEGER, Units INTEGER,
            MaxDepthPressure INTEGER, DiveMinutes INTEGER, SurfacePressure INTEGER,
            SerialNumber TEXT, IsViewDeleted INTEGER);
        CREATE TABLE GasMixes (DiveID INTEGER, FO2 INTEGER, FHe INTEGER,
            StartingPressure INTEGER, EndingPressure INTEGER, TankSize INTEGER,
            TankPressure INTEGER, TotalConsumption INTEGER);
        CREATE TABLE Items (DiveId INTEGER, Value1 INTEGER);
        CREATE TABLE List (Id INTEGER, Type INTEGER, Data TEXT);
        CREATE TABLE TrackPoints (DiveId INTEGER, runtime REAL, DepthPressure INTEGER,
            Temperature REAL);";

    fn import() -> Logbook {
        let conn = memory_db(SCHEMA);
        conn.execute_batch(
            "INSERT INTO Dive VALUES
                (3, '2020-09-13 12:26:40', 1, 0, 3000, 45, 1000, '12345', 0),
                (4, '2020-09-14 12:26:40', 1, 0, 2000, 30, 1000, '12345', 1),
                (5, '2020-09-15 12:26:40', 1, 0, 2000, 30, 1000, '12345', 0),
                (6, '2020-09-16 12:26:40', 1, 0, 2000, 30, 1000, NULL, 0);
             INSERT INTO GasMixes VALUES
                (3, 32, 0, 3000, 500, 80, 3000, 60),
                (3, 50, 0, 3000, 0, 40, 3000, 0);
             INSERT INTO List VALUES
                (1, 4, 'Alex'), (2, 3, 'Good'), (3, 0, 'Bonaire'), (4, 1, 'Salt Pier'),
                (5, 0, 'Curacao'), (6, 1, 'Tugboat');
             INSERT INTO Items VALUES (3, 1), (3, 2), (3, 3), (3, 4), (5, 5), (6, 6);
             INSERT INTO TrackPoints VALUES
                (3, 0, 1000, 77), (3, 0.5, 2000, 75), (3, 1, 3000, 73);",
        )
        .unwrap();
        import_logbook(&conn, "cobalt.db", LogbookFormat::Cobalt, &ImportOptions::default())
            .unwrap()
    }

    #[test]
    fn test_cobalt_dive() {
        let logbook = import();
        let numbers: Vec<_> = logbook.dives.iter().map(|d| d.number).collect();
        assert_eq!(numbers, vec![3, 5, 6]);

        let dive = &logbook.dives[0];
        assert_eq!(dive.when, 1_600_000_000);
        assert_eq!(dive.notes, None);
        assert_eq!(dive.buddy.as_deref(), Some("Alex"));
        assert_eq!(dive.visibility, None);
        assert_eq!(dive.dc.max_depth_mm, 20_000);
        assert_eq!(dive.dc.duration_s, 2_700);
        assert_eq!(dive.dc.surface_pressure_mbar, Some(1_000));
        assert_eq!(dive.dc.model.as_deref(), Some("Cobalt import"));
        assert_eq!(dive.dc.device_id, Some(12_345));

        assert_eq!(dive.cylinders.len(), 1);
        let cylinder = &dive.cylinders[0];
        assert_eq!(cylinder.gasmix, GasMix::new(320, 0));
        assert_eq!(cylinder.start_mbar, Some(psi_to_mbar(3000.0)));
        assert_eq!(cylinder.end_mbar, Some(psi_to_mbar(500.0)));
        assert_eq!(cylinder.size_ml, Some(8_000));
        assert_eq!(cylinder.working_pressure_mbar, Some(psi_to_mbar(3000.0)));
        assert_eq!(cylinder.gas_used_ml, Some(60_000));

        let profile: Vec<_> = dive
            .dc
            .samples
            .iter()
            .map(|s| (s.time_s, s.depth_mm))
            .collect();
        assert_eq!(profile, vec![(0, 0), (30, 10_000), (60, 20_000)]);
        assert_eq!(dive.dc.samples[0].temperature_mk, Some(298_150));
    }

    #[test]
    fn test_site_needs_location_and_site() {
        let logbook = import();
        assert_eq!(logbook.sites.len(), 1);
        assert_eq!(logbook.sites[0].name, "Bonaire / Salt Pier");
        assert_eq!(logbook.dives[0].dive_site, Some(0));
        // A lone location is not carried over into the next dive.
        assert_eq!(logbook.dives[1].dive_site, None);
        assert_eq!(logbook.dives[2].dive_site, None);
        assert_eq!(logbook.dives[2].dc.model, None);
    }

    #[test]
    fn test_missing_list_table_is_reported() {
        let schema = SCHEMA.replace("CREATE TABLE List (Id INTEGER, Type INTEGER, Data TEXT);", "");
        let conn = memory_db(&schema);
        conn.execute_batch(
            "INSERT INTO Dive VALUES (3, '2020-09-13 12:26:40', 1, 0, 3000, 45, 1000, NULL, 0);",
        )
        .unwrap();
        let err =
            import_logbook(&conn, "cobalt.db", LogbookFormat::Cobalt, &ImportOptions::default())
                .unwrap_err();
        assert_eq!(err.query(), Some("cobalt_buddy"));
    }
}
