//! Suunto Dive Manager 5.
//!
//! DM5 keeps the DM4 tables but moves cylinders into `DiveMixture` rows of
//! their own and stores the profile as one blob of fixed-size sample
//! blocks. Logs converted from DM4 still carry the old parallel arrays.

use crate::builder::{DiveScope, LogbookBuilder};
use crate::decode::blob::sane_pressure;
use crate::decode::decode_dm5_blocks;
use crate::error::ImportError;
use crate::gas::add_gaschange;
use crate::models::GasMix;
use crate::source::Row;
use crate::units::percent_to_permille;

use super::dm4::{self, col};
use super::{dive_number, positive, Driver, SecondaryQuery, Session};

const DIVES: &str = "select DiveId,StartTime/10000000-62135596800,Note,Duration,\
coalesce(SourceSerialNumber,SerialNumber),Source,MaxDepth,SampleInterval,StartTemperature,\
BottomTemperature,StartPressure,EndPressure,'','',SurfacePressure,DiveTime,SampleInterval,\
ProfileBlob,TemperatureBlob,PressureBlob,'','','','',SampleBlob FROM Dive where Deleted is null";

const SAMPLE_BLOB: usize = 24;

/// Size DM5 itself shows for a cylinder recorded without one.
const DEFAULT_CYLINDER_ML: u32 = 12_000;

const CYLINDERS: SecondaryQuery = SecondaryQuery {
    name: "dm5_cylinders",
    template: "select * from DiveMixture where DiveId = {id}",
};

const GAS_CHANGES: SecondaryQuery = SecondaryQuery {
    name: "dm5_gaschange",
    template: "select GasChangeTime,Oxygen,Helium from DiveGasChange join DiveMixture \
on DiveGasChange.DiveMixtureId=DiveMixture.DiveMixtureId where DiveId = {id}",
};

pub struct Dm5;

impl Driver for Dm5 {
    fn name(&self) -> &'static str {
        "dm5_dives"
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

        dm4::read_summary(&mut dive, row);
        dm4::read_device(&mut dive, row);
        import_cylinders(session, &mut dive, id)?;

        // Pa
        if !row.is_null(col::SURFACE_PRESSURE) {
            dive.dc.surface_pressure_mbar = positive(row.int(col::SURFACE_PRESSURE) / 100);
        }

        let interval_s = positive(row.int(col::INTERVAL)).unwrap_or(0);
        let points = match row.blob(SAMPLE_BLOB) {
            Some(blob) => decode_dm5_blocks(blob, interval_s, dive.duration_s),
            None => Vec::new(),
        };
        if dm4::add_profile_points(&mut dive, &points) == 0 {
            dm4::import_parallel_profile(&mut dive, row);
        }

        import_gas_changes(session, &mut dive, id)?;
        dm4::import_marks(session, &mut dive, id)?;
        dm4::import_tags(session, &mut dive, id)?;
        dive.end();
        Ok(())
    }
}

fn import_cylinders(
    session: &Session<'_>,
    dive: &mut DiveScope<'_>,
    id: i64,
) -> Result<(), ImportError> {
    session.run(&CYLINDERS, id, &mut |row| {
        let mut cylinder = dive.begin_cylinder();
        cylinder.start_mbar = positive(row.int(7)).and_then(|p| sane_pressure(p as i64));
        cylinder.end_mbar = positive(row.int(8)).and_then(|p| sane_pressure(p as i64));
        if !row.is_null(6) {
            let litres = row.real(6);
            cylinder.size_ml = if litres == 0.0 && cylinder.start_mbar.is_some() {
                Some(DEFAULT_CYLINDER_ML)
            } else {
                positive((litres * 1000.0).round() as i64)
            };
        }
        cylinder.gasmix = GasMix::new(
            percent_to_permille(row.real(2)),
            percent_to_permille(row.real(3)),
        );
        cylinder.end();
        Ok(())
    })
}

/// Recorded switches. The cylinder is the one carrying the same mix.
fn import_gas_changes(
    session: &Session<'_>,
    dive: &mut DiveScope<'_>,
    id: i64,
) -> Result<(), ImportError> {
    session.run(&GAS_CHANGES, id, &mut |row| {
        let time_s = row.int(0).clamp(0, u32::MAX as i64) as u32;
        let mix = GasMix::new(
            percent_to_permille(row.real(1)),
            percent_to_permille(row.real(2)),
        );
        let cylinder = dive.find_cylinder(mix);
        add_gaschange(dive, time_s, mix, cylinder);
        Ok(())
    })
}
