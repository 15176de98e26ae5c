//! Shearwater Desktop.
//!
//! Every dive stores its unit system, and every profile record carries the
//! mix being breathed, so cylinders and gas switches are reconstructed from
//! the records. Air-integrated computers add two transmitter pressures.

use log::debug;

use crate::builder::{DiveScope, LogbookBuilder};
use crate::error::ImportError;
use crate::gas::{normalise, GasSwitchDetector};
use crate::models::{DiveMode, GasMix};
use crate::source::Row;
use crate::units::{fraction_to_permille, psi_to_mbar, UnitSystem};

use super::{dive_number, positive, Driver, SecondaryQuery, Session};

const DIVES: &str = "select l.number,timestamp,location||' / '||site,buddy,notes,imperialUnits,\
maxDepth,maxTime,startSurfacePressure,computerSerial,computerModel,i.diveId \
FROM dive_info AS i JOIN dive_logs AS l ON i.diveId=l.diveId";

const MODE: SecondaryQuery = SecondaryQuery {
    name: "shearwater_mode",
    template: "select distinct currentCircuitSetting from dive_log_records where diveLogId = {id}",
};

const CYLINDERS: SecondaryQuery = SecondaryQuery {
    name: "shearwater_cylinders",
    template: "select fractionO2,fractionHe from dive_log_records where diveLogId = {id} \
group by fractionO2,fractionHe",
};

const GAS_CHANGES: SecondaryQuery = SecondaryQuery {
    name: "shearwater_gaschanges",
    template: "select currentTime,fractionO2,fractionHe from dive_log_records \
where diveLogId = {id} order by currentTime",
};

const AI_COLUMNS: SecondaryQuery = SecondaryQuery {
    name: "shearwater_ai_columns",
    template: "select count(*) from pragma_table_info('dive_log_records') \
where name in ('aiSensor0_PressurePSI','aiSensor1_PressurePSI')",
};

const AI_PROFILE: SecondaryQuery = SecondaryQuery {
    name: "shearwater_ai_profile",
    template: "select currentTime,currentDepth,waterTemp,averagePPO2,currentNdl,CNSPercent,\
decoCeiling,aiSensor0_PressurePSI,aiSensor1_PressurePSI from dive_log_records where diveLogId = {id}",
};

const PROFILE: SecondaryQuery = SecondaryQuery {
    name: "shearwater_profile",
    template: "select currentTime,currentDepth,waterTemp,averagePPO2,currentNdl,CNSPercent,\
decoCeiling from dive_log_records where diveLogId = {id}",
};

/// Transmitter reading meaning "no transmitter".
const AI_MISSING: i64 = 4092;

pub struct Shearwater;

impl Driver for Shearwater {
    fn name(&self) -> &'static str {
        "shearwater_dives"
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
        let mut dive = logbook.begin_dive(dive_number(row.int(0)), row.int(1));
        let log_id = row.int(11);

        if let Some(site) = row.non_empty_text(2) {
            dive.set_site(&site);
        }
        dive.buddy = row.non_empty_text(3);
        dive.notes = row.non_empty_text(4);

        let units = if row.is_null(5) {
            session.options.default_units
        } else if row.int(5) == 1 {
            UnitSystem::Imperial
        } else {
            UnitSystem::Metric
        };

        if !row.is_null(6) {
            dive.dc.max_depth_mm = units.depth_to_mm(row.real(6));
        }
        if let Some(minutes) = positive(row.int(7)) {
            dive.dc.duration_s = minutes.saturating_mul(60);
        }
        dive.dc.surface_pressure_mbar = positive(row.int(8));

        let mut settings = dive.begin_settings();
        settings.serial = row.non_empty_text(9);
        if !row.is_null(10) {
            settings.model = Some(model_name(row.int(10)).to_string());
        }
        settings.end();

        if !row.is_null(11) {
            session.run(&MODE, log_id, &mut |row| {
                if !row.is_null(0) {
                    dive.dc.dive_mode = if row.int(0) == 0 {
                        DiveMode::ClosedCircuit
                    } else {
                        DiveMode::OpenCircuit
                    };
                }
                Ok(())
            })?;
        }

        session.run(&CYLINDERS, log_id, &mut |row| {
            let mut cylinder = dive.begin_cylinder();
            cylinder.gasmix = breathed_mix(row, 0);
            cylinder.end();
            Ok(())
        })?;

        let mut detector = GasSwitchDetector::new();
        session.run(&GAS_CHANGES, log_id, &mut |row| {
            if (0..3).any(|i| row.is_null(i)) {
                return Ok(());
            }
            let time_s = row.int(0).clamp(0, u32::MAX as i64) as u32;
            detector.observe(&mut dive, time_s, breathed_mix(row, 1));
            Ok(())
        })?;

        import_profile(session, &mut dive, log_id, units)?;
        dive.end();
        Ok(())
    }
}

fn model_name(code: i64) -> &'static str {
    match code {
        2 => "Shearwater Petrel/Perdix",
        4 => "Shearwater Predator",
        _ => "Shearwater import",
    }
}

/// O2 and He fractions at `first` and `first + 1`.
fn breathed_mix(row: &dyn Row, first: usize) -> GasMix {
    normalise(GasMix::new(
        fraction_to_permille(row.real(first)),
        fraction_to_permille(row.real(first + 1)),
    ))
}

/// Profile records, with transmitter pressures when the logbook has them.
/// Every failure of the chosen profile query is reported.
fn import_profile(
    session: &Session<'_>,
    dive: &mut DiveScope<'_>,
    log_id: i64,
    units: UnitSystem,
) -> Result<(), ImportError> {
    let mut transmitter_columns = 0;
    session.run(&AI_COLUMNS, log_id, &mut |row| {
        transmitter_columns = row.int(0);
        Ok(())
    })?;
    let air_integrated = transmitter_columns == 2;
    if !air_integrated {
        debug!("{}: no air integration for dive {}", session.url, dive.number);
    }

    let query = if air_integrated { &AI_PROFILE } else { &PROFILE };
    session.run(query, log_id, &mut |row| {
        add_sample(dive, row, units, air_integrated);
        Ok(())
    })
}

fn add_sample(dive: &mut DiveScope<'_>, row: &dyn Row, units: UnitSystem, air_integrated: bool) {
    let time_s = row.int(0).clamp(0, u32::MAX as i64) as u32;
    let mut sample = dive.begin_sample(time_s);
    if !row.is_null(1) {
        sample.depth_mm = units.depth_to_mm(row.real(1));
    }
    if !row.is_null(2) {
        sample.temperature_mk = units.temperature_to_mkelvin(row.real(2));
    }
    if !row.is_null(3) {
        sample.setpoint_mbar = Some((row.real(3) * 1000.0).round().max(0.0) as u32);
    }
    if !row.is_null(4) {
        sample.ndl_s = Some(row.int(4).clamp(0, u32::MAX as i64 / 60) as u32 * 60);
    }
    if !row.is_null(5) {
        sample.cns_percent = Some(row.int(5).max(0) as u32);
    }
    if !row.is_null(6) {
        // Whole metres or feet.
        let ceiling = units.depth_to_mm(row.int(6) as f64);
        sample.stop_depth_mm = Some(ceiling.max(0) as u32);
    }
    if air_integrated {
        sample.pressure_mbar = transmitter_pressure(row, 7);
        sample.pressure2_mbar = transmitter_pressure(row, 8);
    }
    sample.end();
}

/// Transmitters report half the tank pressure in psi.
fn transmitter_pressure(row: &dyn Row, index: usize) -> Option<u32> {
    if row.is_null(index) {
        return None;
    }
    match row.int(index) {
        AI_MISSING => None,
        psi => Some(psi_to_mbar(psi as f64).saturating_mul(2)),
    }
}
