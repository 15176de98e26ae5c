//! DivingLog profile strings.
//!
//! DivingLog keeps a dive's profile in up to five text columns, each a
//! concatenation of fixed-width records of ASCII digits, one record per
//! sample:
//!
//! - `Profile`  `DDDDDCRASWEE` depth (cm), deco, RBT warning, ascent
//!   warning, deco stop ignored, work warning, two computer specific chars
//! - `Profile2` `TTTFFFFIRRR` temperature (0.1 °C), tank pressure (0.1 bar),
//!   tank id, remaining bottom time (min)
//! - `Profile3` 14 chars, heartbeat at offset 8
//! - `Profile4` `NNNSSSDDD` NDL (or TTS in deco, min), stop time (min),
//!   stop depth (m)
//! - `Profile5` `AAABBBCCCOOOONNNNSS` three ppO2 cells (0.01 bar), OTU,
//!   CNS (0.1 %), setpoint (0.1 bar)
//!
//! Only `Profile` drives the sample count; the other columns contribute
//! while they still hold a complete record.

use nom::{
    bytes::complete::take,
    character::complete::anychar,
    combinator::map,
    IResult, Parser,
};

use super::leading_int;
use crate::models::Sample;
use crate::units::celsius_to_mkelvin;

/// Warning flags carried by a `Profile` record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileFlags {
    pub in_deco: bool,
    pub rbt_warning: bool,
    pub ascent_warning: bool,
    pub deco_stop_ignored: bool,
    pub work_warning: bool,
}

/// The profile columns of one logbook row.
#[derive(Debug, Clone, Copy, Default)]
pub struct DivingLogColumns<'a> {
    pub profile: &'a str,
    pub tanks: Option<&'a str>,
    pub heart: Option<&'a str>,
    pub deco: Option<&'a str>,
    pub rebreather: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DivingLogPoint {
    pub sample: Sample,
    pub flags: ProfileFlags,
    /// Tank breathed from, when the row carries tank data.
    pub tank: Option<u32>,
}

struct DepthRecord {
    depth_cm: i64,
    flags: ProfileFlags,
}

struct TankRecord {
    temperature_dc: i64,
    pressure_dbar: i64,
    tank: i64,
    rbt_min: i64,
}

struct DecoRecord {
    ndl_or_tts_min: i64,
    stop_time_min: i64,
    stop_depth_m: i64,
}

struct RebreatherRecord {
    cells_cbar: [i64; 3],
    cns_dpercent: i64,
    setpoint_dbar: i64,
}

fn digits<'a>(width: usize) -> impl Parser<&'a str, Output = i64, Error = nom::error::Error<&'a str>> {
    map(take(width), leading_int)
}

fn flag(input: &str) -> IResult<&str, bool> {
    map(anychar, |c| c != '0').parse(input)
}

fn depth_record(input: &str) -> IResult<&str, DepthRecord> {
    let (input, (depth_cm, in_deco, rbt_warning, ascent_warning, deco_stop_ignored, work_warning, _)) =
        (digits(5), flag, flag, flag, flag, flag, take(2usize)).parse(input)?;
    Ok((
        input,
        DepthRecord {
            depth_cm,
            flags: ProfileFlags {
                in_deco,
                rbt_warning,
                ascent_warning,
                deco_stop_ignored,
                work_warning,
            },
        },
    ))
}

fn tank_record(input: &str) -> IResult<&str, TankRecord> {
    let (input, (temperature_dc, pressure_dbar, tank, rbt_min)) =
        (digits(3), digits(4), digits(1), digits(3)).parse(input)?;
    Ok((
        input,
        TankRecord {
            temperature_dc,
            pressure_dbar,
            tank,
            rbt_min,
        },
    ))
}

fn heart_record(input: &str) -> IResult<&str, i64> {
    let (input, (_, heartbeat, _)) = (take(8usize), digits(3), take(3usize)).parse(input)?;
    Ok((input, heartbeat))
}

fn deco_record(input: &str) -> IResult<&str, DecoRecord> {
    let (input, (ndl_or_tts_min, stop_time_min, stop_depth_m)) =
        (digits(3), digits(3), digits(3)).parse(input)?;
    Ok((
        input,
        DecoRecord {
            ndl_or_tts_min,
            stop_time_min,
            stop_depth_m,
        },
    ))
}

fn rebreather_record(input: &str) -> IResult<&str, RebreatherRecord> {
    let (input, (cell1, cell2, cell3, _otu, cns_dpercent, setpoint_dbar)) =
        (digits(3), digits(3), digits(3), digits(4), digits(4), digits(2)).parse(input)?;
    Ok((
        input,
        RebreatherRecord {
            cells_cbar: [cell1, cell2, cell3],
            cns_dpercent,
            setpoint_dbar,
        },
    ))
}

fn positive(value: i64) -> Option<u32> {
    (value > 0).then_some(value as u32)
}

fn non_negative(value: i64) -> u32 {
    value.max(0) as u32
}

/// Pull the next record off an optional column, advancing it.
fn next_record<'a, T>(
    column: &mut &'a str,
    parser: impl Fn(&'a str) -> IResult<&'a str, T>,
) -> Option<T> {
    let (rest, record) = parser(column).ok()?;
    *column = rest;
    Some(record)
}

/// Decode the profile columns of one dive. Samples are `interval_s`
/// apart, starting at zero.
pub fn decode_divinglog_profile(
    interval_s: u32,
    columns: &DivingLogColumns<'_>,
) -> Vec<DivingLogPoint> {
    let mut profile = columns.profile;
    let mut tanks = columns.tanks.unwrap_or("");
    let mut heart = columns.heart.unwrap_or("");
    let mut deco = columns.deco.unwrap_or("");
    let mut rebreather = columns.rebreather.unwrap_or("");

    let mut points = Vec::new();
    let mut time_s = 0u32;
    while let Some(depth) = next_record(&mut profile, depth_record) {
        let mut sample = Sample {
            time_s,
            depth_mm: (depth.depth_cm * 10) as i32,
            in_deco: depth.flags.in_deco,
            ..Sample::default()
        };
        let mut tank = None;

        if let Some(record) = next_record(&mut tanks, tank_record) {
            sample.temperature_mk = celsius_to_mkelvin(record.temperature_dc as f64 / 10.0);
            sample.pressure_mbar = Some(non_negative(record.pressure_dbar) * 100);
            sample.rbt_s = Some(non_negative(record.rbt_min) * 60);
            tank = Some(non_negative(record.tank));
        }

        if let Some(heartbeat) = next_record(&mut heart, heart_record) {
            sample.heartbeat = Some(non_negative(heartbeat));
        }

        if let Some(record) = next_record(&mut deco, deco_record) {
            // NDL outside deco; in deco either 0 or the time to surface.
            let minutes = non_negative(record.ndl_or_tts_min);
            if sample.in_deco {
                sample.ndl_s = Some(0);
                if minutes > 0 {
                    sample.tts_s = Some(minutes * 60);
                }
            } else {
                sample.ndl_s = Some(minutes * 60);
            }
            sample.stop_time_s = Some(non_negative(record.stop_time_min) * 60);
            sample.stop_depth_mm = Some(non_negative(record.stop_depth_m) * 1000);
        }

        if let Some(record) = next_record(&mut rebreather, rebreather_record) {
            for (channel, cbar) in record.cells_cbar.iter().enumerate() {
                if let Some(cbar) = positive(*cbar) {
                    sample.set_o2_sensor(channel, cbar * 10);
                }
            }
            if record.cns_dpercent > 0 {
                sample.cns_percent = Some((record.cns_dpercent as f64 / 10.0).round() as u32);
            }
            if let Some(setpoint) = positive(record.setpoint_dbar) {
                sample.setpoint_mbar = Some(setpoint * 100);
            }
        }

        points.push(DivingLogPoint {
            sample,
            flags: depth.flags,
            tank,
        });
        time_s = time_s.saturating_add(interval_s);
    }
    points
}
