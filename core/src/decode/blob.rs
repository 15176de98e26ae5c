//! Suunto DM4/DM5 binary profile blobs.
//!
//! DM5 packs every sample into one fixed-size block whose size depends on
//! the sub-format, announced by the first byte of the blob. DM4 (and DM5
//! logs converted from DM4) keep three parallel arrays instead.

use nom::{
    bytes::complete::take,
    number::complete::{be_i16, le_f32, le_i32, le_u24},
    sequence::preceded,
    IResult, Parser,
};

use crate::units::{celsius_to_mkelvin, metres_to_mm};

/// Temperatures outside [-10, 50) °C are sensor garbage.
const TEMPERATURE_RANGE_C: std::ops::Range<i32> = -10..50;

/// Cylinder pressures outside [0, 350000) mbar are sensor garbage.
const PRESSURE_RANGE_MBAR: std::ops::Range<i64> = 0..350_000;

/// One decoded profile point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfilePoint {
    pub time_s: u32,
    pub depth_mm: i32,
    pub temperature_mk: Option<u32>,
    pub pressure_mbar: Option<u32>,
}

/// Field positions inside one DM5 sample block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    pub size: usize,
    /// Little-endian f32, metres.
    pub depth_offset: usize,
    /// 3-byte little-endian integer, mbar.
    pub pressure_offset: usize,
    /// Big-endian signed 16-bit integer, °C.
    pub temperature_offset: usize,
}

impl BlockLayout {
    const fn with_size(size: usize) -> Self {
        Self {
            size,
            depth_offset: 3,
            pressure_offset: 7,
            temperature_offset: 10,
        }
    }

    /// Bytes a block must provide for every field to be readable.
    pub fn extent(&self) -> usize {
        (self.depth_offset + 4)
            .max(self.pressure_offset + 3)
            .max(self.temperature_offset + 2)
    }

    /// Layout announced by the blob's leading byte.
    pub fn for_discriminant(discriminant: u8) -> &'static BlockLayout {
        DM5_LAYOUTS
            .iter()
            .find(|(byte, _)| *byte == discriminant)
            .map(|(_, layout)| layout)
            .unwrap_or(&DM5_DEFAULT_LAYOUT)
    }
}

/// Known DM5 sub-formats. New ones only need a row here.
const DM5_LAYOUTS: &[(u8, BlockLayout)] = &[
    (2, BlockLayout::with_size(19)),
    (3, BlockLayout::with_size(23)),
    (4, BlockLayout::with_size(26)),
];

const DM5_DEFAULT_LAYOUT: BlockLayout = BlockLayout::with_size(16);

/// Sample index and elapsed time for a fixed sampling interval. A zero
/// interval produces nothing.
pub fn sample_times(interval_s: u32, duration_s: u32) -> impl Iterator<Item = (usize, u32)> {
    (0u64..)
        .map(move |i| (i, i * interval_s as u64))
        .take_while(move |(_, t)| interval_s > 0 && *t < duration_s as u64)
        .map(|(i, t)| (i as usize, t as u32))
}

pub fn sane_temperature(celsius: i32) -> Option<u32> {
    if TEMPERATURE_RANGE_C.contains(&celsius) {
        celsius_to_mkelvin(celsius as f64)
    } else {
        None
    }
}

pub fn sane_pressure(mbar: i64) -> Option<u32> {
    if PRESSURE_RANGE_MBAR.contains(&mbar) {
        Some(mbar as u32)
    } else {
        None
    }
}

fn depth_at(block: &[u8], offset: usize) -> Option<f32> {
    let parsed: IResult<&[u8], f32> = preceded(take(offset), le_f32).parse(block);
    parsed.ok().map(|(_, v)| v)
}

fn pressure_at(block: &[u8], offset: usize) -> Option<u32> {
    let parsed: IResult<&[u8], u32> = preceded(take(offset), le_u24).parse(block);
    parsed.ok().map(|(_, v)| v)
}

fn temperature_at(block: &[u8], offset: usize) -> Option<i16> {
    let parsed: IResult<&[u8], i16> = preceded(take(offset), be_i16).parse(block);
    parsed.ok().map(|(_, v)| v)
}

/// Decode a DM5 `SampleBlob`. Decoding stops early at a block whose
/// fields are cut off.
pub fn decode_dm5_blocks(blob: &[u8], interval_s: u32, duration_s: u32) -> Vec<ProfilePoint> {
    let Some(&discriminant) = blob.first() else {
        return Vec::new();
    };
    let layout = BlockLayout::for_discriminant(discriminant);

    let mut points = Vec::new();
    for (index, time_s) in sample_times(interval_s, duration_s) {
        let start = index * layout.size;
        let Some(block) = blob.get(start..start + layout.extent()) else {
            break;
        };
        let (Some(depth), Some(pressure), Some(temperature)) = (
            depth_at(block, layout.depth_offset),
            pressure_at(block, layout.pressure_offset),
            temperature_at(block, layout.temperature_offset),
        ) else {
            break;
        };
        points.push(ProfilePoint {
            time_s,
            depth_mm: metres_to_mm(depth as f64),
            temperature_mk: sane_temperature(temperature as i32),
            pressure_mbar: sane_pressure(pressure as i64),
        });
    }
    points
}

/// The three DM4 profile columns of one dive row.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelArrays<'a> {
    /// Little-endian f32 depth per sample, metres.
    pub profile: Option<&'a [u8]>,
    /// One byte per sample, °C.
    pub temperature: Option<&'a [u8]>,
    /// Little-endian i32 per sample, mbar.
    pub pressure: Option<&'a [u8]>,
}

impl ParallelArrays<'_> {
    fn depth(&self, index: usize) -> Option<f32> {
        let start = index * 4;
        let bytes = self.profile?.get(start..start + 4)?;
        let parsed: IResult<&[u8], f32> = le_f32(bytes);
        parsed.ok().map(|(_, v)| v)
    }

    fn temperature(&self, index: usize) -> Option<u32> {
        let celsius = *self.temperature?.get(index)?;
        sane_temperature(celsius as i32)
    }

    fn pressure(&self, index: usize) -> Option<u32> {
        let start = index * 4;
        let bytes = self.pressure?.get(start..start + 4)?;
        let parsed: IResult<&[u8], i32> = le_i32(bytes);
        parsed.ok().and_then(|(_, v)| sane_pressure(v as i64))
    }
}

/// Decode the DM4 parallel arrays. Without a profile array every sample
/// sits at `fallback_depth_mm`; a profile array that runs out ends the
/// profile.
pub fn decode_parallel_arrays(
    arrays: &ParallelArrays<'_>,
    interval_s: u32,
    duration_s: u32,
    fallback_depth_mm: i32,
) -> Vec<ProfilePoint> {
    let has_profile = arrays.profile.is_some_and(|p| !p.is_empty());
    let mut points = Vec::new();
    for (index, time_s) in sample_times(interval_s, duration_s) {
        let depth_mm = if has_profile {
            match arrays.depth(index) {
                Some(depth) => metres_to_mm(depth as f64),
                None => break,
            }
        } else {
            fallback_depth_mm
        };
        points.push(ProfilePoint {
            time_s,
            depth_mm,
            temperature_mk: arrays.temperature(index),
            pressure_mbar: arrays.pressure(index),
        });
    }
    points
}
