//! Profile decoders for vendor-specific sample encodings.
//!
//! Vendors rarely keep one row per sample. Suunto packs the whole profile
//! into binary blobs ([`blob`]); DivingLog stores it as strings of
//! fixed-width ASCII digit records ([`fixed_width`]).
//!
//! Both decoders are pure: they turn column contents into points, and the
//! drivers feed those points through the dive builder.

pub mod blob;
pub mod fixed_width;

pub use blob::{
    decode_dm5_blocks, decode_parallel_arrays, sample_times, BlockLayout, ParallelArrays,
    ProfilePoint,
};
pub use fixed_width::{decode_divinglog_profile, DivingLogColumns, DivingLogPoint, ProfileFlags};

use nom::{
    character::complete::{i64 as signed_int, multispace0},
    number::complete::recognize_float,
    sequence::preceded,
    IResult, Parser,
};

/// Integer prefix of a text cell, `atoi` style: leading blanks are skipped,
/// parsing stops at the first non-digit, and no digits at all read as 0.
pub fn leading_int(text: &str) -> i64 {
    let parsed: IResult<&str, i64> = preceded(multispace0, signed_int).parse(text);
    parsed.map(|(_, value)| value).unwrap_or(0)
}

/// Floating point prefix of a text cell, `strtod` style.
pub fn leading_float(text: &str) -> f64 {
    let parsed: IResult<&str, &str> = preceded(multispace0, recognize_float).parse(text);
    parsed
        .ok()
        .and_then(|(_, digits)| digits.parse().ok())
        .unwrap_or(0.0)
}
