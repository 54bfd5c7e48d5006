//! Acquisition dates from scene identifiers

use chrono::NaiveDate;
use dswe_core::{Error, Result};

/// Parse the acquisition date embedded in a scene identifier or file name.
///
/// Recognised forms, scanning `_`/`.`-separated tokens left to right:
/// - `YYYYMMDD` (Landsat collection and ARD ids; the first date token is
///   the acquisition, the second the processing date)
/// - `YYYYDDDTHHMMSS` (HLS: year, day of year, time)
pub fn parse_scene_date(name: &str) -> Result<NaiveDate> {
    name.split(['_', '.'])
        .find_map(|token| calendar_date(token).or_else(|| hls_date(token)))
        .ok_or_else(|| Error::SceneDate(name.to_string()))
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn calendar_date(token: &str) -> Option<NaiveDate> {
    if token.len() != 8 || !all_digits(token) {
        return None;
    }
    let year = token[0..4].parse().ok()?;
    let month = token[4..6].parse().ok()?;
    let day = token[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn hls_date(token: &str) -> Option<NaiveDate> {
    let (date, time) = token.split_once(['T', 't'])?;
    if date.len() != 7 || !all_digits(date) || time.len() != 6 || !all_digits(time) {
        return None;
    }
    let year = date[0..4].parse().ok()?;
    let ordinal = date[4..7].parse().ok()?;
    NaiveDate::from_yo_opt(year, ordinal)
}
