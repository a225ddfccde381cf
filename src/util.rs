// Utility helpers for parsing, statistics and formatting.
//
// This module centralizes all the "dirty" text handling of the yearly exports
// (encoding, numeric coercion, identifier shapes) so the pipeline stages can
// assume typed values.
use encoding_rs::WINDOWS_1252;
use num_format::{Locale, ToFormattedString};

/// INSEE commune codes are five characters wide.
const ID_WIDTH: usize = 5;

/// Decode a Windows-1252 export. Every byte maps to a character, so this
/// never fails; accented names come out as proper Unicode.
pub fn decode_windows_1252(bytes: &[u8]) -> String {
    let (text, _, _) = WINDOWS_1252.decode(bytes);
    text.into_owned()
}

/// Parse a numeric cell, yielding `None` for anything that is not a finite number.
///
/// - Trims whitespace.
/// - A period is the only decimal separator; there is no thousands separator.
/// - `nan`, `inf` and free text are all treated as missing.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Trimmed text cell, `None` when blank.
pub fn clean_text(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Bring a municipality identifier to its canonical string form.
///
/// Codes read back from a numeric column lose their leading zero and may
/// gain a `.0` suffix; both are undone here. Alphanumeric Corsican codes
/// (`2A004`) pass through untouched.
pub fn canonical_id(raw: Option<&str>) -> Option<String> {
    let s = raw?.trim();
    let s = s.strip_suffix(".0").unwrap_or(s);
    if s.is_empty() {
        return None;
    }
    if s.chars().all(|c| c.is_ascii_digit()) && s.len() < ID_WIDTH {
        return Some(format!("{:0>width$}", s, width = ID_WIDTH));
    }
    Some(s.to_string())
}

/// First run of exactly four ASCII digits in a file name, read as a year.
pub fn year_from_file_name(name: &str) -> Option<i32> {
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i - start == 4 {
            return name[start..i].parse().ok();
        }
    }
    None
}

/// Median of the observed values; `None` when there are none.
pub fn median(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut v: Vec<f64> = values.into_iter().filter(|x| !x.is_nan()).collect();
    if v.is_empty() {
        return None;
    }
    v.sort_by(f64::total_cmp);
    let mid = v.len() / 2;
    if v.len() % 2 == 1 {
        Some(v[mid])
    } else {
        Some((v[mid - 1] + v[mid]) / 2.0)
    }
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus `num-format` thousands separators (`1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}
