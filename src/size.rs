//! Conversion of human size specs such as `100mb` or `2.4tb` into row counts.
//!
//! A row is roughly one kilobyte on disk, so the multipliers are fixed row
//! counts per unit rather than real byte accounting.

use crate::error::{LoadError, Result};

const UNITS: &[(&str, f64)] = &[("mb", 1_000.0), ("gb", 1_000_000.0), ("tb", 1_000_000_000.0)];

/// Converts `<number><unit>` (unit one of `mb`, `gb`, `tb`, any case) to rows.
pub fn size_to_rows(spec: &str) -> Result<u64> {
    let lower = spec.to_ascii_lowercase();
    if lower.len() < 3 || !lower.is_char_boundary(lower.len() - 2) {
        return Err(malformed(spec));
    }
    let (number, unit) = lower.split_at(lower.len() - 2);

    if !unit.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(malformed(spec));
    }
    let multiplier = UNITS
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, m)| *m)
        .ok_or_else(|| {
            LoadError::config(format!("unknown size {spec}, supported units are mb, gb and tb"))
        })?;

    if !number.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        || !number.bytes().any(|b| b.is_ascii_digit())
    {
        return Err(malformed(spec));
    }
    let value: f64 = number.parse().map_err(|_| malformed(spec))?;

    Ok((value * multiplier) as u64)
}

fn malformed(spec: &str) -> LoadError {
    LoadError::config(format!(
        "size {spec:?} must be in the format [number][unit], e.g. 123gb"
    ))
}
