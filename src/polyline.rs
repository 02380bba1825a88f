//! Decoder for the Google encoded polyline format.
//!
//! Each coordinate is stored as a pair of deltas against the previous point, scaled by 1e5,
//! zigzag-encoded and split into 5-bit groups. Every group is offset by 63 so it lands in the
//! printable range `'?'..='~'`; bit `0x20` marks that more groups follow.

use crate::types::Coordinate;
use thiserror::Error;

const PRECISION: f64 = 1e5;
const CHAR_OFFSET: u8 = 63;
const CONTINUATION_BIT: i64 = 0x20;
const CHUNK_MASK: i64 = 0x1f;
const MAX_SHIFT: u32 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolylineError {
    #[error("byte {byte:#04x} at offset {at} is outside the polyline alphabet")]
    InvalidByte { byte: u8, at: usize },
    #[error("polyline ends in the middle of a value")]
    Truncated,
    #[error("value starting at offset {at} does not fit in 64 bits")]
    Overflow { at: usize },
    #[error("latitude at offset {at} has no matching longitude")]
    MissingLongitude { at: usize },
    #[error("point starting at offset {at} is outside the valid coordinate range")]
    OutOfRange { at: usize },
}

pub fn decode(encoded: &str) -> Result<Vec<Coordinate>, PolylineError> {
    let bytes = encoded.as_bytes();
    let mut idx = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;
    let mut coordinates = Vec::new();

    while idx < bytes.len() {
        let start = idx;
        lat = accumulate(lat, next_delta(bytes, &mut idx)?, start)?;
        if idx >= bytes.len() {
            return Err(PolylineError::MissingLongitude { at: idx });
        }
        lng = accumulate(lng, next_delta(bytes, &mut idx)?, start)?;
        let latitude = lat as f64 / PRECISION;
        let longitude = lng as f64 / PRECISION;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(PolylineError::OutOfRange { at: start });
        }
        coordinates.push(Coordinate {
            latitude,
            longitude,
        });
    }

    Ok(coordinates)
}

fn accumulate(total: i64, delta: i64, at: usize) -> Result<i64, PolylineError> {
    total
        .checked_add(delta)
        .ok_or(PolylineError::Overflow { at })
}

fn next_delta(bytes: &[u8], idx: &mut usize) -> Result<i64, PolylineError> {
    let start = *idx;
    let mut result: i64 = 0;
    let mut shift: u32 = 0;
    loop {
        let byte = *bytes.get(*idx).ok_or(PolylineError::Truncated)?;
        if !(CHAR_OFFSET..=b'~').contains(&byte) {
            return Err(PolylineError::InvalidByte { byte, at: *idx });
        }
        if shift > MAX_SHIFT {
            return Err(PolylineError::Overflow { at: start });
        }
        *idx += 1;
        let chunk = i64::from(byte - CHAR_OFFSET);
        result |= (chunk & CHUNK_MASK) << shift;
        shift += 5;
        if chunk & CONTINUATION_BIT == 0 {
            break;
        }
    }
    if result & 1 == 1 {
        Ok(!(result >> 1))
    } else {
        Ok(result >> 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(coordinates: &[Coordinate]) -> Vec<(f64, f64)> {
        coordinates
            .iter()
            .map(|c| (c.latitude, c.longitude))
            .collect()
    }

    #[test]
    fn empty_input_yields_no_points() {
        assert_eq!(decode("").unwrap(), vec![]);
    }

    #[test]
    fn reference_polyline() {
        let decoded = decode("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
        assert_eq!(
            pairs(&decoded),
            vec![(38.5, -120.2), (40.7, -120.95), (43.252, -126.453)]
        );
    }

    #[test]
    fn single_origin_point() {
        // "??" is a zero delta on both axes
        assert_eq!(pairs(&decode("??").unwrap()), vec![(0.0, 0.0)]);
    }

    #[test]
    fn deltas_accumulate() {
        // +1e-5 on both axes, twice
        let decoded = decode("AAAA").unwrap();
        assert_eq!(pairs(&decoded), vec![(0.00001, 0.00001), (0.00002, 0.00002)]);
    }

    #[test]
    fn decoding_is_deterministic() {
        let input = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";
        assert_eq!(decode(input).unwrap(), decode(input).unwrap());
    }

    #[test]
    fn rejects_bytes_outside_alphabet() {
        assert_eq!(
            decode("_p~iF ps|U"),
            Err(PolylineError::InvalidByte { byte: b' ', at: 5 })
        );
        assert!(matches!(
            decode("é"),
            Err(PolylineError::InvalidByte { at: 0, .. })
        ));
    }

    #[test]
    fn rejects_truncated_value() {
        // '_' has the continuation bit set and nothing follows
        assert_eq!(decode("_"), Err(PolylineError::Truncated));
    }

    #[test]
    fn rejects_latitude_without_longitude() {
        assert_eq!(
            decode("_p~iF"),
            Err(PolylineError::MissingLongitude { at: 5 })
        );
    }

    #[test]
    fn rejects_points_off_the_globe() {
        // each value is a full-width delta, far beyond 180 degrees
        let input = format!("}}{}F", "~".repeat(11)).repeat(6);
        assert!(matches!(
            decode(&input),
            Err(PolylineError::OutOfRange { at: 0 })
        ));
        assert_eq!(pairs(&decode("_cidP?").unwrap()), vec![(90.0, 0.0)]);
        // 90.00001 north
        assert_eq!(decode("acidP?"), Err(PolylineError::OutOfRange { at: 0 }));
    }

    #[test]
    fn running_total_overflow_is_an_error() {
        assert_eq!(accumulate(i64::MAX, 1, 7), Err(PolylineError::Overflow { at: 7 }));
        assert_eq!(accumulate(-5, 3, 0), Ok(-2));
    }

    #[test]
    fn rejects_runaway_continuation() {
        let input = "~".repeat(20);
        assert!(matches!(
            decode(&input),
            Err(PolylineError::Overflow { at: 0 })
        ));
    }
}
