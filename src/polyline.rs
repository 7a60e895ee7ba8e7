//! Encoded polyline codec.
//!
//! Routing providers return path geometry as a compact string: each
//! coordinate is a delta from the previous one, scaled by 1e5, zig-zag
//! signed and written as 5-bit chunks offset by 63, with 0x20 as the
//! continuation bit.
//!
//! Decoding treats its input as untrusted. Malformed or truncated input
//! never panics; decoding stops at the first bad chunk and returns the
//! coordinates read so far.

use crate::geo::GeoPoint;

const SCALE: f64 = 1e5;
const CHUNK_OFFSET: u8 = 63;
const CHUNK_MASK: u8 = 0x1f;
const CONTINUATION: u8 = 0x20;

/// Longest legal shift: six 5-bit chunks carry a 32-bit zig-zag value.
const MAX_SHIFT: u32 = 30;

/// Decode an encoded polyline into coordinates.
///
/// Returns an empty sequence for empty input and a partial sequence
/// when the input ends mid-coordinate or contains bytes outside the
/// encoding alphabet.
pub fn decode_polyline(encoded: &str) -> Vec<GeoPoint> {
    let mut bytes = encoded.bytes();
    let mut points = Vec::with_capacity(encoded.len() / 4);
    let mut lat: i64 = 0;
    let mut lon: i64 = 0;

    loop {
        let Some(dlat) = read_value(&mut bytes) else { break };
        let Some(dlon) = read_value(&mut bytes) else {
            if dlat.is_some() {
                log::debug!("polyline truncated after {} points", points.len());
            }
            break;
        };
        let (Some(dlat), Some(dlon)) = (dlat, dlon) else {
            log::debug!("polyline malformed after {} points", points.len());
            break;
        };

        lat = lat.saturating_add(dlat);
        lon = lon.saturating_add(dlon);
        points.push(GeoPoint {
            lat: lat as f64 / SCALE,
            lon: lon as f64 / SCALE,
        });
    }

    points
}

/// Read one signed value.
///
/// `None` means the input is exhausted before the value started.
/// `Some(None)` means the value started but could not be completed.
fn read_value(bytes: &mut std::str::Bytes<'_>) -> Option<Option<i64>> {
    let mut result: i64 = 0;
    let mut shift: u32 = 0;
    let mut started = false;

    loop {
        let Some(byte) = bytes.next() else {
            return if started { Some(None) } else { None };
        };
        started = true;

        let Some(chunk) = byte.checked_sub(CHUNK_OFFSET).filter(|c| *c < 0x40) else {
            return Some(None);
        };
        if shift > MAX_SHIFT {
            return Some(None);
        }

        result |= i64::from(chunk & CHUNK_MASK) << shift;
        shift += 5;

        if chunk & CONTINUATION == 0 {
            let value = if result & 1 == 1 { !(result >> 1) } else { result >> 1 };
            return Some(Some(value));
        }
    }
}

/// Encode coordinates as a polyline string.
pub fn encode_polyline(points: &[GeoPoint]) -> String {
    let mut out = String::with_capacity(points.len() * 8);
    let mut prev_lat: i64 = 0;
    let mut prev_lon: i64 = 0;

    for p in points {
        let lat = (p.lat * SCALE).round() as i64;
        let lon = (p.lon * SCALE).round() as i64;
        write_value(lat - prev_lat, &mut out);
        write_value(lon - prev_lon, &mut out);
        prev_lat = lat;
        prev_lon = lon;
    }

    out
}

fn write_value(value: i64, out: &mut String) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= i64::from(CONTINUATION) {
        let chunk = (v as u8 & CHUNK_MASK) | CONTINUATION;
        out.push(char::from(chunk + CHUNK_OFFSET));
        v >>= 5;
    }
    out.push(char::from(v as u8 + CHUNK_OFFSET));
}
