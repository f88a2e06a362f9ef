//! Geometry codec for provider paths
//!
//! The directions provider returns its path as an encoded polyline with an
//! elevation dimension: each vertex is three zig-zag varints (latitude and
//! longitude at 1e-5 degrees, elevation at 1e-2 meters), each delta-encoded
//! against the previous vertex. Decoding is pure and never fails: malformed
//! input yields an empty sequence.

use geo::Point;

const COORD_FACTOR: f64 = 1e5;
const ELEVATION_FACTOR: f64 = 1e2;

/// A decoded path vertex
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
    pub elevation: f64,
}

impl Coordinate {
    pub fn new(longitude: f64, latitude: f64, elevation: f64) -> Self {
        Self {
            longitude,
            latitude,
            elevation,
        }
    }

    /// Planar position as `(x = longitude, y = latitude)`
    #[inline]
    pub fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// Decode an encoded geometry into `(longitude, latitude, elevation)` vertices
pub fn decode(encoded: &str) -> Vec<Coordinate> {
    #[cfg(feature = "profiling")]
    profiling::scope!("codec::decode");

    match try_decode(encoded.as_bytes()) {
        Some(coordinates) => coordinates,
        None => {
            tracing::debug!(
                "Discarding malformed encoded geometry ({} bytes)",
                encoded.len()
            );
            Vec::new()
        }
    }
}

fn try_decode(bytes: &[u8]) -> Option<Vec<Coordinate>> {
    let mut coordinates = Vec::with_capacity(bytes.len() / 6);
    let mut index = 0;
    let (mut lat, mut lon, mut ele) = (0i64, 0i64, 0i64);

    while index < bytes.len() {
        lat = lat.checked_add(next_value(bytes, &mut index)?)?;
        lon = lon.checked_add(next_value(bytes, &mut index)?)?;
        ele = ele.checked_add(next_value(bytes, &mut index)?)?;
        coordinates.push(Coordinate::new(
            lon as f64 / COORD_FACTOR,
            lat as f64 / COORD_FACTOR,
            ele as f64 / ELEVATION_FACTOR,
        ));
    }

    Some(coordinates)
}

/// Read one zig-zag varint; `None` on truncation, bad characters or overflow
fn next_value(bytes: &[u8], index: &mut usize) -> Option<i64> {
    let mut result: i64 = 0;
    let mut shift = 0u32;

    loop {
        let byte = *bytes.get(*index)?;
        *index += 1;
        if !(63..127).contains(&byte) {
            return None;
        }
        let chunk = i64::from(byte - 63);
        if shift > 60 {
            return None;
        }
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }

    Some(if result & 1 == 1 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

/// Encode vertices in the same format [`decode`] reads
pub fn encode(coordinates: &[Coordinate]) -> String {
    let mut out = String::with_capacity(coordinates.len() * 12);
    let (mut prev_lat, mut prev_lon, mut prev_ele) = (0i64, 0i64, 0i64);

    for coordinate in coordinates {
        let lat = (coordinate.latitude * COORD_FACTOR).round() as i64;
        let lon = (coordinate.longitude * COORD_FACTOR).round() as i64;
        let ele = (coordinate.elevation * ELEVATION_FACTOR).round() as i64;

        push_value(&mut out, lat - prev_lat);
        push_value(&mut out, lon - prev_lon);
        push_value(&mut out, ele - prev_ele);

        prev_lat = lat;
        prev_lon = lon;
        prev_ele = ele;
    }

    out
}

fn push_value(out: &mut String, value: i64) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= 0x20 {
        out.push(char::from((0x20 | (v & 0x1f)) as u8 + 63));
        v >>= 5;
    }
    out.push(char::from(v as u8 + 63));
}
