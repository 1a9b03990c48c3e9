//! Polyline encoding for route visualization.
//!
//! Implements the Google Maps Encoded Polyline Algorithm Format.
//! See: <https://developers.google.com/maps/documentation/utilities/polylinealgorithm>

use crate::model::{EncodedPolyline, LatLng};

/// Encodes a sequence of coordinates using the polyline algorithm.
///
/// Each coordinate is encoded as the difference from the previous point,
/// with 5 decimal places of precision.
///
/// # Examples
///
/// ```
/// use two_step_routing::geometry::encode_polyline;
///
/// let encoded = encode_polyline(&[(38.5, -120.2)]);
/// assert!(!encoded.is_empty());
///
/// let empty = encode_polyline(&[]);
/// assert!(empty.is_empty());
/// ```
pub fn encode_polyline(coords: &[(f64, f64)]) -> String {
    if coords.is_empty() {
        return String::new();
    }

    let mut result = String::new();
    let mut prev_lat = 0i64;
    let mut prev_lng = 0i64;

    for &(lat, lng) in coords {
        let lat_e5 = (lat * 1e5).round() as i64;
        let lng_e5 = (lng * 1e5).round() as i64;

        encode_value(lat_e5 - prev_lat, &mut result);
        encode_value(lng_e5 - prev_lng, &mut result);

        prev_lat = lat_e5;
        prev_lng = lng_e5;
    }

    result
}

fn encode_value(value: i64, output: &mut String) {
    let mut encoded = if value < 0 { !(value << 1) } else { value << 1 };

    while encoded >= 0x20 {
        output.push(char::from_u32(((encoded & 0x1f) | 0x20) as u32 + 63).unwrap());
        encoded >>= 5;
    }
    output.push(char::from_u32(encoded as u32 + 63).unwrap());
}

/// Decodes a polyline string back to `(lat, lng)` coordinates.
///
/// # Examples
///
/// ```
/// use two_step_routing::geometry::{decode_polyline, encode_polyline};
///
/// let points = vec![(38.5, -120.2), (40.7, -120.95)];
/// let encoded = encode_polyline(&points);
/// let decoded = decode_polyline(&encoded);
/// assert_eq!(decoded.len(), points.len());
/// ```
pub fn decode_polyline(encoded: &str) -> Vec<(f64, f64)> {
    let bytes = encoded.as_bytes();
    let mut index = 0usize;
    let mut lat = 0i64;
    let mut lng = 0i64;
    let mut coords = Vec::new();

    while index < bytes.len() {
        let Some(delta_lat) = decode_value(bytes, &mut index) else { break };
        let Some(delta_lng) = decode_value(bytes, &mut index) else { break };
        lat += delta_lat;
        lng += delta_lng;
        coords.push((lat as f64 / 1e5, lng as f64 / 1e5));
    }

    coords
}

fn decode_value(bytes: &[u8], index: &mut usize) -> Option<i64> {
    if *index >= bytes.len() {
        return None;
    }
    let mut result: i64 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *bytes.get(*index)? as i64 - 63;
        *index += 1;
        result |= (byte & 0x1f) << shift;
        shift += 5;
        if byte < 0x20 {
            break;
        }
    }
    Some(if result & 1 != 0 { !(result >> 1) } else { result >> 1 })
}

/// Joins consecutive per-transition polylines (each already encoded) into
/// one route-level polyline by decoding, concatenating with de-duplicated
/// shared endpoints, and re-encoding.
pub fn join_transition_polylines(polylines: &[EncodedPolyline]) -> EncodedPolyline {
    let mut points: Vec<(f64, f64)> = Vec::new();
    for polyline in polylines {
        let mut decoded = decode_polyline(&polyline.points);
        if let (Some(first), Some(last_so_far)) = (decoded.first(), points.last()) {
            if first == last_so_far {
                decoded.remove(0);
            }
        }
        points.extend(decoded);
    }
    EncodedPolyline { points: encode_polyline(&points) }
}

pub fn latlng_to_tuple(latlng: &LatLng) -> (f64, f64) {
    (latlng.latitude, latlng.longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_is_stable() {
        let points = vec![(38.5, -120.2), (40.7, -120.95), (43.252, -126.453)];
        let encoded = encode_polyline(&points);
        let decoded = decode_polyline(&encoded);
        assert_eq!(decoded.len(), points.len());
        for ((lat1, lng1), (lat2, lng2)) in points.iter().zip(decoded.iter()) {
            assert!((lat1 - lat2).abs() < 1e-4);
            assert!((lng1 - lng2).abs() < 1e-4);
        }
    }

    #[test]
    fn empty_is_empty() {
        assert!(encode_polyline(&[]).is_empty());
        assert!(decode_polyline("").is_empty());
    }

    #[test]
    fn join_dedups_shared_endpoint() {
        let a = EncodedPolyline { points: encode_polyline(&[(1.0, 1.0), (2.0, 2.0)]) };
        let b = EncodedPolyline { points: encode_polyline(&[(2.0, 2.0), (3.0, 3.0)]) };
        let joined = join_transition_polylines(&[a, b]);
        let decoded = decode_polyline(&joined.points);
        assert_eq!(decoded.len(), 3);
    }
}
