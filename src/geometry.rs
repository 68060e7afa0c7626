use geo::{Bearing as _, Distance, Haversine};

use crate::{Bearing, Coordinate, Length};

/// Side of a point with respect to a directed segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
    On,
}

/// Orthogonal projection of a point on a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProjection {
    /// Projected point on the segment.
    pub coordinate: Coordinate,
    /// Relative position of the projected point between the segment start (0) and end (1).
    pub ratio: f64,
    pub side: Side,
}

/// Closest point of a polyline to a given point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolylineProjection {
    /// Projected point on the polyline.
    pub coordinate: Coordinate,
    /// Distance from the first polyline point to the projected point following the polyline.
    pub distance_along: Length,
    /// Index of the polyline segment (or vertex) the projection falls on.
    pub segment: usize,
    /// Distance between the given point and the projected point.
    pub distance: Length,
    /// Total length of the polyline.
    pub length: Length,
    pub side: Side,
}

impl PolylineProjection {
    /// Relative position of the projected point along the polyline, in `[0, 1]`.
    pub fn ratio(&self) -> f64 {
        self.distance_along.ratio_of(self.length).clamp(0.0, 1.0)
    }
}

/// Haversine distance between two coordinates.
pub fn distance(a: Coordinate, b: Coordinate) -> Length {
    Length::from_meters(Haversine.distance(geo::Point::from(a), geo::Point::from(b)))
}

/// Initial haversine bearing from `a` to `b` in degrees, in `[0, 360)`.
pub fn bearing(a: Coordinate, b: Coordinate) -> f64 {
    Haversine
        .bearing(geo::Point::from(a), geo::Point::from(b))
        .rem_euclid(360.0)
}

pub fn polyline_length(points: &[Coordinate]) -> Length {
    points.windows(2).map(|w| distance(w[0], w[1])).sum()
}

fn interpolate(a: Coordinate, b: Coordinate, ratio: f64) -> Coordinate {
    Coordinate {
        lon: a.lon + (b.lon - a.lon) * ratio,
        lat: a.lat + (b.lat - a.lat) * ratio,
    }
}

fn side_of(point: Coordinate, a: Coordinate, b: Coordinate) -> Side {
    const EPSILON: f64 = 1e-12;
    let cross = (b.lon - a.lon) * (point.lat - a.lat) - (b.lat - a.lat) * (point.lon - a.lon);

    if cross > EPSILON {
        Side::Left
    } else if cross < -EPSILON {
        Side::Right
    } else {
        Side::On
    }
}

/// Projects the point on the segment `a`-`b` in the plane of longitude and latitude.
/// Returns None if the segment is degenerate or the projection falls outside the segment.
pub fn project_on_segment(
    point: Coordinate,
    a: Coordinate,
    b: Coordinate,
) -> Option<SegmentProjection> {
    let (dx, dy) = (b.lon - a.lon, b.lat - a.lat);
    let norm = dx * dx + dy * dy;
    if norm == 0.0 {
        return None;
    }

    let ratio = ((point.lon - a.lon) * dx + (point.lat - a.lat) * dy) / norm;
    if !(0.0..=1.0).contains(&ratio) {
        return None;
    }

    Some(SegmentProjection {
        coordinate: interpolate(a, b, ratio),
        ratio,
        side: side_of(point, a, b),
    })
}

/// Finds the closest point of the polyline to the given point, considering both the orthogonal
/// projections on every segment and every polyline vertex. Ties keep the first closest point.
pub fn project_on_polyline(points: &[Coordinate], point: Coordinate) -> Option<PolylineProjection> {
    let first = *points.first()?;
    let length = polyline_length(points);

    let mut best = PolylineProjection {
        coordinate: first,
        distance_along: Length::ZERO,
        segment: 0,
        distance: distance(point, first),
        length,
        side: points
            .get(1)
            .map_or(Side::On, |&second| side_of(point, first, second)),
    };

    let mut distance_along = Length::ZERO;
    for (segment, w) in points.windows(2).enumerate() {
        let (a, b) = (w[0], w[1]);
        let segment_length = distance(a, b);

        let vertex_distance = distance(point, a);
        if vertex_distance < best.distance {
            best = PolylineProjection {
                coordinate: a,
                distance_along,
                segment,
                distance: vertex_distance,
                length,
                side: side_of(point, a, b),
            };
        }

        if let Some(projection) = project_on_segment(point, a, b) {
            let projected_distance = distance(point, projection.coordinate);
            if projected_distance < best.distance {
                best = PolylineProjection {
                    coordinate: projection.coordinate,
                    distance_along: distance_along + distance(a, projection.coordinate),
                    segment,
                    distance: projected_distance,
                    length,
                    side: projection.side,
                };
            }
        }

        distance_along += segment_length;
    }

    if let [.., a, b] = points {
        let vertex_distance = distance(point, *b);
        if vertex_distance < best.distance {
            best = PolylineProjection {
                coordinate: *b,
                distance_along: length,
                segment: points.len() - 2,
                distance: vertex_distance,
                length,
                side: side_of(point, *a, *b),
            };
        }
    }

    Some(best)
}

/// Gets the coordinate at the given relative position along the polyline.
/// The ratio is clamped to `[0, 1]`; 0 gives the first point and 1 the last point.
pub fn position_along_polyline(points: &[Coordinate], ratio: f64) -> Option<Coordinate> {
    let (&first, &last) = (points.first()?, points.last()?);
    let ratio = ratio.clamp(0.0, 1.0);

    if ratio == 0.0 {
        return Some(first);
    } else if ratio == 1.0 {
        return Some(last);
    }

    let target = polyline_length(points) * ratio;
    let mut distance_along = Length::ZERO;

    for w in points.windows(2) {
        let segment_length = distance(w[0], w[1]);
        if distance_along + segment_length >= target && !segment_length.is_zero() {
            let segment_ratio = (target - distance_along).ratio_of(segment_length);
            return Some(interpolate(w[0], w[1], segment_ratio));
        }
        distance_along += segment_length;
    }

    Some(last)
}

/// Encodes the bearing of a polyline: the angle between the true North and the line from the
/// first point to the point at `bearing_distance` along the polyline (or to the last point if the
/// polyline is shorter). With `use_last_segment` the polyline is read from its end backwards.
pub fn encode_bearing(
    points: &[Coordinate],
    bearing_distance: Length,
    use_last_segment: bool,
) -> Bearing {
    if use_last_segment {
        bearing_from_start(points.iter().rev().copied(), bearing_distance)
    } else {
        bearing_from_start(points.iter().copied(), bearing_distance)
    }
}

fn bearing_from_start(
    mut points: impl Iterator<Item = Coordinate>,
    bearing_distance: Length,
) -> Bearing {
    let Some(origin) = points.next() else {
        return Bearing::default();
    };

    let mut previous = origin;
    let mut distance_along = Length::ZERO;

    for point in points {
        let segment_length = distance(previous, point);
        if distance_along + segment_length >= bearing_distance && !segment_length.is_zero() {
            let ratio = (bearing_distance - distance_along).ratio_of(segment_length);
            let target = interpolate(previous, point, ratio);
            return Bearing::from_degrees_f64(bearing(origin, target));
        }

        distance_along += segment_length;
        previous = point;
    }

    Bearing::from_degrees_f64(bearing(origin, previous))
}
