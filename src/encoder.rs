//! The OpenLR encoder generates a map-independent location reference for a (map-dependent)
//! location.

pub mod builder;
pub mod expansion;
pub mod lrp;

use tracing::info;

use crate::encoder::expansion::adjust_to_valid_points;
use crate::encoder::lrp::{build_line_lrps, build_point_along_line_lrps};
use crate::{
    DirectedGraph, EncodeError, Length, Line, Location, LocationError, LocationReference,
    PointAlongLine, ReferencedLine, ReferencedPointAlongLine, SearchConfig,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderConfig {
    /// The maximum distance allowed between consecutive LRPs.
    pub max_lrp_distance: Length,
    /// The length of the segment used to compute the lines bearing (distance from the start of
    /// the segment to its end).
    pub bearing_distance: Length,
    /// The maximum distance between a coordinate and the edge it is resolved to.
    pub max_resolve_distance: Length,
    /// The maximum number of vertices settled by a single search for a valid vertex.
    pub max_settles: usize,
    /// The maximum number of valid vertices rejected when expanding one end of a line.
    pub max_expansion_attempts: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            max_lrp_distance: Length::MAX_LRP_DISTANCE,
            bearing_distance: Length::from_meters(20.0),
            max_resolve_distance: Length::from_meters(50.0),
            max_settles: 1000,
            max_expansion_attempts: 8,
        }
    }
}

impl EncoderConfig {
    pub const fn search_config(&self) -> SearchConfig {
        SearchConfig {
            bearing_distance: self.bearing_distance,
            max_settles: self.max_settles,
        }
    }
}

/// Encodes a location into a map-independent location reference.
/// Locations that are not bound to the road network are returned as they are.
pub fn encode<G: DirectedGraph>(
    config: &EncoderConfig,
    graph: &G,
    location: Location<G::VertexId, G::EdgeId>,
) -> Result<LocationReference, EncodeError<G::EdgeId, G::Error>> {
    info!("Encoding {:?} with {config:?}", location.location_type());

    let reference = match location {
        Location::Line(line) => LocationReference::Line(encode_line(config, graph, line)?),
        Location::PointAlongLine(point) => {
            LocationReference::PointAlongLine(encode_point_along_line(config, graph, point)?)
        }
        Location::GeoCoordinate(coordinate) => LocationReference::GeoCoordinate(coordinate),
        Location::Circle(circle) => LocationReference::Circle(circle),
        Location::Rectangle(rectangle) => LocationReference::Rectangle(rectangle),
        Location::Grid(grid) => LocationReference::Grid(grid),
        Location::Polygon(polygon) => LocationReference::Polygon(polygon),
    };

    Ok(reference)
}

/// Encodes a line location into a line location reference.
pub fn encode_line<G: DirectedGraph>(
    config: &EncoderConfig,
    graph: &G,
    mut line: ReferencedLine<G::VertexId, G::EdgeId>,
) -> Result<Line, EncodeError<G::EdgeId, G::Error>> {
    // Step – 1 Check validity of the location and offsets to be encoded
    ensure_line_is_connected(graph, &line)?;

    // Step – 2 Adjust start and end vertex of the location to represent valid map vertices
    adjust_to_valid_points(config, graph, &mut line)?;

    // Step – 3 Determine the LRPs covering the location by concatenated shortest-paths
    let points = build_line_lrps(config, graph, &line)?;

    Ok(Line {
        points,
        offsets: line.offsets(),
    })
}

/// Encodes a point along line location into a point along line location reference.
pub fn encode_point_along_line<G: DirectedGraph>(
    config: &EncoderConfig,
    graph: &G,
    point: ReferencedPointAlongLine<G::VertexId, G::EdgeId>,
) -> Result<PointAlongLine, EncodeError<G::EdgeId, G::Error>> {
    let ReferencedPointAlongLine {
        mut line,
        orientation,
        side,
        ..
    } = point;

    ensure_line_is_connected(graph, &line)?;
    adjust_to_valid_points(config, graph, &mut line)?;

    Ok(PointAlongLine {
        points: build_point_along_line_lrps(config, graph, &line)?,
        offset: line.offsets().pos,
        orientation,
        side,
    })
}

fn ensure_line_is_connected<G: DirectedGraph>(
    graph: &G,
    line: &ReferencedLine<G::VertexId, G::EdgeId>,
) -> Result<(), EncodeError<G::EdgeId, G::Error>> {
    if line.is_connected(graph)? {
        Ok(())
    } else {
        Err(EncodeError::InvalidLocation(LocationError::NotConnected {
            vertices: line.vertices().len(),
            edges: line.edges().len(),
        }))
    }
}
