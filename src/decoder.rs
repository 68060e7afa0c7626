//! The decoder resolves a (map-dependent) location using its own map.
//! This map might differ from the one used during encoding.
//!
//! 1. Check the validity of the location reference.
//! 2. For each location reference point find candidate vertices.
//! 3. For each location reference point find candidate edges.
//! 4. Rate candidate edges for each location reference point.
//! 5. Determine shortest-path(s) between two subsequent location reference points.
//! 6. Concatenate shortest-path(s) to form the location and keep the offsets.

pub mod candidates;
pub mod resolver;

use tracing::{debug, info};

use crate::decoder::candidates::{combine_candidates, find_candidate_vertices};
use crate::decoder::resolver::{build_line_from_routes, resolve_routes};
use crate::{
    Bearing, DecodeError, DirectedGraph, Length, Line, Location, LocationReference,
    NetworkOverlay, Offset, Offsets, OverlayEdge, OverlayError, OverlayVertex, ReferencedLine,
    ReferencedPointAlongLine,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecoderConfig {
    /// Maximum distance from the LRP to the vertices of the graph that will be considered.
    pub max_vertex_distance: Length,
    /// The length of the segment used to compute the edges bearing (distance from the start of
    /// the segment to its end).
    pub bearing_distance: Length,
    /// Maximum bearing difference between the candidate edge bearing and the LRP bearing for the
    /// candidate to be accepted.
    pub max_bearing_difference: Bearing,
    /// Maximum number of candidate pairs tried, after the first one, between two LRPs.
    pub max_number_retries: usize,
    /// Number of road classes the route between two LRPs may be less important than the lowest
    /// FRC to next point.
    pub frc_variance: u8,
    /// Variance allowed to the resolver when computing distance between LRPs.
    pub next_point_variance: Length,
    /// Maximum number of vertices settled by a single shortest path.
    pub max_settles: usize,
    /// Number of times the search box around an LRP is doubled while it contains no edge.
    pub max_box_expansions: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_vertex_distance: Length::from_meters(100.0),
            bearing_distance: Length::from_meters(20.0),
            max_bearing_difference: Bearing::from_degrees(90),
            max_number_retries: 8,
            frc_variance: 2,
            next_point_variance: Length::from_meters(150.0),
            max_settles: 100_000,
            max_box_expansions: 3,
        }
    }
}

/// Location decoded on a [`NetworkOverlay`], it may reference virtual vertices and edges.
pub type DecodedLocation<VertexId, EdgeId> = Location<OverlayVertex<VertexId>, OverlayEdge<EdgeId>>;

/// Decodes a location reference on the network of the overlay.
///
/// The overlay may be modified (edges split at LRPs far from any vertex) and the decoded location
/// refers to these modifications: the overlay must be reset before decoding another independent
/// location reference. Locations that are not bound to the road network are returned as they are.
pub fn decode<G: DirectedGraph>(
    config: &DecoderConfig,
    overlay: &mut NetworkOverlay<'_, G>,
    reference: LocationReference,
) -> Result<DecodedLocation<G::VertexId, G::EdgeId>, DecodeError<OverlayError<G::Error>>> {
    info!("Decoding {:?} with {config:?}", reference.location_type());

    let location = match reference {
        LocationReference::Line(line) => Location::Line(decode_line(config, overlay, &line)?),
        LocationReference::PointAlongLine(point) => {
            let line = Line {
                points: point.points.to_vec(),
                offsets: Offsets {
                    pos: point.offset,
                    neg: Offset::ZERO,
                },
            };

            let line = decode_line(config, overlay, &line)?;
            let coordinate = line.start_coordinate(&*overlay)?;

            Location::PointAlongLine(ReferencedPointAlongLine {
                line,
                coordinate,
                orientation: point.orientation,
                side: point.side,
            })
        }
        LocationReference::GeoCoordinate(coordinate) => Location::GeoCoordinate(coordinate),
        LocationReference::Circle(circle) => Location::Circle(circle),
        LocationReference::Rectangle(rectangle) => Location::Rectangle(rectangle),
        LocationReference::Grid(grid) => Location::Grid(grid),
        LocationReference::Polygon(polygon) => Location::Polygon(polygon),
    };

    Ok(location)
}

/// Decodes a line location reference into a line of the overlay network.
pub fn decode_line<G: DirectedGraph>(
    config: &DecoderConfig,
    overlay: &mut NetworkOverlay<'_, G>,
    line: &Line,
) -> Result<
    ReferencedLine<OverlayVertex<G::VertexId>, OverlayEdge<G::EdgeId>>,
    DecodeError<OverlayError<G::Error>>,
> {
    // Step – 1 Check the validity of the location reference
    let Some((last, points)) = line.points.split_last() else {
        return Err(DecodeError::InvalidLine);
    };

    if points.is_empty() || !last.is_last() || points.iter().any(|p| p.is_last()) {
        return Err(DecodeError::InvalidLine);
    }

    // Step – 2 For each LRP find candidate vertices, splitting edges far from any vertex
    let mut vertices = Vec::with_capacity(line.points.len());
    for lrp in &line.points {
        vertices.push(find_candidate_vertices(config, overlay, lrp)?);
    }

    // Step – 3, 4 Find and rate candidate edges once every split is done
    let mut candidates = Vec::with_capacity(line.points.len());
    for (lrp, lrp_vertices) in line.points.iter().zip(&vertices) {
        let lrp_candidates =
            combine_candidates(config, &*overlay, lrp_vertices, lrp, !lrp.is_last())?;
        if lrp_candidates.is_empty() {
            return Err(DecodeError::CandidatesNotFound(*lrp));
        }
        candidates.push(lrp_candidates);
    }

    // Step – 5 Determine shortest-paths between subsequent LRPs
    let routes = resolve_routes(config, &*overlay, &line.points, &candidates)?;
    debug!("Resolved {} routes", routes.len());

    // Step – 6 Concatenate the routes
    build_line_from_routes(routes, line.offsets).map_err(DecodeError::InvalidLocation)
}
