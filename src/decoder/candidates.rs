use std::cmp::Reverse;

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::geometry::{PolylineProjection, distance, encode_bearing, project_on_polyline};
use crate::{
    BoundingBox, DecoderConfig, DirectedEdge, DirectedGraph, Fow, Frc, Length, NetworkOverlay,
    OverlayEdge, OverlayError, OverlayVertex, Point, Score,
};

/// Vertex close to a Location Reference Point (LRP).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateVertex<VertexId> {
    pub vertex: VertexId,
    /// Straight line distance from the LRP to the vertex.
    pub distance: Length,
    pub score: Score,
}

/// Edge connected to a candidate vertex, oriented away from the vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateEdge<VertexId, EdgeId> {
    pub edge: DirectedEdge<EdgeId>,
    /// Vertex on the other side of the edge.
    pub target: VertexId,
    pub score: Score,
}

/// Candidate vertex together with one of its candidate edges.
///
/// The edge is oriented away from the vertex: it is travelled as it is for every LRP but the last
/// one, whose candidate edges enter the vertex and are travelled reversed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateVertexEdge<VertexId, EdgeId> {
    pub vertex: VertexId,
    pub edge: DirectedEdge<EdgeId>,
    pub target: VertexId,
    pub score: Score,
}

/// Each location reference point contains coordinates specifying a node in the encoder map. The
/// decoder tries to find so called candidate vertices in the decoder map whereby the coordinates
/// of the candidate vertices are close to the coordinates of the location reference point.
/// The straight line distance is used to identify close-by vertices, vertices farther than the
/// maximum distance are not considered.
///
/// If no candidate vertex has been found the LRP coordinate is projected onto the closest
/// traversable edge, and the edge is split at the projected point to materialize a virtual vertex
/// in the overlay. The split is undone by [`NetworkOverlay::reset`].
pub fn find_candidate_vertices<G: DirectedGraph>(
    config: &DecoderConfig,
    overlay: &mut NetworkOverlay<'_, G>,
    lrp: &Point,
) -> Result<Vec<CandidateVertex<OverlayVertex<G::VertexId>>>, OverlayError<G::Error>> {
    debug!("Finding candidate vertices for {lrp:?}");

    let mut radius = config.max_vertex_distance;
    let mut edges = vec![];

    for _ in 0..=config.max_box_expansions {
        let bbox = BoundingBox::around(lrp.coordinate, radius);
        edges = overlay.edges_within_box(bbox)?.collect();
        if !edges.is_empty() {
            break;
        }
        radius = radius * 2.0;
    }

    let mut visited = FxHashSet::default();
    let mut candidates = vec![];

    for &edge in &edges {
        let (start, end) = overlay.get_edge_vertices(edge)?;
        for vertex in [start, end] {
            if !visited.insert(vertex) {
                continue;
            }

            let vertex_distance =
                distance(lrp.coordinate, overlay.get_vertex_coordinate(vertex)?);
            if vertex_distance <= config.max_vertex_distance {
                candidates.push(CandidateVertex {
                    vertex,
                    distance: vertex_distance,
                    score: vertex_score(config, vertex_distance),
                });
            }
        }
    }

    if candidates.is_empty() {
        trace!("No vertex close to {lrp:?}, projecting on {} edges", edges.len());

        let mut closest: Option<(_, PolylineProjection)> = None;
        for &edge in &edges {
            if !overlay.get_edge_factor(edge)?.is_traversable() {
                continue;
            }

            let geometry = overlay.get_directed_edge_coordinates(DirectedEdge::forward(edge))?;
            let Some(projection) = project_on_polyline(&geometry, lrp.coordinate) else {
                continue;
            };

            if closest.is_none_or(|(_, p)| projection.distance < p.distance) {
                closest = Some((edge, projection));
            }
        }

        if let Some((edge, projection)) = closest
            && projection.distance <= config.max_vertex_distance
        {
            let vertex = overlay.split_edge(edge, &projection)?;
            candidates.push(CandidateVertex {
                vertex,
                distance: projection.distance,
                score: vertex_score(config, projection.distance),
            });
        }
    }

    candidates.sort_unstable_by_key(|c| c.vertex);
    debug!("Found {} candidate vertices", candidates.len());

    Ok(candidates)
}

fn vertex_score(config: &DecoderConfig, distance: Length) -> Score {
    Score::from((1.0 - distance.ratio_of(config.max_vertex_distance)).max(0.0))
}

/// The candidate edges should be outgoing edges (incoming edges for the last location reference
/// point) of the candidate vertex, traversable in that direction, and should match the FRC, FOW
/// and bearing of the LRP. Slight variances are allowed and are taken into account by the score:
/// - FRC and FOW scores degrade with the difference between the classes.
/// - The bearing score is `(180 - difference) / 180`, where the bearing of the edge is measured
///   over its first part (of the bearing distance) starting from the vertex. Edges whose bearing
///   differs from the LRP bearing more than the maximum bearing difference are discarded.
///
/// Edges with a non positive score are not candidates.
pub fn find_candidate_edges<G: DirectedGraph>(
    config: &DecoderConfig,
    graph: &G,
    vertex: G::VertexId,
    forward: bool,
    lrp: &Point,
) -> Result<Vec<CandidateEdge<G::VertexId, G::EdgeId>>, G::Error> {
    let mut candidates = vec![];

    for (edge, target) in graph.vertex_directed_edges(vertex)? {
        // only outgoing edges are accepted for the LRPs
        // except for the last LRP where only incoming edges are accepted
        let travelled = if forward { edge } else { edge.reversed() };
        if !graph.can_traverse(travelled)? {
            continue;
        }

        let (frc, fow) = graph
            .get_edge_road_class(edge.id)?
            .unwrap_or((Frc::Frc7, Fow::Undefined));

        let geometry = graph.get_directed_edge_coordinates(edge)?;
        let bearing = encode_bearing(&geometry, config.bearing_distance, false);

        if bearing.difference(&lrp.line.bearing) > config.max_bearing_difference {
            trace!("Candidate {edge:?} bearing {bearing:?} out of bounds");
            continue;
        }

        let score = frc.rating(&lrp.line.frc)
            * fow.rating(&lrp.line.fow)
            * bearing.rating(&lrp.line.bearing);

        trace!("Candidate {edge:?} from {vertex:?}: {score:?}");

        if score.is_positive() {
            candidates.push(CandidateEdge {
                edge,
                target,
                score,
            });
        }
    }

    Ok(candidates)
}

/// Finds the candidate vertices of the LRP and combines them with their candidate edges.
///
/// Edges split while looking for the vertices of this LRP are taken into account, but splits
/// made later for other LRPs are not: when decoding several LRPs on the same overlay, every LRP
/// vertex must be found before combining, see [`combine_candidates`].
pub fn find_candidates_for<G: DirectedGraph>(
    config: &DecoderConfig,
    overlay: &mut NetworkOverlay<'_, G>,
    lrp: &Point,
    forward: bool,
) -> Result<
    Vec<CandidateVertexEdge<OverlayVertex<G::VertexId>, OverlayEdge<G::EdgeId>>>,
    OverlayError<G::Error>,
> {
    let vertices = find_candidate_vertices(config, overlay, lrp)?;
    combine_candidates(config, &*overlay, &vertices, lrp, forward)
}

/// Combines the candidate vertices of the LRP with their candidate edges.
///
/// The candidates are sorted by descending score, ties are broken by vertex and then by edge.
pub fn combine_candidates<G: DirectedGraph>(
    config: &DecoderConfig,
    graph: &G,
    vertices: &[CandidateVertex<G::VertexId>],
    lrp: &Point,
    forward: bool,
) -> Result<Vec<CandidateVertexEdge<G::VertexId, G::EdgeId>>, G::Error> {
    let mut candidates = vec![];

    for candidate in vertices {
        let edges = find_candidate_edges(config, graph, candidate.vertex, forward, lrp)?;

        for CandidateEdge {
            edge,
            target,
            score,
        } in edges
        {
            let score = candidate.score * score;
            if score.is_positive() {
                candidates.push(CandidateVertexEdge {
                    vertex: candidate.vertex,
                    edge,
                    target,
                    score,
                });
            }
        }
    }

    candidates.sort_unstable_by_key(|c| (Reverse(c.score), c.vertex, c.edge));
    debug!("Found {} candidates for {lrp:?}", candidates.len());

    Ok(candidates)
}
