use tracing::trace;

use crate::geometry::{encode_bearing, polyline_length};
use crate::{Bearing, DirectedEdge, DirectedGraph, Fow, Length};

/// Edges shorter than this cannot provide a reliable bearing.
pub const MIN_BEARING_SHAPE_LENGTH: Length = Length::from_meters(25.0);

/// Incoming and outgoing one-way edges closer than this angle are considered the two carriageways
/// of the same road.
pub const MAX_ONEWAY_PAIR_BEARING_DIFFERENCE: Bearing = Bearing::from_degrees(30);

/// Returns true if the vertex is a valid location reference point anchor.
///
/// Valid vertices are such vertices where a shortest-path calculation needs to decide between
/// several different ways. Invalid vertices, on the contrary, are such vertices where a shortest
/// path calculation can step over:
/// 1. Dead ends (at most one traversable edge) are valid, otherwise every expansion beyond them
///    would be useless.
/// 2. Vertices with two traversable edges are only shape points of the road and never valid.
/// 3. Junctions of four or more traversable edges are always valid.
/// 4. Vertices with three traversable edges are valid unless they are the point where the two
///    one-way carriageways of a road (one entering, one exiting the vertex) merge into a single
///    bidirectional road. Such merges are still valid if the carriageways belong to a roundabout,
///    if the road classes differ, or if the carriageways diverge by more than 30 degrees.
pub fn is_vertex_valid<G: DirectedGraph>(
    graph: &G,
    vertex: G::VertexId,
    bearing_distance: Length,
) -> Result<bool, G::Error> {
    let mut incoming = vec![];
    let mut outgoing = vec![];
    let mut bidirectional = vec![];

    for (edge, _) in graph.vertex_directed_edges(vertex)? {
        let factor = graph.get_edge_factor(edge.id)?;
        match (factor.allows(!edge.forward), factor.allows(edge.forward)) {
            (true, true) => bidirectional.push(edge),
            (true, false) => incoming.push(edge),
            (false, true) => outgoing.push(edge),
            (false, false) => {}
        }
    }

    let degree = incoming.len() + outgoing.len() + bidirectional.len();
    trace!("Vertex {vertex:?} has {degree} traversable edges");

    match degree {
        0 | 1 => Ok(true),
        2 => Ok(false),
        3 => match (&incoming[..], &outgoing[..], &bidirectional[..]) {
            ([incoming], [outgoing], [bidirectional]) => {
                is_oneway_pair_valid(graph, *incoming, *outgoing, *bidirectional, bearing_distance)
            }
            _ => Ok(true),
        },
        _ => Ok(true),
    }
}

/// Decides if the merge of an incoming and an outgoing one-way edge into a bidirectional edge is a
/// genuine junction. All the edges are oriented away from the merge vertex.
fn is_oneway_pair_valid<G: DirectedGraph>(
    graph: &G,
    incoming: DirectedEdge<G::EdgeId>,
    outgoing: DirectedEdge<G::EdgeId>,
    bidirectional: DirectedEdge<G::EdgeId>,
    bearing_distance: Length,
) -> Result<bool, G::Error> {
    let road_classes = (
        graph.get_edge_road_class(incoming.id)?,
        graph.get_edge_road_class(outgoing.id)?,
        graph.get_edge_road_class(bidirectional.id)?,
    );

    let (Some(incoming_class), Some(outgoing_class), Some(bidirectional_class)) = road_classes
    else {
        return Ok(true);
    };

    if incoming_class.1 == Fow::Roundabout || outgoing_class.1 == Fow::Roundabout {
        return Ok(true);
    } else if incoming_class.0 != outgoing_class.0 || incoming_class.0 != bidirectional_class.0 {
        return Ok(true);
    }

    // the incoming edge is read as travelled, that is towards the vertex
    let incoming_shape = graph.get_directed_edge_coordinates(incoming.reversed())?;
    let outgoing_shape = graph.get_directed_edge_coordinates(outgoing)?;

    if polyline_length(&incoming_shape) < MIN_BEARING_SHAPE_LENGTH
        || polyline_length(&outgoing_shape) < MIN_BEARING_SHAPE_LENGTH
    {
        return Ok(false);
    }

    let incoming_bearing = encode_bearing(&incoming_shape, bearing_distance, true);
    let outgoing_bearing = encode_bearing(&outgoing_shape, bearing_distance, false);
    let difference = incoming_bearing.difference(&outgoing_bearing);

    trace!(
        "One-way pair {:?} {:?} bearing difference: {difference:?}",
        incoming.id, outgoing.id
    );

    Ok(difference > MAX_ONEWAY_PAIR_BEARING_DIFFERENCE)
}
