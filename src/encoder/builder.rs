use tracing::{debug, info};

use crate::geometry::{PolylineProjection, Side, project_on_polyline};
use crate::{
    BoundingBox, Coordinate, DirectedEdge, DirectedGraph, EncodeError, EncoderConfig, Length,
    LocationError, Offset, Offsets, Orientation, ReferencedLine, ReferencedPointAlongLine,
    ShortestPathConfig, SideOfRoad, shortest_path,
};

/// Position of a coordinate resolved on the closest edge of the graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgePosition<EdgeId> {
    pub edge: EdgeId,
    /// Projection of the coordinate on the edge geometry in its stored orientation.
    pub projection: PolylineProjection,
    /// Distance from the edge start vertex to the projected point.
    pub distance_along: Length,
    pub edge_length: Length,
}

impl<EdgeId: Copy> EdgePosition<EdgeId> {
    /// Distance from the start of the directed edge to the projected point.
    fn offset(&self, edge: DirectedEdge<EdgeId>) -> Length {
        if edge.forward {
            self.distance_along
        } else {
            self.edge_length - self.distance_along
        }
    }
}

/// Builds a line from the given path, without any expansion of its ends.
///
/// The path must be connected (`edges[i]` goes from `vertices[i]` to `vertices[i + 1]`) and the
/// offsets must be valid. The geometry of the edges is attached to the line.
pub fn build_line<G: DirectedGraph>(
    graph: &G,
    vertices: Vec<G::VertexId>,
    edges: Vec<DirectedEdge<G::EdgeId>>,
    offsets: Offsets,
) -> Result<ReferencedLine<G::VertexId, G::EdgeId>, EncodeError<G::EdgeId, G::Error>> {
    let line = ReferencedLine::new(vertices, edges, offsets).map_err(EncodeError::InvalidLocation)?;

    if !line.is_connected(graph)? {
        return Err(EncodeError::InvalidLocation(LocationError::NotConnected {
            vertices: line.vertices().len(),
            edges: line.edges().len(),
        }));
    }

    let shapes = line
        .edges()
        .iter()
        .map(|&edge| graph.get_directed_edge_coordinates(edge))
        .collect::<Result<Vec<_>, _>>()?;

    line.with_shapes(shapes)
        .map_err(EncodeError::InvalidLocation)
}

/// Resolves the coordinate to the closest traversable edge within the maximum resolve distance.
pub fn resolve_coordinate<G: DirectedGraph>(
    config: &EncoderConfig,
    graph: &G,
    coordinate: Coordinate,
) -> Result<EdgePosition<G::EdgeId>, EncodeError<G::EdgeId, G::Error>> {
    let bbox = BoundingBox::around(coordinate, config.max_resolve_distance);
    let mut closest: Option<EdgePosition<G::EdgeId>> = None;

    for edge in graph.edges_within_box(bbox)? {
        if !graph.get_edge_factor(edge)?.is_traversable() {
            continue;
        }

        let geometry = graph.get_directed_edge_coordinates(DirectedEdge::forward(edge))?;
        let Some(projection) = project_on_polyline(&geometry, coordinate) else {
            continue;
        };

        if projection.distance > config.max_resolve_distance
            || closest.is_some_and(|c| projection.distance >= c.projection.distance)
        {
            continue;
        }

        let edge_length = graph.get_edge_length(edge)?;
        closest = Some(EdgePosition {
            edge,
            projection,
            distance_along: edge_length * projection.ratio(),
            edge_length,
        });
    }

    debug!("Resolved {coordinate:?} to {closest:?}");

    closest.ok_or(EncodeError::LocationNotResolved {
        coordinate,
        max_distance: config.max_resolve_distance,
    })
}

/// Lines covering less than this between their offsets are not built.
const MIN_COVERED_LENGTH: Length = Length::from_meters(0.01);

/// Builds the line that goes from the first to the second coordinate.
///
/// Both coordinates are resolved on their closest edges; the line starts at the vertex behind the
/// first position and ends at the vertex past the second position, the distances between these
/// vertices and the positions become the line offsets.
///
/// When both coordinates resolve to the same point of the network there is no line to build and
/// [`EncodeError::RouteNotFound`] is returned.
pub fn build_line_between<G: DirectedGraph>(
    config: &EncoderConfig,
    graph: &G,
    start: Coordinate,
    end: Coordinate,
) -> Result<ReferencedLine<G::VertexId, G::EdgeId>, EncodeError<G::EdgeId, G::Error>> {
    info!("Building line {start:?} -> {end:?}");

    let first = resolve_coordinate(config, graph, start)?;
    let last = resolve_coordinate(config, graph, end)?;

    if first.edge == last.edge
        && (first.distance_along.meters() - last.distance_along.meters()).abs()
            < MIN_COVERED_LENGTH.meters()
    {
        debug!("Line {start:?} -> {end:?} resolves to a single point");
        return Err(EncodeError::RouteNotFound);
    }

    let mut best: Option<(Length, LinePath<G::VertexId, G::EdgeId>)> = None;

    for first_edge in directed_edges(graph, first.edge)? {
        for last_edge in directed_edges(graph, last.edge)? {
            let Some(path) = route_between(graph, &first, first_edge, &last, last_edge)? else {
                continue;
            };

            let covered = path.length - path.pos_offset - path.neg_offset;
            if best.as_ref().is_none_or(|(length, _)| covered < *length) {
                best = Some((covered, path));
            }
        }
    }

    let Some((covered, path)) = best else {
        return Err(EncodeError::RouteNotFound);
    };

    if covered < MIN_COVERED_LENGTH {
        debug!("Line {start:?} -> {end:?} covers {covered}");
        return Err(EncodeError::RouteNotFound);
    }

    let offsets = Offsets::from_lengths(path.pos_offset, path.neg_offset, path.length);
    build_line(graph, path.vertices, path.edges, offsets)
}

#[derive(Debug)]
struct LinePath<VertexId, EdgeId> {
    vertices: Vec<VertexId>,
    edges: Vec<DirectedEdge<EdgeId>>,
    length: Length,
    pos_offset: Length,
    neg_offset: Length,
}

/// Gets the orientations the edge can be travelled in.
fn directed_edges<G: DirectedGraph>(
    graph: &G,
    edge: G::EdgeId,
) -> Result<Vec<DirectedEdge<G::EdgeId>>, G::Error> {
    let mut edges = vec![];
    for edge in [DirectedEdge::forward(edge), DirectedEdge::backward(edge)] {
        if graph.can_traverse(edge)? {
            edges.push(edge);
        }
    }
    Ok(edges)
}

/// Routes from the first position travelled along the first edge to the last position travelled
/// along the last edge.
///
/// If both positions lie on the same directed edge with the last one behind the first one, the
/// route leaves the edge and loops back to its start to enter it again.
fn route_between<G: DirectedGraph>(
    graph: &G,
    first: &EdgePosition<G::EdgeId>,
    first_edge: DirectedEdge<G::EdgeId>,
    last: &EdgePosition<G::EdgeId>,
    last_edge: DirectedEdge<G::EdgeId>,
) -> Result<Option<LinePath<G::VertexId, G::EdgeId>>, G::Error> {
    let pos_offset = first.offset(first_edge);
    let (first_start, first_end) = graph.get_directed_edge_vertices(first_edge)?;

    if first_edge == last_edge {
        let end_offset = last.offset(last_edge);
        if end_offset > pos_offset {
            return Ok(Some(LinePath {
                vertices: vec![first_start, first_end],
                edges: vec![first_edge],
                length: first.edge_length,
                pos_offset,
                neg_offset: first.edge_length - end_offset,
            }));
        } else if pos_offset - end_offset < MIN_COVERED_LENGTH {
            return Ok(None);
        }
    }

    let (last_start, last_end) = graph.get_directed_edge_vertices(last_edge)?;
    let config = ShortestPathConfig::default();
    let Some(path) = shortest_path(&config, graph, first_end, last_start)? else {
        return Ok(None);
    };

    let mut vertices = vec![first_start];
    vertices.extend(path.vertices);
    vertices.push(last_end);

    let mut edges = vec![first_edge];
    edges.extend(path.edges);
    edges.push(last_edge);

    Ok(Some(LinePath {
        vertices,
        edges,
        length: first.edge_length + path.length + last.edge_length,
        pos_offset,
        neg_offset: last.edge_length - last.offset(last_edge),
    }))
}

/// Builds the point along line location of the coordinate.
///
/// The coordinate is resolved on its closest edge, which is travelled in a direction it allows.
/// The point is located on the edge by the positive offset, its side of road derives from the
/// side of the projection with respect to the direction of travel.
pub fn build_point_along_line<G: DirectedGraph>(
    config: &EncoderConfig,
    graph: &G,
    coordinate: Coordinate,
) -> Result<ReferencedPointAlongLine<G::VertexId, G::EdgeId>, EncodeError<G::EdgeId, G::Error>> {
    info!("Building point along line {coordinate:?}");

    let position = resolve_coordinate(config, graph, coordinate)?;
    let edge = directed_edges(graph, position.edge)?
        .into_iter()
        .next()
        .ok_or(EncodeError::LocationNotResolved {
            coordinate,
            max_distance: config.max_resolve_distance,
        })?;

    let (start, end) = graph.get_directed_edge_vertices(edge)?;

    // the point must lie before the end of the line
    const MAX_PERCENTAGE: f64 = 99.99;
    let percentage = position.offset(edge).ratio_of(position.edge_length) * 100.0;
    let offsets = Offsets {
        pos: Offset::from_percentage(percentage.clamp(0.0, MAX_PERCENTAGE)),
        neg: Offset::ZERO,
    };

    let side = match (position.projection.side, edge.forward) {
        (Side::On, _) => SideOfRoad::OnRoadOrUnknown,
        (Side::Left, true) | (Side::Right, false) => SideOfRoad::Left,
        (Side::Right, true) | (Side::Left, false) => SideOfRoad::Right,
    };

    Ok(ReferencedPointAlongLine {
        line: build_line(graph, vec![start, end], vec![edge], offsets)?,
        coordinate,
        orientation: Orientation::Unknown,
        side,
    })
}
