use tracing::{debug, warn};

use crate::geometry::{encode_bearing, polyline_length};
use crate::{
    Coordinate, DirectedGraph, EncodeError, EncoderConfig, Fow, Frc, Length,
    LineAttributes, PathAttributes, Point, ReferencedLine, ShortestPathConfig, shortest_path,
};

/// Builds the LRPs of the line: the first LRP on the start vertex, intermediate LRPs wherever the
/// shortest path between two LRPs wouldn't follow the line (or the LRPs would be too far apart),
/// and the last LRP on the end vertex.
pub fn build_line_lrps<G: DirectedGraph>(
    config: &EncoderConfig,
    graph: &G,
    line: &ReferencedLine<G::VertexId, G::EdgeId>,
) -> Result<Vec<Point>, EncodeError<G::EdgeId, G::Error>> {
    let mut points = vec![];
    let mut current = 0;

    while current < line.edges().len() {
        let next = next_lrp_index(config, graph, line, current)?;
        points.push(point_from_vertex(config, graph, line, current, next)?);
        current = next;
    }

    points.push(last_point(config, graph, line)?);

    debug!("Built {} LRPs", points.len());
    Ok(points)
}

/// Builds the two LRPs of a point along line: the first LRP covers the whole line.
pub fn build_point_along_line_lrps<G: DirectedGraph>(
    config: &EncoderConfig,
    graph: &G,
    line: &ReferencedLine<G::VertexId, G::EdgeId>,
) -> Result<[Point; 2], EncodeError<G::EdgeId, G::Error>> {
    let first = point_from_vertex(config, graph, line, 0, line.edges().len())?;
    let last = last_point(config, graph, line)?;
    Ok([first, last])
}

/// Finds the line vertex (after the current one) where the next LRP has to be placed.
fn next_lrp_index<G: DirectedGraph>(
    config: &EncoderConfig,
    graph: &G,
    line: &ReferencedLine<G::VertexId, G::EdgeId>,
    current: usize,
) -> Result<usize, G::Error> {
    let vertices = line.vertices();
    let edges = line.edges();
    let router = ShortestPathConfig::default();
    let mut distance = Length::ZERO;

    for next in current + 1..=edges.len() {
        distance += graph.get_edge_length(edges[next - 1].id)?;

        let follows_line = distance <= config.max_lrp_distance
            && shortest_path(&router, graph, vertices[current], vertices[next])?
                .is_some_and(|path| path.edges.as_slice() == &edges[current..next]);

        if !follows_line {
            if next - 1 > current {
                debug!("Intermediate LRP on {:?}", vertices[next - 1]);
                return Ok(next - 1);
            }

            // a single edge that is not its own shortest path, or is too long
            warn!("Edge {:?} cannot be covered by a shortest path", edges[current]);
            return Ok(next);
        }
    }

    Ok(edges.len())
}

/// Builds the LRP on the line vertex at `index` that leads to the LRP on the vertex at `next`.
fn point_from_vertex<G: DirectedGraph>(
    config: &EncoderConfig,
    graph: &G,
    line: &ReferencedLine<G::VertexId, G::EdgeId>,
    index: usize,
    next: usize,
) -> Result<Point, EncodeError<G::EdgeId, G::Error>> {
    let (frc, fow) = road_class(graph, line, index)?;

    let mut dnp = Length::ZERO;
    let mut lfrcnp = frc;
    for edge_index in index..next {
        dnp += graph.get_edge_length(line.edges()[edge_index].id)?;
        lfrcnp = lfrcnp.max(road_class(graph, line, edge_index)?.0);
    }

    let shapes = bearing_shapes(config, graph, line, index..line.edges().len())?;
    let polyline = concat(shapes);

    Ok(Point {
        coordinate: graph.get_vertex_coordinate(line.vertices()[index])?,
        line: LineAttributes {
            frc,
            fow,
            bearing: encode_bearing(&polyline, config.bearing_distance, false),
        },
        path: Some(PathAttributes {
            lfrcnp,
            dnp: dnp.round(),
        }),
    })
}

/// Builds the last LRP on the end vertex, its bearing looks backward along the line.
fn last_point<G: DirectedGraph>(
    config: &EncoderConfig,
    graph: &G,
    line: &ReferencedLine<G::VertexId, G::EdgeId>,
) -> Result<Point, EncodeError<G::EdgeId, G::Error>> {
    let last = line.edges().len() - 1;
    let (frc, fow) = road_class(graph, line, last)?;

    let mut shapes = bearing_shapes(config, graph, line, (0..=last).rev())?;
    shapes.reverse();
    let polyline = concat(shapes);

    Ok(Point {
        coordinate: graph.get_vertex_coordinate(line.end_vertex())?,
        line: LineAttributes {
            frc,
            fow,
            bearing: encode_bearing(&polyline, config.bearing_distance, true),
        },
        path: None,
    })
}

fn road_class<G: DirectedGraph>(
    graph: &G,
    line: &ReferencedLine<G::VertexId, G::EdgeId>,
    index: usize,
) -> Result<(Frc, Fow), EncodeError<G::EdgeId, G::Error>> {
    let edge = line.edges()[index].id;
    graph
        .get_edge_road_class(edge)?
        .ok_or(EncodeError::AttributesNotFound(edge))
}

/// Collects the shapes of the edges (in the given order) until they are long enough to compute
/// a bearing.
fn bearing_shapes<G: DirectedGraph>(
    config: &EncoderConfig,
    graph: &G,
    line: &ReferencedLine<G::VertexId, G::EdgeId>,
    indices: impl Iterator<Item = usize>,
) -> Result<Vec<Vec<Coordinate>>, G::Error> {
    let mut shapes = vec![];
    let mut length = Length::ZERO;

    for index in indices {
        let shape = line.edge_coordinates(graph, index)?;
        length += polyline_length(&shape);
        shapes.push(shape);

        if length >= config.bearing_distance {
            break;
        }
    }

    Ok(shapes)
}

fn concat(shapes: Vec<Vec<Coordinate>>) -> Vec<Coordinate> {
    let mut polyline: Vec<Coordinate> = vec![];
    for coordinate in shapes.into_iter().flatten() {
        if polyline.last() != Some(&coordinate) {
            polyline.push(coordinate);
        }
    }
    polyline
}
