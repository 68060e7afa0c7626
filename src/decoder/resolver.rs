use std::cmp::Reverse;

use tracing::{debug, trace};

use crate::decoder::candidates::CandidateVertexEdge;
use crate::{
    DecodeError, DecoderConfig, DirectedGraph, Length, LocationError, Offsets, Path, Point,
    ReferencedLine, Score, ShortestPathConfig, shortest_path_with_fallback,
};

/// Path between two consecutive LRPs, starting with the edge of the first candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Route<VertexId, EdgeId> {
    pub path: Path<VertexId, EdgeId>,
    pub start: CandidateVertexEdge<VertexId, EdgeId>,
    pub end: CandidateVertexEdge<VertexId, EdgeId>,
    pub score: Score,
}

/// The decoder needs to compute a shortest-path between each pair of subsequent location reference
/// points. For each pair of location reference points suitable candidates must be chosen. The
/// candidate edge of the first LRP of this pair acts as start of the shortest-path calculation.
/// The candidate vertex of the second LRP of this pair is the end of the shortest-path calculation
/// (for the last LRP its candidate edge is also part of the route).
///
/// The shortest path takes into account the part of the network which contains all the edges
/// having a functional road class lower than or equal to the lowest functional road class of the
/// first LRP of the pair (plus a variance), and that is not much longer than the distance to the
/// next point. When no such path exists the search is repeated without bounds.
///
/// The best `max_number_retries + 1` pairs of candidates are tried and the route with the best
/// score wins. If the chosen start differs from the end of the previous route, the previous route
/// is re-calculated to end there.
pub fn resolve_routes<G: DirectedGraph>(
    config: &DecoderConfig,
    graph: &G,
    points: &[Point],
    candidates: &[Vec<CandidateVertexEdge<G::VertexId, G::EdgeId>>],
) -> Result<Vec<Route<G::VertexId, G::EdgeId>>, DecodeError<G::Error>> {
    debug!("Resolving routes for {} LRPs", points.len());

    let pairs = points.len().min(candidates.len()).saturating_sub(1);
    let mut routes: Vec<Route<G::VertexId, G::EdgeId>> = Vec::with_capacity(pairs);

    for index in 0..pairs {
        let lrps = (points[index], points[index + 1]);
        let is_last = index + 1 == pairs;

        let route = best_route(
            config,
            graph,
            &lrps.0,
            &candidates[index],
            &candidates[index + 1],
            is_last,
        )?
        .ok_or(DecodeError::RouteNotFound(lrps))?;

        if let Some(previous) = routes.last_mut()
            && previous.path.destination() != Some(route.start.vertex)
        {
            debug!("Recomputing previous route to {:?}", route.start.vertex);
            let previous_lrps = (points[index - 1], points[index]);
            *previous = compute_route(
                config,
                graph,
                &previous_lrps.0,
                previous.start,
                route.start,
                false,
            )?
            .ok_or(DecodeError::RouteNotFound(previous_lrps))?;
        }

        routes.push(route);
    }

    Ok(routes)
}

/// Tries the best pairs of candidates and returns the route with the highest positive score.
fn best_route<G: DirectedGraph>(
    config: &DecoderConfig,
    graph: &G,
    lrp: &Point,
    starts: &[CandidateVertexEdge<G::VertexId, G::EdgeId>],
    ends: &[CandidateVertexEdge<G::VertexId, G::EdgeId>],
    is_last: bool,
) -> Result<Option<Route<G::VertexId, G::EdgeId>>, G::Error> {
    let mut pairs: Vec<_> = starts
        .iter()
        .flat_map(|&start| ends.iter().map(move |&end| (start, end)))
        .collect();
    pairs.sort_by_key(|(start, end)| Reverse(start.score * end.score));

    let mut best: Option<Route<G::VertexId, G::EdgeId>> = None;

    for (start, end) in pairs.into_iter().take(config.max_number_retries + 1) {
        let Some(route) = compute_route(config, graph, lrp, start, end, is_last)? else {
            trace!("No route from {start:?} to {end:?}");
            continue;
        };

        trace!("Route {:?} with score {:?}", route.path.edges, route.score);
        if route.score.is_positive() && best.as_ref().is_none_or(|b| route.score > b.score) {
            best = Some(route);
        }
    }

    Ok(best)
}

/// Computes the route from the start candidate to the end candidate:
/// - `[start.edge] + shortest_path(start.target -> end.vertex)` towards an intermediate LRP.
/// - `[start.edge] + shortest_path(start.target -> end.target) + [end.edge reversed]` towards the
///   last LRP, or just `[start.edge]` if both candidates share the same edge.
fn compute_route<G: DirectedGraph>(
    config: &DecoderConfig,
    graph: &G,
    lrp: &Point,
    start: CandidateVertexEdge<G::VertexId, G::EdgeId>,
    end: CandidateVertexEdge<G::VertexId, G::EdgeId>,
    is_last: bool,
) -> Result<Option<Route<G::VertexId, G::EdgeId>>, G::Error> {
    let router = ShortestPathConfig {
        lowest_frc: lrp.lfrcnp().with_variance(config.frc_variance),
        max_length: lrp.dnp() + config.next_point_variance,
        max_settles: config.max_settles,
    };

    let mut vertices = vec![start.vertex];
    let mut edges = vec![start.edge];

    if is_last && start.edge == end.edge.reversed() {
        vertices.push(start.target);
    } else {
        let destination = if is_last { end.target } else { end.vertex };
        let Some(path) = shortest_path_with_fallback(&router, graph, start.target, destination)?
        else {
            return Ok(None);
        };

        vertices.extend(path.vertices);
        edges.extend(path.edges);

        if is_last {
            vertices.push(end.vertex);
            edges.push(end.edge.reversed());
        }
    }

    let mut length = Length::ZERO;
    let mut weight = 0.0;
    for edge in &edges {
        length += graph.get_edge_length(edge.id)?;
        weight += graph.get_edge_weight(edge.id)?.unwrap_or_default();
    }

    let deviation = (length - lrp.dnp()).meters().abs() / config.next_point_variance.meters();
    let score = start.score * end.score * Score::from(1.0 / (1.0 + deviation));

    Ok(Some(Route {
        path: Path {
            vertices,
            edges,
            length,
            weight,
        },
        start,
        end,
        score,
    }))
}

/// Concatenates the routes into a line carrying the given offsets, sanitized to be valid.
pub fn build_line_from_routes<VertexId, EdgeId>(
    routes: Vec<Route<VertexId, EdgeId>>,
    offsets: Offsets,
) -> Result<ReferencedLine<VertexId, EdgeId>, LocationError>
where
    VertexId: Copy + PartialEq,
    EdgeId: Copy,
{
    let mut vertices = vec![];
    let mut edges = vec![];

    for route in routes {
        let skip = if vertices.is_empty() { 0 } else { 1 };
        vertices.extend(route.path.vertices.into_iter().skip(skip));
        edges.extend(route.path.edges);
    }

    ReferencedLine::new(vertices, edges, offsets.sanitized())
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::graph::tests::{EdgeId, EdgeProperties, NetworkBuilder, NetworkGraph, VertexId};
    use crate::{Bearing, Coordinate, DirectedEdge, Fow, Frc, LineAttributes, PathAttributes};

    /// 1 ==== 2 ==== 3 ==== 4      6 ==== 7
    fn network() -> NetworkGraph {
        let mut network = NetworkBuilder::default();
        for i in 1..=4 {
            network.vertex(i, 0.001 * (i - 1) as f64, 0.0);
        }
        network.vertex(6, 0.0, 0.01);
        network.vertex(7, 0.001, 0.01);

        for i in 1..=3 {
            network.edge(i, EdgeProperties::new(VertexId(i), VertexId(i + 1)).length(100.0));
        }
        network.edge(6, EdgeProperties::new(VertexId(6), VertexId(7)).length(100.0));
        network.build()
    }

    fn lrp(lon: f64, dnp: Option<f64>) -> Point {
        Point {
            coordinate: Coordinate { lon, lat: 0.0 },
            line: LineAttributes {
                frc: Frc::Frc4,
                fow: Fow::SingleCarriageway,
                bearing: Bearing::from_degrees(90),
            },
            path: dnp.map(|dnp| PathAttributes {
                lfrcnp: Frc::Frc4,
                dnp: Length::from_meters(dnp),
            }),
        }
    }

    fn candidate(
        vertex: u64,
        edge: DirectedEdge<EdgeId>,
        target: u64,
        score: f64,
    ) -> CandidateVertexEdge<VertexId, EdgeId> {
        CandidateVertexEdge {
            vertex: VertexId(vertex),
            edge,
            target: VertexId(target),
            score: Score::from(score),
        }
    }

    #[test]
    fn decoder_resolve_routes_001() {
        let graph = network();
        let config = DecoderConfig::default();

        let points = [lrp(0.0, Some(300.0)), lrp(0.003, None)];
        let candidates = [
            vec![candidate(1, DirectedEdge::forward(EdgeId(1)), 2, 1.0)],
            vec![candidate(4, DirectedEdge::backward(EdgeId(3)), 3, 1.0)],
        ];

        let routes = resolve_routes(&config, &graph, &points, &candidates).unwrap();

        assert_eq!(routes.len(), 1);
        assert_eq!(
            routes[0].path.vertices,
            [VertexId(1), VertexId(2), VertexId(3), VertexId(4)]
        );
        assert_eq!(
            routes[0].path.edges,
            [
                DirectedEdge::forward(EdgeId(1)),
                DirectedEdge::forward(EdgeId(2)),
                DirectedEdge::forward(EdgeId(3))
            ]
        );
        assert_eq!(routes[0].path.length, Length::from_meters(300.0));
        assert_eq!(routes[0].score, Score::ONE);

        let line = build_line_from_routes(routes, Offsets::default()).unwrap();
        assert_eq!(line.edges().len(), 3);
    }

    #[test]
    fn decoder_resolve_routes_002() {
        let graph = network();
        let config = DecoderConfig::default();

        // both candidates on the same edge
        let points = [lrp(0.002, Some(100.0)), lrp(0.003, None)];
        let candidates = [
            vec![candidate(3, DirectedEdge::forward(EdgeId(3)), 4, 1.0)],
            vec![candidate(4, DirectedEdge::backward(EdgeId(3)), 3, 1.0)],
        ];

        let routes = resolve_routes(&config, &graph, &points, &candidates).unwrap();
        assert_eq!(routes[0].path.vertices, [VertexId(3), VertexId(4)]);
        assert_eq!(routes[0].path.edges, [DirectedEdge::forward(EdgeId(3))]);

        // the end is not reachable
        let points = [lrp(0.0, Some(100.0)), lrp(0.001, None)];
        let candidates = [
            vec![candidate(1, DirectedEdge::forward(EdgeId(1)), 2, 1.0)],
            vec![candidate(7, DirectedEdge::backward(EdgeId(6)), 6, 1.0)],
        ];
        assert_eq!(
            resolve_routes(&config, &graph, &points, &candidates),
            Err(DecodeError::RouteNotFound((points[0], points[1])))
        );
    }

    #[test]
    fn decoder_resolve_routes_003() {
        let graph = network();
        let config = DecoderConfig::default();

        let points = [
            lrp(0.0, Some(200.0)),
            lrp(0.002, Some(200.0)),
            lrp(0.003, None),
        ];
        let intermediate = vec![
            candidate(2, DirectedEdge::forward(EdgeId(2)), 3, 0.9),
            candidate(3, DirectedEdge::forward(EdgeId(3)), 4, 0.8),
        ];
        let candidates = [
            vec![candidate(1, DirectedEdge::forward(EdgeId(1)), 2, 1.0)],
            intermediate,
            vec![candidate(4, DirectedEdge::backward(EdgeId(3)), 3, 1.0)],
        ];

        let routes = resolve_routes(&config, &graph, &points, &candidates).unwrap();

        // the second route starts on 2, the first one is recomputed to end there
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].path.vertices, [VertexId(1), VertexId(2)]);
        assert_eq!(
            routes[1].path.vertices,
            [VertexId(2), VertexId(3), VertexId(4)]
        );

        let line = build_line_from_routes(routes, Offsets::default()).unwrap();
        assert_eq!(
            line.vertices(),
            [VertexId(1), VertexId(2), VertexId(3), VertexId(4)]
        );
        assert!(line.is_connected(&graph).unwrap());
    }
}
