use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::graph::validity::is_vertex_valid;
use crate::{
    DirectedGraph, EncodeError, EncoderConfig, Length, Offsets, Path, ReferencedLine,
    ShortestPathConfig, find_valid_vertex, shortest_path,
};

/// Adjusts the start and the end of the line so that they are valid vertices.
///
/// Data format rules recommends to place location reference points on valid vertices.
/// Valid vertices are such vertices where a shortest-path calculation needs to decide between
/// several different ways. Invalid vertices, on the contrary, are such vertices where a shortest
/// path calculation can step over.
///
/// Since the start and end of a location will become a location reference point these vertices
/// need to be adjusted to valid vertices if necessary (expansion of location). The real start and
/// end of the location are then referenced using offsets (positive offset for the start vertex
/// and negative offset for the end vertex, respectively).
///
/// An expansion is only accepted if the shortest path from the new end to the line still follows
/// the line, otherwise the next closest valid vertex is tried. Ends that cannot be expanded are
/// left as they are. Adjusting an already adjusted line doesn't change it.
pub fn adjust_to_valid_points<G: DirectedGraph>(
    config: &EncoderConfig,
    graph: &G,
    line: &mut ReferencedLine<G::VertexId, G::EdgeId>,
) -> Result<(), EncodeError<G::EdgeId, G::Error>> {
    let (pos_offset, neg_offset) = line.offset_lengths(graph)?;

    let prefix = if is_vertex_valid(graph, line.start_vertex(), config.bearing_distance)? {
        None
    } else {
        expand_start(config, graph, line)?
    };

    let postfix = if is_vertex_valid(graph, line.end_vertex(), config.bearing_distance)? {
        None
    } else {
        expand_end(config, graph, line)?
    };

    if prefix.is_none() && postfix.is_none() {
        return Ok(());
    }

    let mut vertices = vec![];
    let mut edges = vec![];
    let mut pos_offset = pos_offset;
    let mut neg_offset = neg_offset;

    if let Some(prefix) = prefix {
        debug!("Expanding line start by {:?}", prefix.vertices);
        let last = prefix.vertices.len() - 1;
        vertices.extend_from_slice(&prefix.vertices[..last]);
        edges.extend(prefix.edges);
        pos_offset += prefix.length;
    }

    vertices.extend_from_slice(line.vertices());
    edges.extend_from_slice(line.edges());

    if let Some(postfix) = postfix {
        debug!("Expanding line end by {:?}", postfix.vertices);
        vertices.extend_from_slice(&postfix.vertices[1..]);
        edges.extend(postfix.edges);
        neg_offset += postfix.length;
    }

    let length = edges
        .iter()
        .map(|edge| graph.get_edge_length(edge.id))
        .sum::<Result<Length, _>>()?;
    let offsets = Offsets::from_lengths(pos_offset, neg_offset, length);

    let shapes = if line.shapes().is_some() {
        let shapes = edges
            .iter()
            .map(|&edge| graph.get_directed_edge_coordinates(edge))
            .collect::<Result<Vec<_>, _>>()?;
        Some(shapes)
    } else {
        None
    };

    line.replace(vertices, edges, shapes, offsets)
        .map_err(EncodeError::InvalidLocation)
}

/// Searches backward from the line start the closest valid vertex, the returned path goes from
/// the valid vertex to the line start.
fn expand_start<G: DirectedGraph>(
    config: &EncoderConfig,
    graph: &G,
    line: &ReferencedLine<G::VertexId, G::EdgeId>,
) -> Result<Option<Path<G::VertexId, G::EdgeId>>, G::Error> {
    let search = config.search_config();
    let start = line.start_vertex();
    let first_edge = line.first_edge();
    let mut exclude: FxHashSet<_> = line.vertices().iter().copied().collect();

    for _ in 0..config.max_expansion_attempts {
        let found = find_valid_vertex(
            &search,
            graph,
            start,
            first_edge.id,
            line.vertices()[1],
            &exclude,
            false,
        )?;

        let Some(path) = found.map(|path| path.reversed()) else {
            break;
        };

        let Some(candidate) = path.origin() else {
            break;
        };

        // the LRP on the new start must still reach the line through its first edge
        let route = shortest_path(
            &ShortestPathConfig::default(),
            graph,
            candidate,
            line.vertices()[1],
        )?;

        if route.is_some_and(|route| route.edges.contains(&first_edge)) {
            return Ok(Some(path));
        }

        debug!("Rejected start expansion to {candidate:?}");
        exclude.insert(candidate);
    }

    warn!("Cannot expand line start {start:?} to a valid vertex");
    Ok(None)
}

/// Searches forward from the line end the closest valid vertex, the returned path goes from the
/// line end to the valid vertex.
fn expand_end<G: DirectedGraph>(
    config: &EncoderConfig,
    graph: &G,
    line: &ReferencedLine<G::VertexId, G::EdgeId>,
) -> Result<Option<Path<G::VertexId, G::EdgeId>>, G::Error> {
    let search = config.search_config();
    let end = line.end_vertex();
    let last_edge = line.last_edge();
    let before_end = line.vertices()[line.vertices().len() - 2];
    let mut exclude: FxHashSet<_> = line.vertices().iter().copied().collect();

    for _ in 0..config.max_expansion_attempts {
        let found =
            find_valid_vertex(&search, graph, end, last_edge.id, before_end, &exclude, true)?;

        let Some(path) = found else {
            break;
        };

        let Some(candidate) = path.destination() else {
            break;
        };

        // the LRP before the new end must still follow the line through its last edge
        let route = shortest_path(&ShortestPathConfig::default(), graph, before_end, candidate)?;

        if route.is_some_and(|route| route.edges.contains(&last_edge)) {
            return Ok(Some(path));
        }

        debug!("Rejected end expansion to {candidate:?}");
        exclude.insert(candidate);
    }

    warn!("Cannot expand line end {end:?} to a valid vertex");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use test_log::test;

    use super::*;
    use crate::encoder::builder::build_line;
    use crate::graph::tests::{EdgeId, EdgeProperties, NetworkBuilder, NetworkGraph, VertexId};
    use crate::{DirectedEdge, Offset};

    ///          7                 8
    ///          |                 |
    /// 1 ====== 2 ==== 3 ==== 4 ==== 5 ==== 6
    ///          |                 |
    ///          9                 10
    ///
    /// 2 and 5 are junctions, 3 and 4 shape points (100m edges).
    fn network() -> NetworkGraph {
        let mut network = NetworkBuilder::default();
        for (i, lon) in [(1, 0.0), (2, 0.001), (3, 0.002), (4, 0.003), (5, 0.004), (6, 0.005)] {
            network.vertex(i, lon, 0.0);
        }
        network.vertex(7, 0.001, 0.001);
        network.vertex(8, 0.004, 0.001);
        network.vertex(9, 0.001, -0.001);
        network.vertex(10, 0.004, -0.001);

        for i in 1..=5 {
            network.edge(i, EdgeProperties::new(VertexId(i), VertexId(i + 1)).length(100.0));
        }
        network.edge(6, EdgeProperties::new(VertexId(2), VertexId(7)).length(100.0));
        network.edge(7, EdgeProperties::new(VertexId(5), VertexId(8)).length(100.0));
        network.edge(8, EdgeProperties::new(VertexId(2), VertexId(9)).length(100.0));
        network.edge(9, EdgeProperties::new(VertexId(5), VertexId(10)).length(100.0));
        network.build()
    }

    fn offsets(pos: f64, neg: f64) -> Offsets {
        Offsets {
            pos: Offset::from_percentage(pos),
            neg: Offset::from_percentage(neg),
        }
    }

    #[test]
    fn encoder_adjust_to_valid_points_001() {
        let graph = network();
        let config = EncoderConfig::default();

        // 3 -> 4 with 10% (10m) positive offset
        let mut line = build_line(
            &graph,
            vec![VertexId(3), VertexId(4)],
            vec![DirectedEdge::forward(EdgeId(3))],
            offsets(10.0, 0.0),
        )
        .unwrap();

        adjust_to_valid_points(&config, &graph, &mut line).unwrap();

        assert_eq!(
            line.vertices(),
            [VertexId(2), VertexId(3), VertexId(4), VertexId(5)]
        );
        assert_eq!(
            line.edges(),
            [
                DirectedEdge::forward(EdgeId(2)),
                DirectedEdge::forward(EdgeId(3)),
                DirectedEdge::forward(EdgeId(4))
            ]
        );
        assert_eq!(line.shapes().map(|s| s.len()), Some(3));

        let (pos, neg) = line.offset_lengths(&graph).unwrap();
        assert_relative_eq!(pos.meters(), 110.0, epsilon = 1e-6);
        assert_relative_eq!(neg.meters(), 100.0, epsilon = 1e-6);
    }

    #[test]
    fn encoder_adjust_to_valid_points_002() {
        let graph = network();
        let config = EncoderConfig::default();

        // backward 4 -> 3
        let mut line = build_line(
            &graph,
            vec![VertexId(4), VertexId(3)],
            vec![DirectedEdge::backward(EdgeId(3))],
            offsets(0.0, 0.0),
        )
        .unwrap();

        adjust_to_valid_points(&config, &graph, &mut line).unwrap();
        assert_eq!(
            line.vertices(),
            [VertexId(5), VertexId(4), VertexId(3), VertexId(2)]
        );
        assert!(line.edges().iter().all(|e| !e.forward));

        let adjusted = line.clone();
        adjust_to_valid_points(&config, &graph, &mut line).unwrap();
        assert_eq!(line, adjusted);
    }

    #[test]
    fn encoder_adjust_to_valid_points_003() {
        let graph = network();
        let config = EncoderConfig::default();

        // already valid ends are not changed
        let mut line = build_line(
            &graph,
            vec![VertexId(2), VertexId(3), VertexId(4), VertexId(5)],
            vec![
                DirectedEdge::forward(EdgeId(2)),
                DirectedEdge::forward(EdgeId(3)),
                DirectedEdge::forward(EdgeId(4)),
            ],
            offsets(5.0, 5.0),
        )
        .unwrap();
        let original = line.clone();

        adjust_to_valid_points(&config, &graph, &mut line).unwrap();
        assert_eq!(line, original);
    }

    #[test]
    fn encoder_adjust_to_valid_points_004() {
        // one-way loop: the only valid vertex behind the start is reached through the line end
        //
        //  1 --> 2 --> 3 --> 4
        //  ^                 |
        //  +-------- 5 <-----+
        //            |
        //            6
        let mut network = NetworkBuilder::default();
        let v1 = network.vertex(1, 0.0, 0.0);
        let v2 = network.vertex(2, 0.001, 0.0);
        let v3 = network.vertex(3, 0.002, 0.0);
        let v4 = network.vertex(4, 0.003, 0.0);
        let v5 = network.vertex(5, 0.0015, -0.001);
        let v6 = network.vertex(6, 0.0015, -0.002);
        network.edge(1, EdgeProperties::new(v1, v2).length(100.0).oneway());
        network.edge(2, EdgeProperties::new(v2, v3).length(100.0).oneway());
        network.edge(3, EdgeProperties::new(v3, v4).length(100.0).oneway());
        network.edge(4, EdgeProperties::new(v4, v5).length(150.0).oneway());
        network.edge(5, EdgeProperties::new(v5, v1).length(150.0).oneway());
        network.edge(6, EdgeProperties::new(v5, v6).length(100.0));
        let graph = network.build();
        let config = EncoderConfig::default();

        let mut line = build_line(
            &graph,
            vec![v2, v3],
            vec![DirectedEdge::forward(EdgeId(2))],
            offsets(0.0, 0.0),
        )
        .unwrap();

        adjust_to_valid_points(&config, &graph, &mut line).unwrap();

        // the start reaches 5 backward (2 <- 1 <- 5), the end reaches 5 forward (3 -> 4 -> 5)
        assert_eq!(line.start_vertex(), v5);
        assert_eq!(line.end_vertex(), v5);
        assert_eq!(line.length(&graph).unwrap(), Length::from_meters(600.0));
        let (pos, neg) = line.offset_lengths(&graph).unwrap();
        assert_relative_eq!(pos.meters(), 250.0, epsilon = 1e-6);
        assert_relative_eq!(neg.meters(), 250.0, epsilon = 1e-6);
    }

    /// Merge of one-way carriageways at 2 (invalid), with a shortcut from 1 to 3.
    ///
    ///  5 ==== 1 ----> 2 ==== 4
    ///         ||     /
    ///  6 ==== 3 <---+
    ///
    /// 1 -> 2 and 2 -> 3 are 100m, 2 - 4 is 200m, the shortcut 1 - 3 is 50m.
    fn shortcut_network() -> NetworkGraph {
        let mut network = NetworkBuilder::default();
        let v1 = network.vertex(1, -0.001, 0.0001);
        let v2 = network.vertex(2, 0.0, 0.0);
        let v3 = network.vertex(3, -0.001, -0.0001);
        let v4 = network.vertex(4, 0.001, 0.0);
        let v5 = network.vertex(5, -0.002, 0.0001);
        let v6 = network.vertex(6, -0.002, -0.0001);
        network.edge(1, EdgeProperties::new(v1, v2).length(100.0).oneway());
        network.edge(2, EdgeProperties::new(v2, v3).length(100.0).oneway());
        network.edge(3, EdgeProperties::new(v2, v4).length(200.0));
        network.edge(4, EdgeProperties::new(v1, v3).length(50.0));
        network.edge(5, EdgeProperties::new(v1, v5).length(100.0));
        network.edge(6, EdgeProperties::new(v3, v6).length(100.0));
        network.build()
    }

    #[test]
    fn encoder_adjust_to_valid_points_005() {
        let graph = shortcut_network();
        let config = EncoderConfig::default();
        assert!(!is_vertex_valid(&graph, VertexId(2), config.bearing_distance).unwrap());

        let mut line = build_line(
            &graph,
            vec![VertexId(1), VertexId(2)],
            vec![DirectedEdge::forward(EdgeId(1))],
            offsets(0.0, 0.0),
        )
        .unwrap();

        adjust_to_valid_points(&config, &graph, &mut line).unwrap();

        // 3 is the closest valid vertex but 1 reaches it through the shortcut
        assert_eq!(line.vertices(), [VertexId(1), VertexId(2), VertexId(4)]);
        assert_eq!(
            line.edges(),
            [
                DirectedEdge::forward(EdgeId(1)),
                DirectedEdge::forward(EdgeId(3))
            ]
        );
        let (pos, neg) = line.offset_lengths(&graph).unwrap();
        assert_relative_eq!(pos.meters(), 0.0);
        assert_relative_eq!(neg.meters(), 200.0, epsilon = 1e-6);
    }

    #[test]
    fn encoder_adjust_to_valid_points_006() {
        let graph = shortcut_network();

        // the only attempt is spent on the rejected vertex 3
        let config = EncoderConfig {
            max_expansion_attempts: 1,
            ..Default::default()
        };

        let mut line = build_line(
            &graph,
            vec![VertexId(1), VertexId(2)],
            vec![DirectedEdge::forward(EdgeId(1))],
            offsets(10.0, 0.0),
        )
        .unwrap();
        let original = line.clone();

        adjust_to_valid_points(&config, &graph, &mut line).unwrap();
        assert_eq!(line, original);
    }

    #[test]
    fn encoder_adjust_to_valid_points_007() {
        // 4 becomes a junction reached from 1 through a second shortcut
        let mut network = NetworkBuilder::default();
        let v1 = network.vertex(1, -0.001, 0.0001);
        let v2 = network.vertex(2, 0.0, 0.0);
        let v3 = network.vertex(3, -0.001, -0.0001);
        let v4 = network.vertex(4, 0.001, 0.0);
        let v5 = network.vertex(5, -0.002, 0.0001);
        let v6 = network.vertex(6, -0.002, -0.0001);
        let v7 = network.vertex(7, 0.002, 0.0);
        network.edge(1, EdgeProperties::new(v1, v2).length(100.0).oneway());
        network.edge(2, EdgeProperties::new(v2, v3).length(100.0).oneway());
        network.edge(3, EdgeProperties::new(v2, v4).length(200.0));
        network.edge(4, EdgeProperties::new(v1, v3).length(50.0));
        network.edge(5, EdgeProperties::new(v1, v5).length(100.0));
        network.edge(6, EdgeProperties::new(v3, v6).length(100.0));
        network.edge(7, EdgeProperties::new(v1, v4).length(50.0));
        network.edge(8, EdgeProperties::new(v4, v7).length(100.0));
        let graph = network.build();
        let config = EncoderConfig::default();

        let mut line = build_line(
            &graph,
            vec![v1, v2],
            vec![DirectedEdge::forward(EdgeId(1))],
            offsets(0.0, 0.0),
        )
        .unwrap();
        let original = line.clone();

        // every valid vertex around 2 is rejected, the line end is kept
        adjust_to_valid_points(&config, &graph, &mut line).unwrap();
        assert_eq!(line, original);
    }
}
