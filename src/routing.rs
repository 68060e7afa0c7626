use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::{DirectedEdge, DirectedGraph, Frc, Length};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShortestPathConfig {
    /// Edges of a less important road class than this are not explored.
    pub lowest_frc: Frc,
    /// Paths longer than this are not explored.
    pub max_length: Length,
    /// Maximum number of vertices settled before giving up.
    pub max_settles: usize,
}

impl Default for ShortestPathConfig {
    fn default() -> Self {
        Self {
            lowest_frc: Frc::Frc7,
            max_length: Length::MAX,
            max_settles: 100_000,
        }
    }
}

impl ShortestPathConfig {
    /// Unbounded version of this configuration, only the settle cap is kept.
    pub fn aggressive(&self) -> Self {
        Self {
            max_settles: self.max_settles,
            ..Self::default()
        }
    }
}

/// Sequence of vertices connected by directed edges, `edges[i]` goes from `vertices[i]` to
/// `vertices[i + 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Path<VertexId, EdgeId> {
    pub vertices: Vec<VertexId>,
    pub edges: Vec<DirectedEdge<EdgeId>>,
    pub length: Length,
    /// Sum of the edge weights (length divided by factor).
    pub weight: f64,
}

impl<VertexId: Copy, EdgeId: Copy> Path<VertexId, EdgeId> {
    pub fn empty(vertex: VertexId) -> Self {
        Self {
            vertices: vec![vertex],
            edges: vec![],
            length: Length::ZERO,
            weight: 0.0,
        }
    }

    pub fn origin(&self) -> Option<VertexId> {
        self.vertices.first().copied()
    }

    pub fn destination(&self) -> Option<VertexId> {
        self.vertices.last().copied()
    }

    /// Returns the same path travelled from its destination back to its origin.
    pub fn reversed(&self) -> Self {
        Self {
            vertices: self.vertices.iter().rev().copied().collect(),
            edges: self.edges.iter().rev().map(|e| e.reversed()).collect(),
            length: self.length,
            weight: self.weight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HeapElement<VertexId> {
    /// Current smallest weight from origin to this vertex.
    pub weight: OrderedFloat<f64>,
    pub vertex: VertexId,
}

// The priority queue depends on the implementation of the Ord trait.
// By default std::BinaryHeap is a max heap.
// Explicitly implement the trait so the queue becomes a min heap.
impl<VertexId: Ord> Ord for HeapElement<VertexId> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .weight
            .cmp(&self.weight)
            // breaking ties in a deterministic way
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

impl<VertexId: Ord> PartialOrd for HeapElement<VertexId> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Best known way to reach a vertex.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Label<VertexId, EdgeId> {
    pub weight: f64,
    pub length: Length,
    /// Edge (and its start vertex) the vertex is reached through, None for the origin.
    pub previous: Option<(DirectedEdge<EdgeId>, VertexId)>,
}

/// Unpacks the path from the destination back to the origin.
pub(crate) fn unpack_path<VertexId, EdgeId>(
    labels: &FxHashMap<VertexId, Label<VertexId, EdgeId>>,
    destination: VertexId,
) -> Path<VertexId, EdgeId>
where
    VertexId: Copy + Eq + std::hash::Hash,
    EdgeId: Copy,
{
    let mut vertices = vec![destination];
    let mut edges = vec![];
    let mut next = destination;

    while let Some(&(edge, previous)) = labels.get(&next).and_then(|label| label.previous.as_ref())
    {
        edges.push(edge);
        vertices.push(previous);
        next = previous;
    }

    vertices.reverse();
    edges.reverse();

    let (weight, length) = labels
        .get(&destination)
        .map_or((0.0, Length::ZERO), |label| (label.weight, label.length));

    Path {
        vertices,
        edges,
        length,
        weight,
    }
}

/// Computes the path of minimum weight from origin to destination following the allowed travel
/// direction of the edges. Returns None if the destination cannot be reached within the bounds of
/// the configuration.
pub fn shortest_path<G: DirectedGraph>(
    config: &ShortestPathConfig,
    graph: &G,
    origin: G::VertexId,
    destination: G::VertexId,
) -> Result<Option<Path<G::VertexId, G::EdgeId>>, G::Error> {
    debug!("Computing shortest path {origin:?} -> {destination:?} with {config:?}");

    let mut labels: FxHashMap<G::VertexId, Label<G::VertexId, G::EdgeId>> = FxHashMap::default();
    labels.insert(
        origin,
        Label {
            weight: 0.0,
            length: Length::ZERO,
            previous: None,
        },
    );

    let mut settled = FxHashSet::default();

    // priority queue of discovered vertices that may need to be visited
    let mut frontier = BinaryHeap::from([HeapElement {
        weight: OrderedFloat(0.0),
        vertex: origin,
    }]);

    while let Some(element) = frontier.pop() {
        if element.vertex == destination {
            return Ok(Some(unpack_path(&labels, destination)));
        } else if !settled.insert(element.vertex) {
            continue;
        } else if settled.len() > config.max_settles {
            debug!("Shortest path exceeded {} settles", config.max_settles);
            return Ok(None);
        }

        let Some(&label) = labels.get(&element.vertex) else {
            continue;
        };

        for (edge, vertex_to) in graph.vertex_directed_edges(element.vertex)? {
            if settled.contains(&vertex_to) || !graph.can_traverse(edge)? {
                continue;
            }

            let frc = graph
                .get_edge_road_class(edge.id)?
                .map_or(Frc::Frc7, |(frc, _)| frc);
            if frc > config.lowest_frc {
                continue;
            }

            let Some(edge_weight) = graph.get_edge_weight(edge.id)? else {
                continue;
            };

            let length = label.length + graph.get_edge_length(edge.id)?;
            if length > config.max_length {
                continue;
            }

            let weight = label.weight + edge_weight;
            let is_better = labels
                .get(&vertex_to)
                .is_none_or(|known| weight < known.weight);

            // check if we can follow the current path to reach the neighbor in a cheaper way
            if is_better {
                trace!("Relax {vertex_to:?} through {edge:?} with weight {weight}");
                labels.insert(
                    vertex_to,
                    Label {
                        weight,
                        length,
                        previous: Some((edge, element.vertex)),
                    },
                );
                frontier.push(HeapElement {
                    weight: OrderedFloat(weight),
                    vertex: vertex_to,
                });
            }
        }
    }

    Ok(None)
}

/// Computes the shortest path within the bounds of the configuration and, if none exists, repeats
/// the search without road class and length bounds.
pub fn shortest_path_with_fallback<G: DirectedGraph>(
    config: &ShortestPathConfig,
    graph: &G,
    origin: G::VertexId,
    destination: G::VertexId,
) -> Result<Option<Path<G::VertexId, G::EdgeId>>, G::Error> {
    if let Some(path) = shortest_path(config, graph, origin, destination)? {
        return Ok(Some(path));
    }

    let aggressive = config.aggressive();
    if aggressive == *config {
        return Ok(None);
    }

    debug!("Retrying shortest path {origin:?} -> {destination:?} without bounds");
    shortest_path(&aggressive, graph, origin, destination)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::graph::tests::{EdgeProperties, NetworkBuilder, NetworkGraph, VertexId};
    use crate::Fow;

    ///      3
    ///    /   \
    ///   1 --- 2 --> 4
    ///
    /// 1-2 is the main road, 1-3-2 a detour, 2-4 one-way.
    fn network() -> NetworkGraph {
        let mut network = NetworkBuilder::default();
        let v1 = network.vertex(1, 0.0, 0.0);
        let v2 = network.vertex(2, 0.002, 0.0);
        let v3 = network.vertex(3, 0.001, 0.001);
        let v4 = network.vertex(4, 0.003, 0.0);
        network.edge(
            1,
            EdgeProperties::new(v1, v2)
                .length(300.0)
                .road_class(Frc::Frc5, Fow::SingleCarriageway),
        );
        network.edge(2, EdgeProperties::new(v1, v3).length(100.0));
        network.edge(3, EdgeProperties::new(v3, v2).length(100.0));
        network.edge(4, EdgeProperties::new(v2, v4).length(100.0).oneway());
        network.build()
    }

    #[test]
    fn routing_shortest_path_001() {
        let graph = network();
        let config = ShortestPathConfig::default();

        let path = shortest_path(&config, &graph, VertexId(1), VertexId(4))
            .unwrap()
            .unwrap();

        assert_eq!(path.vertices, [VertexId(1), VertexId(3), VertexId(2), VertexId(4)]);
        assert_eq!(path.length, Length::from_meters(300.0));
        assert_eq!(path.weight, 300.0);
        assert!(path.edges.iter().all(|e| e.forward));

        // one-way edge cannot be travelled backward
        assert_eq!(
            shortest_path(&config, &graph, VertexId(4), VertexId(1)).unwrap(),
            None
        );
    }

    #[test]
    fn routing_shortest_path_002() {
        let graph = network();

        let config = ShortestPathConfig {
            lowest_frc: Frc::Frc4,
            ..Default::default()
        };
        let path = shortest_path(&config, &graph, VertexId(2), VertexId(1))
            .unwrap()
            .unwrap();
        assert_eq!(path.vertices, [VertexId(2), VertexId(3), VertexId(1)]);
        assert!(path.edges.iter().all(|e| !e.forward));

        let config = ShortestPathConfig {
            max_length: Length::from_meters(150.0),
            ..Default::default()
        };
        assert_eq!(
            shortest_path(&config, &graph, VertexId(1), VertexId(2)).unwrap(),
            None
        );

        let path = shortest_path_with_fallback(&config, &graph, VertexId(1), VertexId(2))
            .unwrap()
            .unwrap();
        assert_eq!(path.length, Length::from_meters(200.0));
    }

    #[test]
    fn routing_shortest_path_003() {
        let graph = network();
        let config = ShortestPathConfig::default();

        let path = shortest_path(&config, &graph, VertexId(3), VertexId(3))
            .unwrap()
            .unwrap();
        assert_eq!(path, Path::empty(VertexId(3)));

        let config = ShortestPathConfig {
            max_settles: 1,
            ..Default::default()
        };
        assert_eq!(
            shortest_path(&config, &graph, VertexId(1), VertexId(4)).unwrap(),
            None
        );

        assert!(shortest_path(&config, &graph, VertexId(9), VertexId(4)).is_err());
    }

    #[test]
    fn routing_path_reversed() {
        let graph = network();
        let path = shortest_path(&ShortestPathConfig::default(), &graph, VertexId(1), VertexId(2))
            .unwrap()
            .unwrap();

        let reversed = path.reversed();
        assert_eq!(reversed.vertices, [VertexId(2), VertexId(3), VertexId(1)]);
        assert_eq!(reversed.edges[0], DirectedEdge::backward(crate::graph::tests::EdgeId(3)));
        assert_eq!(reversed.reversed(), path);
    }
}
