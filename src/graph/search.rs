use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::graph::validity::is_vertex_valid;
use crate::routing::{HeapElement, Label, unpack_path};
use crate::{DirectedGraph, Length, Path};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchConfig {
    /// Distance along the edges used to compute bearings when checking vertex validity.
    pub bearing_distance: Length,
    /// Maximum number of vertices settled before the search gives up.
    pub max_settles: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            bearing_distance: Length::from_meters(20.0),
            max_settles: 1000,
        }
    }
}

/// Searches the closest valid vertex (in terms of edge weight) reachable from the given vertex
/// without passing through the target vertex, the edge to the target and any excluded vertex.
///
/// When searching forward the edges are followed in their allowed travel direction, when searching
/// backward they are followed against it (that is the returned path can be travelled from its
/// destination back to the origin).
///
/// Returns the path from the vertex to the first valid vertex in search order, or None if the
/// search space is exhausted or the number of settled vertices exceeds the configured maximum.
pub fn find_valid_vertex<G: DirectedGraph>(
    config: &SearchConfig,
    graph: &G,
    vertex: G::VertexId,
    edge_to_target: G::EdgeId,
    target_vertex: G::VertexId,
    exclude: &FxHashSet<G::VertexId>,
    search_forward: bool,
) -> Result<Option<Path<G::VertexId, G::EdgeId>>, G::Error> {
    debug!("Searching valid vertex from {vertex:?} (forward: {search_forward})");

    let mut labels: FxHashMap<G::VertexId, Label<G::VertexId, G::EdgeId>> = FxHashMap::default();
    labels.insert(
        vertex,
        Label {
            weight: 0.0,
            length: Length::ZERO,
            previous: None,
        },
    );

    // the target is never entered
    let mut settled = FxHashSet::from_iter([target_vertex]);
    let mut settles = 0;

    let mut frontier = BinaryHeap::from([HeapElement {
        weight: OrderedFloat(0.0),
        vertex,
    }]);

    while let Some(element) = frontier.pop() {
        if !settled.insert(element.vertex) {
            continue;
        }

        settles += 1;
        if settles > config.max_settles {
            debug!("Valid vertex search exceeded {} settles", config.max_settles);
            return Ok(None);
        }

        if element.vertex != vertex
            && is_vertex_valid(graph, element.vertex, config.bearing_distance)?
        {
            let path = unpack_path(&labels, element.vertex);
            debug!("Found valid vertex {:?} at {}", element.vertex, path.length);
            return Ok(Some(path));
        }

        let Some(&label) = labels.get(&element.vertex) else {
            continue;
        };

        for (edge, vertex_to) in graph.vertex_directed_edges(element.vertex)? {
            if edge.id == edge_to_target
                || settled.contains(&vertex_to)
                || exclude.contains(&vertex_to)
            {
                continue;
            }

            let travelled = if search_forward { edge } else { edge.reversed() };
            if !graph.can_traverse(travelled)? {
                continue;
            }

            let Some(edge_weight) = graph.get_edge_weight(edge.id)? else {
                continue;
            };

            let weight = label.weight + edge_weight;
            let is_better = labels
                .get(&vertex_to)
                .is_none_or(|known| weight < known.weight);

            if is_better {
                trace!("Relax {vertex_to:?} through {edge:?} with weight {weight}");
                let length = label.length + graph.get_edge_length(edge.id)?;
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
