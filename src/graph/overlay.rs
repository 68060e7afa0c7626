use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::geometry::PolylineProjection;
use crate::{
    BoundingBox, Coordinate, DirectedEdge, DirectedGraph, Factor, Fow, Frc, Length, OverlayError,
};

/// Vertex of a [`NetworkOverlay`]: either a vertex of the underlying network or a virtual vertex
/// created by splitting an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OverlayVertex<VertexId> {
    Network(VertexId),
    Virtual(usize),
}

/// Edge of a [`NetworkOverlay`]: either an edge of the underlying network or one of the virtual
/// halves of a split edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OverlayEdge<EdgeId> {
    Network(EdgeId),
    Virtual(usize),
}

#[derive(Debug, Clone)]
struct VirtualEdge<VertexId, EdgeId> {
    /// Network edge this edge is (part of), it provides factor and road class.
    parent: EdgeId,
    vertices: (OverlayVertex<VertexId>, OverlayVertex<VertexId>),
    length: Length,
    shape: Vec<Coordinate>,
}

/// Copy-on-write view of a road network where edges can be split at arbitrary points.
///
/// Splitting an edge hides it and adds a virtual vertex together with two virtual edges that
/// inherit factor and road class of the split edge. The underlying network is never modified;
/// every decoding attempt owns its overlay and [`NetworkOverlay::reset`] drops all the virtual
/// elements.
pub struct NetworkOverlay<'a, G: DirectedGraph> {
    graph: &'a G,
    vertices: Vec<Coordinate>,
    edges: Vec<VirtualEdge<G::VertexId, G::EdgeId>>,
    /// Virtual edges connected to each vertex.
    adjacency: FxHashMap<OverlayVertex<G::VertexId>, Vec<OverlayEdge<G::EdgeId>>>,
    /// Edges replaced by their virtual halves.
    hidden: FxHashSet<OverlayEdge<G::EdgeId>>,
}

impl<'a, G: DirectedGraph> NetworkOverlay<'a, G> {
    pub fn new(graph: &'a G) -> Self {
        Self {
            graph,
            vertices: vec![],
            edges: vec![],
            adjacency: FxHashMap::default(),
            hidden: FxHashSet::default(),
        }
    }

    pub const fn graph(&self) -> &'a G {
        self.graph
    }

    /// Removes all the virtual vertices and edges.
    pub fn reset(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.adjacency.clear();
        self.hidden.clear();
    }

    pub fn virtual_vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_hidden(&self, edge: OverlayEdge<G::EdgeId>) -> bool {
        self.hidden.contains(&edge)
    }

    fn virtual_edge(
        &self,
        index: usize,
    ) -> Result<&VirtualEdge<G::VertexId, G::EdgeId>, OverlayError<G::Error>> {
        self.edges
            .get(index)
            .ok_or(OverlayError::EdgeNotFound(index))
    }

    /// Gets the network edge the overlay edge derives from.
    pub fn parent_edge(
        &self,
        edge: OverlayEdge<G::EdgeId>,
    ) -> Result<G::EdgeId, OverlayError<G::Error>> {
        match edge {
            OverlayEdge::Network(e) => Ok(e),
            OverlayEdge::Virtual(i) => Ok(self.virtual_edge(i)?.parent),
        }
    }

    /// Splits the edge at the projected point, returning the vertex at the projected point.
    ///
    /// The projection must be computed on the geometry of the edge in its stored orientation.
    /// Projections falling on the edge start or end return the existing vertex without splitting.
    pub fn split_edge(
        &mut self,
        edge: OverlayEdge<G::EdgeId>,
        projection: &PolylineProjection,
    ) -> Result<OverlayVertex<G::VertexId>, OverlayError<G::Error>> {
        let (start, end) = self.get_edge_vertices(edge)?;
        let ratio = projection.ratio();

        if ratio <= 0.0 {
            return Ok(start);
        } else if ratio >= 1.0 {
            return Ok(end);
        }

        let parent = self.parent_edge(edge)?;
        let length = self.get_edge_length(edge)?;
        let geometry = self.get_directed_edge_coordinates(DirectedEdge::forward(edge))?;
        let split = projection.coordinate;

        let segment = projection.segment.min(geometry.len().saturating_sub(2));
        let first_shape: Vec<_> = geometry[1..=segment]
            .iter()
            .copied()
            .filter(|&c| c != split)
            .collect();
        let second_shape: Vec<_> = geometry[segment + 1..geometry.len() - 1]
            .iter()
            .copied()
            .filter(|&c| c != split)
            .collect();

        let vertex = OverlayVertex::Virtual(self.vertices.len());
        self.vertices.push(split);

        let first_length = length * ratio;
        let halves = [
            VirtualEdge {
                parent,
                vertices: (start, vertex),
                length: first_length,
                shape: first_shape,
            },
            VirtualEdge {
                parent,
                vertices: (vertex, end),
                length: length - first_length,
                shape: second_shape,
            },
        ];

        for half in halves {
            let id = OverlayEdge::Virtual(self.edges.len());
            let (a, b) = half.vertices;
            self.adjacency.entry(a).or_default().push(id);
            self.adjacency.entry(b).or_default().push(id);
            self.edges.push(half);
        }

        self.hidden.insert(edge);
        debug!("Split {edge:?} at {split:?} into {vertex:?}");

        Ok(vertex)
    }
}

impl<G: DirectedGraph> DirectedGraph for NetworkOverlay<'_, G> {
    type VertexId = OverlayVertex<G::VertexId>;
    type EdgeId = OverlayEdge<G::EdgeId>;
    type Error = OverlayError<G::Error>;

    fn get_vertex_coordinate(&self, vertex: Self::VertexId) -> Result<Coordinate, Self::Error> {
        match vertex {
            OverlayVertex::Network(v) => Ok(self.graph.get_vertex_coordinate(v)?),
            OverlayVertex::Virtual(i) => self
                .vertices
                .get(i)
                .copied()
                .ok_or(OverlayError::VertexNotFound(i)),
        }
    }

    fn get_edge_vertices(
        &self,
        edge: Self::EdgeId,
    ) -> Result<(Self::VertexId, Self::VertexId), Self::Error> {
        match edge {
            OverlayEdge::Network(e) => {
                let (start, end) = self.graph.get_edge_vertices(e)?;
                Ok((OverlayVertex::Network(start), OverlayVertex::Network(end)))
            }
            OverlayEdge::Virtual(i) => Ok(self.virtual_edge(i)?.vertices),
        }
    }

    fn get_edge_length(&self, edge: Self::EdgeId) -> Result<Length, Self::Error> {
        match edge {
            OverlayEdge::Network(e) => Ok(self.graph.get_edge_length(e)?),
            OverlayEdge::Virtual(i) => Ok(self.virtual_edge(i)?.length),
        }
    }

    fn get_edge_shape(
        &self,
        edge: Self::EdgeId,
    ) -> Result<impl Iterator<Item = Coordinate>, Self::Error> {
        let shape: Vec<Coordinate> = match edge {
            OverlayEdge::Network(e) => self.graph.get_edge_shape(e)?.collect(),
            OverlayEdge::Virtual(i) => self.virtual_edge(i)?.shape.clone(),
        };
        Ok(shape.into_iter())
    }

    fn get_edge_factor(&self, edge: Self::EdgeId) -> Result<Factor, Self::Error> {
        Ok(self.graph.get_edge_factor(self.parent_edge(edge)?)?)
    }

    fn get_edge_road_class(&self, edge: Self::EdgeId) -> Result<Option<(Frc, Fow)>, Self::Error> {
        Ok(self.graph.get_edge_road_class(self.parent_edge(edge)?)?)
    }

    fn vertex_edges(
        &self,
        vertex: Self::VertexId,
    ) -> Result<impl Iterator<Item = Self::EdgeId>, Self::Error> {
        let mut edges: Vec<Self::EdgeId> = match vertex {
            OverlayVertex::Network(v) => self
                .graph
                .vertex_edges(v)?
                .map(OverlayEdge::Network)
                .collect(),
            OverlayVertex::Virtual(i) if i < self.vertices.len() => vec![],
            OverlayVertex::Virtual(i) => return Err(OverlayError::VertexNotFound(i)),
        };

        if let Some(virtual_edges) = self.adjacency.get(&vertex) {
            edges.extend(virtual_edges);
        }

        edges.retain(|e| !self.hidden.contains(e));
        Ok(edges.into_iter())
    }

    fn edges_within_box(
        &self,
        bbox: BoundingBox,
    ) -> Result<impl Iterator<Item = Self::EdgeId>, Self::Error> {
        let mut edges: Vec<Self::EdgeId> = self
            .graph
            .edges_within_box(bbox)?
            .map(OverlayEdge::Network)
            .collect();

        for index in 0..self.edges.len() {
            let edge = OverlayEdge::Virtual(index);
            let coordinates = self.get_directed_edge_coordinates(DirectedEdge::forward(edge))?;
            if BoundingBox::from_coordinates(coordinates).is_some_and(|b| b.intersects(&bbox)) {
                edges.push(edge);
            }
        }

        edges.retain(|e| !self.hidden.contains(e));
        Ok(edges.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use test_log::test;

    use super::*;
    use crate::geometry::project_on_polyline;
    use crate::graph::tests::{EdgeId, EdgeProperties, NetworkBuilder, NetworkGraph, VertexId};

    /// 1 ---- 2 ---- 3 with a shape point in the middle of 1-2
    fn network() -> NetworkGraph {
        let mut network = NetworkBuilder::default();
        let v1 = network.vertex(1, 0.0, 0.0);
        let v2 = network.vertex(2, 0.002, 0.0);
        let v3 = network.vertex(3, 0.003, 0.0);
        network.edge(
            1,
            EdgeProperties::new(v1, v2)
                .length(200.0)
                .oneway()
                .shape(vec![Coordinate { lon: 0.001, lat: 0.0 }]),
        );
        network.edge(2, EdgeProperties::new(v2, v3).length(100.0));
        network.build()
    }

    fn project<G: DirectedGraph>(graph: &G, edge: G::EdgeId, lon: f64) -> PolylineProjection {
        let geometry = graph
            .get_directed_edge_coordinates(DirectedEdge::forward(edge))
            .unwrap();
        project_on_polyline(&geometry, Coordinate { lon, lat: 0.0001 }).unwrap()
    }

    #[test]
    fn overlay_split_edge_001() {
        let graph = network();
        let mut overlay = NetworkOverlay::new(&graph);
        let edge = OverlayEdge::Network(EdgeId(1));

        let projection = project(&overlay, edge, 0.0015);
        let vertex = overlay.split_edge(edge, &projection).unwrap();
        assert_eq!(vertex, OverlayVertex::Virtual(0));
        assert_eq!(
            overlay.get_vertex_coordinate(vertex).unwrap(),
            Coordinate {
                lon: 0.0015,
                lat: 0.0
            }
        );

        let v1 = OverlayVertex::Network(VertexId(1));
        let v2 = OverlayVertex::Network(VertexId(2));
        assert!(overlay.is_hidden(edge));
        assert_eq!(
            overlay.vertex_edges(v1).unwrap().collect::<Vec<_>>(),
            [OverlayEdge::Virtual(0)]
        );
        assert_eq!(
            overlay.vertex_edges(v2).unwrap().collect::<Vec<_>>(),
            [OverlayEdge::Network(EdgeId(2)), OverlayEdge::Virtual(1)]
        );
        assert_eq!(
            overlay.vertex_edges(vertex).unwrap().collect::<Vec<_>>(),
            [OverlayEdge::Virtual(0), OverlayEdge::Virtual(1)]
        );

        let first = OverlayEdge::Virtual(0);
        let second = OverlayEdge::Virtual(1);
        assert_eq!(overlay.get_edge_vertices(first).unwrap(), (v1, vertex));
        assert_eq!(overlay.get_edge_vertices(second).unwrap(), (vertex, v2));
        assert_relative_eq!(overlay.get_edge_length(first).unwrap().meters(), 150.0, epsilon = 0.1);
        assert_relative_eq!(overlay.get_edge_length(second).unwrap().meters(), 50.0, epsilon = 0.1);
        assert_eq!(overlay.get_edge_shape(first).unwrap().count(), 1);
        assert_eq!(overlay.get_edge_shape(second).unwrap().count(), 0);
        assert_eq!(
            overlay.get_edge_factor(first).unwrap(),
            graph.get_edge_factor(EdgeId(1)).unwrap()
        );
        assert_eq!(overlay.parent_edge(second), Ok(EdgeId(1)));

        let center = Coordinate {
            lon: 0.0015,
            lat: 0.0,
        };
        let bbox = BoundingBox::around(center, Length::from_meters(5.0));
        assert_eq!(
            overlay.edges_within_box(bbox).unwrap().collect::<Vec<_>>(),
            [OverlayEdge::Virtual(0), OverlayEdge::Virtual(1)]
        );

        overlay.reset();
        assert_eq!(overlay.virtual_vertex_count(), 0);
        assert!(!overlay.is_hidden(edge));
        assert_eq!(
            overlay.get_vertex_coordinate(vertex),
            Err(OverlayError::VertexNotFound(0))
        );
        assert_eq!(
            overlay.vertex_edges(v1).unwrap().collect::<Vec<_>>(),
            [OverlayEdge::Network(EdgeId(1))]
        );
    }

    #[test]
    fn overlay_split_edge_002() {
        let graph = network();
        let mut overlay = NetworkOverlay::new(&graph);
        let edge = OverlayEdge::Network(EdgeId(2));

        // projections on the edge ends do not split
        let projection = project(&overlay, edge, 0.0019);
        assert_eq!(
            overlay.split_edge(edge, &projection).unwrap(),
            OverlayVertex::Network(VertexId(2))
        );
        let projection = project(&overlay, edge, 0.0031);
        assert_eq!(
            overlay.split_edge(edge, &projection).unwrap(),
            OverlayVertex::Network(VertexId(3))
        );
        assert_eq!(overlay.virtual_vertex_count(), 0);

        // virtual edges can be split again
        let projection = project(&overlay, edge, 0.0025);
        let middle = overlay.split_edge(edge, &projection).unwrap();
        let second = OverlayEdge::Virtual(1);
        let projection = project(&overlay, second, 0.00275);
        let quarter = overlay.split_edge(second, &projection).unwrap();

        assert_eq!(quarter, OverlayVertex::Virtual(1));
        assert!(overlay.is_hidden(second));
        assert_eq!(
            overlay.vertex_edges(middle).unwrap().collect::<Vec<_>>(),
            [OverlayEdge::Virtual(0), OverlayEdge::Virtual(2)]
        );
        assert_relative_eq!(
            overlay.get_edge_length(OverlayEdge::Virtual(3)).unwrap().meters(),
            25.0,
            epsilon = 0.1
        );
        assert_eq!(overlay.parent_edge(OverlayEdge::Virtual(3)), Ok(EdgeId(2)));
    }
}
