use std::fmt::Debug;
use std::hash::Hash;

use crate::{BoundingBox, Coordinate, Fow, Frc, Length};

/// Directed graph.
/// Exposes the behavior of a Geospatial Index and of a Road Network Graph.
/// Should be implemented by the graph the represents the map the decoder and encoder run on.
///
/// Edges are stored once with an orientation (from the first to the second vertex returned by
/// [`DirectedGraph::get_edge_vertices`]); they can be traversed in either orientation depending
/// on their [`Factor`].
pub trait DirectedGraph {
    /// Uniquely identify a vertex that belongs to the graph.
    type VertexId: Debug + Copy + Ord + Hash;
    /// Uniquely identify an edge that belongs to the graph.
    type EdgeId: Debug + Copy + Ord + Hash;
    /// Failure of the graph storage, for example a vertex that doesn't belong to the graph.
    type Error: Debug;

    /// Gets the vertex coordinate.
    fn get_vertex_coordinate(&self, vertex: Self::VertexId) -> Result<Coordinate, Self::Error>;

    /// Gets the start and the end vertex of the edge in its stored orientation.
    fn get_edge_vertices(
        &self,
        edge: Self::EdgeId,
    ) -> Result<(Self::VertexId, Self::VertexId), Self::Error>;

    /// Gets the total length of the edge.
    fn get_edge_length(&self, edge: Self::EdgeId) -> Result<Length, Self::Error>;

    /// Gets the intermediate shape points of the edge in its stored orientation, excluding the
    /// coordinates of the start and the end vertex.
    fn get_edge_shape(
        &self,
        edge: Self::EdgeId,
    ) -> Result<impl Iterator<Item = Coordinate>, Self::Error>;

    /// Gets the traversal factor and the allowed travel direction of the edge.
    fn get_edge_factor(&self, edge: Self::EdgeId) -> Result<Factor, Self::Error>;

    /// Gets the Functional Road Class (FRC) and the Form of Way (FOW) of the edge.
    /// Returns None if the road class cannot be derived from the edge attributes.
    fn get_edge_road_class(&self, edge: Self::EdgeId) -> Result<Option<(Frc, Fow)>, Self::Error>;

    /// Gets an iterator over all the edges (entering and exiting) connected to the vertex.
    fn vertex_edges(
        &self,
        vertex: Self::VertexId,
    ) -> Result<impl Iterator<Item = Self::EdgeId>, Self::Error>;

    /// Gets an iterator over all the edges whose geometry intersects the bounding box.
    fn edges_within_box(
        &self,
        bbox: BoundingBox,
    ) -> Result<impl Iterator<Item = Self::EdgeId>, Self::Error>;

    /// Gets the cost of traversing the edge, that is its length divided by its factor.
    /// Returns None if the edge is not traversable.
    fn get_edge_weight(&self, edge: Self::EdgeId) -> Result<Option<f64>, Self::Error> {
        let factor = self.get_edge_factor(edge)?;
        if !factor.is_traversable() {
            return Ok(None);
        }
        let length = self.get_edge_length(edge)?;
        Ok(Some(length.meters() / factor.value))
    }

    /// Gets the start and the end vertex of the edge when traversed in the given orientation.
    fn get_directed_edge_vertices(
        &self,
        edge: DirectedEdge<Self::EdgeId>,
    ) -> Result<(Self::VertexId, Self::VertexId), Self::Error> {
        let (start, end) = self.get_edge_vertices(edge.id)?;
        Ok(if edge.forward {
            (start, end)
        } else {
            (end, start)
        })
    }

    /// Gets the full geometry of the edge (start vertex, shape points, end vertex) in the
    /// direction of traversal.
    fn get_directed_edge_coordinates(
        &self,
        edge: DirectedEdge<Self::EdgeId>,
    ) -> Result<Vec<Coordinate>, Self::Error> {
        let (start, end) = self.get_edge_vertices(edge.id)?;

        let mut coordinates = vec![self.get_vertex_coordinate(start)?];
        coordinates.extend(self.get_edge_shape(edge.id)?);
        coordinates.push(self.get_vertex_coordinate(end)?);

        if !edge.forward {
            coordinates.reverse();
        }
        Ok(coordinates)
    }

    /// Gets all the edges connected to the vertex oriented away from it, together with the
    /// vertex on the other side of each edge. Loops are returned in both orientations.
    fn vertex_directed_edges(
        &self,
        vertex: Self::VertexId,
    ) -> Result<Vec<(DirectedEdge<Self::EdgeId>, Self::VertexId)>, Self::Error> {
        let mut edges = vec![];
        for edge in self.vertex_edges(vertex)? {
            let (start, end) = self.get_edge_vertices(edge)?;
            if start == vertex {
                edges.push((DirectedEdge::forward(edge), end));
            }
            if end == vertex {
                edges.push((DirectedEdge::backward(edge), start));
            }
        }
        Ok(edges)
    }

    /// Returns true if the edge can be traversed in the orientation of the directed edge.
    fn can_traverse(&self, edge: DirectedEdge<Self::EdgeId>) -> Result<bool, Self::Error> {
        Ok(self.get_edge_factor(edge.id)?.allows(edge.forward))
    }
}

/// Edge of a graph together with the orientation it is traversed in.
/// The orientation is forward when the edge is traversed from its start vertex to its end vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DirectedEdge<EdgeId> {
    pub id: EdgeId,
    pub forward: bool,
}

impl<EdgeId> DirectedEdge<EdgeId> {
    pub const fn forward(id: EdgeId) -> Self {
        Self { id, forward: true }
    }

    pub const fn backward(id: EdgeId) -> Self {
        Self { id, forward: false }
    }

    pub fn reversed(self) -> Self {
        Self {
            id: self.id,
            forward: !self.forward,
        }
    }
}

/// Directions an edge can be travelled, relative to its stored orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display)]
pub enum TravelDirection {
    #[default]
    Both,
    Forward,
    Backward,
}

/// Traversal factor of an edge as derived by the vehicle profile of the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Factor {
    /// Speed-like multiplier, zero if the edge cannot be travelled at all.
    pub value: f64,
    pub direction: TravelDirection,
}

impl Default for Factor {
    fn default() -> Self {
        Self {
            value: 1.0,
            direction: TravelDirection::Both,
        }
    }
}

impl Factor {
    pub const fn new(value: f64, direction: TravelDirection) -> Self {
        Self { value, direction }
    }

    pub fn is_traversable(&self) -> bool {
        self.value > 0.0
    }

    /// Returns true if the edge can only be travelled in one direction.
    pub fn is_oneway(&self) -> bool {
        self.direction != TravelDirection::Both
    }

    /// Returns true if the edge can be travelled forward (true) or backward (false).
    pub fn allows(&self, forward: bool) -> bool {
        self.is_traversable()
            && match self.direction {
                TravelDirection::Both => true,
                TravelDirection::Forward => forward,
                TravelDirection::Backward => !forward,
            }
    }
}

pub mod overlay;
pub mod search;
pub mod validity;
