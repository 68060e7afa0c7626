use crate::geometry::position_along_polyline;
use crate::{
    Circle, Coordinate, DirectedEdge, DirectedGraph, Grid, Length, LocationError, LocationType,
    Offsets, Orientation, Polygon, Rectangle, SideOfRoad,
};

/// Defines a location (in a map) that can be encoded using the OpenLR encoder
/// and is also the result of the decoding process.
#[derive(Debug, Clone, PartialEq)]
pub enum Location<VertexId, EdgeId> {
    Line(ReferencedLine<VertexId, EdgeId>),
    PointAlongLine(ReferencedPointAlongLine<VertexId, EdgeId>),
    GeoCoordinate(Coordinate),
    Circle(Circle),
    Rectangle(Rectangle),
    Grid(Grid),
    Polygon(Polygon),
}

impl<VertexId, EdgeId> Location<VertexId, EdgeId> {
    pub const fn location_type(&self) -> LocationType {
        match self {
            Self::Line(_) => LocationType::Line,
            Self::PointAlongLine(_) => LocationType::PointAlongLine,
            Self::GeoCoordinate(_) => LocationType::GeoCoordinate,
            Self::Circle(_) => LocationType::Circle,
            Self::Rectangle(_) => LocationType::Rectangle,
            Self::Grid(_) => LocationType::Grid,
            Self::Polygon(_) => LocationType::Polygon,
        }
    }
}

/// Location (in a map) that represents a Line Location Reference.
///
/// The line is a path of the graph: `edges[i]` connects `vertices[i]` to `vertices[i + 1]`.
/// The location starts at the positive offset from the first vertex and ends at the negative
/// offset from the last vertex, both expressed as percentages of the path length.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencedLine<VertexId, EdgeId> {
    vertices: Vec<VertexId>,
    edges: Vec<DirectedEdge<EdgeId>>,
    /// Geometry of each edge in the direction of travel, when known.
    shapes: Option<Vec<Vec<Coordinate>>>,
    offsets: Offsets,
}

impl<VertexId: Copy + PartialEq, EdgeId: Copy> ReferencedLine<VertexId, EdgeId> {
    pub fn new(
        vertices: Vec<VertexId>,
        edges: Vec<DirectedEdge<EdgeId>>,
        offsets: Offsets,
    ) -> Result<Self, LocationError> {
        ensure_line_is_valid(&vertices, &edges, None, &offsets)?;

        Ok(Self {
            vertices,
            edges,
            shapes: None,
            offsets,
        })
    }

    /// Attaches the geometry of each edge to the line.
    pub fn with_shapes(mut self, shapes: Vec<Vec<Coordinate>>) -> Result<Self, LocationError> {
        ensure_line_is_valid(&self.vertices, &self.edges, Some(&shapes), &self.offsets)?;
        self.shapes = Some(shapes);
        Ok(self)
    }

    pub fn vertices(&self) -> &[VertexId] {
        &self.vertices
    }

    pub fn edges(&self) -> &[DirectedEdge<EdgeId>] {
        &self.edges
    }

    pub fn shapes(&self) -> Option<&[Vec<Coordinate>]> {
        self.shapes.as_deref()
    }

    pub const fn offsets(&self) -> Offsets {
        self.offsets
    }

    pub const fn pos_offset(&self) -> f64 {
        self.offsets.pos.percentage()
    }

    pub const fn neg_offset(&self) -> f64 {
        self.offsets.neg.percentage()
    }

    pub fn start_vertex(&self) -> VertexId {
        self.vertices[0]
    }

    pub fn end_vertex(&self) -> VertexId {
        self.vertices[self.vertices.len() - 1]
    }

    pub fn first_edge(&self) -> DirectedEdge<EdgeId> {
        self.edges[0]
    }

    pub fn last_edge(&self) -> DirectedEdge<EdgeId> {
        self.edges[self.edges.len() - 1]
    }

    /// Replaces the whole line at once, the line is left untouched if the replacement is invalid.
    pub(crate) fn replace(
        &mut self,
        vertices: Vec<VertexId>,
        edges: Vec<DirectedEdge<EdgeId>>,
        shapes: Option<Vec<Vec<Coordinate>>>,
        offsets: Offsets,
    ) -> Result<(), LocationError> {
        ensure_line_is_valid(&vertices, &edges, shapes.as_deref(), &offsets)?;

        self.vertices = vertices;
        self.edges = edges;
        self.shapes = shapes;
        self.offsets = offsets;
        Ok(())
    }

    /// Gets the total length of the line edges (offsets are not subtracted).
    pub fn length<G>(&self, graph: &G) -> Result<Length, G::Error>
    where
        G: DirectedGraph<VertexId = VertexId, EdgeId = EdgeId>,
    {
        self.edges
            .iter()
            .map(|edge| graph.get_edge_length(edge.id))
            .sum()
    }

    /// Gets the positive and negative offsets as distances along the line.
    pub fn offset_lengths<G>(&self, graph: &G) -> Result<(Length, Length), G::Error>
    where
        G: DirectedGraph<VertexId = VertexId, EdgeId = EdgeId>,
    {
        Ok(self.offsets.lengths(self.length(graph)?))
    }

    /// Gets the geometry of the edge at the given index in the direction of travel.
    pub fn edge_coordinates<G>(&self, graph: &G, index: usize) -> Result<Vec<Coordinate>, G::Error>
    where
        G: DirectedGraph<VertexId = VertexId, EdgeId = EdgeId>,
    {
        match self.shapes.as_ref().and_then(|shapes| shapes.get(index)) {
            Some(shape) => Ok(shape.clone()),
            None => graph.get_directed_edge_coordinates(self.edges[index]),
        }
    }

    /// Gets the geometry of the whole line (offsets are not applied).
    pub fn coordinates<G>(&self, graph: &G) -> Result<Vec<Coordinate>, G::Error>
    where
        G: DirectedGraph<VertexId = VertexId, EdgeId = EdgeId>,
    {
        let mut coordinates: Vec<Coordinate> = vec![];
        for index in 0..self.edges.len() {
            for coordinate in self.edge_coordinates(graph, index)? {
                if coordinates.last() != Some(&coordinate) {
                    coordinates.push(coordinate);
                }
            }
        }
        Ok(coordinates)
    }

    /// Gets the coordinate at the given distance from the first vertex following the line edges.
    /// The distance is clamped to the line length.
    pub fn coordinate_at<G>(&self, graph: &G, distance: Length) -> Result<Coordinate, G::Error>
    where
        G: DirectedGraph<VertexId = VertexId, EdgeId = EdgeId>,
    {
        let mut remaining = distance.max(Length::ZERO);
        let last = self.edges.len() - 1;

        for (index, edge) in self.edges.iter().enumerate() {
            let length = graph.get_edge_length(edge.id)?;
            if remaining <= length || index == last {
                let shape = self.edge_coordinates(graph, index)?;
                let ratio = remaining.ratio_of(length);
                if let Some(coordinate) = position_along_polyline(&shape, ratio) {
                    return Ok(coordinate);
                }
            }
            remaining -= length;
        }

        graph.get_vertex_coordinate(self.end_vertex())
    }

    /// Gets the coordinate where the location starts, that is after the positive offset.
    pub fn start_coordinate<G>(&self, graph: &G) -> Result<Coordinate, G::Error>
    where
        G: DirectedGraph<VertexId = VertexId, EdgeId = EdgeId>,
    {
        let (pos_offset, _) = self.offset_lengths(graph)?;
        self.coordinate_at(graph, pos_offset)
    }

    /// Gets the coordinate where the location ends, that is before the negative offset.
    pub fn end_coordinate<G>(&self, graph: &G) -> Result<Coordinate, G::Error>
    where
        G: DirectedGraph<VertexId = VertexId, EdgeId = EdgeId>,
    {
        let length = self.length(graph)?;
        let (_, neg_offset) = self.offsets.lengths(length);
        self.coordinate_at(graph, length - neg_offset)
    }

    /// Returns true if every edge of the line connects its two vertices in the direction of
    /// travel.
    pub fn is_connected<G>(&self, graph: &G) -> Result<bool, G::Error>
    where
        G: DirectedGraph<VertexId = VertexId, EdgeId = EdgeId>,
    {
        for (edge, vertices) in self.edges.iter().zip(self.vertices.windows(2)) {
            let (start, end) = graph.get_directed_edge_vertices(*edge)?;
            if start != vertices[0] || end != vertices[1] {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Location (in a map) that represents a Point along Line Location Reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencedPointAlongLine<VertexId, EdgeId> {
    /// Line the point lies on, the point is at the positive offset of the line.
    pub line: ReferencedLine<VertexId, EdgeId>,
    pub coordinate: Coordinate,
    pub orientation: Orientation,
    pub side: SideOfRoad,
}

/// Returns an error if the line is not valid.
///
/// A line is valid if the following constraints are fulfilled:
/// - The line has at least one edge and exactly one vertex more than edges.
/// - If shapes are given, there is exactly one shape for each edge.
/// - The offsets are within `[0, 100)` and their sum is lower than 100.
fn ensure_line_is_valid<VertexId, EdgeId>(
    vertices: &[VertexId],
    edges: &[DirectedEdge<EdgeId>],
    shapes: Option<&[Vec<Coordinate>]>,
    offsets: &Offsets,
) -> Result<(), LocationError> {
    if edges.is_empty() {
        return Err(LocationError::Empty);
    } else if vertices.len() != edges.len() + 1 {
        return Err(LocationError::NotConnected {
            vertices: vertices.len(),
            edges: edges.len(),
        });
    } else if shapes.is_some_and(|shapes| shapes.len() != edges.len()) {
        return Err(LocationError::InvalidShapes);
    } else if !offsets.is_valid() {
        return Err(LocationError::InvalidOffsets(*offsets));
    }

    Ok(())
}
