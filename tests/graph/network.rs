use openlr_line::geometry::polyline_length;
use openlr_line::{
    BoundingBox, Coordinate, DirectedGraph, Factor, Fow, Frc, Length, TravelDirection,
};
use rstar::{AABB, RTree, RTreeObject};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("Vertex {0:?} not found")]
    VertexNotFound(VertexId),
    #[error("Edge {0:?} not found")]
    EdgeNotFound(EdgeId),
}

/// In-memory road network with a spatial index over the edge geometries.
#[derive(Debug)]
pub struct NetworkGraph {
    vertices: FxHashMap<VertexId, Coordinate>,
    adjacency: FxHashMap<VertexId, Vec<EdgeId>>,
    edges: FxHashMap<EdgeId, EdgeProperties>,
    geospatial_edges: RTree<GeospatialEdge>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeProperties {
    pub vertices: (VertexId, VertexId),
    /// Overrides the length of the edge geometry.
    pub length: Option<Length>,
    pub factor: Factor,
    pub road_class: Option<(Frc, Fow)>,
    pub shape: Vec<Coordinate>,
}

impl EdgeProperties {
    pub fn new(start: VertexId, end: VertexId) -> Self {
        Self {
            vertices: (start, end),
            length: None,
            factor: Factor::default(),
            road_class: Some((Frc::Frc4, Fow::SingleCarriageway)),
            shape: vec![],
        }
    }

    pub fn length(mut self, meters: f64) -> Self {
        self.length = Some(Length::from_meters(meters));
        self
    }

    pub fn oneway(mut self) -> Self {
        self.factor.direction = TravelDirection::Forward;
        self
    }

    pub fn factor(mut self, factor: Factor) -> Self {
        self.factor = factor;
        self
    }

    pub fn road_class(mut self, frc: Frc, fow: Fow) -> Self {
        self.road_class = Some((frc, fow));
        self
    }

    pub fn without_road_class(mut self) -> Self {
        self.road_class = None;
        self
    }

    pub fn shape(mut self, shape: Vec<Coordinate>) -> Self {
        self.shape = shape;
        self
    }
}

#[derive(Debug)]
struct GeospatialEdge {
    edge: EdgeId,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for GeospatialEdge {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

#[derive(Debug, Default)]
pub struct NetworkBuilder {
    vertices: FxHashMap<VertexId, Coordinate>,
    edges: Vec<(EdgeId, EdgeProperties)>,
}

impl NetworkBuilder {
    pub fn vertex(&mut self, id: u64, lon: f64, lat: f64) -> VertexId {
        self.vertices.insert(VertexId(id), Coordinate { lon, lat });
        VertexId(id)
    }

    pub fn edge(&mut self, id: u64, properties: EdgeProperties) -> EdgeId {
        self.edges.push((EdgeId(id), properties));
        EdgeId(id)
    }

    pub fn build(self) -> NetworkGraph {
        let mut adjacency: FxHashMap<VertexId, Vec<EdgeId>> = FxHashMap::default();
        let mut geospatial_edges = vec![];

        for (edge, properties) in &self.edges {
            let (start, end) = properties.vertices;
            adjacency.entry(start).or_default().push(*edge);
            if start != end {
                adjacency.entry(end).or_default().push(*edge);
            }

            let bbox = BoundingBox::from_coordinates(
                [self.vertices[&start], self.vertices[&end]]
                    .into_iter()
                    .chain(properties.shape.iter().copied()),
            )
            .unwrap();

            geospatial_edges.push(GeospatialEdge {
                edge: *edge,
                envelope: AABB::from_corners(
                    [bbox.min.lon, bbox.min.lat],
                    [bbox.max.lon, bbox.max.lat],
                ),
            });
        }

        // edges returned in a deterministic order
        adjacency.values_mut().for_each(|edges| edges.sort());

        NetworkGraph {
            vertices: self.vertices,
            adjacency,
            edges: self.edges.into_iter().collect(),
            geospatial_edges: RTree::bulk_load(geospatial_edges),
        }
    }
}

impl NetworkGraph {
    fn properties(&self, edge: EdgeId) -> Result<&EdgeProperties, NetworkError> {
        self.edges
            .get(&edge)
            .ok_or(NetworkError::EdgeNotFound(edge))
    }
}

impl DirectedGraph for NetworkGraph {
    type VertexId = VertexId;
    type EdgeId = EdgeId;
    type Error = NetworkError;

    fn get_vertex_coordinate(&self, vertex: VertexId) -> Result<Coordinate, NetworkError> {
        self.vertices
            .get(&vertex)
            .copied()
            .ok_or(NetworkError::VertexNotFound(vertex))
    }

    fn get_edge_vertices(&self, edge: EdgeId) -> Result<(VertexId, VertexId), NetworkError> {
        Ok(self.properties(edge)?.vertices)
    }

    fn get_edge_length(&self, edge: EdgeId) -> Result<Length, NetworkError> {
        let properties = self.properties(edge)?;
        if let Some(length) = properties.length {
            return Ok(length);
        }

        let (start, end) = properties.vertices;
        let mut geometry = vec![self.get_vertex_coordinate(start)?];
        geometry.extend(properties.shape.iter().copied());
        geometry.push(self.get_vertex_coordinate(end)?);
        Ok(polyline_length(&geometry))
    }

    fn get_edge_shape(
        &self,
        edge: EdgeId,
    ) -> Result<impl Iterator<Item = Coordinate>, NetworkError> {
        Ok(self.properties(edge)?.shape.iter().copied())
    }

    fn get_edge_factor(&self, edge: EdgeId) -> Result<Factor, NetworkError> {
        Ok(self.properties(edge)?.factor)
    }

    fn get_edge_road_class(&self, edge: EdgeId) -> Result<Option<(Frc, Fow)>, NetworkError> {
        Ok(self.properties(edge)?.road_class)
    }

    fn vertex_edges(&self, vertex: VertexId) -> Result<impl Iterator<Item = EdgeId>, NetworkError> {
        if !self.vertices.contains_key(&vertex) {
            return Err(NetworkError::VertexNotFound(vertex));
        }

        let edges = self.adjacency.get(&vertex).map(Vec::as_slice);
        Ok(edges.unwrap_or_default().iter().copied())
    }

    fn edges_within_box(
        &self,
        bbox: BoundingBox,
    ) -> Result<impl Iterator<Item = EdgeId>, NetworkError> {
        let envelope =
            AABB::from_corners([bbox.min.lon, bbox.min.lat], [bbox.max.lon, bbox.max.lat]);

        let mut edges: Vec<_> = self
            .geospatial_edges
            .locate_in_envelope_intersecting(&envelope)
            .map(|e| e.edge)
            .collect();

        edges.sort();
        Ok(edges.into_iter())
    }
}
