use thiserror::Error;

use crate::{Coordinate, Length, Offsets, Point};

#[derive(Error, Debug, PartialEq, Clone, Copy)]
pub enum LocationError {
    #[error("Location is empty")]
    Empty,
    #[error("Location has {vertices} vertices for {edges} edges")]
    NotConnected { vertices: usize, edges: usize },
    #[error("Location shapes do not match its edges")]
    InvalidShapes,
    #[error("Invalid offsets {0:?}")]
    InvalidOffsets(Offsets),
}

#[derive(Error, Debug, PartialEq, Clone, Copy)]
pub enum EncodeError<EdgeId, GraphError> {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("Cannot encode location: {0}")]
    InvalidLocation(LocationError),
    #[error("Cannot resolve {coordinate:?} to an edge within {max_distance}")]
    LocationNotResolved {
        coordinate: Coordinate,
        max_distance: Length,
    },
    #[error("Cannot find road class attributes of edge {0:?}")]
    AttributesNotFound(EdgeId),
    #[error("Cannot find route between LRPs")]
    RouteNotFound,
}

#[derive(Error, Debug, PartialEq, Clone, Copy)]
pub enum DecodeError<GraphError> {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("Cannot decode location: {0}")]
    InvalidLocation(LocationError),
    #[error("Line reference consists of at least 2 LR-points")]
    InvalidLine,
    #[error("Cannot find candidates for {0:?}")]
    CandidatesNotFound(Point),
    #[error("Cannot find route between LRPs {0:?}")]
    RouteNotFound((Point, Point)),
}

#[derive(Error, Debug, PartialEq, Clone, Copy)]
pub enum OverlayError<GraphError> {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("Virtual vertex {0} not found")]
    VertexNotFound(usize),
    #[error("Virtual edge {0} not found")]
    EdgeNotFound(usize),
}
