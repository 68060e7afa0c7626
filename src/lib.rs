#![doc = include_str!("../README.md")]

mod decoder;
mod encoder;
mod error;
pub mod geometry;
mod graph;
mod location;
mod model;
mod routing;

pub use decoder::candidates::{
    CandidateEdge, CandidateVertex, CandidateVertexEdge, combine_candidates,
    find_candidate_edges, find_candidate_vertices, find_candidates_for,
};
pub use decoder::resolver::{Route, build_line_from_routes, resolve_routes};
pub use decoder::{DecodedLocation, DecoderConfig, decode, decode_line};
pub use encoder::builder::{
    EdgePosition, build_line, build_line_between, build_point_along_line, resolve_coordinate,
};
pub use encoder::expansion::adjust_to_valid_points;
pub use encoder::lrp::{build_line_lrps, build_point_along_line_lrps};
pub use encoder::{EncoderConfig, encode, encode_line, encode_point_along_line};
pub use error::{DecodeError, EncodeError, LocationError, OverlayError};
pub use graph::overlay::{NetworkOverlay, OverlayEdge, OverlayVertex};
pub use graph::search::{SearchConfig, find_valid_vertex};
pub use graph::validity::{
    MAX_ONEWAY_PAIR_BEARING_DIFFERENCE, MIN_BEARING_SHAPE_LENGTH, is_vertex_valid,
};
pub use graph::{DirectedEdge, DirectedGraph, Factor, TravelDirection};
pub use location::{Location, ReferencedLine, ReferencedPointAlongLine};
pub use model::{
    Bearing, BoundingBox, Circle, Coordinate, Fow, Frc, Grid, GridSize, Length, Line,
    LineAttributes, LocationReference, LocationType, Offset, Offsets, Orientation, PathAttributes,
    Point, PointAlongLine, Polygon, Rectangle, Score, SideOfRoad,
};
pub use routing::{Path, ShortestPathConfig, shortest_path, shortest_path_with_fallback};
