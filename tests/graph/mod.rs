#![allow(dead_code)]

mod network;

pub use network::{EdgeId, EdgeProperties, NetworkBuilder, NetworkError, NetworkGraph, VertexId};
