//! Solution decoding and lineage reconstruction.

pub mod decoder;

pub use decoder::{
    decode_lineages, EdgeKind, Lineage, LineageEdge, LineageId, LineageLabel, LineageMap,
};
