//! Codecs for a chunk-opcode world file format and its companion formats.
//!
//! - `chunk`: world files, decoded into a generic attributed [`Node`] tree
//!   and written back in canonical order
//! - `heightfield`: run-length encoded terrain grids
//! - `window`: LZSS window decompression
//!
//! Reading is best-effort past the header: malformed chunks and sections are
//! logged through `log` and skipped, keeping everything decoded before them.

pub mod chunk;
pub mod config;
pub mod cursor;
pub mod error;
pub mod heightfield;
pub mod tree;
pub mod window;

pub use chunk::{OpcodeTable, Section, WorldHeader};
pub use config::ReadConfig;
pub use error::{Error, Result};
pub use heightfield::{Terrain, TerrainCell, TerrainHeader};
pub use tree::{Leaf, Node, NodePath, PropertyType, Value};

/// Decode a world file with the standard opcode table, reading every section.
pub fn read_world(data: &[u8]) -> Result<Node> {
    chunk::reader::read(data, &OpcodeTable::standard(), &ReadConfig::default())
}

/// Encode a tree with the standard opcode table.
pub fn write_world(root: &Node) -> Result<Vec<u8>> {
    chunk::writer::write(root, &OpcodeTable::standard())
}
