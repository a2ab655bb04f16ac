use thiserror::Error;

use crate::tree::PropertyType;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid magic: expected {expected:#010x}, found {found:#010x}")]
    InvalidMagic { expected: u32, found: u32 },

    #[error("unexpected end of data at offset {offset:#x} (need {need} bytes, have {have})")]
    UnexpectedEof {
        offset: usize,
        need: usize,
        have: usize,
    },

    #[error("{section} pointer {pointer:#x} outside [{min:#x}, {max:#x}]")]
    SectionPointer {
        section: &'static str,
        pointer: u32,
        min: usize,
        max: usize,
    },

    #[error("unknown opcode {opcode:#04x} at offset {offset:#x}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("opcode {opcode:#04x} ({name}) at offset {offset:#x} has no current object")]
    NoCurrentObject {
        opcode: u8,
        name: &'static str,
        offset: usize,
    },

    #[error("lock end at offset {offset:#x} without matching lock start")]
    UnbalancedLock { offset: usize },

    #[error("{node} is missing required leaf {leaf}")]
    MissingLeaf { node: String, leaf: String },

    #[error("leaf {leaf} is {found:?}, expected {expected:?}")]
    LeafType {
        leaf: String,
        expected: PropertyType,
        found: PropertyType,
    },

    #[error("string for {leaf} is {len} bytes, limit is {max}")]
    StringTooLong { leaf: String, len: usize, max: usize },

    #[error("array element {leaf} in {node} is not an index in 0..=255")]
    BadArrayIndex { node: String, leaf: String },

    #[error("terrain: {0}")]
    Terrain(String),

    #[error("{context}: {message}")]
    Parse { context: &'static str, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
