//! The chunk-opcode world file: header, main block and trailing sections.

pub mod context;
pub mod header;
pub mod opcode;
pub mod payload;
pub mod reader;
pub mod section;
pub mod writer;

pub use header::WorldHeader;
pub use opcode::{OpcodeDef, OpcodeTable};
pub use section::Section;
