//! The six trailing sections that follow the main block.
//!
//! Each is a `u32` record count followed by the records. Name lists become
//! repeated string leaves on the section node; the two structured lists become
//! repeated child nodes.

use crate::cursor::{Cursor, Writer};
use crate::error::Result;
use crate::tree::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Textures,
    Sfx,
    ObjDefs,
    Fx,
    Scenerios,
    IncludeFiles,
}

/// Record layout of a section.
enum Record {
    /// A null-terminated string stored as a leaf with this name.
    Name(&'static str),
    /// `i32 type, cstring name` stored as an `ObjDef` node.
    ObjDef,
    /// `cstring name, i32 flags` stored as a `Scenerio` node.
    Scenerio,
}

impl Section {
    /// File order, which is also header pointer order.
    pub const ALL: [Section; 6] = [
        Section::Textures,
        Section::Sfx,
        Section::ObjDefs,
        Section::Fx,
        Section::Scenerios,
        Section::IncludeFiles,
    ];

    /// Short name used in diagnostics and skip lists.
    pub fn key(self) -> &'static str {
        match self {
            Self::Textures => "textures",
            Self::Sfx => "sfx",
            Self::ObjDefs => "objdefs",
            Self::Fx => "fx",
            Self::Scenerios => "scenerios",
            Self::IncludeFiles => "includefiles",
        }
    }

    /// Name of the root node holding this section.
    pub fn node_name(self) -> &'static str {
        match self {
            Self::Textures => "[textures]",
            Self::Sfx => "[sfx]",
            Self::ObjDefs => "[objdefs]",
            Self::Fx => "[fx]",
            Self::Scenerios => "[scenerios]",
            Self::IncludeFiles => "[includefiles]",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.key() == key)
    }

    /// The section stored under root child `name`, if it is one.
    pub fn from_node_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.node_name() == name)
    }

    fn record(self) -> Record {
        match self {
            Self::Textures => Record::Name("Texture"),
            Self::Sfx => Record::Name("Sfx"),
            Self::ObjDefs => Record::ObjDef,
            Self::Fx => Record::Name("Fx"),
            Self::Scenerios => Record::Scenerio,
            Self::IncludeFiles => Record::Name("IncludeFile"),
        }
    }

    /// Parse the section at `offset` into `node`.
    ///
    /// Records are added as they are read, so on failure `node` keeps every
    /// record before the bad one.
    pub fn read(self, data: &[u8], offset: usize, node: &mut Node) -> Result<()> {
        let mut c = Cursor::new(data);
        c.seek(offset);
        let count = c.read_u32()?;
        for _ in 0..count {
            match self.record() {
                Record::Name(leaf) => {
                    let name = c.read_cstring()?;
                    node.add_string(leaf, name, -1)?;
                }
                Record::ObjDef => {
                    let ty = c.read_i32()?;
                    let name = c.read_cstring()?;
                    let def = node.add_node("ObjDef");
                    def.add_int32("Type", ty);
                    def.add_string("Name", name, -1)?;
                }
                Record::Scenerio => {
                    let name = c.read_cstring()?;
                    let flags = c.read_i32()?;
                    let scenerio = node.add_node("Scenerio");
                    scenerio.add_string("Name", name, -1)?;
                    scenerio.add_int32("Flags", flags);
                }
            }
        }
        Ok(())
    }

    /// Write the section from `node`. A missing node writes an empty section.
    pub fn write(self, node: Option<&Node>, w: &mut Writer) -> Result<()> {
        let Some(node) = node else {
            w.write_u32(0);
            return Ok(());
        };
        match self.record() {
            Record::Name(leaf) => {
                let names: Vec<_> = node.leaves().filter(|l| l.name() == leaf).collect();
                w.write_u32(names.len() as u32);
                for name in names {
                    w.write_cstring(name.expect_str()?)?;
                }
            }
            Record::ObjDef => {
                let defs: Vec<_> = node.nodes_named("ObjDef").collect();
                w.write_u32(defs.len() as u32);
                for def in defs {
                    w.write_i32(def.require_leaf("Type")?.expect_int32()?);
                    w.write_cstring(def.require_leaf("Name")?.expect_str()?)?;
                }
            }
            Record::Scenerio => {
                let scenerios: Vec<_> = node.nodes_named("Scenerio").collect();
                w.write_u32(scenerios.len() as u32);
                for scenerio in scenerios {
                    w.write_cstring(scenerio.require_leaf("Name")?.expect_str()?)?;
                    w.write_i32(scenerio.require_leaf("Flags")?.expect_int32()?);
                }
            }
        }
        Ok(())
    }
}
