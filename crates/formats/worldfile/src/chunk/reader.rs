//! Best-effort decoding of a world file into a tree.
//!
//! Only the header can fail a read. Past that point a malformed chunk ends
//! the main block and a malformed section ends that section; both are logged
//! and whatever was built before the failure stays in the tree.

use crate::chunk::context::{apply_chunk, ParseContext};
use crate::chunk::header::WorldHeader;
use crate::chunk::opcode::{OpcodeTable, END_MARKER};
use crate::chunk::section::Section;
use crate::config::ReadConfig;
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::tree::Node;

/// Name of the root node.
pub const ROOT_NODE: &str = "World";

/// Root leaf holding a non-zero first header word.
pub const HEADER_UNUSED_LEAF: &str = "HeaderUnused";

pub const BOX_LEAF: &str = "Box";
pub const SCENE_LEAF: &str = "Scene";

/// Decode `data` into a tree rooted at a `World` node.
pub fn read(data: &[u8], table: &OpcodeTable, config: &ReadConfig) -> Result<Node> {
    let header = WorldHeader::parse(data)?;
    let mut root = Node::new(ROOT_NODE);
    if header.unused != 0 {
        root.add_int32(HEADER_UNUSED_LEAF, header.unused as i32);
    }

    match read_main_block(data, header.main_block as usize, table, &mut root) {
        Ok(chunks) => log::debug!("[reader] main block: {chunks} chunks"),
        Err(e) => log::warn!("[reader] main block aborted: {e}"),
    }

    for section in Section::ALL {
        if !config.reads(section) {
            log::debug!("[reader] skipping [{}]", section.key());
            continue;
        }
        let pointer = header.sections[section.index()] as usize;
        let node = root.add_node(section.node_name());
        if let Err(e) = section.read(data, pointer, node) {
            log::warn!("[reader] [{}] at {pointer:#x}: {e}", section.key());
        }
    }

    Ok(root)
}

/// Parse the main block at `offset` into `root`, returning the number of
/// chunks applied.
fn read_main_block(
    data: &[u8],
    offset: usize,
    table: &OpcodeTable,
    root: &mut Node,
) -> Result<usize> {
    let mut c = Cursor::new(data);
    c.seek(offset);
    let declared = c.read_u32()? as usize;
    let body_start = c.position();
    let end = match body_start.checked_add(declared) {
        Some(end) if end <= data.len() => end,
        _ => {
            log::warn!(
                "[reader] main block length {declared:#x} at {offset:#x} runs past end of file, clamping to {:#x}",
                data.len() - body_start
            );
            data.len()
        }
    };

    let mut c = Cursor::new(&data[..end]);
    c.seek(body_start);
    let box_name = c.read_cstring()?;
    let scene = c.read_cstring()?;
    root.add_string(BOX_LEAF, box_name, -1)?;
    root.add_string(SCENE_LEAF, scene, -1)?;

    let mut ctx = ParseContext::default();
    let mut chunks = 0;
    while !c.is_empty() {
        let at = c.position();
        let code = c.read_u8()?;
        if code == END_MARKER {
            break;
        }
        let def = table
            .get(code)
            .ok_or(Error::UnknownOpcode { opcode: code, offset: at })?;
        ctx = apply_chunk(root, ctx, def, &mut c, at)?;
        chunks += 1;
    }

    if ctx.depth() > 0 {
        log::warn!(
            "[reader] {} lock(s) still open at end of main block, closing",
            ctx.depth()
        );
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::header::HEADER_SIZE;
    use crate::cursor::Writer;

    /// Header + main block built from `chunks`, with every section empty.
    fn world_bytes(chunks: &[u8]) -> Vec<u8> {
        let mut body = Writer::new();
        body.write_cstring("box01").unwrap();
        body.write_cstring("island").unwrap();
        body.write_bytes(chunks);
        body.write_u8(END_MARKER);
        let body = body.into_bytes();

        let sections = HEADER_SIZE + 4 + body.len();
        let mut w = Writer::new();
        WorldHeader::write_placeholder(0, &mut w);
        WorldHeader::patch_main_block(&mut w, HEADER_SIZE as u32);
        w.write_u32(body.len() as u32);
        w.write_bytes(&body);
        for (i, section) in Section::ALL.into_iter().enumerate() {
            WorldHeader::patch_section(&mut w, section, (sections + i * 4) as u32);
            w.write_u32(0);
        }
        w.into_bytes()
    }

    fn read_default(data: &[u8]) -> Result<Node> {
        read(data, &OpcodeTable::standard(), &ReadConfig::default())
    }

    #[test]
    fn empty_world_has_strings_and_sections() {
        let root = read_default(&world_bytes(&[])).unwrap();
        assert_eq!(root.name(), ROOT_NODE);
        assert_eq!(root.find_child_leaf(BOX_LEAF).unwrap().as_str(), Some("box01"));
        assert_eq!(root.find_child_leaf(SCENE_LEAF).unwrap().as_str(), Some("island"));
        assert!(root.find_child_leaf(HEADER_UNUSED_LEAF).is_none());
        let names: Vec<_> = root.nodes().map(Node::name).collect();
        assert_eq!(
            names,
            ["[textures]", "[sfx]", "[objdefs]", "[fx]", "[scenerios]", "[includefiles]"]
        );
    }

    #[test]
    fn obsolete_chunks_are_skipped() {
        let mut chunks = vec![0x2F];
        chunks.extend_from_slice(&[0xAA; 8]);
        chunks.extend_from_slice(&[0x15, 1, 2, 3]);
        let root = read_default(&world_bytes(&chunks)).unwrap();
        let sun = root.find_child_node("SunColor").unwrap();
        assert_eq!(sun.find_child_leaf("B").unwrap().as_byte(), Some(3));
    }

    /// A string field with no terminator is kept truncated and the block
    /// carries on.
    #[test]
    fn full_width_string_does_not_end_block() {
        let mut chunks = vec![0x20];
        chunks.extend_from_slice(&[b'a'; 32]);
        chunks.extend_from_slice(&[0x15, 1, 2, 3]);
        let root = read_default(&world_bytes(&chunks)).unwrap();
        let track = root
            .find_child_node("MusicMain")
            .and_then(|n| n.find_child_leaf("Track"))
            .unwrap();
        assert_eq!(track.as_str(), Some("a".repeat(31).as_str()));
        assert!(root.find_child_node("SunColor").is_some());
    }

    /// An unknown opcode stops the block but keeps chunks before it.
    #[test]
    fn unknown_opcode_keeps_prefix() {
        let chunks = [0x15, 1, 2, 3, 0x05, 0x17, 9, 9, 9];
        let root = read_default(&world_bytes(&chunks)).unwrap();
        assert!(root.find_child_node("SunColor").is_some());
        assert!(root.find_child_node("AmbientColor").is_none());
        assert!(root.find_child_node("[includefiles]").is_some());
    }

    #[test]
    fn unclosed_lock_is_tolerated() {
        let mut chunks = vec![0x44];
        chunks.extend_from_slice(&1i32.to_le_bytes());
        chunks.extend_from_slice(&[0; 16]);
        chunks.push(0x63);
        let root = read_default(&world_bytes(&chunks)).unwrap();
        let object = root.node_at(&[0, 0]).unwrap();
        assert_eq!(object.find_child_node("Lock").unwrap().node_count(), 0);
    }

    /// A declared block length past the end of file is clamped, not fatal.
    #[test]
    fn overlong_block_length_is_clamped() {
        let mut data = world_bytes(&[0x15, 1, 2, 3]);
        data[HEADER_SIZE..HEADER_SIZE + 4].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());
        let root = read_default(&data).unwrap();
        assert!(root.find_child_node("SunColor").is_some());
    }

    #[test]
    fn skipped_sections_are_absent() {
        let config = ReadConfig::from_skip_list(&["fx"]);
        let root = read(&world_bytes(&[]), &OpcodeTable::standard(), &config).unwrap();
        assert!(root.find_child_node("[fx]").is_none());
        assert_eq!(root.node_count(), 5);
    }

    #[test]
    fn nonzero_unused_word_is_kept() {
        let mut data = world_bytes(&[]);
        data[..4].copy_from_slice(&7u32.to_le_bytes());
        let root = read_default(&data).unwrap();
        assert_eq!(root.find_child_leaf(HEADER_UNUSED_LEAF).unwrap().as_int32(), Some(7));
    }
}
