//! Serialization of a tree back into a world file.
//!
//! Root children are emitted in tree order. Object attributes are not: each
//! object is written in one fixed order so that a decode/encode cycle settles
//! after a single pass.

use crate::chunk::header::WorldHeader;
use crate::chunk::opcode::{
    ChunkKind, OpcodeDef, OpcodeTable, END_MARKER, LOCK_NODE, OBJECTS_GROUP,
    REQUIRED_OBJECT_LEAVES,
};
use crate::chunk::payload::{encode_array, encode_fields};
use crate::chunk::reader::{BOX_LEAF, HEADER_UNUSED_LEAF, SCENE_LEAF};
use crate::chunk::section::Section;
use crate::cursor::Writer;
use crate::error::{Error, Result};
use crate::tree::Node;

/// Attribute opcodes in emission order. `HerdScale` is skipped here for
/// `AreaAlien`, which writes it straight after creation.
const OBJECT_ATTRIBUTES: &[&str] = &[
    "Scale",
    "AIMode",
    "HerdMarkers",
    "TeamID",
    "HerdType",
    "HerdCount",
    "OData1",
    "OData2",
    "OData3",
    "SplineKeyTime",
    "LightColor",
    "AnimType",
    "AnimTime",
    "FlickUsed",
    "AIData",
    "HerdScale",
    "SplineStartId",
    "SplineScale",
    "SplineTangents",
    "SplinePath3D",
    "SplineJet",
    "MinishopRIcons",
    "MinishopMIcons",
];

/// Repeated child nodes, written after the attributes and before locks.
const OBJECT_CHILDREN: &[&str] = &["HerdPoint", "Path", "GroundPath", "Wind"];

const AREA_ALIEN: &str = "AreaAlien";
const HERD_SCALE: &str = "HerdScale";

/// Encode the tree rooted at `root` into world-file bytes.
pub fn write(root: &Node, table: &OpcodeTable) -> Result<Vec<u8>> {
    let unused = match root.find_child_leaf(HEADER_UNUSED_LEAF) {
        Some(leaf) => leaf.expect_int32()? as u32,
        None => 0,
    };

    let mut w = Writer::with_capacity(4096);
    WorldHeader::write_placeholder(unused, &mut w);

    let main_block = w.position();
    WorldHeader::patch_main_block(&mut w, main_block as u32);
    w.write_u32(0);
    let body_start = w.position();
    w.write_cstring(root_string(root, BOX_LEAF)?)?;
    w.write_cstring(root_string(root, SCENE_LEAF)?)?;

    for child in root.nodes() {
        write_root_child(child, table, &mut w)?;
    }
    w.write_u8(END_MARKER);
    let body_len = w.position() - body_start;
    w.patch_u32(main_block, body_len as u32);
    log::debug!("[writer] main block: {body_len} bytes");

    for section in Section::ALL {
        let pointer = w.position();
        WorldHeader::patch_section(&mut w, section, pointer as u32);
        section.write(root.find_child_node(section.node_name()), &mut w)?;
    }

    Ok(w.into_bytes())
}

fn root_string<'a>(root: &'a Node, name: &str) -> Result<&'a str> {
    match root.find_child_leaf(name) {
        Some(leaf) => leaf.expect_str(),
        None => Ok(""),
    }
}

fn write_root_child(child: &Node, table: &OpcodeTable, w: &mut Writer) -> Result<()> {
    let name = child.name();
    if name == OBJECTS_GROUP {
        for object in child.nodes() {
            write_object(object, table, w)?;
        }
        return Ok(());
    }
    if let Some(def) = table.group_entry(name) {
        for entry in child.nodes() {
            if entry.name() != def.name {
                log::warn!("[writer] skipping {} in {name}", entry.name());
                continue;
            }
            w.write_u8(def.code);
            encode_fields(def.fields, entry, w)?;
        }
        return Ok(());
    }
    if Section::from_node_name(name).is_some() {
        return Ok(());
    }
    match table.by_name(name) {
        Some(def) if def.kind == ChunkKind::World => {
            w.write_u8(def.code);
            encode_fields(def.fields, child, w)
        }
        _ => {
            log::warn!("[writer] skipping unknown root node {name}");
            Ok(())
        }
    }
}

/// Write one object and, through its locks, every object nested in it.
fn write_object(object: &Node, table: &OpcodeTable, w: &mut Writer) -> Result<()> {
    let creation = match object.name() {
        "Object" if object.find_child_leaf("TiltForward").is_some() => "ObjectRef6",
        "Object" => "ObjectRef",
        "SmokeGen" => "SmokeGen",
        AREA_ALIEN => AREA_ALIEN,
        other => {
            log::warn!("[writer] skipping unknown object node {other}");
            return Ok(());
        }
    };
    for leaf in REQUIRED_OBJECT_LEAVES {
        object.require_leaf(leaf)?;
    }

    let def = lookup(table, creation)?;
    w.write_u8(def.code);
    encode_fields(def.fields, object, w)?;

    let area_alien = object.name() == AREA_ALIEN;
    if area_alien {
        write_attribute(object, lookup(table, HERD_SCALE)?, w)?;
    }
    for &name in OBJECT_ATTRIBUTES {
        if area_alien && name == HERD_SCALE {
            continue;
        }
        write_attribute(object, lookup(table, name)?, w)?;
    }

    for &name in OBJECT_CHILDREN {
        let def = lookup(table, name)?;
        for child in object.nodes_named(name) {
            w.write_u8(def.code);
            encode_fields(def.fields, child, w)?;
        }
    }

    let start = lookup(table, "LockStart")?;
    let end = lookup(table, "LockEnd")?;
    for lock in object.nodes_named(LOCK_NODE) {
        w.write_u8(start.code);
        for nested in lock.nodes() {
            write_object(nested, table, w)?;
        }
        w.write_u8(end.code);
    }
    Ok(())
}

/// Emit `def` for `object` if the object carries it. A multi-field attribute
/// is present when its first field is; the others are then required.
fn write_attribute(object: &Node, def: &OpcodeDef, w: &mut Writer) -> Result<()> {
    match def.kind {
        ChunkKind::ObjectLeaves => {
            let Some(first) = def.fields.first() else {
                return Ok(());
            };
            if object.find_child_leaf(first.name).is_some() {
                w.write_u8(def.code);
                encode_fields(def.fields, object, w)?;
            }
        }
        ChunkKind::ObjectFlag => {
            if object.find_child_leaf(def.name).is_some() {
                w.write_u8(def.code);
            }
        }
        ChunkKind::ObjectArray { elem } => {
            if let Some(array) = object.find_child_node(def.name) {
                w.write_u8(def.code);
                encode_array(elem, array, w)?;
            }
        }
        _ => {
            return Err(Error::Parse {
                context: "writer",
                message: format!("{} is not an object attribute", def.name),
            })
        }
    }
    Ok(())
}

fn lookup(table: &OpcodeTable, name: &str) -> Result<&'static OpcodeDef> {
    table.by_name(name).ok_or_else(|| Error::Parse {
        context: "opcode table",
        message: format!("no opcode named {name}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::header::HEADER_SIZE;

    fn object(root: &mut Node, ty: i32) -> &mut Node {
        let object = root.get_or_add_node(OBJECTS_GROUP).add_node("Object");
        object.add_int32("Type", ty);
        object.add_single("X", 1.0);
        object.add_single("Y", 2.0);
        object.add_single("Z", 3.0);
        object.add_single("DirFacing", 0.0);
        object
    }

    /// Opcode bytes of the main block after the two strings of an otherwise
    /// empty world.
    fn body(bytes: &[u8]) -> &[u8] {
        let len = u32::from_le_bytes(bytes[HEADER_SIZE..HEADER_SIZE + 4].try_into().unwrap());
        &bytes[HEADER_SIZE + 4 + 2..HEADER_SIZE + 4 + len as usize]
    }

    #[test]
    fn empty_root_writes_minimal_file() {
        let bytes = write(&Node::new("World"), &OpcodeTable::standard()).unwrap();
        // Header, length, two empty strings, end marker, six empty sections.
        assert_eq!(bytes.len(), HEADER_SIZE + 4 + 3 + 6 * 4);
        assert_eq!(body(&bytes), [END_MARKER]);
        let header = WorldHeader::parse(&bytes).unwrap();
        assert_eq!(header.main_block as usize, HEADER_SIZE);
        assert_eq!(header.sections[0] as usize, HEADER_SIZE + 7);
    }

    #[test]
    fn tilt_selects_six_field_creation() {
        let mut root = Node::new("World");
        object(&mut root, 5);
        let plain = write(&root, &OpcodeTable::standard()).unwrap();
        assert_eq!(body(&plain)[0], 0x44);

        let obj = root.node_at_mut(&[0, 0]).unwrap();
        obj.add_single("TiltForward", 0.1);
        obj.add_single("TiltLeft", 0.2);
        let tilted = write(&root, &OpcodeTable::standard()).unwrap();
        assert_eq!(body(&tilted)[0], 0x45);
        assert_eq!(body(&tilted).len(), 1 + 28 + 1);
    }

    /// Area aliens write their herd scale right after creation.
    #[test]
    fn area_alien_herd_scale_follows_creation() {
        let mut root = Node::new("World");
        let alien = root.get_or_add_node(OBJECTS_GROUP).add_node("AreaAlien");
        for (name, v) in [("X", 0.0), ("Y", 0.0), ("Z", 0.0), ("DirFacing", 0.0), ("Radius", 4.0)] {
            alien.add_single(name, v);
        }
        alien.add_int32("Type", 9);
        alien.add_int32("TeamID", 2);
        alien.add_single("HerdScale", 1.5);
        let bytes = write(&root, &OpcodeTable::standard()).unwrap();
        let body = body(&bytes);
        let creation_len = 1 + 24;
        assert_eq!(body[0], 0x47);
        assert_eq!(body[creation_len], 0x57);
        assert_eq!(body[creation_len + 5], 0x4B);
        assert_eq!(body.len(), creation_len + 5 + 5 + 1);
    }

    #[test]
    fn missing_required_leaf_fails() {
        let mut root = Node::new("World");
        let obj = root.add_node(OBJECTS_GROUP).add_node("Object");
        obj.add_int32("Type", 1);
        assert!(matches!(
            write(&root, &OpcodeTable::standard()),
            Err(Error::MissingLeaf { .. })
        ));
    }

    #[test]
    fn partial_multi_field_attribute_fails() {
        let mut root = Node::new("World");
        object(&mut root, 1).add_int32("HerdCount", 4);
        assert!(matches!(
            write(&root, &OpcodeTable::standard()),
            Err(Error::MissingLeaf { leaf, .. }) if leaf == "ShowPath"
        ));
    }

    #[test]
    fn unknown_root_nodes_are_skipped() {
        let mut root = Node::new("World");
        root.add_node("EditorState").add_int32("Zoom", 3);
        let bytes = write(&root, &OpcodeTable::standard()).unwrap();
        assert_eq!(body(&bytes), [END_MARKER]);
    }

    #[test]
    fn locks_wrap_nested_objects() {
        let mut root = Node::new("World");
        let outer = object(&mut root, 1);
        let lock = outer.add_node(LOCK_NODE);
        let inner = lock.add_node("Object");
        inner.add_int32("Type", 2);
        for name in ["X", "Y", "Z", "DirFacing"] {
            inner.add_single(name, 0.0);
        }
        let bytes = write(&root, &OpcodeTable::standard()).unwrap();
        let body = body(&bytes);
        assert_eq!(body[0], 0x44);
        assert_eq!(body[21], 0x63);
        assert_eq!(body[22], 0x44);
        assert_eq!(body[43], 0x64);
        assert_eq!(body[44], END_MARKER);
    }
}
