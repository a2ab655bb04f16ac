//! Opcode table for the main block of a world file.
//!
//! Every byte value maps to a [`Slot`]: either a definition describing the
//! payload layout and how it lands in the tree, or an explicit reservation.
//! Decoding and encoding are driven entirely by these definitions, so adding or
//! auditing an opcode is an edit to [`OPCODES`].

use std::collections::HashMap;

/// Name of the root group that placed objects are appended to.
pub const OBJECTS_GROUP: &str = "<Objects>";

/// Node name of the nested context created by `LockStart`.
pub const LOCK_NODE: &str = "Lock";

/// End-of-block marker byte.
pub const END_MARKER: u8 = 0xFF;

/// Wire type of a single payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Byte,
    Int32,
    Single,
    /// Fixed-width, null-padded string field of `n` bytes.
    Str(usize),
}

impl FieldType {
    /// Bytes this field occupies on the wire.
    pub fn size(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Int32 | Self::Single => 4,
            Self::Str(n) => n,
        }
    }
}

/// A named payload field. The name doubles as the leaf name in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
}

/// How a chunk's payload is attached to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// Keyed node directly under the root; a repeat replaces the earlier one.
    World,
    /// New object node (named `node`) appended at the attachment point.
    CreateObject { node: &'static str },
    /// Leaves set on the current object.
    ObjectLeaves,
    /// Void marker leaf named after the opcode, set on the current object.
    ObjectFlag,
    /// Child node named after the opcode, appended to the current object.
    ObjectNode,
    /// `u8 count`, then `count` pairs of `u8 index` and `elem`. Stored as a
    /// child node of the current object whose leaves are named by index.
    ObjectArray { elem: FieldType },
    /// Entry node named after the opcode, appended into a root group.
    Group { group: &'static str },
    LockStart,
    LockEnd,
    /// Retired opcode: payload of `skip` bytes is consumed and discarded.
    Obsolete { skip: usize },
    End,
}

/// One opcode definition.
#[derive(Debug)]
pub struct OpcodeDef {
    pub code: u8,
    pub name: &'static str,
    pub kind: ChunkKind,
    pub fields: &'static [Field],
}

impl OpcodeDef {
    /// Payload size in bytes when it does not depend on the data.
    pub fn fixed_payload_len(&self) -> Option<usize> {
        match self.kind {
            ChunkKind::ObjectArray { .. } => None,
            ChunkKind::Obsolete { skip } => Some(skip),
            _ => Some(self.fields.iter().map(|f| f.ty.size()).sum()),
        }
    }

    /// Whether chunks of this kind need a current object.
    pub fn targets_object(&self) -> bool {
        matches!(
            self.kind,
            ChunkKind::ObjectLeaves
                | ChunkKind::ObjectFlag
                | ChunkKind::ObjectNode
                | ChunkKind::ObjectArray { .. }
                | ChunkKind::LockStart
        )
    }
}

/// Table entry for one byte value.
#[derive(Debug, Clone, Copy)]
pub enum Slot {
    Defined(&'static OpcodeDef),
    Reserved,
}

/// Lookup registry over a set of definitions. Built once and passed by
/// reference to the reader and writer.
pub struct OpcodeTable {
    slots: [Slot; 256],
    by_name: HashMap<&'static str, &'static OpcodeDef>,
    by_group: HashMap<&'static str, &'static OpcodeDef>,
}

impl OpcodeTable {
    /// The table for the shipped format.
    pub fn standard() -> Self {
        Self::from_defs(OPCODES)
    }

    /// Build a table from `defs`. Later definitions of the same code win.
    pub fn from_defs(defs: &'static [OpcodeDef]) -> Self {
        let mut slots = [Slot::Reserved; 256];
        let mut by_name = HashMap::new();
        let mut by_group = HashMap::new();
        for def in defs {
            slots[def.code as usize] = Slot::Defined(def);
            match def.kind {
                ChunkKind::Obsolete { .. } => {}
                ChunkKind::Group { group } => {
                    by_group.insert(group, def);
                    by_name.insert(def.name, def);
                }
                _ => {
                    by_name.insert(def.name, def);
                }
            }
        }
        Self {
            slots,
            by_name,
            by_group,
        }
    }

    pub fn slot(&self, code: u8) -> Slot {
        self.slots[code as usize]
    }

    pub fn get(&self, code: u8) -> Option<&'static OpcodeDef> {
        match self.slots[code as usize] {
            Slot::Defined(def) => Some(def),
            Slot::Reserved => None,
        }
    }

    /// Definition by opcode name. Obsolete opcodes are not addressable.
    pub fn by_name(&self, name: &str) -> Option<&'static OpcodeDef> {
        self.by_name.get(name).copied()
    }

    /// Entry opcode for a grouped-repeat root node such as `<Teleports>`.
    pub fn group_entry(&self, group: &str) -> Option<&'static OpcodeDef> {
        self.by_group.get(group).copied()
    }

    /// All defined opcodes in code order.
    pub fn defined(&self) -> impl Iterator<Item = &'static OpcodeDef> + '_ {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Defined(def) => Some(*def),
            Slot::Reserved => None,
        })
    }
}

impl Default for OpcodeTable {
    fn default() -> Self {
        Self::standard()
    }
}

const fn byte(name: &'static str) -> Field {
    Field {
        name,
        ty: FieldType::Byte,
    }
}

const fn int(name: &'static str) -> Field {
    Field {
        name,
        ty: FieldType::Int32,
    }
}

const fn single(name: &'static str) -> Field {
    Field {
        name,
        ty: FieldType::Single,
    }
}

const fn text(name: &'static str, n: usize) -> Field {
    Field {
        name,
        ty: FieldType::Str(n),
    }
}

const fn def(code: u8, name: &'static str, kind: ChunkKind, fields: &'static [Field]) -> OpcodeDef {
    OpcodeDef {
        code,
        name,
        kind,
        fields,
    }
}

const fn world(code: u8, name: &'static str, fields: &'static [Field]) -> OpcodeDef {
    def(code, name, ChunkKind::World, fields)
}

const fn leaves(code: u8, name: &'static str, fields: &'static [Field]) -> OpcodeDef {
    def(code, name, ChunkKind::ObjectLeaves, fields)
}

const fn obsolete(code: u8, skip: usize) -> OpcodeDef {
    def(code, "Obsolete", ChunkKind::Obsolete { skip }, &[])
}

/// Field list as a named constant so it lives for `'static` inside the table.
macro_rules! fields {
    ($($field:expr),* $(,)?) => {{
        const FIELDS: &[Field] = &[$($field),*];
        FIELDS
    }};
}

const NONE: &[Field] = &[];
const RGB: &[Field] = &[byte("R"), byte("G"), byte("B")];
const NAME: &[Field] = &[text("Name", 32)];
const TRACK: &[Field] = &[text("Track", 32)];
const TEXTURE: &[Field] = &[text("Texture", 32)];
const NEAR_FAR: &[Field] = &[single("Near"), single("Far")];
const MIN_MAX: &[Field] = &[single("Min"), single("Max")];
const XYZ: &[Field] = &[single("X"), single("Y"), single("Z")];
const ANGLES: &[Field] = &[single("Azimuth"), single("Elevation")];
const BOUNDS: &[Field] = &[single("MinX"), single("MinY"), single("MaxX"), single("MaxY")];
const SECONDS: &[Field] = &[int("Seconds")];
const COUNT: &[Field] = &[int("Count")];
const DENSITY: &[Field] = &[single("Density")];
const CONDITION: &[Field] = &[int("Condition")];
const SOUND: &[Field] = &[text("Sound", 32), single("Volume")];

const OBJECT: &[Field] = &[
    int("Type"),
    single("X"),
    single("Y"),
    single("Z"),
    single("DirFacing"),
];
const OBJECT6: &[Field] = &[
    int("Type"),
    single("X"),
    single("Y"),
    single("Z"),
    single("DirFacing"),
    single("TiltForward"),
    single("TiltLeft"),
];
const SMOKE_GEN: &[Field] = &[
    int("Type"),
    single("X"),
    single("Y"),
    single("Z"),
    single("DirFacing"),
    int("SmokeType"),
    single("SmokeRate"),
];
const AREA_ALIEN: &[Field] = &[
    int("Type"),
    single("X"),
    single("Y"),
    single("Z"),
    single("DirFacing"),
    single("Radius"),
];

/// Leaves every object carries whatever its creation opcode.
pub const REQUIRED_OBJECT_LEAVES: &[&str] = &["Type", "X", "Y", "Z", "DirFacing"];

/// The shipped opcode set. Codes `0x13..=0x90` are all assigned, retired ones
/// as [`ChunkKind::Obsolete`]; `0xFF` ends the block.
pub static OPCODES: &[OpcodeDef] = &[
    // World properties
    world(0x13, "FogColor", RGB),
    world(0x14, "FogRange", NEAR_FAR),
    world(0x15, "SunColor", RGB),
    world(0x16, "SunDirection", XYZ),
    world(0x17, "AmbientColor", RGB),
    world(0x18, "WaterColor", RGB),
    world(0x19, "WaterMaterial", fields![text("Texture", 32), single("Alpha")]),
    world(0x1A, "WaterHeight", fields![single("Height")]),
    world(0x1B, "WaterFlow", fields![single("Speed"), single("Direction")]),
    world(0x1C, "Tiling", fields![single("U"), single("V")]),
    world(0x1D, "SkyDome", TEXTURE),
    world(0x1E, "SkyColor", RGB),
    world(0x1F, "CloudLayer", fields![text("Texture", 32), single("Speed"), single("Height")]),
    world(0x20, "MusicMain", TRACK),
    world(0x21, "MusicAttack", TRACK),
    world(0x22, "MusicVictory", TRACK),
    world(0x23, "MusicDefeat", TRACK),
    world(0x24, "Grid", fields![single("Size"), byte("Visible")]),
    world(0x25, "ScenarioFlags", fields![int("Flags")]),
    world(0x26, "ScenarioTimer", SECONDS),
    world(0x27, "GameType", fields![int("Type")]),
    world(0x28, "MaxPlayers", COUNT),
    world(0x29, "Gravity", fields![single("Value")]),
    world(0x2A, "GlobalWind", fields![single("Strength"), single("Direction")]),
    world(0x2B, "LandTexture", NAME),
    world(0x2C, "DetailTexture", fields![text("Name", 32), single("Scale")]),
    world(0x2D, "ViewDistance", fields![single("Distance")]),
    obsolete(0x2E, 4),
    obsolete(0x2F, 8),
    world(0x30, "MiniMap", TEXTURE),
    world(0x31, "LightningFrequency", MIN_MAX),
    world(0x32, "RainDensity", DENSITY),
    world(0x33, "SnowDensity", DENSITY),
    obsolete(0x34, 12),
    world(0x35, "ShadowColor", RGB),
    world(0x36, "SpecularColor", RGB),
    world(0x37, "BeachFoam", fields![text("Texture", 32), single("Width")]),
    world(0x38, "Waves", fields![single("Height"), single("Speed"), single("Length")]),
    world(
        0x39,
        "StartCamera",
        fields![single("X"), single("Y"), single("Z"), single("Yaw"), single("Pitch")],
    ),
    obsolete(0x3A, 4),
    world(0x3B, "IslandBounds", BOUNDS),
    world(0x3C, "Seed", fields![int("Value")]),
    world(0x3D, "AmbientSound", SOUND),
    world(0x3E, "AmbientSoundNight", SOUND),
    world(0x3F, "TimeOfDay", fields![single("Hour"), single("Speed")]),
    world(0x40, "MissionText", fields![text("Text", 64)]),
    world(0x41, "MissionName", NAME),
    world(0x42, "NextMission", NAME),
    obsolete(0x43, 16),
    // Object creation
    def(0x44, "ObjectRef", ChunkKind::CreateObject { node: "Object" }, OBJECT),
    def(0x45, "ObjectRef6", ChunkKind::CreateObject { node: "Object" }, OBJECT6),
    def(0x46, "SmokeGen", ChunkKind::CreateObject { node: "SmokeGen" }, SMOKE_GEN),
    def(0x47, "AreaAlien", ChunkKind::CreateObject { node: "AreaAlien" }, AREA_ALIEN),
    // Object attributes
    leaves(0x48, "Scale", fields![single("Scale")]),
    leaves(0x49, "AIMode", fields![byte("AIMode")]),
    leaves(0x4A, "HerdMarkers", fields![int("HerdMarkers")]),
    leaves(0x4B, "TeamID", fields![int("TeamID")]),
    leaves(0x4C, "HerdType", fields![byte("HerdType")]),
    leaves(0x4D, "HerdCount", fields![int("HerdCount"), byte("ShowPath")]),
    leaves(0x4E, "OData1", fields![single("OData1")]),
    leaves(0x4F, "OData2", fields![single("OData2")]),
    leaves(0x50, "OData3", fields![single("OData3")]),
    leaves(0x51, "SplineKeyTime", fields![single("SplineKeyTime")]),
    leaves(0x52, "LightColor", fields![byte("LightR"), byte("LightG"), byte("LightB")]),
    leaves(0x53, "AnimType", fields![int("AnimType")]),
    leaves(0x54, "AnimTime", fields![single("AnimTime")]),
    leaves(0x55, "FlickUsed", fields![byte("FlickUsed")]),
    def(0x56, "AIData", ChunkKind::ObjectArray { elem: FieldType::Single }, NONE),
    leaves(0x57, "HerdScale", fields![single("HerdScale")]),
    leaves(0x58, "SplineStartId", fields![int("SplineStartId")]),
    leaves(0x59, "SplineScale", fields![single("SplineScaleIn"), single("SplineScaleOut")]),
    leaves(0x5A, "SplineTangents", fields![single("SplineTangentIn"), single("SplineTangentOut")]),
    def(0x5B, "SplinePath3D", ChunkKind::ObjectFlag, NONE),
    def(0x5C, "SplineJet", ChunkKind::ObjectFlag, NONE),
    def(0x5D, "MinishopRIcons", ChunkKind::ObjectArray { elem: FieldType::Int32 }, NONE),
    def(0x5E, "MinishopMIcons", ChunkKind::ObjectArray { elem: FieldType::Int32 }, NONE),
    def(0x5F, "HerdPoint", ChunkKind::ObjectNode, XYZ),
    def(
        0x60,
        "Path",
        ChunkKind::ObjectNode,
        fields![int("Id"), single("X"), single("Y"), single("Z")],
    ),
    def(0x61, "GroundPath", ChunkKind::ObjectNode, fields![int("Id"), single("X"), single("Y")]),
    def(
        0x62,
        "Wind",
        ChunkKind::ObjectNode,
        fields![single("Strength"), single("Direction"), single("Turbulence")],
    ),
    // Structure
    def(0x63, "LockStart", ChunkKind::LockStart, NONE),
    def(0x64, "LockEnd", ChunkKind::LockEnd, NONE),
    obsolete(0x65, 4),
    obsolete(0x66, 1),
    // Grouped repeats
    def(
        0x67,
        "Teleport",
        ChunkKind::Group { group: "<Teleports>" },
        fields![int("Id"), single("X"), single("Y"), single("Z"), int("Target")],
    ),
    def(
        0x68,
        "StartLocation",
        ChunkKind::Group { group: "<StartLocations>" },
        fields![int("Team"), single("X"), single("Y"), single("Z"), single("DirFacing")],
    ),
    def(
        0x69,
        "Sunflare",
        ChunkKind::Group { group: "<Sunflares>" },
        fields![
            text("Texture", 32),
            single("Position"),
            single("Size"),
            byte("R"),
            byte("G"),
            byte("B"),
        ],
    ),
    def(
        0x6A,
        "Flick",
        ChunkKind::Group { group: "<Flicks>" },
        fields![int("Id"), text("Texture", 32), single("Speed")],
    ),
    def(
        0x6B,
        "Texture",
        ChunkKind::Group { group: "<Textures>" },
        fields![text("Name", 32), single("Tiling")],
    ),
    // Later world properties
    world(0x6C, "FogHeight", MIN_MAX),
    world(0x6D, "WaterFog", fields![byte("R"), byte("G"), byte("B"), single("Density")]),
    world(0x6E, "UnderwaterColor", RGB),
    obsolete(0x6F, 4),
    world(0x70, "SunPosition", ANGLES),
    world(0x71, "MoonPosition", ANGLES),
    world(0x72, "MoonColor", RGB),
    world(0x73, "StarDensity", DENSITY),
    world(0x74, "LensFlare", fields![byte("Enabled")]),
    obsolete(0x75, 8),
    world(0x76, "ReinforcementTimer", SECONDS),
    world(0x77, "ResourceRate", fields![single("Rate")]),
    world(0x78, "StartResources", fields![int("Amount")]),
    world(0x79, "TeamAllies", fields![int("Mask")]),
    obsolete(0x7A, 2),
    world(0x7B, "VictoryCondition", CONDITION),
    world(0x7C, "DefeatCondition", CONDITION),
    world(0x7D, "MusicAmbient", TRACK),
    world(0x7E, "MusicNight", TRACK),
    obsolete(0x7F, 4),
    world(0x80, "DetailBlend", NEAR_FAR),
    world(0x81, "TerrainFile", NAME),
    world(0x82, "LightmapFile", NAME),
    obsolete(0x83, 20),
    world(0x84, "EnvironmentMap", TEXTURE),
    world(0x85, "ShoreLine", fields![single("Height")]),
    world(0x86, "ClipPlanes", NEAR_FAR),
    world(0x87, "CameraBounds", BOUNDS),
    obsolete(0x88, 4),
    world(0x89, "BuildLimit", COUNT),
    world(0x8A, "UnitLimit", COUNT),
    world(0x8B, "Difficulty", fields![byte("Level")]),
    obsolete(0x8C, 6),
    world(0x8D, "ScriptFile", NAME),
    world(0x8E, "Author", NAME),
    world(0x8F, "Description", fields![text("Text", 64)]),
    obsolete(0x90, 4),
    def(END_MARKER, "End", ChunkKind::End, NONE),
];

#[cfg(test)]
mod tests {
    use super::*;

    /// Every byte is either defined or explicitly reserved, and the defined
    /// range is exactly 0x13..=0x90 plus the end marker.
    #[test]
    fn table_is_complete() {
        let table = OpcodeTable::standard();
        for code in 0..=255u8 {
            let defined = matches!(table.slot(code), Slot::Defined(_));
            let expected = (0x13..=0x90).contains(&code) || code == END_MARKER;
            assert_eq!(defined, expected, "code {code:#04x}");
        }
        assert_eq!(table.defined().count(), 127);
    }

    /// Each definition sits in the slot of its own code (no duplicates in
    /// the static list overwrite each other).
    #[test]
    fn codes_are_unique() {
        let mut seen = [false; 256];
        for def in OPCODES {
            assert!(!seen[def.code as usize], "duplicate {:#04x}", def.code);
            seen[def.code as usize] = true;
        }
    }

    #[test]
    fn names_resolve_except_obsolete() {
        let table = OpcodeTable::standard();
        for def in table.defined() {
            match def.kind {
                ChunkKind::Obsolete { .. } => assert!(table.by_name(def.name).is_none()),
                _ => assert_eq!(table.by_name(def.name).map(|d| d.code), Some(def.code)),
            }
        }
    }

    #[test]
    fn groups_map_to_entries() {
        let table = OpcodeTable::standard();
        assert_eq!(table.group_entry("<Teleports>").unwrap().name, "Teleport");
        assert_eq!(table.group_entry("<Textures>").unwrap().name, "Texture");
        assert!(table.group_entry(OBJECTS_GROUP).is_none());
    }

    /// Field names must be unique within a payload since they become leaf
    /// names on the same node.
    #[test]
    fn field_names_unique_per_opcode() {
        for def in OPCODES {
            for (i, a) in def.fields.iter().enumerate() {
                assert!(
                    def.fields[i + 1..].iter().all(|b| b.name != a.name),
                    "{} repeats field {}",
                    def.name,
                    a.name
                );
            }
        }
    }

    #[test]
    fn payload_sizes() {
        let table = OpcodeTable::standard();
        assert_eq!(table.by_name("ObjectRef").unwrap().fixed_payload_len(), Some(20));
        assert_eq!(table.by_name("ObjectRef6").unwrap().fixed_payload_len(), Some(28));
        assert_eq!(table.by_name("Scale").unwrap().fixed_payload_len(), Some(4));
        assert_eq!(table.by_name("AIData").unwrap().fixed_payload_len(), None);
        assert_eq!(table.get(0x83).unwrap().fixed_payload_len(), Some(20));
        assert_eq!(table.by_name("End").unwrap().fixed_payload_len(), Some(0));
    }

    /// Object attributes share the object's leaf namespace with the creation
    /// fields, so they must not collide with them.
    #[test]
    fn attribute_leaves_do_not_shadow_creation_fields() {
        for def in OPCODES.iter().filter(|d| d.kind == ChunkKind::ObjectLeaves) {
            for field in def.fields {
                assert!(!OBJECT6.iter().any(|f| f.name == field.name), "{}", field.name);
                assert!(!SMOKE_GEN.iter().any(|f| f.name == field.name), "{}", field.name);
                assert!(!AREA_ALIEN.iter().any(|f| f.name == field.name), "{}", field.name);
            }
        }
    }
}
