//! Field-level payload codec shared by the reader and writer.

use crate::chunk::opcode::{Field, FieldType};
use crate::cursor::{Cursor, Writer};
use crate::error::{Error, Result};
use crate::tree::{Leaf, Node, Value};

/// Read one leaf per field. Nothing is attached to the tree here, so a
/// truncated payload leaves no partial chunk behind.
pub fn decode_fields(fields: &[Field], c: &mut Cursor<'_>) -> Result<Vec<Leaf>> {
    fields
        .iter()
        .map(|field| decode_value(field.name, field.ty, c))
        .collect()
}

fn decode_value(name: &str, ty: FieldType, c: &mut Cursor<'_>) -> Result<Leaf> {
    Ok(match ty {
        FieldType::Byte => Leaf::new(name, Value::Byte(c.read_u8()?)),
        FieldType::Int32 => Leaf::new(name, Value::Int32(c.read_i32()?)),
        FieldType::Single => Leaf::new(name, Value::Single(c.read_u32()?)),
        FieldType::Str(n) => {
            let max = n.saturating_sub(1);
            let mut s = c.read_fixed_string(n)?;
            // A field filled to the last byte has no terminator.
            if s.chars().count() > max {
                log::warn!("[payload] {name}: {n}-byte string has no terminator, truncated to {max}");
                s = s.chars().take(max).collect();
            }
            Leaf::string(name, s, max as i32)?
        }
    })
}

/// Write each field from the leaf of the same name on `node`.
pub fn encode_fields(fields: &[Field], node: &Node, w: &mut Writer) -> Result<()> {
    for field in fields {
        let leaf = node.require_leaf(field.name)?;
        encode_value(leaf, field.ty, w)?;
    }
    Ok(())
}

fn encode_value(leaf: &Leaf, ty: FieldType, w: &mut Writer) -> Result<()> {
    match ty {
        FieldType::Byte => w.write_u8(leaf.expect_byte()?),
        FieldType::Int32 => w.write_i32(leaf.expect_int32()?),
        FieldType::Single => w.write_u32(leaf.expect_single_bits()?),
        FieldType::Str(n) => {
            w.write_fixed_string(leaf.expect_str()?, n)
                .map_err(|e| match e {
                    Error::StringTooLong { len, max, .. } => Error::StringTooLong {
                        leaf: leaf.name().to_string(),
                        len,
                        max,
                    },
                    e => e,
                })?;
        }
    }
    Ok(())
}

/// Read an indexed array: `u8 count`, then `count` pairs of `u8 index` and
/// an `elem` value. Leaves are named by their decimal index.
pub fn decode_array(elem: FieldType, c: &mut Cursor<'_>) -> Result<Vec<Leaf>> {
    let count = c.read_u8()?;
    let mut leaves = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let index = c.read_u8()?;
        leaves.push(decode_value(&index.to_string(), elem, c)?);
    }
    Ok(leaves)
}

/// Inverse of [`decode_array`], in leaf order.
pub fn encode_array(elem: FieldType, node: &Node, w: &mut Writer) -> Result<()> {
    let count = u8::try_from(node.leaf_count()).map_err(|_| Error::Parse {
        context: "array",
        message: format!("{} has {} elements, at most 255 fit", node.name(), node.leaf_count()),
    })?;
    w.write_u8(count);
    for leaf in node.leaves() {
        let index: u8 = leaf.name().parse().map_err(|_| Error::BadArrayIndex {
            node: node.name().to_string(),
            leaf: leaf.name().to_string(),
        })?;
        w.write_u8(index);
        encode_value(leaf, elem, w)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::PropertyType;

    const FIELDS: &[Field] = &[
        Field {
            name: "Type",
            ty: FieldType::Int32,
        },
        Field {
            name: "Scale",
            ty: FieldType::Single,
        },
        Field {
            name: "Mode",
            ty: FieldType::Byte,
        },
        Field {
            name: "Track",
            ty: FieldType::Str(8),
        },
    ];

    #[test]
    fn fields_decode_in_order_with_types() {
        let mut w = Writer::new();
        w.write_i32(679);
        w.write_f32(1.5);
        w.write_u8(2);
        w.write_fixed_string("drums", 8).unwrap();
        let bytes = w.into_bytes();

        let mut c = Cursor::new(&bytes);
        let leaves = decode_fields(FIELDS, &mut c).unwrap();
        assert!(c.is_empty());
        let types: Vec<_> = leaves.iter().map(Leaf::property_type).collect();
        assert_eq!(
            types,
            [
                PropertyType::Int32,
                PropertyType::Single,
                PropertyType::Byte,
                PropertyType::String
            ]
        );
        assert_eq!(leaves[3].as_str(), Some("drums"));
        assert_eq!(leaves[3].max_length(), 7);
    }

    /// Encoding looks leaves up by name, so tree order does not matter.
    #[test]
    fn encode_ignores_leaf_order() {
        let mut node = Node::new("Object");
        node.add_string("Track", "drums", 7).unwrap();
        node.add_byte("Mode", 2);
        node.add_single("Scale", 1.5);
        node.add_int32("Type", 679);
        let mut w = Writer::new();
        encode_fields(FIELDS, &node, &mut w).unwrap();
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 17);
        assert_eq!(&bytes[..4], &679i32.to_le_bytes());
    }

    #[test]
    fn encode_reports_missing_and_mistyped_leaves() {
        let mut node = Node::new("Object");
        node.add_single("Type", 1.0);
        let mut w = Writer::new();
        assert!(matches!(
            encode_fields(FIELDS, &node, &mut w),
            Err(Error::LeafType { .. })
        ));
        let empty = Node::new("Object");
        assert!(matches!(
            encode_fields(FIELDS, &empty, &mut Writer::new()),
            Err(Error::MissingLeaf { .. })
        ));
    }

    #[test]
    fn string_overflow_names_the_leaf() {
        let mut node = Node::new("MusicMain");
        node.add_string("Track", "a".repeat(8), -1).unwrap();
        let field = [Field {
            name: "Track",
            ty: FieldType::Str(8),
        }];
        match encode_fields(&field, &node, &mut Writer::new()) {
            Err(Error::StringTooLong { leaf, len, max }) => {
                assert_eq!((leaf.as_str(), len, max), ("Track", 8, 7));
            }
            other => panic!("expected overflow, got {other:?}"),
        }
    }

    /// A field with no terminator decodes to its bounded prefix instead of
    /// failing the chunk.
    #[test]
    fn unterminated_string_is_truncated() {
        let field = [Field {
            name: "Track",
            ty: FieldType::Str(8),
        }];
        let bytes = [b'a'; 8];
        let mut c = Cursor::new(&bytes);
        let leaves = decode_fields(&field, &mut c).unwrap();
        assert!(c.is_empty());
        assert_eq!(leaves[0].as_str(), Some("aaaaaaa"));
        assert_eq!(leaves[0].max_length(), 7);
    }

    #[test]
    fn array_keeps_sparse_indices() {
        let mut node = Node::new("MinishopRIcons");
        node.add_int32("3", 17);
        node.add_int32("9", 4);
        let mut w = Writer::new();
        encode_array(FieldType::Int32, &node, &mut w).unwrap();
        let bytes = w.into_bytes();
        assert_eq!(bytes[0], 2);
        assert_eq!(bytes[1], 3);

        let leaves = decode_array(FieldType::Int32, &mut Cursor::new(&bytes)).unwrap();
        let names: Vec<_> = leaves.iter().map(Leaf::name).collect();
        assert_eq!(names, ["3", "9"]);
        assert_eq!(leaves[1].as_int32(), Some(4));
    }

    #[test]
    fn array_rejects_non_index_names() {
        let mut node = Node::new("AIData");
        node.add_single("speed", 1.0);
        assert!(matches!(
            encode_array(FieldType::Single, &node, &mut Writer::new()),
            Err(Error::BadArrayIndex { .. })
        ));
    }
}
