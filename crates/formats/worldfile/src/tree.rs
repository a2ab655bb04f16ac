//! Generic attributed tree: named container nodes holding ordered child nodes
//! and ordered typed leaves.
//!
//! Sibling names are not unique. Repeated names are how the world format
//! encodes ordered collections (every placed object is an `Object` child of
//! `<Objects>`), so the `find_child_*` lookups return the first match and later
//! duplicates are reachable only through iteration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Child indices from the root down to a node.
pub type NodePath = Vec<usize>;

/// Type tag of a [`Leaf`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    Byte,
    Int32,
    Single,
    String,
    Void,
}

/// Scalar value held by a leaf.
///
/// `Single` keeps the raw IEEE-754 bit pattern so NaN payloads and signed
/// zeros are preserved and never conflated with `Int32`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Byte(u8),
    Int32(i32),
    Single(u32),
    String(String),
    Void,
}

impl Value {
    pub fn single(v: f32) -> Self {
        Self::Single(v.to_bits())
    }

    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::Byte(_) => PropertyType::Byte,
            Self::Int32(_) => PropertyType::Int32,
            Self::Single(_) => PropertyType::Single,
            Self::String(_) => PropertyType::String,
            Self::Void => PropertyType::Void,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Byte(v) => write!(f, "byte {v}"),
            Self::Int32(v) => write!(f, "int32 {v}"),
            Self::Single(bits) => write!(f, "single {}", f32::from_bits(*bits)),
            Self::String(s) => write!(f, "string {s:?}"),
            Self::Void => f.write_str("void"),
        }
    }
}

/// A named, typed scalar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawLeaf")]
pub struct Leaf {
    name: String,
    value: Value,
    /// Maximum string length in characters, -1 for unbounded. Only
    /// meaningful for `String` leaves.
    max_length: i32,
}

fn unbounded() -> i32 {
    -1
}

/// Deserialized form of [`Leaf`], checked against its bound before use.
#[derive(Deserialize)]
struct RawLeaf {
    name: String,
    value: Value,
    #[serde(default = "unbounded")]
    max_length: i32,
}

impl TryFrom<RawLeaf> for Leaf {
    type Error = Error;

    fn try_from(raw: RawLeaf) -> Result<Self> {
        if let Value::String(s) = &raw.value {
            check_length(&raw.name, s, raw.max_length)?;
        }
        Ok(Self {
            name: raw.name,
            value: raw.value,
            max_length: raw.max_length,
        })
    }
}

/// Leaves compare by name and value; `max_length` is a constraint, not content.
impl PartialEq for Leaf {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value
    }
}

impl Eq for Leaf {}

impl Leaf {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            max_length: -1,
        }
    }

    /// A string leaf bounded to `max_length` characters (-1 for unbounded).
    pub fn string(name: impl Into<String>, s: impl Into<String>, max_length: i32) -> Result<Self> {
        let name = name.into();
        let s = s.into();
        check_length(&name, &s, max_length)?;
        Ok(Self {
            name,
            value: Value::String(s),
            max_length,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn property_type(&self) -> PropertyType {
        self.value.property_type()
    }

    pub fn max_length(&self) -> i32 {
        self.max_length
    }

    pub fn as_byte(&self) -> Option<u8> {
        match self.value {
            Value::Byte(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int32(&self) -> Option<i32> {
        match self.value {
            Value::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_single(&self) -> Option<f32> {
        self.as_single_bits().map(f32::from_bits)
    }

    pub fn as_single_bits(&self) -> Option<u32> {
        match self.value {
            Value::Single(bits) => Some(bits),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn expect_byte(&self) -> Result<u8> {
        self.as_byte().ok_or_else(|| self.type_error(PropertyType::Byte))
    }

    pub fn expect_int32(&self) -> Result<i32> {
        self.as_int32().ok_or_else(|| self.type_error(PropertyType::Int32))
    }

    pub fn expect_single_bits(&self) -> Result<u32> {
        self.as_single_bits()
            .ok_or_else(|| self.type_error(PropertyType::Single))
    }

    pub fn expect_str(&self) -> Result<&str> {
        self.as_str().ok_or_else(|| self.type_error(PropertyType::String))
    }

    /// Replace the value. The new value must have the same type, and strings
    /// must respect `max_length`.
    pub fn set(&mut self, value: Value) -> Result<()> {
        let expected = self.property_type();
        if value.property_type() != expected {
            return Err(Error::LeafType {
                leaf: self.name.clone(),
                expected,
                found: value.property_type(),
            });
        }
        if let Value::String(s) = &value {
            check_length(&self.name, s, self.max_length)?;
        }
        self.value = value;
        Ok(())
    }

    fn type_error(&self, expected: PropertyType) -> Error {
        Error::LeafType {
            leaf: self.name.clone(),
            expected,
            found: self.property_type(),
        }
    }
}

fn check_length(name: &str, s: &str, max_length: i32) -> Result<()> {
    if max_length < 0 {
        return Ok(());
    }
    let len = s.chars().count();
    if len > max_length as usize {
        return Err(Error::StringTooLong {
            leaf: name.to_string(),
            len,
            max: max_length as usize,
        });
    }
    Ok(())
}

/// A named container of child nodes and leaves, both kept in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Node {
    name: String,
    #[serde(default)]
    leaves: Vec<Leaf>,
    #[serde(default)]
    nodes: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            leaves: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a child node and return it.
    pub fn add_node(&mut self, name: impl Into<String>) -> &mut Node {
        self.push_node(Node::new(name))
    }

    /// Append an existing subtree and return it.
    pub fn push_node(&mut self, node: Node) -> &mut Node {
        self.nodes.push(node);
        let last = self.nodes.len() - 1;
        &mut self.nodes[last]
    }

    /// Keyed child: reset the first child called `name` to an empty node in
    /// place, or append one if there is none.
    pub fn set_node(&mut self, name: &str) -> &mut Node {
        match self.nodes.iter().position(|n| n.name == name) {
            Some(i) => {
                self.nodes[i] = Node::new(name);
                &mut self.nodes[i]
            }
            None => self.add_node(name),
        }
    }

    /// First child called `name`, appending one if there is none.
    pub fn get_or_add_node(&mut self, name: &str) -> &mut Node {
        match self.nodes.iter().position(|n| n.name == name) {
            Some(i) => &mut self.nodes[i],
            None => self.add_node(name),
        }
    }

    /// Append an existing leaf and return it.
    pub fn push_leaf(&mut self, leaf: Leaf) -> &mut Leaf {
        self.leaves.push(leaf);
        let last = self.leaves.len() - 1;
        &mut self.leaves[last]
    }

    /// Keyed leaf: overwrite the first leaf with the same name, or append.
    pub fn set_leaf(&mut self, leaf: Leaf) -> &mut Leaf {
        match self.leaves.iter().position(|l| l.name == leaf.name) {
            Some(i) => {
                self.leaves[i] = leaf;
                &mut self.leaves[i]
            }
            None => self.push_leaf(leaf),
        }
    }

    /// Append an unbounded leaf.
    pub fn add_leaf(&mut self, name: impl Into<String>, value: Value) -> &mut Leaf {
        self.push_leaf(Leaf::new(name, value))
    }

    pub fn add_byte(&mut self, name: impl Into<String>, v: u8) -> &mut Leaf {
        self.add_leaf(name, Value::Byte(v))
    }

    pub fn add_int32(&mut self, name: impl Into<String>, v: i32) -> &mut Leaf {
        self.add_leaf(name, Value::Int32(v))
    }

    pub fn add_single(&mut self, name: impl Into<String>, v: f32) -> &mut Leaf {
        self.add_leaf(name, Value::single(v))
    }

    pub fn add_void(&mut self, name: impl Into<String>) -> &mut Leaf {
        self.add_leaf(name, Value::Void)
    }

    pub fn add_string(
        &mut self,
        name: impl Into<String>,
        s: impl Into<String>,
        max_length: i32,
    ) -> Result<&mut Leaf> {
        Ok(self.push_leaf(Leaf::string(name, s, max_length)?))
    }

    pub fn find_child_node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn find_child_node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.name == name)
    }

    pub fn find_child_leaf(&self, name: &str) -> Option<&Leaf> {
        self.leaves.iter().find(|l| l.name == name)
    }

    pub fn find_child_leaf_mut(&mut self, name: &str) -> Option<&mut Leaf> {
        self.leaves.iter_mut().find(|l| l.name == name)
    }

    /// Child nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter()
    }

    /// Leaves in insertion order.
    pub fn leaves(&self) -> impl Iterator<Item = &Leaf> + '_ {
        self.leaves.iter()
    }

    /// Child nodes called `name`, in insertion order.
    pub fn nodes_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.iter().filter(move |n| n.name == name)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Unlink and return the child node at `index`.
    pub fn remove_node(&mut self, index: usize) -> Node {
        self.nodes.remove(index)
    }

    /// Unlink and return the leaf at `index`.
    pub fn remove_leaf(&mut self, index: usize) -> Leaf {
        self.leaves.remove(index)
    }

    /// Unlink the first child node called `name`.
    pub fn remove_child_node(&mut self, name: &str) -> Option<Node> {
        let i = self.nodes.iter().position(|n| n.name == name)?;
        Some(self.nodes.remove(i))
    }

    /// Unlink the first leaf called `name`.
    pub fn remove_child_leaf(&mut self, name: &str) -> Option<Leaf> {
        let i = self.leaves.iter().position(|l| l.name == name)?;
        Some(self.leaves.remove(i))
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        path.iter().try_fold(self, |node, &i| node.nodes.get(i))
    }

    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        path.iter().try_fold(self, |node, &i| node.nodes.get_mut(i))
    }

    /// Pre-order traversal: this node, its leaves, then each child subtree.
    pub fn walk(&self, on_node: &mut impl FnMut(&Node), on_leaf: &mut impl FnMut(&Leaf)) {
        on_node(self);
        for leaf in &self.leaves {
            on_leaf(leaf);
        }
        for child in &self.nodes {
            child.walk(on_node, on_leaf);
        }
    }

    /// The leaf called `name`, or `MissingLeaf` naming this node.
    pub fn require_leaf(&self, name: &str) -> Result<&Leaf> {
        self.find_child_leaf(name).ok_or_else(|| Error::MissingLeaf {
            node: self.name.clone(),
            leaf: name.to_string(),
        })
    }
}

/// Indented outline: node names, with `name = value` lines for leaves.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

impl Node {
    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(f, "{:indent$}{}", "", self.name, indent = depth * 2)?;
        for leaf in &self.leaves {
            writeln!(
                f,
                "{:indent$}{} = {}",
                "",
                leaf.name,
                leaf.value,
                indent = (depth + 1) * 2
            )?;
        }
        for child in &self.nodes {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}
