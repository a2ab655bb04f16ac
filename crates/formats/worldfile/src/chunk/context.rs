//! Parser state for the main block, threaded through chunk handlers by value.
//!
//! The tree only grows while a block is parsed (world properties are replaced
//! in place), so child-index paths stay valid for the whole parse and stand in
//! for parent pointers.

use crate::chunk::opcode::{ChunkKind, OpcodeDef, LOCK_NODE, OBJECTS_GROUP};
use crate::chunk::payload::{decode_array, decode_fields};
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::tree::{Leaf, Node, NodePath, Value};

/// Where newly created objects are appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    /// The root `<Objects>` group, created on first use.
    Objects,
    /// A `Lock` node inside another object.
    Lock(NodePath),
}

/// Context saved by `LockStart` and restored by the matching `LockEnd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockFrame {
    pub attachment: Attachment,
    pub last_object: Option<NodePath>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseContext {
    pub attachment: Attachment,
    /// Target of attribute chunks.
    pub last_object: Option<NodePath>,
    pub locks: Vec<LockFrame>,
}

impl Default for ParseContext {
    fn default() -> Self {
        Self {
            attachment: Attachment::Objects,
            last_object: None,
            locks: Vec::new(),
        }
    }
}

impl ParseContext {
    /// Depth of lock nesting.
    pub fn depth(&self) -> usize {
        self.locks.len()
    }
}

/// Decode one chunk payload at `c` and apply it to `root`.
///
/// `offset` is the position of the opcode byte, for diagnostics. The payload
/// is fully read before the tree is touched.
pub fn apply_chunk(
    root: &mut Node,
    ctx: ParseContext,
    def: &'static OpcodeDef,
    c: &mut Cursor<'_>,
    offset: usize,
) -> Result<ParseContext> {
    let no_object = || Error::NoCurrentObject {
        opcode: def.code,
        name: def.name,
        offset,
    };
    if def.targets_object() && ctx.last_object.is_none() {
        return Err(no_object());
    }

    match def.kind {
        ChunkKind::World => {
            let leaves = decode_fields(def.fields, c)?;
            let node = root.set_node(def.name);
            for leaf in leaves {
                node.push_leaf(leaf);
            }
            Ok(ctx)
        }
        ChunkKind::CreateObject { node } => {
            let leaves = decode_fields(def.fields, c)?;
            let parent_path = match &ctx.attachment {
                Attachment::Objects => {
                    let found = root.nodes().position(|n| n.name() == OBJECTS_GROUP);
                    let index = match found {
                        Some(i) => i,
                        None => {
                            root.add_node(OBJECTS_GROUP);
                            root.node_count() - 1
                        }
                    };
                    vec![index]
                }
                Attachment::Lock(path) => path.clone(),
            };
            let parent = node_mut(root, &parent_path)?;
            let object = parent.add_node(node);
            for leaf in leaves {
                object.push_leaf(leaf);
            }
            let mut object_path = parent_path;
            object_path.push(parent.node_count() - 1);
            Ok(ParseContext {
                last_object: Some(object_path),
                ..ctx
            })
        }
        ChunkKind::ObjectLeaves => {
            let leaves = decode_fields(def.fields, c)?;
            let object = current_object(root, &ctx).ok_or_else(no_object)?;
            for leaf in leaves {
                object.set_leaf(leaf);
            }
            Ok(ctx)
        }
        ChunkKind::ObjectFlag => {
            let object = current_object(root, &ctx).ok_or_else(no_object)?;
            object.set_leaf(Leaf::new(def.name, Value::Void));
            Ok(ctx)
        }
        ChunkKind::ObjectNode => {
            let leaves = decode_fields(def.fields, c)?;
            let object = current_object(root, &ctx).ok_or_else(no_object)?;
            let child = object.add_node(def.name);
            for leaf in leaves {
                child.push_leaf(leaf);
            }
            Ok(ctx)
        }
        ChunkKind::ObjectArray { elem } => {
            let leaves = decode_array(elem, c)?;
            let object = current_object(root, &ctx).ok_or_else(no_object)?;
            let array = object.set_node(def.name);
            for leaf in leaves {
                array.push_leaf(leaf);
            }
            Ok(ctx)
        }
        ChunkKind::Group { group } => {
            let leaves = decode_fields(def.fields, c)?;
            let entry = root.get_or_add_node(group).add_node(def.name);
            for leaf in leaves {
                entry.push_leaf(leaf);
            }
            Ok(ctx)
        }
        ChunkKind::LockStart => {
            let object_path = ctx.last_object.clone().ok_or_else(no_object)?;
            let object = node_mut(root, &object_path)?;
            object.add_node(LOCK_NODE);
            let mut lock_path = object_path.clone();
            lock_path.push(object.node_count() - 1);

            let mut locks = ctx.locks;
            locks.push(LockFrame {
                attachment: ctx.attachment,
                last_object: Some(object_path),
            });
            Ok(ParseContext {
                attachment: Attachment::Lock(lock_path),
                last_object: ctx.last_object,
                locks,
            })
        }
        ChunkKind::LockEnd => {
            let mut locks = ctx.locks;
            let frame = locks.pop().ok_or(Error::UnbalancedLock { offset })?;
            Ok(ParseContext {
                attachment: frame.attachment,
                last_object: frame.last_object,
                locks,
            })
        }
        ChunkKind::Obsolete { skip } => {
            c.skip(skip)?;
            Ok(ctx)
        }
        // The block loop stops at the end marker before dispatching.
        ChunkKind::End => Ok(ctx),
    }
}

fn current_object<'a>(root: &'a mut Node, ctx: &ParseContext) -> Option<&'a mut Node> {
    root.node_at_mut(ctx.last_object.as_deref()?)
}

fn node_mut<'a>(root: &'a mut Node, path: &[usize]) -> Result<&'a mut Node> {
    root.node_at_mut(path).ok_or_else(|| Error::Parse {
        context: "parse context",
        message: format!("stale node path {path:?}"),
    })
}
