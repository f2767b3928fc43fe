//! A minimal in-crate stand-in for the external plan loader: enough to
//! build a node tree for doc examples and tests without a real parser.
//! The real loader stays an external collaborator; this module only
//! covers constructing the handful of trees this crate's own tests need.

use crate::executive::{attach_assignment, new_node, Executive};
use crate::node::{ConditionKind, NodeArena, NodeHandle, NodeType};
use crate::variable::{ExprId, VariableStore};

/// Builds one node and lets the caller wire up its conditions before it is
/// attached to a parent or the executive.
pub struct NodeSpec {
    pub id: String,
    pub node_type: NodeType,
    pub priority: u32,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
        NodeSpec {
            id: id.into(),
            node_type,
            priority: u32::MAX,
        }
    }

    pub fn priority(mut self, p: u32) -> Self {
        self.priority = p;
        self
    }
}

/// Creates a node from a spec, parents it if requested, and returns its
/// handle. Condition slots are attached afterward via
/// [`set_condition`]/[`attach_assignment`].
pub fn build_node(arena: &mut NodeArena, spec: NodeSpec, parent: Option<NodeHandle>) -> NodeHandle {
    let handle = new_node(arena, spec.id, spec.node_type, parent);
    arena.get_mut(handle).priority = spec.priority;
    if let Some(parent) = parent {
        arena.get_mut(parent).children.push(handle);
    }
    handle
}

/// Wires an externally-owned expression into one of a node's condition
/// slots.
pub fn set_condition(arena: &mut NodeArena, node: NodeHandle, kind: ConditionKind, expr: ExprId) {
    arena.get_mut(node).conditions.set(kind, expr, false);
}

/// Convenience: build an `Assignment` node with its destination/RHS wired
/// and registered with the executive in one call.
pub fn build_assignment_node(
    arena: &mut NodeArena,
    id: impl Into<String>,
    parent: Option<NodeHandle>,
    priority: u32,
    dest: ExprId,
    rhs: ExprId,
) -> NodeHandle {
    let handle = build_node(arena, NodeSpec::new(id, NodeType::Assignment).priority(priority), parent);
    attach_assignment(arena, handle, dest, rhs);
    handle
}

/// Attaches every root in `roots` to the executive in order.
pub fn add_roots(exec: &mut Executive, roots: &[NodeHandle], store: &mut dyn VariableStore) {
    for &root in roots {
        exec.add_plan(root, store);
    }
}
