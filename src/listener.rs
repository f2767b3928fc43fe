//! The listener collaborator: fire-and-forget notifications of node
//! transitions and assignments, batched per quiescence cycle.

use serde::{Deserialize, Serialize};

use crate::node::{NodeHandle, NodeState};
use crate::variable::{ExprId, Value};

/// One node's observed transition within a single quiescence cycle's
/// batch: the node and the state it transitioned *from* (the destination
/// is read off the node itself by the listener, since by publish time the
/// transition has already been applied).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NodeTransition {
    pub node: NodeHandle,
    pub previous_state: NodeState,
}

/// Non-owning observer of the executive. Callbacks run inline within
/// `step`; the core makes no assumption about listener threading and a
/// listener must not call back into `step`.
pub trait ExecListener {
    fn notify_of_transitions(&mut self, batch: &[NodeTransition]);
    fn notify_of_assignment(&mut self, dest: ExprId, dest_name: &str, value: &Value);
}

/// Default no-op listener: a step with no listener installed must behave
/// identically to one with the busiest listener installed, modulo the
/// notifications themselves.
#[derive(Debug, Default)]
pub struct NullListener;

impl ExecListener for NullListener {
    fn notify_of_transitions(&mut self, _batch: &[NodeTransition]) {}
    fn notify_of_assignment(&mut self, _dest: ExprId, _dest_name: &str, _value: &Value) {}
}
