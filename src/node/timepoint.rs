//! Wall-clock timepoint recording: one record per (state, endpoint) the
//! node has actually visited, kept for introspection and listener payloads.

use crate::node::NodeState;
use crate::time::Time;

/// Records the wall-clock stamp at which a node entered (`is_end == false`)
/// or exited (`is_end == true`) a given state.
#[derive(Debug, Clone, Copy)]
pub struct NodeTimepointValue {
    pub state: NodeState,
    pub is_end: bool,
    pub time: Time,
    pub known: bool,
}

impl NodeTimepointValue {
    pub fn new(state: NodeState, is_end: bool, time: Time) -> Self {
        NodeTimepointValue {
            state,
            is_end,
            time,
            known: true,
        }
    }
}

/// Per-node timepoint log. A plain `Vec` replaces the source's intrusive
/// singly-linked list; lookups are by linear scan since a node visits only
/// a handful of states per activation.
#[derive(Debug, Default, Clone)]
pub struct TimepointLog {
    entries: Vec<NodeTimepointValue>,
}

impl TimepointLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, state: NodeState, is_end: bool, time: Time) {
        self.entries.push(NodeTimepointValue::new(state, is_end, time));
    }

    pub fn get(&self, state: NodeState, is_end: bool) -> Option<Time> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.state == state && e.is_end == is_end)
            .map(|e| e.time)
    }

    pub fn entries(&self) -> &[NodeTimepointValue] {
        &self.entries
    }

    /// Cleared when the node resets (e.g. `IterationEnded -> Waiting` on
    /// repeat), matching the source's "reset when the node is reset" rule.
    pub fn reset(&mut self) {
        self.entries.clear();
    }
}
