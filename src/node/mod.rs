//! Node storage, the node-local state machine fields, and the arena that
//! owns every node in every plan the executive is running.

pub mod conditions;
pub mod timepoint;
pub mod transitions;

use serde::{Deserialize, Serialize};

use crate::assignment::Assignment;
use crate::queue::QueueStatus;
use crate::variable::ExprId;

pub use conditions::{ConditionKind, Conditions};
pub use timepoint::TimepointLog;

/// Index into a [`NodeArena`]. Stable for the lifetime of the node it
/// names; once a finished root's subtree is reclaimed by
/// `Executive::delete_finished_plans`, handles into that subtree must not
/// be reused. The arena does not use generation counters — the only
/// long-lived external identity is a node's `id`, not its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeHandle(usize);

impl NodeHandle {
    pub fn from_index(i: usize) -> Self {
        NodeHandle(i)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Empty,
    Assignment,
    Command,
    Update,
    List,
    LibraryCall,
}

impl NodeType {
    /// `Finishing` and `Failing` exist only for non-`Empty` types.
    pub fn has_finishing_and_failing(self) -> bool {
        !matches!(self, NodeType::Empty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    Inactive,
    Waiting,
    Executing,
    IterationEnded,
    Finished,
    Failing,
    Finishing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeOutcome {
    None,
    Success,
    Failure,
    Skipped,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureType {
    None,
    PreFailed,
    PostFailed,
    InvariantFailed,
    ParentFailed,
    Exited,
    ParentExited,
}

/// A staged but not-yet-applied transition, computed by
/// [`transitions::compute_next_state`] and applied by
/// `Executive::apply_transition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedTransition {
    pub next_state: NodeState,
    pub next_outcome: NodeOutcome,
    pub next_failure_type: FailureType,
}

pub struct Node {
    pub id: String,
    pub node_type: NodeType,
    pub state: NodeState,
    pub outcome: NodeOutcome,
    pub failure_type: FailureType,
    pub staged: Option<StagedTransition>,
    /// Only meaningful for `Assignment` nodes; lower is stronger.
    pub priority: u32,
    pub queue_status: QueueStatus,
    pub parent: Option<NodeHandle>,
    pub children: Vec<NodeHandle>,
    pub conditions: Conditions,
    pub timepoints: TimepointLog,
    /// Present only for `Assignment`-typed nodes.
    pub assignment: Option<Assignment>,
    /// The variable an `Assignment` node writes, used to key its entry in
    /// the executive's conflict-set pool. `None` for non-assignment nodes.
    pub assignment_variable: Option<ExprId>,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: NodeType, parent: Option<NodeHandle>) -> Self {
        Node {
            id: id.into(),
            node_type,
            state: NodeState::Inactive,
            outcome: NodeOutcome::None,
            failure_type: FailureType::None,
            staged: None,
            priority: u32::MAX,
            queue_status: QueueStatus::None,
            parent,
            children: Vec::new(),
            conditions: Conditions::new(),
            timepoints: TimepointLog::new(),
            assignment: None,
            assignment_variable: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Resets outcome, failure type, and timepoints for a fresh iteration;
    /// used on `IterationEnded -> Waiting` (repeat) and `Finished ->
    /// Inactive` (ancestor repeat).
    pub fn reset_for_new_iteration(&mut self) {
        self.outcome = NodeOutcome::None;
        self.failure_type = FailureType::None;
        self.timepoints.reset();
    }
}

/// Owns every node across every plan root the executive is running.
/// Backed by a `Vec<Option<Node>>`; a `None` slot is a reclaimed handle.
#[derive(Default)]
pub struct NodeArena {
    nodes: Vec<Option<Node>>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Node) -> NodeHandle {
        self.nodes.push(Some(node));
        NodeHandle::from_index(self.nodes.len() - 1)
    }

    pub fn get(&self, handle: NodeHandle) -> &Node {
        self.nodes[handle.index()]
            .as_ref()
            .expect("dereferenced a reclaimed NodeHandle")
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> &mut Node {
        self.nodes[handle.index()]
            .as_mut()
            .expect("dereferenced a reclaimed NodeHandle")
    }

    pub fn try_get(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle.index()).and_then(|n| n.as_ref())
    }

    /// Removes a node and every descendant, recursively. Called only on
    /// finished plan roots.
    pub fn remove_subtree(&mut self, root: NodeHandle) {
        let children = self.get(root).children.clone();
        for child in children {
            self.remove_subtree(child);
        }
        self.nodes[root.index()] = None;
    }

    pub fn parent_of(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.get(handle).parent
    }
}
