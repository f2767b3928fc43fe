//! Error types for the executive core.
//!
//! Plan-level contention errors are recoverable and returned from [`crate::executive::Executive::step`];
//! internal invariant violations are bugs in this crate or its caller and are
//! fatal (`debug_assert!`/`unreachable!` in debug builds, `PlanError::Internal`
//! in release builds).

use thiserror::Error;

use crate::node::NodeHandle;

#[derive(Debug, Error)]
pub enum PlanError {
    /// Two assignment nodes at equal priority both proposed to enter
    /// `Executing` on the same variable in the same macro step. The source
    /// treats this as a plan-validation defect, not an engine bug: it is
    /// reported and the current quiescence loop is abandoned cleanly.
    #[error("priority conflict on variable held by nodes {a:?} and {b:?} at equal priority {priority}")]
    PriorityConflict {
        a: NodeHandle,
        b: NodeHandle,
        priority: u32,
    },

    /// `step` was called reentrantly, e.g. from within an `ExecListener`
    /// callback invoked by an in-progress step.
    #[error("step() called reentrantly")]
    Reentrant,

    /// A node was asked to transition to a state unreachable from its
    /// current (state, type) pair.
    #[error("invalid transition for node {node:?}: {from:?} -> {to:?}")]
    InvalidTransition {
        node: NodeHandle,
        from: crate::node::NodeState,
        to: crate::node::NodeState,
    },

    /// A queue transition violated the `QueueStatus` state machine, e.g.
    /// enqueuing a node for transition while it is already queued as a
    /// transition and not a candidate re-entry.
    #[error("illegal queue transition for node {node:?}: {detail}")]
    IllegalQueueTransition {
        node: NodeHandle,
        detail: &'static str,
    },

    /// A condition slot was read before being activated. Indicates a bug
    /// in the transition tables, since the state machine is responsible
    /// for activating every condition it reads.
    #[error("condition {condition:?} read while inactive on node {node:?}")]
    ConditionInactive {
        node: NodeHandle,
        condition: crate::node::conditions::ConditionKind,
    },

    /// Catch-all for internal invariant violations promoted to a `Result`
    /// in release builds instead of panicking.
    #[error("internal invariant violated: {0}")]
    Internal(&'static str),
}

pub type StepResult<T> = Result<T, PlanError>;
