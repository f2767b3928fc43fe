//! Hierarchical plan execution core.
//!
//! This crate implements the node state machine, condition-lattice
//! propagation, and macro-step quiescence scheduler that drive a tree of
//! plan nodes to completion. It is deliberately narrow: expression
//! evaluation, variable storage, and the outside world are external
//! collaborators reached through the [`VariableStore`], [`WorldAdapter`],
//! and [`ExecListener`] traits. A real plan loader, expression language,
//! and command dispatcher live outside this crate; [`plan`] offers only
//! the minimal tree-building scaffolding this crate's own tests need.
//!
//! The scheduler is synchronous and single-threaded: a caller drives
//! progress by calling [`Executive::step`] whenever something it tracks
//! through [`VariableStore`]/[`WorldAdapter`] might have changed a
//! condition's truth value. There is no internal clock, thread pool, or
//! async runtime; embedding into one is the caller's responsibility.
//!
//! ```text
//! caller's event loop
//!   -> update external variables / expressions
//!   -> notify_node_condition_changed() for anything that may have changed
//!   -> Executive::step()
//!   -> drain outbound commands via WorldAdapter
//! ```

pub mod assignment;
pub mod error;
pub mod executive;
pub mod listener;
pub mod node;
pub mod plan;
pub mod queue;
pub mod time;
pub mod variable;

pub use assignment::Assignment;
pub use error::{PlanError, StepResult};
pub use executive::{attach_assignment, new_node, root_handles, Executive, NullWorldAdapter, WorldAdapter};
pub use listener::{ExecListener, NodeTransition, NullListener};
pub use node::{
    ConditionKind, Conditions, FailureType, Node, NodeArena, NodeHandle, NodeOutcome, NodeState, NodeType,
    StagedTransition, TimepointLog,
};
pub use plan::{add_roots, build_assignment_node, build_node, set_condition, NodeSpec};
pub use queue::QueueStatus;
pub use time::Time;
pub use variable::{ConflictSetPool, ExprId, TriBool, Value, VariableConflictSet, VariableStore};
