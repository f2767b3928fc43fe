//! Destination-state computation: pure functions of (current state, node
//! type, condition values) with no side effects. `Executive::apply_transition`
//! is responsible for the entry/exit hooks (condition activation,
//! timepoint stamping, queue placement) once a staged transition here is
//! promoted off the transition queue.

use crate::node::{ConditionKind, FailureType, Node, NodeArena, NodeHandle, NodeOutcome, NodeState, NodeType, StagedTransition};
use crate::variable::{TriBool, VariableStore};

fn local(node: &Node, kind: ConditionKind, store: &dyn VariableStore) -> Option<TriBool> {
    node.conditions.value(kind, store)
}

fn is_true(node: &Node, kind: ConditionKind, store: &dyn VariableStore, default: bool) -> bool {
    match local(node, kind, store) {
        Some(tb) => tb.is_true(),
        None => default,
    }
}

fn is_false(node: &Node, kind: ConditionKind, store: &dyn VariableStore) -> bool {
    matches!(local(node, kind, store), Some(TriBool::False))
}

fn ancestor(arena: &NodeArena, handle: NodeHandle, kind: ConditionKind, store: &dyn VariableStore) -> Option<TriBool> {
    let parent = arena.get(handle).parent?;
    local(arena.get(parent), kind, store)
}

fn ancestor_true(arena: &NodeArena, handle: NodeHandle, kind: ConditionKind, store: &dyn VariableStore) -> bool {
    matches!(ancestor(arena, handle, kind, store), Some(TriBool::True))
}

fn ancestor_false(arena: &NodeArena, handle: NodeHandle, kind: ConditionKind, store: &dyn VariableStore) -> bool {
    matches!(ancestor(arena, handle, kind, store), Some(TriBool::False))
}

fn staged(state: NodeState, outcome: NodeOutcome, failure: FailureType) -> Option<StagedTransition> {
    Some(StagedTransition {
        next_state: state,
        next_outcome: outcome,
        next_failure_type: failure,
    })
}

fn carry_over(node: &Node, state: NodeState) -> Option<StagedTransition> {
    Some(StagedTransition {
        next_state: state,
        next_outcome: node.outcome,
        next_failure_type: node.failure_type,
    })
}

/// `ActionComplete` for `List`/`LibraryCall` nodes is an aggregate over
/// children, not an externally-signalled expression: true once every
/// child has reached `Finished`.
fn list_action_complete(arena: &NodeArena, handle: NodeHandle) -> bool {
    arena
        .get(handle)
        .children
        .iter()
        .all(|&c| arena.get(c).state == NodeState::Finished)
}

/// Computes the node's destination state given its current condition
/// values, or `None` if no transition is yet warranted. Dispatches on
/// `(state, node_type)` as the Design Notes direct, in lieu of virtual
/// dispatch on node type.
pub fn compute_next_state(
    handle: NodeHandle,
    arena: &NodeArena,
    store: &dyn VariableStore,
) -> Option<StagedTransition> {
    let node = arena.get(handle);
    match node.state {
        NodeState::Inactive => from_inactive(arena, handle, store),
        NodeState::Waiting => from_waiting(arena, handle, store),
        NodeState::Executing => match node.node_type {
            NodeType::Empty => empty_from_executing(arena, handle, store),
            NodeType::Assignment => assignment_from_executing(arena, handle, store),
            NodeType::Command | NodeType::Update => command_from_executing(arena, handle, store),
            NodeType::List | NodeType::LibraryCall => list_from_executing(arena, handle, store),
        },
        NodeState::Finishing => match node.node_type {
            NodeType::Empty => unreachable!("Empty nodes never enter Finishing"),
            NodeType::Assignment => unreachable!("Assignment nodes never enter Finishing"),
            NodeType::Command | NodeType::Update => command_from_finishing(arena, handle, store),
            NodeType::List | NodeType::LibraryCall => list_from_finishing(arena, handle, store),
        },
        NodeState::Failing => match node.node_type {
            NodeType::Empty => unreachable!("Empty nodes never enter Failing"),
            NodeType::Assignment => assignment_from_failing(node),
            NodeType::Command | NodeType::Update => command_from_failing(node, store),
            NodeType::List | NodeType::LibraryCall => list_from_failing(arena, handle, node),
        },
        NodeState::IterationEnded => from_iteration_ended(arena, handle, store, node),
        NodeState::Finished => None, // Inactive re-entry is driven explicitly by the parent's repeat, not a condition read.
    }
}

fn from_inactive(arena: &NodeArena, handle: NodeHandle, store: &dyn VariableStore) -> Option<StagedTransition> {
    let parent = match arena.get(handle).parent {
        Some(p) => p,
        // Root node: no ancestor conditions to gate on, proceeds unconditionally.
        None => return staged(NodeState::Waiting, NodeOutcome::None, FailureType::None),
    };
    match arena.get(parent).state {
        NodeState::Finished => staged(NodeState::Finished, NodeOutcome::Skipped, FailureType::None),
        NodeState::Executing => {
            if ancestor_true(arena, handle, ConditionKind::Exit, store)
                || ancestor_false(arena, handle, ConditionKind::Invariant, store)
                || ancestor_true(arena, handle, ConditionKind::End, store)
            {
                return staged(NodeState::Finished, NodeOutcome::Skipped, FailureType::None);
            }
            staged(NodeState::Waiting, NodeOutcome::None, FailureType::None)
        }
        // Parent hasn't reached Executing yet (e.g. sitting in Waiting on its
        // own Start/Pre): no transition until it does.
        _ => None,
    }
}

fn from_waiting(arena: &NodeArena, handle: NodeHandle, store: &dyn VariableStore) -> Option<StagedTransition> {
    let node = arena.get(handle);
    if ancestor_true(arena, handle, ConditionKind::Exit, store)
        || ancestor_true(arena, handle, ConditionKind::End, store)
        || ancestor_false(arena, handle, ConditionKind::Invariant, store)
        || is_true(node, ConditionKind::Exit, store, false)
        || is_true(node, ConditionKind::Skip, store, false)
    {
        return staged(NodeState::Finished, NodeOutcome::Skipped, FailureType::None);
    }
    if !is_true(node, ConditionKind::Start, store, true) {
        return None;
    }
    if !is_true(node, ConditionKind::Pre, store, true) {
        return staged(NodeState::IterationEnded, NodeOutcome::Failure, FailureType::PreFailed);
    }
    staged(NodeState::Executing, NodeOutcome::None, FailureType::None)
}

fn from_iteration_ended(
    arena: &NodeArena,
    handle: NodeHandle,
    store: &dyn VariableStore,
    node: &Node,
) -> Option<StagedTransition> {
    if ancestor_true(arena, handle, ConditionKind::Exit, store) {
        return staged(NodeState::Finished, NodeOutcome::Interrupted, FailureType::ParentExited);
    }
    if ancestor_false(arena, handle, ConditionKind::Invariant, store) {
        return staged(NodeState::Finished, NodeOutcome::Failure, FailureType::ParentFailed);
    }
    if ancestor_true(arena, handle, ConditionKind::End, store) {
        return carry_over(node, NodeState::Finished);
    }
    if !is_true(node, ConditionKind::Repeat, store, false) {
        return carry_over(node, NodeState::Finished);
    }
    staged(NodeState::Waiting, NodeOutcome::None, FailureType::None)
}

fn empty_from_executing(arena: &NodeArena, handle: NodeHandle, store: &dyn VariableStore) -> Option<StagedTransition> {
    let node = arena.get(handle);
    if ancestor_true(arena, handle, ConditionKind::Exit, store) {
        return staged(NodeState::Finished, NodeOutcome::Interrupted, FailureType::ParentExited);
    }
    if is_true(node, ConditionKind::Exit, store, false) {
        return staged(NodeState::Finished, NodeOutcome::Interrupted, FailureType::Exited);
    }
    if ancestor_false(arena, handle, ConditionKind::Invariant, store) {
        return staged(NodeState::Finished, NodeOutcome::Failure, FailureType::ParentFailed);
    }
    if is_false(node, ConditionKind::Invariant, store) {
        return staged(NodeState::Finished, NodeOutcome::Failure, FailureType::InvariantFailed);
    }
    if node.conditions.has(ConditionKind::End) && !is_true(node, ConditionKind::End, store, true) {
        return None;
    }
    if node.conditions.has(ConditionKind::Post) && !is_true(node, ConditionKind::Post, store, true) {
        return staged(NodeState::IterationEnded, NodeOutcome::Failure, FailureType::PostFailed);
    }
    staged(NodeState::IterationEnded, NodeOutcome::Success, FailureType::None)
}

fn assignment_from_executing(arena: &NodeArena, handle: NodeHandle, store: &dyn VariableStore) -> Option<StagedTransition> {
    let node = arena.get(handle);
    // Not eligible to leave EXECUTING until the assignment has been executed.
    // `ack` lives on the Assignment record itself, not the store.
    if !node.assignment.as_ref().map(|a| a.ack()).unwrap_or(false) {
        return None;
    }
    if ancestor_true(arena, handle, ConditionKind::Exit, store) {
        return staged(NodeState::Failing, NodeOutcome::Interrupted, FailureType::ParentExited);
    }
    if is_true(node, ConditionKind::Exit, store, false) {
        return staged(NodeState::Failing, NodeOutcome::Interrupted, FailureType::Exited);
    }
    if ancestor_false(arena, handle, ConditionKind::Invariant, store) {
        return staged(NodeState::Failing, NodeOutcome::Failure, FailureType::ParentFailed);
    }
    if is_false(node, ConditionKind::Invariant, store) {
        return staged(NodeState::Failing, NodeOutcome::Failure, FailureType::InvariantFailed);
    }
    if node.conditions.has(ConditionKind::End) && !is_true(node, ConditionKind::End, store, true) {
        return None;
    }
    if node.conditions.has(ConditionKind::Post) && !is_true(node, ConditionKind::Post, store, true) {
        return staged(NodeState::IterationEnded, NodeOutcome::Failure, FailureType::PostFailed);
    }
    staged(NodeState::IterationEnded, NodeOutcome::Success, FailureType::None)
}

fn assignment_from_failing(node: &Node) -> Option<StagedTransition> {
    if !node.assignment.as_ref().map(|a| a.abort_complete()).unwrap_or(false) {
        return None;
    }
    match node.failure_type {
        FailureType::ParentFailed | FailureType::ParentExited => carry_over(node, NodeState::Finished),
        _ => carry_over(node, NodeState::IterationEnded),
    }
}

fn command_from_executing(arena: &NodeArena, handle: NodeHandle, store: &dyn VariableStore) -> Option<StagedTransition> {
    let node = arena.get(handle);
    if ancestor_true(arena, handle, ConditionKind::Exit, store) {
        return staged(NodeState::Failing, NodeOutcome::Interrupted, FailureType::ParentExited);
    }
    if is_true(node, ConditionKind::Exit, store, false) {
        return staged(NodeState::Failing, NodeOutcome::Interrupted, FailureType::Exited);
    }
    if ancestor_false(arena, handle, ConditionKind::Invariant, store) {
        return staged(NodeState::Failing, NodeOutcome::Failure, FailureType::ParentFailed);
    }
    if is_false(node, ConditionKind::Invariant, store) {
        return staged(NodeState::Failing, NodeOutcome::Failure, FailureType::InvariantFailed);
    }
    if is_true(node, ConditionKind::End, store, false) {
        return staged(NodeState::Finishing, NodeOutcome::None, FailureType::None);
    }
    None
}

fn command_from_finishing(arena: &NodeArena, handle: NodeHandle, store: &dyn VariableStore) -> Option<StagedTransition> {
    let node = arena.get(handle);
    if ancestor_true(arena, handle, ConditionKind::Exit, store) {
        return staged(NodeState::Failing, NodeOutcome::Interrupted, FailureType::ParentExited);
    }
    if ancestor_false(arena, handle, ConditionKind::Invariant, store) {
        return staged(NodeState::Failing, NodeOutcome::Failure, FailureType::ParentFailed);
    }
    if !is_true(node, ConditionKind::ActionComplete, store, false) {
        return None;
    }
    if node.conditions.has(ConditionKind::Post) && !is_true(node, ConditionKind::Post, store, true) {
        return staged(NodeState::IterationEnded, NodeOutcome::Failure, FailureType::PostFailed);
    }
    staged(NodeState::IterationEnded, NodeOutcome::Success, FailureType::None)
}

fn command_from_failing(node: &Node, store: &dyn VariableStore) -> Option<StagedTransition> {
    if !is_true(node, ConditionKind::AbortComplete, store, false) {
        return None;
    }
    match node.failure_type {
        FailureType::ParentFailed | FailureType::ParentExited => carry_over(node, NodeState::Finished),
        _ => carry_over(node, NodeState::IterationEnded),
    }
}

fn list_from_executing(arena: &NodeArena, handle: NodeHandle, store: &dyn VariableStore) -> Option<StagedTransition> {
    let node = arena.get(handle);
    if ancestor_true(arena, handle, ConditionKind::Exit, store) {
        return staged(NodeState::Failing, NodeOutcome::Interrupted, FailureType::ParentExited);
    }
    if is_true(node, ConditionKind::Exit, store, false) {
        return staged(NodeState::Failing, NodeOutcome::Interrupted, FailureType::Exited);
    }
    if ancestor_false(arena, handle, ConditionKind::Invariant, store) {
        return staged(NodeState::Failing, NodeOutcome::Failure, FailureType::ParentFailed);
    }
    if is_false(node, ConditionKind::Invariant, store) {
        return staged(NodeState::Failing, NodeOutcome::Failure, FailureType::InvariantFailed);
    }
    if is_true(node, ConditionKind::End, store, false) && list_action_complete(arena, handle) {
        return staged(NodeState::Finishing, NodeOutcome::None, FailureType::None);
    }
    None
}

fn list_from_finishing(arena: &NodeArena, handle: NodeHandle, store: &dyn VariableStore) -> Option<StagedTransition> {
    let node = arena.get(handle);
    if ancestor_true(arena, handle, ConditionKind::Exit, store) {
        return staged(NodeState::Failing, NodeOutcome::Interrupted, FailureType::ParentExited);
    }
    if ancestor_false(arena, handle, ConditionKind::Invariant, store) {
        return staged(NodeState::Failing, NodeOutcome::Failure, FailureType::ParentFailed);
    }
    if !list_action_complete(arena, handle) {
        return None;
    }
    if node.conditions.has(ConditionKind::Post) && !is_true(node, ConditionKind::Post, store, true) {
        return staged(NodeState::IterationEnded, NodeOutcome::Failure, FailureType::PostFailed);
    }
    staged(NodeState::IterationEnded, NodeOutcome::Success, FailureType::None)
}

fn list_from_failing(arena: &NodeArena, handle: NodeHandle, node: &Node) -> Option<StagedTransition> {
    if !list_action_complete(arena, handle) {
        return None;
    }
    match node.failure_type {
        FailureType::ParentFailed | FailureType::ParentExited => carry_over(node, NodeState::Finished),
        _ => carry_over(node, NodeState::IterationEnded),
    }
}
