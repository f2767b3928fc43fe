//! The quiescence scheduler: candidate drain, destination computation,
//! conflict resolution, transition application, and the assignment
//! execute/retract queues drained at macro-step end.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::assignment::Assignment;
use crate::error::{PlanError, StepResult};
use crate::listener::{ExecListener, NodeTransition};
use crate::node::conditions::ConditionKind;
use crate::node::transitions::compute_next_state;
use crate::node::{Node, NodeArena, NodeHandle, NodeState, NodeType};
use crate::queue::QueueStatus;
use crate::time::Time;
use crate::variable::{ConflictSetPool, ExprId, VariableStore};

/// The external world adapter: wall clock, inbound event drain, and
/// outbound command queue. A single macro step begins by letting the
/// caller drain inbound events (outside this crate, via
/// `notify_node_condition_changed`) and ends by flushing the outbound
/// queue through this trait.
pub trait WorldAdapter {
    fn current_time(&self) -> Time;
    fn increment_cycle_count(&mut self);
    fn outbound_queue_empty(&self) -> bool;
    fn execute_outbound_queue(&mut self);
}

/// Adapter for embedding the executive with no real world: an empty
/// outbound queue and a caller-supplied clock. Useful for tests and
/// single-shot in-process use.
#[derive(Debug, Default)]
pub struct NullWorldAdapter {
    pub now: Time,
    pub cycle_count: u64,
}

impl WorldAdapter for NullWorldAdapter {
    fn current_time(&self) -> Time {
        self.now
    }
    fn increment_cycle_count(&mut self) {
        self.cycle_count += 1;
    }
    fn outbound_queue_empty(&self) -> bool {
        true
    }
    fn execute_outbound_queue(&mut self) {}
}

pub struct Executive {
    arena: NodeArena,
    roots: Vec<NodeHandle>,
    candidate_queue: VecDeque<NodeHandle>,
    transition_queue: VecDeque<NodeHandle>,
    assignment_execute_queue: VecDeque<NodeHandle>,
    assignment_retract_queue: VecDeque<NodeHandle>,
    finished_root_queue: VecDeque<NodeHandle>,
    conflict_pool: ConflictSetPool,
    variables_to_retract: Vec<ExprId>,
    listener: Option<Box<dyn ExecListener>>,
    cycle_count: u64,
    in_step: bool,
}

impl Default for Executive {
    fn default() -> Self {
        Self::new()
    }
}

impl Executive {
    pub fn new() -> Self {
        Executive {
            arena: NodeArena::new(),
            roots: Vec::new(),
            candidate_queue: VecDeque::new(),
            transition_queue: VecDeque::new(),
            assignment_execute_queue: VecDeque::new(),
            assignment_retract_queue: VecDeque::new(),
            finished_root_queue: VecDeque::new(),
            conflict_pool: ConflictSetPool::new(),
            variables_to_retract: Vec::new(),
            listener: None,
            cycle_count: 0,
            in_step: false,
        }
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut NodeArena {
        &mut self.arena
    }

    pub fn set_exec_listener(&mut self, listener: Option<Box<dyn ExecListener>>) {
        self.listener = listener;
    }

    pub fn has_exec_listener(&self) -> bool {
        self.listener.is_some()
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Attaches a new root: activates its always-owned conditions and
    /// queues it as an initial candidate. Returns `false` if the root
    /// already has a parent (not a valid root).
    pub fn add_plan(&mut self, root: NodeHandle, store: &mut dyn VariableStore) -> bool {
        if self.arena.get(root).parent.is_some() {
            return false;
        }
        self.roots.push(root);
        self.enqueue_candidate(root, store);
        true
    }

    pub fn needs_step(&self) -> bool {
        !self.candidate_queue.is_empty()
    }

    pub fn all_plans_finished(&self) -> bool {
        self.roots
            .iter()
            .all(|&r| self.arena.try_get(r).map(|n| n.state == NodeState::Finished).unwrap_or(true))
    }

    /// Releases storage for every finished root currently queued for
    /// deletion.
    pub fn delete_finished_plans(&mut self) {
        while let Some(root) = self.finished_root_queue.pop_front() {
            self.roots.retain(|&r| r != root);
            self.arena.remove_subtree(root);
        }
    }

    fn enqueue_candidate(&mut self, node: NodeHandle, _store: &mut dyn VariableStore) {
        let status = self.arena.get(node).queue_status;
        match status.enqueue_candidate(node) {
            Ok(new_status) => {
                let was_queued = matches!(status, QueueStatus::Check | QueueStatus::TransitionCheck);
                self.arena.get_mut(node).queue_status = new_status;
                if new_status == QueueStatus::Check && !was_queued {
                    self.candidate_queue.push_back(node);
                }
            }
            Err(e) => {
                warn!(?e, "dropping illegal candidate re-enqueue");
            }
        }
    }

    /// External ingress point: the variable-store collaborator calls this
    /// when a subscribed expression's truth value may have changed.
    pub fn notify_node_condition_changed(&mut self, node: NodeHandle, store: &mut dyn VariableStore) {
        self.enqueue_candidate(node, store);
    }

    pub fn remove_node_from_consideration(&mut self, node: NodeHandle) {
        self.candidate_queue.retain(|&n| n != node);
        self.transition_queue.retain(|&n| n != node);
        self.arena.get_mut(node).queue_status = QueueStatus::None;
    }

    pub fn enqueue_assignment(&mut self, node: NodeHandle) {
        self.assignment_execute_queue.push_back(node);
    }

    /// Resolves to `store.base_variable(...)`, not the raw destination
    /// expression: two assignment proposals contend (and a retraction beats
    /// a pending execution) iff their destinations share a base variable,
    /// not iff they are the identical `ExprId`.
    pub fn enqueue_assignment_for_retraction(&mut self, node: NodeHandle, store: &dyn VariableStore) {
        if let Some(var) = self.arena.get(node).assignment_variable {
            self.variables_to_retract.push(store.base_variable(var));
        }
        self.assignment_retract_queue.push_back(node);
    }

    pub fn mark_root_node_finished(&mut self, node: NodeHandle) {
        self.finished_root_queue.push_back(node);
    }

    /// Adds or removes an `Assignment` node from its target variable's
    /// conflict set as its staged destination enters or leaves
    /// contention, mirroring `PlexilExec::handleConditionsChanged`. Keyed
    /// by `store.base_variable(...)` so two destinations that alias the
    /// same underlying assignable are recognized as contending for it.
    fn handle_conditions_changed(&mut self, node: NodeHandle, store: &dyn VariableStore) {
        let n = self.arena.get(node);
        if n.node_type != NodeType::Assignment {
            return;
        }
        let Some(dest) = n.assignment_variable else { return };
        let Some(staged) = n.staged else { return };
        let priority = n.priority;
        let var = store.base_variable(dest);

        match staged.next_state {
            NodeState::Executing => {
                self.conflict_pool.entry(var).push(node, priority);
            }
            NodeState::Failing | NodeState::IterationEnded | NodeState::Finished => {
                let was_present = self.conflict_pool.get(var).is_some();
                if was_present {
                    self.conflict_pool.entry(var).remove(node);
                    if staged.next_state == NodeState::Failing {
                        self.variables_to_retract.push(var);
                    }
                    self.conflict_pool.release_if_empty(var);
                }
            }
            _ => {}
        }
    }

    /// One macro step: drain candidates, resolve contention, apply
    /// transitions, repeat until stable, then flush assignments and the
    /// outbound queue.
    pub fn step(
        &mut self,
        now: Time,
        store: &mut dyn VariableStore,
        world: &mut dyn WorldAdapter,
    ) -> StepResult<()> {
        if self.in_step {
            return Err(PlanError::Reentrant);
        }
        self.in_step = true;
        let result = self.step_inner(now, store, world);
        self.in_step = false;
        result
    }

    fn step_inner(
        &mut self,
        now: Time,
        store: &mut dyn VariableStore,
        world: &mut dyn WorldAdapter,
    ) -> StepResult<()> {
        loop {
            // 1. Drain candidates; compute destinations.
            while let Some(node) = self.candidate_queue.pop_front() {
                let new_status = self.arena.get(node).queue_status.dequeue();
                self.arena.get_mut(node).queue_status = new_status;
                let dest = compute_next_state(node, &self.arena, &*store);
                let Some(staged) = dest else { continue };
                if staged.next_state == self.arena.get(node).state {
                    continue;
                }
                self.arena.get_mut(node).staged = Some(staged);
                self.handle_conditions_changed(node, &*store);

                // An assignment proposing to enter EXECUTING contends for its
                // destination variable; its promotion onto the transition
                // queue is decided below, not here. Every other staged
                // transition (including this same node staging FAILING) is
                // uncontended and can be queued immediately.
                let contends_for_variable =
                    self.arena.get(node).node_type == NodeType::Assignment && staged.next_state == NodeState::Executing;
                if contends_for_variable {
                    continue;
                }

                let status = self.arena.get(node).queue_status;
                match status.enqueue_transition(node) {
                    Ok(new_status) => {
                        self.arena.get_mut(node).queue_status = new_status;
                        self.transition_queue.push_back(node);
                    }
                    Err(e) => return Err(e),
                }
            }

            // 2. Resolve contention over every active conflict set.
            let vars: Vec<ExprId> = self.conflict_pool.iter().map(|(v, _)| *v).collect();
            for var in vars {
                self.resolve_one(var)?;
            }

            if self.transition_queue.is_empty() {
                break;
            }

            // 3. Apply transitions in FIFO order, batching for the listener.
            let mut batch = Vec::new();
            while let Some(node) = self.transition_queue.pop_front() {
                let new_status = self.arena.get(node).queue_status.dequeue();
                self.arena.get_mut(node).queue_status = new_status;
                // `TransitionCheck -> Check`: the node picked up a fresh
                // candidate mark while still on the transition queue; the
                // re-candidacy was deferred (queue.rs) and must be honored
                // now by actually placing it back on the candidate queue.
                if new_status == QueueStatus::Check {
                    self.candidate_queue.push_back(node);
                }
                let previous_state = self.arena.get(node).state;
                self.apply_transition(node, now, store);
                batch.push(NodeTransition {
                    node,
                    previous_state,
                });
            }
            if let Some(listener) = self.listener.as_mut() {
                listener.notify_of_transitions(&batch);
            }
            debug!(cycle = self.cycle_count, transitions = batch.len(), "published quiescence cycle");

            if self.candidate_queue.is_empty()
                && self.assignment_execute_queue.is_empty()
                && self.assignment_retract_queue.is_empty()
                && !world.outbound_queue_empty()
            {
                break;
            }
        }

        // 4. External-visible side effects.
        self.cycle_count += 1;
        world.increment_cycle_count();
        while let Some(node) = self.assignment_execute_queue.pop_front() {
            self.run_assignment_execute(node, store);
        }
        while let Some(node) = self.assignment_retract_queue.pop_front() {
            self.run_assignment_retract(node, store);
        }
        self.variables_to_retract.clear();
        world.execute_outbound_queue();
        Ok(())
    }

    fn run_assignment_execute(&mut self, node: NodeHandle, store: &mut dyn VariableStore) {
        let n = self.arena.get_mut(node);
        let Some(assignment) = n.assignment.as_mut() else { return };
        let value = assignment.execute(store);
        let dest = assignment.dest();
        self.enqueue_candidate(node, store);
        if let Some(listener) = self.listener.as_mut() {
            listener.notify_of_assignment(dest, &self.arena.get(node).id, &value);
        }
    }

    fn run_assignment_retract(&mut self, node: NodeHandle, store: &mut dyn VariableStore) {
        let n = self.arena.get_mut(node);
        let Some(assignment) = n.assignment.as_mut() else { return };
        let value = assignment.retract(store);
        let dest = assignment.dest();
        self.enqueue_candidate(node, store);
        if let Some(listener) = self.listener.as_mut() {
            listener.notify_of_assignment(dest, &self.arena.get(node).id, &value);
        }
    }

    /// `resolveOne`: step 1 of the source's two-step contention check —
    /// bail if a pending retraction already decided this variable's
    /// outcome this cycle, otherwise promote the winner(s) of the tie
    /// group at the head of the conflict set.
    fn resolve_one(&mut self, var: ExprId) -> StepResult<()> {
        if self.variables_to_retract.iter().any(|&v| v == var) {
            return Ok(());
        }
        let (k, tie_group): (usize, Vec<NodeHandle>) = match self.conflict_pool.get(var) {
            Some(set) => (set.front_count(), set.tie_group().collect()),
            None => return Ok(()),
        };
        if k == 0 {
            return Ok(());
        }
        if k == 1 {
            let winner = tie_group[0];
            self.promote_if_contending(winner)?;
            return Ok(());
        }

        // k > 1: at most one tied proposer may still be *entering*
        // Executing; others already Failing/Executing ride along.
        let mut entering_executing = Vec::new();
        for &node in &tie_group {
            if let Some(staged) = self.arena.get(node).staged {
                if staged.next_state == NodeState::Executing {
                    entering_executing.push(node);
                }
            }
        }
        if entering_executing.len() > 1 {
            let a = entering_executing[0];
            let b = entering_executing[1];
            let priority = self.arena.get(a).priority;
            return Err(PlanError::PriorityConflict { a, b, priority });
        }
        for &node in &tie_group {
            self.promote_if_contending(node)?;
        }
        Ok(())
    }

    fn promote_if_contending(&mut self, node: NodeHandle) -> StepResult<()> {
        let Some(staged) = self.arena.get(node).staged else { return Ok(()) };
        if !matches!(staged.next_state, NodeState::Executing | NodeState::Failing) {
            return Ok(());
        }
        let status = self.arena.get(node).queue_status;
        if status.is_queued() && matches!(status, QueueStatus::Transition | QueueStatus::TransitionCheck) {
            return Ok(()); // already promoted
        }
        let new_status = status.enqueue_transition(node)?;
        self.arena.get_mut(node).queue_status = new_status;
        self.transition_queue.push_back(node);
        Ok(())
    }

    /// Applies a staged transition: stamps timepoints, runs the
    /// (state, type) entry/exit hooks that (de)activate conditions, and
    /// enqueues newly-eligible candidates (children entering Waiting, a
    /// repeating List's children resetting to Inactive, and so on).
    fn apply_transition(&mut self, handle: NodeHandle, now: Time, store: &mut dyn VariableStore) {
        let staged = self
            .arena
            .get_mut(handle)
            .staged
            .take()
            .expect("apply_transition called without a staged transition");
        let old_state = self.arena.get(handle).state;
        let node_type = self.arena.get(handle).node_type;

        self.leave_state(handle, old_state, staged.next_state, node_type, store);

        {
            let node = self.arena.get_mut(handle);
            node.state = staged.next_state;
            node.outcome = staged.next_outcome;
            node.failure_type = staged.next_failure_type;
            node.timepoints.record(old_state, true, now);
            node.timepoints.record(staged.next_state, false, now);
        }

        self.enter_state(handle, staged.next_state, node_type, store);

        if staged.next_state == NodeState::Finished && self.arena.get(handle).is_root() {
            self.mark_root_node_finished(handle);
        }

        info!(
            node = %self.arena.get(handle).id,
            from = ?old_state,
            to = ?staged.next_state,
            outcome = ?staged.next_outcome,
            "node transition"
        );
    }

    fn leave_state(
        &mut self,
        handle: NodeHandle,
        state: NodeState,
        next_state: NodeState,
        node_type: NodeType,
        store: &mut dyn VariableStore,
    ) {
        match state {
            NodeState::Waiting => {
                let node = self.arena.get_mut(handle);
                node.conditions.deactivate(ConditionKind::Skip, store);
                node.conditions.deactivate(ConditionKind::Start, store);
                node.conditions.deactivate(ConditionKind::Pre, store);
            }
            NodeState::Executing => {
                let node = self.arena.get_mut(handle);
                node.conditions.deactivate(ConditionKind::Invariant, store);
                node.conditions.deactivate(ConditionKind::End, store);
                node.conditions.deactivate(ConditionKind::Post, store);
                // Exit stays active through Finishing/Failing for types that have them.
                if !node_type.has_finishing_and_failing() {
                    node.conditions.deactivate(ConditionKind::Exit, store);
                }
                // An Assignment node that completes without ever entering
                // Failing releases its RHS/LHS activation here; one that
                // enters Failing keeps them active until the abort
                // resolves (see the Failing arm below).
                if node_type == NodeType::Assignment && next_state != NodeState::Failing {
                    if let Some(a) = node.assignment.as_mut() {
                        a.deactivate(store);
                    }
                }
            }
            NodeState::Finishing => {
                let node = self.arena.get_mut(handle);
                if node_type == NodeType::Command || node_type == NodeType::Update {
                    node.conditions.deactivate(ConditionKind::ActionComplete, store);
                }
                node.conditions.deactivate(ConditionKind::Exit, store);
            }
            NodeState::Failing => {
                let node = self.arena.get_mut(handle);
                if node_type == NodeType::Command || node_type == NodeType::Update {
                    node.conditions.deactivate(ConditionKind::AbortComplete, store);
                }
                if node_type == NodeType::Assignment {
                    if let Some(a) = node.assignment.as_mut() {
                        a.deactivate(store);
                    }
                }
            }
            NodeState::IterationEnded => {
                let node = self.arena.get_mut(handle);
                node.conditions.deactivate(ConditionKind::Repeat, store);
            }
            NodeState::Inactive | NodeState::Finished => {}
        }
    }

    fn enter_state(&mut self, handle: NodeHandle, state: NodeState, node_type: NodeType, store: &mut dyn VariableStore) {
        match state {
            NodeState::Waiting => {
                let node = self.arena.get_mut(handle);
                node.conditions.activate(ConditionKind::Skip, store);
                node.conditions.activate(ConditionKind::Start, store);
                node.conditions.activate(ConditionKind::Pre, store);
                node.conditions.activate(ConditionKind::Exit, store);
                self.enqueue_candidate(handle, store);

                // Cascades the source's "Finished -> Inactive" rule: this
                // node's children (if any) must restart from Inactive.
                let children = self.arena.get(handle).children.clone();
                for child in children {
                    let c = self.arena.get_mut(child);
                    if c.state == NodeState::Finished {
                        c.state = NodeState::Inactive;
                        c.reset_for_new_iteration();
                    }
                    self.enqueue_candidate(child, store);
                }
            }
            NodeState::Executing => {
                let node = self.arena.get_mut(handle);
                node.conditions.activate(ConditionKind::Invariant, store);
                node.conditions.activate(ConditionKind::End, store);
                node.conditions.activate(ConditionKind::Post, store);
                if node_type == NodeType::Assignment {
                    // `ack` lives on the Assignment record, not a store
                    // condition slot (see node::transitions).
                    if let Some(a) = node.assignment.take() {
                        let mut a = a;
                        a.activate(store);
                        a.fix_value(store);
                        node.assignment = Some(a);
                        self.enqueue_assignment(handle);
                    }
                }
                self.enqueue_candidate(handle, store);
                let children = self.arena.get(handle).children.clone();
                for child in children {
                    self.enqueue_candidate(child, store);
                }
            }
            NodeState::Finishing => {
                let node = self.arena.get_mut(handle);
                if node_type == NodeType::Command || node_type == NodeType::Update {
                    node.conditions.activate(ConditionKind::ActionComplete, store);
                }
                self.enqueue_candidate(handle, store);
            }
            NodeState::Failing => {
                let node = self.arena.get_mut(handle);
                match node_type {
                    NodeType::Assignment => {
                        self.enqueue_assignment_for_retraction(handle, &*store);
                    }
                    NodeType::Command | NodeType::Update => {
                        node.conditions.activate(ConditionKind::AbortComplete, store);
                    }
                    _ => {}
                }
                self.enqueue_candidate(handle, store);
            }
            NodeState::IterationEnded => {
                let node = self.arena.get_mut(handle);
                node.conditions.activate(ConditionKind::Repeat, store);
                self.enqueue_candidate(handle, store);
            }
            NodeState::Finished => {
                self.enqueue_candidate(handle, store);
                let parent = self.arena.get(handle).parent;
                if let Some(parent) = parent {
                    self.enqueue_candidate(parent, store);
                }
                // A child that never saw this node reach Executing (e.g. this
                // node skipped straight Waiting->Finished) is still parked in
                // Inactive with no active condition to wake it; re-check it
                // now that `from_inactive`'s parent-state gate can resolve to
                // Finished/Skipped.
                let children = self.arena.get(handle).children.clone();
                for child in children {
                    if self.arena.get(child).state == NodeState::Inactive {
                        self.enqueue_candidate(child, store);
                    }
                }
            }
            NodeState::Inactive => {
                self.enqueue_candidate(handle, store);
            }
        }
    }
}

/// Convenience constructor for a freshly-allocated, unparented node.
pub fn new_node(arena: &mut NodeArena, id: impl Into<String>, node_type: NodeType, parent: Option<NodeHandle>) -> NodeHandle {
    arena.insert(Node::new(id, node_type, parent))
}

/// Attaches an `Assignment` record to an `Assignment`-typed node and
/// registers its destination as the variable it contends for.
pub fn attach_assignment(arena: &mut NodeArena, node: NodeHandle, dest: ExprId, rhs: ExprId) {
    let n = arena.get_mut(node);
    debug_assert_eq!(n.node_type, NodeType::Assignment);
    n.assignment = Some(Assignment::new(dest, rhs));
    n.assignment_variable = Some(dest);
    // ActionComplete/AbortComplete for an Assignment node are read off the
    // Assignment record's own `ack`/`abort_complete` fields (see
    // node::transitions), not through a store-backed condition slot.
}

pub fn root_handles(exec: &Executive) -> &[NodeHandle] {
    &exec.roots
}
