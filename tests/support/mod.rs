//! Shared test doubles for the scenario and invariant tests: an in-memory
//! `VariableStore` and a manually-advanced `WorldAdapter`, matching
//! SPEC_FULL.md's `tests/support/` plan (`FakeStore`, `FakeWorld`).

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use planexec::{ExecListener, ExprId, NodeTransition, Time, TriBool, Value, VariableStore, WorldAdapter};

/// Installs a `tracing_subscriber` fmt layer honoring `RUST_LOG`, so the
/// `debug!`/`info!`/`warn!` events `Executive::step` emits are visible when
/// a test is run with `--nocapture`. `try_init` is safe to call once per
/// test binary invocation; subsequent calls (every other test in the same
/// binary constructing a `FakeStore`) are harmless no-ops.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A `HashMap`-backed variable store. Boolean/integer values are set
/// directly; `set_bool_sequence` lets a test drive a condition through a
/// scripted series of readings (e.g. true once, then false), which is the
/// only way to observe a value changing *within* a single macro step since
/// the quiescence loop does not hand control back to the caller between
/// candidate-drain cycles.
#[derive(Default)]
pub struct FakeStore {
    values: HashMap<ExprId, Value>,
    saved: HashMap<ExprId, Value>,
    active: HashMap<ExprId, i32>,
    sequences: RefCell<HashMap<ExprId, VecDeque<bool>>>,
    /// Maps an aliasing destination expression to the base variable it
    /// actually writes through, e.g. two distinct array-element references
    /// into the same underlying array. Absent entries are their own base.
    aliases: HashMap<ExprId, ExprId>,
    pub writes: Vec<(ExprId, Value)>,
}

impl FakeStore {
    pub fn new() -> Self {
        init_tracing();
        Self::default()
    }

    /// Declares that `expr` writes through `base` rather than itself, for
    /// tests exercising `VariableStore::base_variable` conflict arbitration.
    pub fn alias(&mut self, expr: ExprId, base: ExprId) {
        self.aliases.insert(expr, base);
    }

    pub fn set_bool(&mut self, expr: ExprId, b: bool) {
        self.values.insert(expr, Value::Boolean(b));
    }

    pub fn set_int(&mut self, expr: ExprId, v: i64) {
        self.values.insert(expr, Value::Integer(v));
    }

    pub fn get_int(&self, expr: ExprId) -> Option<i64> {
        match self.values.get(&expr) {
            Some(Value::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    /// Each read of `expr` consumes the next entry in `seq`; once only one
    /// entry remains it sticks for every subsequent read.
    pub fn set_bool_sequence(&mut self, expr: ExprId, seq: Vec<bool>) {
        self.sequences.borrow_mut().insert(expr, seq.into_iter().collect());
    }

    pub fn is_active(&self, expr: ExprId) -> bool {
        self.active.get(&expr).copied().unwrap_or(0) > 0
    }
}

impl VariableStore for FakeStore {
    fn activate(&mut self, expr: ExprId) {
        *self.active.entry(expr).or_insert(0) += 1;
    }

    fn deactivate(&mut self, expr: ExprId) {
        if let Some(c) = self.active.get_mut(&expr) {
            *c -= 1;
        }
    }

    fn get_tribool(&self, expr: ExprId) -> TriBool {
        {
            let mut sequences = self.sequences.borrow_mut();
            if let Some(seq) = sequences.get_mut(&expr) {
                if seq.len() > 1 {
                    return TriBool::from(seq.pop_front().unwrap());
                } else if let Some(&last) = seq.front() {
                    return TriBool::from(last);
                }
            }
        }
        match self.values.get(&expr) {
            Some(v) => v.as_tribool(),
            None => TriBool::Unknown,
        }
    }

    fn get_value(&self, expr: ExprId) -> Value {
        self.values.get(&expr).cloned().unwrap_or(Value::Unknown)
    }

    fn set_value(&mut self, expr: ExprId, value: Value) {
        self.writes.push((expr, value.clone()));
        self.values.insert(expr, value);
    }

    fn save_current_value(&mut self, expr: ExprId) {
        let v = self.get_value(expr);
        self.saved.insert(expr, v);
    }

    fn restore_saved_value(&mut self, expr: ExprId) {
        if let Some(v) = self.saved.remove(&expr) {
            self.values.insert(expr, v);
        }
    }

    fn base_variable(&self, expr: ExprId) -> ExprId {
        self.aliases.get(&expr).copied().unwrap_or(expr)
    }
}

/// A `WorldAdapter` test double: a caller-advanced clock and an always-empty
/// outbound queue (none of the scenario tests exercise command dispatch).
#[derive(Debug, Default)]
pub struct FakeWorld {
    pub now: Time,
    pub cycle_count: u64,
}

impl FakeWorld {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorldAdapter for FakeWorld {
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

/// Records every transition batch and assignment notification it is sent,
/// for tests that assert on listener fan-out ordering. Backed by a shared
/// cell so a test can keep a handle after the `Box<dyn ExecListener>` has
/// been moved into the executive.
#[derive(Default)]
pub struct RecordingListener {
    pub batches: Rc<RefCell<Vec<Vec<NodeTransition>>>>,
    pub assignments: Rc<RefCell<Vec<(ExprId, String, Value)>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> RecordingListener {
        RecordingListener {
            batches: Rc::clone(&self.batches),
            assignments: Rc::clone(&self.assignments),
        }
    }

    pub fn batches(&self) -> Vec<Vec<NodeTransition>> {
        self.batches.borrow().clone()
    }
}

impl ExecListener for RecordingListener {
    fn notify_of_transitions(&mut self, batch: &[NodeTransition]) {
        self.batches.borrow_mut().push(batch.to_vec());
    }

    fn notify_of_assignment(&mut self, dest: ExprId, dest_name: &str, value: &Value) {
        self.assignments
            .borrow_mut()
            .push((dest, dest_name.to_string(), value.clone()));
    }
}

/// Steps the executive until no candidate remains, bailing out after
/// `max_steps` to fail loudly instead of looping forever on a stuck test.
pub fn run_to_quiescence(
    exec: &mut planexec::Executive,
    store: &mut FakeStore,
    world: &mut FakeWorld,
    max_steps: usize,
) {
    for _ in 0..max_steps {
        if !exec.needs_step() {
            return;
        }
        exec.step(world.now, store, world).expect("step failed");
    }
    panic!("did not reach quiescence within {} steps", max_steps);
}
