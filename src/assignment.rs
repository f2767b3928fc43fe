//! The assignment record: a (destination, value-expression) pair with
//! `ack`/`abortComplete` observables, executed or retracted once per
//! macro-step at the scheduler's queue-drain boundary.

use crate::variable::{ExprId, Value, VariableStore};

/// Owned only by its enclosing `Assignment`-typed node. `ack` and
/// `abort_complete` are plain booleans rather than store-backed
/// expressions: they are intrinsic to the assignment record itself,
/// mirroring the reference implementation's dedicated observable
/// sub-variables, and feed the node's `ActionComplete`/`AbortComplete`
/// condition slots directly.
pub struct Assignment {
    dest: ExprId,
    rhs: ExprId,
    value: Value,
    ack: bool,
    abort_complete: bool,
}

impl Assignment {
    pub fn new(dest: ExprId, rhs: ExprId) -> Self {
        Assignment {
            dest,
            rhs,
            value: Value::Unknown,
            ack: false,
            abort_complete: false,
        }
    }

    pub fn dest(&self) -> ExprId {
        self.dest
    }

    pub fn ack(&self) -> bool {
        self.ack
    }

    pub fn abort_complete(&self) -> bool {
        self.abort_complete
    }

    pub fn activate(&self, store: &mut dyn VariableStore) {
        store.activate(self.rhs);
        store.activate(self.dest);
    }

    pub fn deactivate(&mut self, store: &mut dyn VariableStore) {
        store.deactivate(self.rhs);
        store.deactivate(self.dest);
        self.value = Value::Unknown;
        self.ack = false;
        self.abort_complete = false;
    }

    /// Snapshots the destination's current value (for later restoration)
    /// and captures the RHS value into the record.
    pub fn fix_value(&mut self, store: &mut dyn VariableStore) {
        store.save_current_value(self.dest);
        self.value = store.get_value(self.rhs);
    }

    /// Writes the captured value and asserts `ack`. Returns the value
    /// written, for the listener's `notifyOfAssignment` payload.
    pub fn execute(&mut self, store: &mut dyn VariableStore) -> Value {
        store.set_value(self.dest, self.value.clone());
        self.ack = true;
        self.value.clone()
    }

    /// Restores the destination to its pre-assignment value and asserts
    /// `abortComplete`. Returns the restored value for the listener.
    pub fn retract(&mut self, store: &mut dyn VariableStore) -> Value {
        store.restore_saved_value(self.dest);
        self.abort_complete = true;
        store.get_value(self.dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::variable::TriBool;

    struct FakeStore {
        values: HashMap<ExprId, Value>,
        saved: HashMap<ExprId, Value>,
        active: HashMap<ExprId, u32>,
    }

    impl FakeStore {
        fn new() -> Self {
            FakeStore { values: HashMap::new(), saved: HashMap::new(), active: HashMap::new() }
        }
    }

    impl VariableStore for FakeStore {
        fn activate(&mut self, expr: ExprId) {
            *self.active.entry(expr).or_insert(0) += 1;
        }
        fn deactivate(&mut self, expr: ExprId) {
            if let Some(c) = self.active.get_mut(&expr) {
                *c = c.saturating_sub(1);
            }
        }
        fn get_tribool(&self, expr: ExprId) -> TriBool {
            match self.values.get(&expr) {
                Some(v) => v.as_tribool(),
                None => TriBool::Unknown,
            }
        }
        fn get_value(&self, expr: ExprId) -> Value {
            self.values.get(&expr).cloned().unwrap_or(Value::Unknown)
        }
        fn set_value(&mut self, expr: ExprId, value: Value) {
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
    }

    #[test]
    fn retract_restores_prior_value_byte_for_byte() {
        let dest = ExprId(1);
        let rhs = ExprId(2);
        let mut store = FakeStore::new();
        store.set_value(dest, Value::Integer(5));
        store.set_value(rhs, Value::Integer(9));

        let mut assn = Assignment::new(dest, rhs);
        assn.activate(&mut store);
        assn.fix_value(&mut store);
        assn.execute(&mut store);
        assert_eq!(store.get_value(dest), Value::Integer(9));
        assert!(assn.ack());

        assn.retract(&mut store);
        assert_eq!(store.get_value(dest), Value::Integer(5));
        assert!(assn.abort_complete());
    }
}
