//! The per-node condition lattice: up to 13 tri-valued slots, three of
//! which are read-through references to the parent's `Exit`/`Invariant`/`End`
//! slots rather than owned state.

use crate::variable::{ExprId, TriBool, VariableStore};

/// The ten slots a node may own directly. The three ancestor slots
/// (`AncestorExit`, `AncestorInvariant`, `AncestorEnd`) are not represented
/// here: they are never owned, never activated locally, and are read via
/// [`Conditions::ancestor_exit`] and friends on the *child's* `Conditions`,
/// which dereference the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    Skip,
    Start,
    Pre,
    Exit,
    Invariant,
    End,
    Post,
    Repeat,
    ActionComplete,
    AbortComplete,
}

const SLOT_COUNT: usize = 10;

fn slot_index(kind: ConditionKind) -> usize {
    kind as usize
}

/// One condition slot: either empty, a reference to an externally-owned
/// expression, or an expression this node owns and must eventually
/// release (the `owned` flag mirrors the source's `m_garbageConditions`).
#[derive(Debug, Clone, Copy)]
pub struct ConditionSlot {
    pub expr: ExprId,
    pub owned: bool,
    active: bool,
}

#[derive(Debug, Default)]
pub struct Conditions {
    slots: [Option<ConditionSlot>; SLOT_COUNT],
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, kind: ConditionKind, expr: ExprId, owned: bool) {
        self.slots[slot_index(kind)] = Some(ConditionSlot {
            expr,
            owned,
            active: false,
        });
    }

    pub fn has(&self, kind: ConditionKind) -> bool {
        self.slots[slot_index(kind)].is_some()
    }

    pub fn expr(&self, kind: ConditionKind) -> Option<ExprId> {
        self.slots[slot_index(kind)].map(|s| s.expr)
    }

    pub fn activate(&mut self, kind: ConditionKind, store: &mut dyn VariableStore) {
        if let Some(slot) = self.slots[slot_index(kind)].as_mut() {
            if !slot.active {
                slot.active = true;
                store.activate(slot.expr);
            }
        }
    }

    pub fn deactivate(&mut self, kind: ConditionKind, store: &mut dyn VariableStore) {
        if let Some(slot) = self.slots[slot_index(kind)].as_mut() {
            if slot.active {
                slot.active = false;
                store.deactivate(slot.expr);
            }
        }
    }

    pub fn is_active(&self, kind: ConditionKind) -> bool {
        self.slots[slot_index(kind)]
            .map(|s| s.active)
            .unwrap_or(false)
    }

    /// Reads a slot's tri-valued truth. Absent slots read as `True` for
    /// `Skip`/`Start`/`Pre`-style "no condition means don't block" slots is
    /// *not* assumed here: callers decide the absent-slot default per the
    /// transition table, since the default differs by slot (e.g. an absent
    /// `End` defaults to true — "finish immediately" — while an absent
    /// `Invariant` defaults to true as well, but an absent `Repeat`
    /// defaults to false).
    pub fn value(&self, kind: ConditionKind, store: &dyn VariableStore) -> Option<TriBool> {
        self.slots[slot_index(kind)].map(|s| store.get_tribool(s.expr))
    }
}
