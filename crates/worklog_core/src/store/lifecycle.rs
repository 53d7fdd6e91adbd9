//! Object lifecycle state machine and reference counting.
//!
//! # Invariants
//! - `New` and `Old` objects have `reference_count == 0`.
//! - `Managed` objects have `reference_count > 0`.
//! - `is_live` flips from `true` to `false` exactly once.
//! - Illegal transitions are reported, never applied.

use log::error;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Reference-count driven state of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectState {
    /// Constructed, never referenced.
    New,
    /// Held by at least one edge or external holder.
    Managed,
    /// Unreferenced again.
    Old,
}

/// Rejected lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleViolation {
    ReferenceOverflow,
    ReleaseWithoutReference(ObjectState),
    AlreadyDead,
}

impl Display for LifecycleViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReferenceOverflow => write!(f, "reference count overflow"),
            Self::ReleaseWithoutReference(state) => {
                write!(f, "reference released in state {state:?}")
            }
            Self::AlreadyDead => write!(f, "object is already dead"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    state: ObjectState,
    reference_count: u32,
    is_live: bool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: ObjectState::New,
            reference_count: 0,
            is_live: true,
        }
    }

    pub fn state(&self) -> ObjectState {
        self.state
    }

    pub fn reference_count(&self) -> u32 {
        self.reference_count
    }

    pub fn is_live(&self) -> bool {
        self.is_live
    }

    pub fn try_add_reference(&mut self) -> Result<(), LifecycleViolation> {
        match self.state {
            ObjectState::New | ObjectState::Old => {
                self.state = ObjectState::Managed;
                self.reference_count = 1;
            }
            ObjectState::Managed => {
                self.reference_count = self
                    .reference_count
                    .checked_add(1)
                    .ok_or(LifecycleViolation::ReferenceOverflow)?;
            }
        }
        Ok(())
    }

    pub fn try_remove_reference(&mut self) -> Result<(), LifecycleViolation> {
        match self.state {
            ObjectState::Managed if self.reference_count > 1 => {
                self.reference_count -= 1;
            }
            ObjectState::Managed => {
                self.state = ObjectState::Old;
                self.reference_count = 0;
            }
            other => return Err(LifecycleViolation::ReleaseWithoutReference(other)),
        }
        Ok(())
    }

    pub fn try_mark_dead(&mut self) -> Result<(), LifecycleViolation> {
        if !self.is_live {
            return Err(LifecycleViolation::AlreadyDead);
        }
        self.is_live = false;
        Ok(())
    }

    /// Adds a reference; a violation trips a debug assertion and is otherwise ignored.
    pub fn add_reference(&mut self) {
        if let Err(violation) = self.try_add_reference() {
            report(violation);
        }
    }

    /// Releases a reference; a violation trips a debug assertion and is otherwise ignored.
    pub fn remove_reference(&mut self) {
        if let Err(violation) = self.try_remove_reference() {
            report(violation);
        }
    }

    pub fn mark_dead(&mut self) {
        if let Err(violation) = self.try_mark_dead() {
            report(violation);
        }
    }

    /// Dead and unreferenced: the slot may be deallocated.
    pub fn is_collectable(&self) -> bool {
        !self.is_live && self.reference_count == 0
    }

    pub fn is_consistent(&self) -> bool {
        match self.state {
            ObjectState::New | ObjectState::Old => self.reference_count == 0,
            ObjectState::Managed => self.reference_count > 0,
        }
    }
}

fn report(violation: LifecycleViolation) {
    error!("event=lifecycle_violation module=store status=error violation={violation}");
    debug_assert!(false, "lifecycle violation: {violation}");
}

#[cfg(test)]
mod tests {
    use super::{Lifecycle, LifecycleViolation, ObjectState};

    #[test]
    fn new_object_is_live_and_unreferenced() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), ObjectState::New);
        assert_eq!(lifecycle.reference_count(), 0);
        assert!(lifecycle.is_live());
        assert!(lifecycle.is_consistent());
    }

    #[test]
    fn references_cycle_through_managed_and_old() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.try_add_reference().unwrap();
        assert_eq!(lifecycle.state(), ObjectState::Managed);
        lifecycle.try_add_reference().unwrap();
        assert_eq!(lifecycle.reference_count(), 2);

        lifecycle.try_remove_reference().unwrap();
        assert_eq!(lifecycle.state(), ObjectState::Managed);
        lifecycle.try_remove_reference().unwrap();
        assert_eq!(lifecycle.state(), ObjectState::Old);
        assert_eq!(lifecycle.reference_count(), 0);

        lifecycle.try_add_reference().unwrap();
        assert_eq!(lifecycle.state(), ObjectState::Managed);
        assert_eq!(lifecycle.reference_count(), 1);
        assert!(lifecycle.is_consistent());
    }

    #[test]
    fn releasing_unreferenced_object_is_rejected_without_change() {
        let mut lifecycle = Lifecycle::new();
        assert_eq!(
            lifecycle.try_remove_reference(),
            Err(LifecycleViolation::ReleaseWithoutReference(ObjectState::New))
        );
        assert_eq!(lifecycle, Lifecycle::new());

        lifecycle.try_add_reference().unwrap();
        lifecycle.try_remove_reference().unwrap();
        assert_eq!(
            lifecycle.try_remove_reference(),
            Err(LifecycleViolation::ReleaseWithoutReference(ObjectState::Old))
        );
        assert_eq!(lifecycle.state(), ObjectState::Old);
    }

    #[test]
    fn overflow_is_rejected_without_change() {
        let mut lifecycle = Lifecycle {
            state: ObjectState::Managed,
            reference_count: u32::MAX,
            is_live: true,
        };
        assert_eq!(
            lifecycle.try_add_reference(),
            Err(LifecycleViolation::ReferenceOverflow)
        );
        assert_eq!(lifecycle.reference_count(), u32::MAX);
    }

    #[test]
    fn death_is_one_way_and_collectable_only_when_unreferenced() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.try_add_reference().unwrap();
        lifecycle.try_mark_dead().unwrap();
        assert!(!lifecycle.is_live());
        assert!(!lifecycle.is_collectable());
        assert_eq!(
            lifecycle.try_mark_dead(),
            Err(LifecycleViolation::AlreadyDead)
        );

        lifecycle.try_remove_reference().unwrap();
        assert!(lifecycle.is_collectable());
    }
}
