//! Stack mutation engine
//!
//! Every change to a manager's popup stack goes through
//! [`StackEngine::perform`]. A mutation arms the manager's debounce guard;
//! any further mutation arriving before the cooldown has elapsed is dropped
//! without being queued. This absorbs double taps and other call storms
//! into a single effective change.
//!
//! Order of a mutation:
//!
//! 1. drop the call if the guard is armed
//! 2. arm the guard (released once the cooldown deadline passes)
//! 3. ask the focus collaborator to resign keyboard/input focus
//! 4. apply the operation to the stack
//! 5. fire `on_dismiss` for every popup that left the stack, in removal order
//! 6. publish the new stack to the manager's subscribers

use anyhow::Result;
use log::{debug, trace};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::EngineConfig;
use crate::manager::PopupManager;
use crate::popup::{AnyPopup, PopupId};
use crate::stack::{PopupStack, Replacement};

/// Cooldown applied after each mutation unless configured otherwise
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(440);

/// The five stack mutations
#[derive(Debug)]
pub enum StackOperation {
    /// Overwrite the top-most popup (or append to an empty stack)
    ReplaceTop(AnyPopup),
    /// Append on top of the existing popups
    Stack(AnyPopup),
    RemoveLast,
    RemoveById(PopupId),
    RemoveAll,
}

impl StackOperation {
    pub fn name(&self) -> &'static str {
        match self {
            StackOperation::ReplaceTop(_) => "replace_top",
            StackOperation::Stack(_) => "stack",
            StackOperation::RemoveLast => "remove_last",
            StackOperation::RemoveById(_) => "remove_by_id",
            StackOperation::RemoveAll => "remove_all",
        }
    }
}

/// What a call to [`StackEngine::perform`] did
#[derive(Debug)]
pub enum PerformOutcome {
    /// The stack changed and subscribers were notified
    Applied {
        inserted: Option<AnyPopup>,
        removed: Vec<AnyPopup>,
    },
    /// The guard was armed but the operation was a no-op
    /// (duplicate id, unknown id, empty stack)
    Unchanged,
    /// Dropped because the cooldown of a previous mutation was still running
    Debounced,
}

impl PerformOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, PerformOutcome::Applied { .. })
    }

    pub fn is_debounced(&self) -> bool {
        matches!(self, PerformOutcome::Debounced)
    }

    pub fn inserted(&self) -> Option<&AnyPopup> {
        match self {
            PerformOutcome::Applied { inserted, .. } => inserted.as_ref(),
            _ => None,
        }
    }

    pub fn removed(&self) -> &[AnyPopup] {
        match self {
            PerformOutcome::Applied { removed, .. } => removed,
            _ => &[],
        }
    }
}

/// Per-manager debounce guard
#[derive(Debug, Clone, Default)]
pub struct Debounce {
    blocked_until: Option<Instant>,
}

impl Debounce {
    pub fn is_blocked(&self, now: Instant) -> bool {
        matches!(self.blocked_until, Some(until) if now < until)
    }

    pub fn arm(&mut self, now: Instant, cooldown: Duration) {
        self.blocked_until = Some(now + cooldown);
    }

    /// Time left until the guard releases, if it is armed
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.blocked_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }
}

/// Platform hook resigning keyboard/input focus before a mutation.
///
/// Best effort: errors are logged and otherwise ignored.
#[cfg_attr(test, mockall::automock)]
pub trait FocusDismisser: Send + Sync {
    fn resign_focus(&self) -> Result<()>;
}

/// Focus hook for hosts without a focus concept
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFocus;

impl FocusDismisser for NoopFocus {
    fn resign_focus(&self) -> Result<()> {
        Ok(())
    }
}

/// Applies [`StackOperation`]s to managers.
///
/// One engine is shared by every manager of a registry.
pub struct StackEngine {
    cooldown: Duration,
    focus: Option<Arc<dyn FocusDismisser>>,
}

impl StackEngine {
    pub fn new(cooldown: Duration, focus: Arc<dyn FocusDismisser>) -> Self {
        Self {
            cooldown,
            focus: Some(focus),
        }
    }

    pub fn from_config(config: &EngineConfig, focus: Arc<dyn FocusDismisser>) -> Self {
        Self {
            cooldown: config.cooldown(),
            focus: config.dismiss_focus.then_some(focus),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Run one mutation against `manager`.
    ///
    /// Never blocks beyond the manager's state lock and never fails; the
    /// outcome tells whether the operation applied, was a no-op or was
    /// dropped by the guard.
    pub fn perform(&self, operation: StackOperation, manager: &PopupManager) -> PerformOutcome {
        let now = Instant::now();
        let armed = manager.with_state(|state| {
            if state.guard.is_blocked(now) {
                return false;
            }
            state.guard.arm(now, self.cooldown);
            true
        });
        if !armed {
            trace!(
                "Dropping {} on manager {}: cooldown active",
                operation.name(),
                manager.id()
            );
            return PerformOutcome::Debounced;
        }

        self.resign_focus();

        let name = operation.name();
        let (outcome, snapshot) = manager.with_state(|state| {
            let outcome = apply(&mut state.stack, operation);
            let snapshot = outcome.is_applied().then(|| state.next_snapshot());
            (outcome, snapshot)
        });

        // Callbacks run with the state lock released so they may call back
        // into the manager; such calls hit the armed guard.
        for popup in outcome.removed() {
            popup.notify_dismissed();
        }

        match snapshot {
            Some(snapshot) => {
                debug!(
                    "Manager {}: {} applied, {} popup(s) stacked, {} removed",
                    manager.id(),
                    name,
                    snapshot.len(),
                    outcome.removed().len()
                );
                if !manager.publish(snapshot) {
                    trace!("Manager {}: snapshot superseded during callbacks", manager.id());
                }
            }
            None => trace!("Manager {}: {} changed nothing", manager.id(), name),
        }

        outcome
    }

    /// Empty `manager` without consulting or arming its guard.
    ///
    /// Used when a manager is destroyed so its popups still receive their
    /// dismissal callbacks.
    pub(crate) fn tear_down(&self, manager: &PopupManager) -> Vec<AnyPopup> {
        let (removed, snapshot) = manager.with_state(|state| {
            let removed = state.stack.remove_all();
            let snapshot = (!removed.is_empty()).then(|| state.next_snapshot());
            (removed, snapshot)
        });

        for popup in &removed {
            popup.notify_dismissed();
        }
        if let Some(snapshot) = snapshot {
            if !manager.publish(snapshot) {
                trace!("Manager {}: teardown snapshot superseded", manager.id());
            }
        }

        debug!("Manager {} torn down, {} popup(s) dismissed", manager.id(), removed.len());
        removed
    }

    fn resign_focus(&self) {
        if let Some(focus) = &self.focus {
            if let Err(e) = focus.resign_focus() {
                debug!("Focus dismissal failed (ignored): {:#}", e);
            }
        }
    }
}

impl std::fmt::Debug for StackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackEngine")
            .field("cooldown", &self.cooldown)
            .field("dismiss_focus", &self.focus.is_some())
            .finish()
    }
}

fn apply(stack: &mut PopupStack, operation: StackOperation) -> PerformOutcome {
    match operation {
        StackOperation::ReplaceTop(popup) => {
            let inserted = popup.clone();
            match stack.replace_last_or_ignore(popup) {
                Replacement::Appended => PerformOutcome::Applied {
                    inserted: Some(inserted),
                    removed: Vec::new(),
                },
                Replacement::Replaced(previous) => PerformOutcome::Applied {
                    inserted: Some(inserted),
                    removed: vec![previous],
                },
                Replacement::Ignored => PerformOutcome::Unchanged,
            }
        }
        StackOperation::Stack(popup) => {
            let inserted = popup.clone();
            if stack.insert_or_ignore(popup) {
                PerformOutcome::Applied {
                    inserted: Some(inserted),
                    removed: Vec::new(),
                }
            } else {
                PerformOutcome::Unchanged
            }
        }
        StackOperation::RemoveLast => match stack.remove_last() {
            Some(last) => PerformOutcome::Applied {
                inserted: None,
                removed: vec![last],
            },
            None => PerformOutcome::Unchanged,
        },
        StackOperation::RemoveById(id) => removed_outcome(stack.remove_by_id(&id)),
        StackOperation::RemoveAll => removed_outcome(stack.remove_all()),
    }
}

fn removed_outcome(removed: Vec<AnyPopup>) -> PerformOutcome {
    if removed.is_empty() {
        PerformOutcome::Unchanged
    } else {
        PerformOutcome::Applied {
            inserted: None,
            removed,
        }
    }
}
