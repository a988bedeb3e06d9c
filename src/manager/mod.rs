//! Popup manager
//!
//! A `PopupManager` owns one [`PopupStack`] and its debounce guard. It is the
//! unit the rendering layer observes: every applied mutation publishes a new
//! [`PopupSnapshot`] on a `tokio::sync::watch` channel, from which the
//! per-anchor views (top, centre, bottom) are derived.
//!
//! Mutating calls are meant to run on the host's main sequencing context
//! (see [`MainLoop`](crate::context::MainLoop)). The state lock only makes
//! the manager safe to share; it does not order calls.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::engine::{Debounce, PerformOutcome, StackEngine, StackOperation};
use crate::popup::{
    AnchorConfig, AnyPopup, BottomPopupConfig, CentrePopupConfig, Popup, PopupId, TopPopupConfig,
};
use crate::registry::ManagerId;
use crate::stack::PopupStack;

/// Mutable state of a manager, only touched by the engine
#[derive(Debug, Default)]
pub(crate) struct ManagerState {
    pub(crate) stack: PopupStack,
    pub(crate) guard: Debounce,
    revision: u64,
}

impl ManagerState {
    /// Bump the revision and capture the stack for subscribers
    pub(crate) fn next_snapshot(&mut self) -> PopupSnapshot {
        self.revision += 1;
        PopupSnapshot {
            revision: self.revision,
            popups: self.stack.to_vec(),
        }
    }

    fn current_snapshot(&self) -> PopupSnapshot {
        PopupSnapshot {
            revision: self.revision,
            popups: self.stack.to_vec(),
        }
    }
}

/// A popup projected to its anchor-specific configuration
#[derive(Debug, Clone)]
pub struct Anchored<C> {
    pub popup: AnyPopup,
    pub config: C,
}

/// Immutable view of a manager's stack at one revision
#[derive(Debug, Clone, Default)]
pub struct PopupSnapshot {
    revision: u64,
    popups: Vec<AnyPopup>,
}

impl PopupSnapshot {
    /// Number of applied mutations this snapshot reflects
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// All popups, bottom to top
    pub fn popups(&self) -> &[AnyPopup] {
        &self.popups
    }

    pub fn ids(&self) -> Vec<PopupId> {
        self.popups.iter().map(|p| p.id().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.popups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.popups.is_empty()
    }

    /// Order-preserving projection onto the popups anchored by `C`
    pub fn items<C: AnchorConfig>(&self) -> Vec<Anchored<C>> {
        self.popups
            .iter()
            .filter_map(|popup| {
                C::project(popup.config()).map(|config| Anchored {
                    popup: popup.clone(),
                    config: config.clone(),
                })
            })
            .collect()
    }

    pub fn top_items(&self) -> Vec<Anchored<TopPopupConfig>> {
        self.items()
    }

    pub fn centre_items(&self) -> Vec<Anchored<CentrePopupConfig>> {
        self.items()
    }

    pub fn bottom_items(&self) -> Vec<Anchored<BottomPopupConfig>> {
        self.items()
    }
}

/// Owner of one popup stack
pub struct PopupManager {
    id: ManagerId,
    engine: Arc<StackEngine>,
    state: Mutex<ManagerState>,
    updates: watch::Sender<PopupSnapshot>,
}

impl PopupManager {
    pub fn new(id: ManagerId, engine: Arc<StackEngine>) -> Self {
        let (updates, _) = watch::channel(PopupSnapshot::default());
        Self {
            id,
            engine,
            state: Mutex::new(ManagerState::default()),
            updates,
        }
    }

    pub fn id(&self) -> &ManagerId {
        &self.id
    }

    /// Show `popup`, stacking it on top (`stacking`) or replacing the
    /// top-most popup.
    pub fn show(&self, popup: AnyPopup, stacking: bool) -> PerformOutcome {
        let operation = if stacking {
            StackOperation::Stack(popup)
        } else {
            StackOperation::ReplaceTop(popup)
        };
        self.perform(operation)
    }

    pub fn show_and_stack(&self, popup: AnyPopup) -> PerformOutcome {
        self.show(popup, true)
    }

    pub fn show_and_replace(&self, popup: AnyPopup) -> PerformOutcome {
        self.show(popup, false)
    }

    /// Dismiss the top-most popup
    pub fn dismiss_last(&self) -> PerformOutcome {
        self.perform(StackOperation::RemoveLast)
    }

    /// Dismiss the popup with this id
    pub fn dismiss(&self, id: impl Into<PopupId>) -> PerformOutcome {
        self.perform(StackOperation::RemoveById(id.into()))
    }

    /// Dismiss popups of type `P` that kept their default, type-derived id.
    ///
    /// Popups of `P` shown under a custom id are not matched.
    pub fn dismiss_type<P: Popup>(&self) -> PerformOutcome {
        self.dismiss(PopupId::of::<P>())
    }

    pub fn dismiss_all(&self) -> PerformOutcome {
        self.perform(StackOperation::RemoveAll)
    }

    /// Run an arbitrary stack operation through the engine
    pub fn perform(&self, operation: StackOperation) -> PerformOutcome {
        self.engine.perform(operation, self)
    }

    /// Receive a snapshot after every applied mutation
    pub fn subscribe(&self) -> watch::Receiver<PopupSnapshot> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> PopupSnapshot {
        self.state.lock().current_snapshot()
    }

    pub fn top_items(&self) -> Vec<Anchored<TopPopupConfig>> {
        self.snapshot().top_items()
    }

    pub fn centre_items(&self) -> Vec<Anchored<CentrePopupConfig>> {
        self.snapshot().centre_items()
    }

    pub fn bottom_items(&self) -> Vec<Anchored<BottomPopupConfig>> {
        self.snapshot().bottom_items()
    }

    pub fn ids(&self) -> Vec<PopupId> {
        self.state.lock().stack.ids()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().stack.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.lock().stack.len()
    }

    pub fn contains(&self, id: &PopupId) -> bool {
        self.state.lock().stack.contains(id)
    }

    /// Whether this exact popup instance is still stacked
    pub fn contains_token(&self, token: u64) -> bool {
        self.state.lock().stack.contains_token(token)
    }

    /// Time until the debounce guard releases, `None` when it is open
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        self.state.lock().guard.remaining(Instant::now())
    }

    /// Remove every popup regardless of the guard, firing their callbacks
    pub fn teardown(&self) -> Vec<AnyPopup> {
        self.engine.tear_down(self)
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut ManagerState) -> R) -> R {
        f(&mut self.state.lock())
    }

    /// Publish `snapshot` unless a newer revision went out first.
    ///
    /// Snapshots are captured under the state lock but published after
    /// dismissal callbacks ran; a callback tearing this manager down has
    /// already published a later revision by then.
    pub(crate) fn publish(&self, snapshot: PopupSnapshot) -> bool {
        self.updates.send_if_modified(|current| {
            if snapshot.revision > current.revision {
                *current = snapshot;
                true
            } else {
                false
            }
        })
    }
}

impl std::fmt::Debug for PopupManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopupManager")
            .field("id", &self.id)
            .field("popups", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests;
