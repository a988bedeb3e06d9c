//! Process-wide popup context and the main sequencing loop
//!
//! Requests to show or dismiss popups may come from anywhere: timers, async
//! completions, input handlers on other threads. [`PopupDispatcher`] funnels
//! them into a channel and returns immediately; [`MainLoop`] drains that
//! channel on the host's main context and applies each request through the
//! stack engine, one at a time and in arrival order. Effects become visible
//! to callers through the managers' snapshot subscriptions.
//!
//! The main loop also owns auto-dismiss timers. A popup asking to dismiss
//! itself after a delay gets a timer task when it is inserted; the task is
//! aborted when the popup leaves the stack through the loop or its manager
//! is unregistered, and a timer that fires anyway only dismisses the popup
//! if the very same instance is still stacked.
//!
//! ```no_run
//! use popup_stack::config::StackConfig;
//! use popup_stack::context::PopupContext;
//! use popup_stack::engine::NoopFocus;
//! use popup_stack::popup::{Popup, TopPopupConfig};
//! use std::sync::Arc;
//!
//! struct Toast;
//!
//! impl Popup for Toast {
//!     type Config = TopPopupConfig;
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (context, main_loop) = PopupContext::new(&StackConfig::default(), Arc::new(NoopFocus));
//!     tokio::spawn(main_loop.run());
//!
//!     let root = context.active_scope();
//!     context.dispatcher().show_and_stack(root.manager_id(), context.popup(Toast));
//!     context.dispatcher().flush().await?;
//!     Ok(())
//! }
//! ```

use log::{debug, info, trace, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::{PopupDefaults, StackConfig};
use crate::engine::{FocusDismisser, PerformOutcome, StackEngine, StackOperation};
use crate::error::PopupError;
use crate::popup::{AnyPopup, AutoDismiss, Popup, PopupId};
use crate::registry::{ManagerId, ManagerRegistry, PopupScope};

/// Work item for the main loop
#[derive(Debug)]
enum Request {
    Perform {
        manager: ManagerId,
        operation: StackOperation,
    },
    /// Answered once every earlier request has been applied
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Clone)]
struct TimerExpired {
    manager: ManagerId,
    popup: PopupId,
    token: u64,
}

/// Explicitly constructed, process-wide popup context.
///
/// Create one per process at the UI root and hand it (or its dispatcher
/// and registry) to whoever needs to show popups.
#[derive(Debug, Clone)]
pub struct PopupContext {
    registry: Arc<ManagerRegistry>,
    dispatcher: PopupDispatcher,
    defaults: Arc<PopupDefaults>,
}

impl PopupContext {
    /// Build the context and the main loop that must be driven on the
    /// host's main sequencing context.
    pub fn new(config: &StackConfig, focus: Arc<dyn FocusDismisser>) -> (Self, MainLoop) {
        let engine = Arc::new(StackEngine::from_config(&config.engine, focus));
        debug!("Creating popup context with {:?}", engine);
        let registry = Arc::new(ManagerRegistry::new(engine));

        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();

        let context = Self {
            registry: registry.clone(),
            dispatcher: PopupDispatcher {
                registry: registry.clone(),
                requests: requests_tx,
            },
            defaults: Arc::new(config.defaults.clone()),
        };
        let main_loop = MainLoop {
            registry,
            requests: requests_rx,
            expired_tx,
            expired_rx,
            timers: HashMap::new(),
        };

        (context, main_loop)
    }

    pub fn registry(&self) -> &Arc<ManagerRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> PopupDispatcher {
        self.dispatcher.clone()
    }

    pub fn defaults(&self) -> &PopupDefaults {
        &self.defaults
    }

    /// Erase `popup` using the configured per-anchor defaults
    pub fn popup<P: Popup>(&self, popup: P) -> AnyPopup {
        AnyPopup::with_defaults(popup, &self.defaults)
    }

    /// Scope of the currently active manager
    pub fn active_scope(&self) -> PopupScope {
        PopupScope::new(self.registry.active_id())
    }
}

/// Cloneable, thread-safe handle marshalling requests onto the main loop.
///
/// Every method returns without waiting for the request to be applied.
/// A `false` return means the request was not queued: the manager id is
/// unknown or the main loop has stopped.
#[derive(Debug, Clone)]
pub struct PopupDispatcher {
    registry: Arc<ManagerRegistry>,
    requests: mpsc::UnboundedSender<Request>,
}

impl PopupDispatcher {
    /// Queue `operation` for `manager`.
    pub fn try_perform(&self, manager: &ManagerId, operation: StackOperation) -> Result<(), PopupError> {
        if !self.registry.contains(manager) {
            return Err(PopupError::ManagerNotFound(manager.clone()));
        }

        self.requests
            .send(Request::Perform {
                manager: manager.clone(),
                operation,
            })
            .map_err(|_| PopupError::ContextClosed)
    }

    fn perform(&self, manager: &ManagerId, operation: StackOperation) -> bool {
        match self.try_perform(manager, operation) {
            Ok(()) => true,
            Err(e @ PopupError::ContextClosed) => {
                warn!("Popup request dropped: {}", e);
                false
            }
            Err(e) => {
                debug!("Popup request ignored: {}", e);
                false
            }
        }
    }

    pub fn show(&self, manager: &ManagerId, popup: AnyPopup, stacking: bool) -> bool {
        let operation = if stacking {
            StackOperation::Stack(popup)
        } else {
            StackOperation::ReplaceTop(popup)
        };
        self.perform(manager, operation)
    }

    pub fn show_and_stack(&self, manager: &ManagerId, popup: AnyPopup) -> bool {
        self.show(manager, popup, true)
    }

    pub fn show_and_replace(&self, manager: &ManagerId, popup: AnyPopup) -> bool {
        self.show(manager, popup, false)
    }

    pub fn dismiss_last(&self, manager: &ManagerId) -> bool {
        self.perform(manager, StackOperation::RemoveLast)
    }

    pub fn dismiss(&self, manager: &ManagerId, id: impl Into<PopupId>) -> bool {
        self.perform(manager, StackOperation::RemoveById(id.into()))
    }

    /// Dismiss popups of type `P` shown under their default id
    pub fn dismiss_type<P: Popup>(&self, manager: &ManagerId) -> bool {
        self.dismiss(manager, PopupId::of::<P>())
    }

    pub fn dismiss_all(&self, manager: &ManagerId) -> bool {
        self.perform(manager, StackOperation::RemoveAll)
    }

    /// Wait until every request queued before this call has been applied.
    pub async fn flush(&self) -> Result<(), PopupError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.requests
            .send(Request::Flush(done_tx))
            .map_err(|_| PopupError::ContextClosed)?;
        done_rx.await.map_err(|_| PopupError::ContextClosed)
    }
}

/// The single sequencing context applying popup requests.
///
/// Runs until every [`PopupContext`] and [`PopupDispatcher`] is dropped.
pub struct MainLoop {
    registry: Arc<ManagerRegistry>,
    requests: mpsc::UnboundedReceiver<Request>,
    expired_tx: mpsc::UnboundedSender<TimerExpired>,
    expired_rx: mpsc::UnboundedReceiver<TimerExpired>,
    /// Auto-dismiss timers by popup instance token, with the owning manager
    timers: HashMap<u64, (ManagerId, JoinHandle<()>)>,
}

impl MainLoop {
    pub async fn run(mut self) {
        info!("Popup main loop started");

        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => break,
                },
                Some(expired) = self.expired_rx.recv() => self.handle_expired(expired),
            }
        }

        for (_, (_, timer)) in self.timers.drain() {
            timer.abort();
        }
        info!("Popup main loop stopped");
    }

    fn handle_request(&mut self, request: Request) {
        self.prune_timers();
        match request {
            Request::Perform { manager, operation } => {
                let Some(target) = self.registry.manager_for(&manager) else {
                    debug!("Manager {} unregistered before {} ran", manager, operation.name());
                    return;
                };
                let outcome = target.perform(operation);
                self.track_timers(&manager, &outcome);
            }
            Request::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    fn handle_expired(&mut self, expired: TimerExpired) {
        self.timers.remove(&expired.token);

        let Some(target) = self.registry.manager_for(&expired.manager) else {
            trace!("Auto-dismiss of {} skipped: manager {} is gone", expired.popup, expired.manager);
            return;
        };
        if !target.contains_token(expired.token) {
            trace!("Auto-dismiss of {} skipped: already removed", expired.popup);
            return;
        }

        let outcome = target.dismiss(expired.popup.clone());
        if outcome.is_debounced() {
            // A timer is not a call storm: retry once the guard opens
            let retry = target.cooldown_remaining().unwrap_or_default();
            debug!("Auto-dismiss of {} debounced, retrying in {:?}", expired.popup, retry);
            self.arm_timer(expired, retry);
            return;
        }

        debug!("Auto-dismissed {} on manager {}", expired.popup, expired.manager);
        self.track_timers(&expired.manager, &outcome);
    }

    fn track_timers(&mut self, manager: &ManagerId, outcome: &PerformOutcome) {
        for popup in outcome.removed() {
            if let Some((_, timer)) = self.timers.remove(&popup.token()) {
                timer.abort();
            }
        }

        if let Some(popup) = outcome.inserted() {
            if let AutoDismiss::After(delay) = popup.auto_dismiss() {
                let expired = TimerExpired {
                    manager: manager.clone(),
                    popup: popup.id().clone(),
                    token: popup.token(),
                };
                self.arm_timer(expired, delay);
            }
        }
    }

    fn arm_timer(&mut self, expired: TimerExpired, delay: Duration) {
        let token = expired.token;
        let manager = expired.manager.clone();
        let expired_tx = self.expired_tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = expired_tx.send(expired);
        });

        if let Some((_, previous)) = self.timers.insert(token, (manager, timer)) {
            previous.abort();
        }
    }

    /// Abort timers of managers that were unregistered since they were armed
    fn prune_timers(&mut self) {
        let registry = &self.registry;
        self.timers.retain(|token, (manager, timer)| {
            if registry.contains(manager) {
                return true;
            }
            trace!("Dropping auto-dismiss timer {} of removed manager {}", token, manager);
            timer.abort();
            false
        });
    }

    /// Number of pending auto-dismiss timers
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }
}

impl std::fmt::Debug for MainLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainLoop")
            .field("registry", &self.registry)
            .field("pending_timers", &self.timers.len())
            .finish()
    }
}
