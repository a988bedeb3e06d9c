//! Scripted popup scenarios
//!
//! A scenario is a TOML file of `[[step]]` tables replayed against a
//! [`PopupContext`]. After each step the runner waits for the main loop to
//! apply it and records what the targeted manager shows per anchor.
//!
//! ```toml
//! [[step]]
//! action = "show"
//! id = "welcome"
//! anchor = "top"
//!
//! [[step]]
//! action = "wait"
//! wait_ms = 500
//!
//! [[step]]
//! action = "dismiss"
//! id = "welcome"
//! ```

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::context::PopupContext;
use crate::engine::StackOperation;
use crate::error::PopupError;
use crate::manager::PopupSnapshot;
use crate::popup::{Anchor, AnyPopup, PopupConfig, PopupId};
use crate::registry::ManagerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Show,
    Dismiss,
    DismissLast,
    DismissAll,
    Register,
    Unregister,
    Activate,
    Pop,
    Wait,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Show => "show",
            Action::Dismiss => "dismiss",
            Action::DismissLast => "dismiss_last",
            Action::DismissAll => "dismiss_all",
            Action::Register => "register",
            Action::Unregister => "unregister",
            Action::Activate => "activate",
            Action::Pop => "pop",
            Action::Wait => "wait",
        }
    }
}

/// One scripted step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub action: Action,

    /// Target manager; the active manager when omitted
    #[serde(default)]
    pub manager: Option<String>,

    /// Popup id for `show`/`dismiss`, requested manager id for `register`
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default = "default_anchor")]
    pub anchor: Anchor,

    /// Stack on top instead of replacing the top-most popup
    #[serde(default)]
    pub stack: bool,

    #[serde(default)]
    pub auto_dismiss_ms: Option<u64>,

    #[serde(default)]
    pub wait_ms: Option<u64>,

    #[serde(default = "default_make_active")]
    pub make_active: bool,
}

fn default_anchor() -> Anchor {
    Anchor::Centre
}

fn default_make_active() -> bool {
    true
}

impl Step {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            manager: None,
            id: None,
            anchor: default_anchor(),
            stack: false,
            auto_dismiss_ms: None,
            wait_ms: None,
            make_active: default_make_active(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to load scenario file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse scenario")
    }
}

/// State of one manager after a step
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub index: usize,
    pub action: Action,
    pub manager: ManagerId,
    /// Whether the manager's stack changed during the step
    pub changed: bool,
    pub top: Vec<PopupId>,
    pub centre: Vec<PopupId>,
    pub bottom: Vec<PopupId>,
    pub note: Option<String>,
}

impl StepReport {
    fn new(index: usize, action: Action, manager: ManagerId, changed: bool, snapshot: &PopupSnapshot) -> Self {
        let ids = |anchor: Anchor| -> Vec<PopupId> {
            snapshot
                .popups()
                .iter()
                .filter(|p| p.anchor() == anchor)
                .map(|p| p.id().clone())
                .collect()
        };
        Self {
            index,
            action,
            manager,
            changed,
            top: ids(Anchor::Top),
            centre: ids(Anchor::Centre),
            bottom: ids(Anchor::Bottom),
            note: None,
        }
    }
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(ids: &[PopupId]) -> String {
            ids.iter().map(PopupId::as_str).collect::<Vec<_>>().join(",")
        }

        write!(
            f,
            "#{:<3} {:<12} {} top=[{}] centre=[{}] bottom=[{}]",
            self.index,
            self.action.as_str(),
            self.manager,
            list(&self.top),
            list(&self.centre),
            list(&self.bottom),
        )?;
        if !self.changed {
            f.write_str(" (unchanged)")?;
        }
        if let Some(note) = &self.note {
            write!(f, " ({})", note)?;
        }
        Ok(())
    }
}

fn rejection(result: Result<(), PopupError>) -> Option<String> {
    result.err().map(|e| e.to_string())
}

/// Replays scenarios against a context whose main loop is running
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    context: PopupContext,
}

impl ScenarioRunner {
    pub fn new(context: PopupContext) -> Self {
        Self { context }
    }

    pub async fn run(&self, scenario: &Scenario) -> Result<Vec<StepReport>> {
        info!("Running scenario with {} step(s)", scenario.steps.len());
        let mut reports = Vec::with_capacity(scenario.steps.len());

        for (index, step) in scenario.steps.iter().enumerate() {
            let report = self
                .run_step(index, step)
                .await
                .with_context(|| format!("Scenario step {} ({}) failed", index, step.action.as_str()))?;
            debug!("{}", report);
            reports.push(report);
        }

        Ok(reports)
    }

    async fn run_step(&self, index: usize, step: &Step) -> Result<StepReport> {
        let registry = self.context.registry();
        let dispatcher = self.context.dispatcher();
        let target = match &step.manager {
            Some(id) => ManagerId::new(id.as_str()),
            None => registry.active_id(),
        };
        let before = registry.manager_for(&target).map(|m| m.snapshot().revision());

        let mut note = None;
        let mut reported = target.clone();

        match step.action {
            Action::Show => {
                let Some(id) = &step.id else {
                    bail!("`show` needs an `id`");
                };
                let config = PopupConfig::base(step.anchor, self.context.defaults());
                let mut popup = AnyPopup::from_parts(id.as_str(), config, id.clone());
                if let Some(ms) = step.auto_dismiss_ms {
                    popup = popup.auto_dismiss_after(Duration::from_millis(ms));
                }
                let operation = if step.stack {
                    StackOperation::Stack(popup)
                } else {
                    StackOperation::ReplaceTop(popup)
                };
                note = rejection(dispatcher.try_perform(&target, operation));
            }
            Action::Dismiss => {
                let Some(id) = &step.id else {
                    bail!("`dismiss` needs an `id`");
                };
                let operation = StackOperation::RemoveById(PopupId::new(id.as_str()));
                note = rejection(dispatcher.try_perform(&target, operation));
            }
            Action::DismissLast => {
                note = rejection(dispatcher.try_perform(&target, StackOperation::RemoveLast));
            }
            Action::DismissAll => {
                note = rejection(dispatcher.try_perform(&target, StackOperation::RemoveAll));
            }
            Action::Register => {
                let requested = step.id.as_deref().map(ManagerId::from);
                match registry.register(requested.clone(), step.make_active) {
                    Some(id) => {
                        note = Some(format!("registered {}", id));
                        reported = id;
                    }
                    None => {
                        let id = requested.unwrap_or_else(ManagerId::root);
                        note = Some(PopupError::ReservedId(id).to_string());
                    }
                }
            }
            Action::Unregister => {
                let Some(id) = &step.manager else {
                    bail!("`unregister` needs a `manager`");
                };
                if !registry.unregister(&ManagerId::new(id.as_str())) {
                    note = Some(format!("{} not removed", id));
                }
                reported = registry.active_id();
            }
            Action::Activate => {
                if !registry.set_active(&target) {
                    note = Some(PopupError::ManagerNotFound(target.clone()).to_string());
                }
                reported = registry.active_id();
            }
            Action::Pop => {
                note = Some(match registry.pop_last() {
                    Some(id) => format!("popped {}", id),
                    None => "only root left".to_string(),
                });
                reported = registry.active_id();
            }
            Action::Wait => {
                let ms = step.wait_ms.unwrap_or_default();
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
        }

        if let Err(e) = dispatcher.flush().await {
            warn!("Scenario step {} not confirmed: {}", index, e);
            note.get_or_insert_with(|| e.to_string());
        }

        let manager = registry
            .manager_for(&reported)
            .unwrap_or_else(|| registry.active_manager());
        let snapshot = manager.snapshot();
        let changed = manager.id() == &target && before != Some(snapshot.revision());

        let mut report = StepReport::new(index, step.action, manager.id().clone(), changed, &snapshot);
        report.note = note;
        Ok(report)
    }
}
