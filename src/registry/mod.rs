//! Popup manager registry
//!
//! The registry owns every [`PopupManager`] of the process and tracks which
//! one is active. It always contains the root manager registered under
//! [`ROOT_ID`]; the root can neither be unregistered nor re-registered, and
//! the active pointer falls back to it whenever the active manager goes
//! away.
//!
//! Registry state is shared between threads (background registration while
//! the main context renders), so every access goes through a
//! [`Guarded`] lock, reads included.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::engine::StackEngine;
use crate::manager::PopupManager;
use crate::sync::Guarded;

/// Reserved id of the root manager
pub const ROOT_ID: &str = "popup-stack.root";

/// Identifier of a registered manager
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManagerId(String);

impl ManagerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn root() -> Self {
        Self(ROOT_ID.to_string())
    }

    /// Fresh process-unique id
    pub fn generate() -> Self {
        Self(format!("popup-manager-{}", uuid::Uuid::new_v4()))
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ManagerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ManagerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ManagerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug)]
struct RegistryState {
    /// Managers in registration order; index 0 is always the root
    managers: Vec<Arc<PopupManager>>,
    active: ManagerId,
}

impl RegistryState {
    fn find(&self, id: &ManagerId) -> Option<&Arc<PopupManager>> {
        self.managers.iter().find(|m| m.id() == id)
    }

    fn root(&self) -> &Arc<PopupManager> {
        // Index 0 is never removed
        &self.managers[0]
    }

    fn active(&self) -> &Arc<PopupManager> {
        self.find(&self.active).unwrap_or_else(|| self.root())
    }
}

/// Owner of all popup managers of a process
pub struct ManagerRegistry {
    engine: Arc<StackEngine>,
    state: Guarded<RegistryState>,
}

impl ManagerRegistry {
    /// Create a registry holding only the root manager, which is active.
    pub fn new(engine: Arc<StackEngine>) -> Self {
        let root = Arc::new(PopupManager::new(ManagerId::root(), engine.clone()));
        Self {
            engine,
            state: Guarded::new(RegistryState {
                managers: vec![root],
                active: ManagerId::root(),
            }),
        }
    }

    pub fn engine(&self) -> &Arc<StackEngine> {
        &self.engine
    }

    /// Register a new manager.
    ///
    /// Without an `id` a process-unique one is generated. Registering an id
    /// that already exists creates nothing but still honours `make_active`.
    ///
    /// # Returns
    ///
    /// The resolved id, or `None` when `id` is the reserved root id
    pub fn register(&self, id: Option<ManagerId>, make_active: bool) -> Option<ManagerId> {
        self.insert(id, make_active, true).map(|(id, _)| id)
    }

    /// Register `id`, reporting whether a manager was created.
    ///
    /// `activate_existing` decides whether `make_active` also applies when
    /// the id was already registered.
    fn insert(
        &self,
        id: Option<ManagerId>,
        make_active: bool,
        activate_existing: bool,
    ) -> Option<(ManagerId, bool)> {
        let id = id.unwrap_or_else(ManagerId::generate);
        if id.is_root() {
            debug!("Refusing to register reserved manager id {}", id);
            return None;
        }

        let created = self.state.mutate(|state| {
            let created = state.find(&id).is_none();
            if created {
                let manager = Arc::new(PopupManager::new(id.clone(), self.engine.clone()));
                state.managers.push(manager);
            }
            if make_active && (created || activate_existing) {
                state.active = id.clone();
            }
            created
        });

        if created {
            info!("Registered popup manager {}", id);
        }
        Some((id, created))
    }

    /// Remove the manager with this id.
    ///
    /// The root and unknown ids are ignored. If the removed manager was
    /// active, the root becomes active. Popups of the removed manager
    /// receive their dismissal callbacks.
    ///
    /// # Returns
    ///
    /// `true` if a manager was removed
    pub fn unregister(&self, id: &ManagerId) -> bool {
        if id.is_root() {
            return false;
        }

        let removed = self.state.mutate(|state| {
            let position = state.managers.iter().position(|m| m.id() == id)?;
            let removed = state.managers.remove(position);
            if &state.active == id {
                state.active = ManagerId::root();
            }
            Some(removed)
        });

        match removed {
            Some(manager) => {
                info!("Unregistered popup manager {}", id);
                // Outside the registry lock: callbacks may use the registry
                manager.teardown();
                true
            }
            None => false,
        }
    }

    /// Make the manager with this id active; unknown ids are ignored.
    pub fn set_active(&self, id: &ManagerId) -> bool {
        self.state.mutate(|state| {
            if state.find(id).is_some() {
                state.active = id.clone();
                true
            } else {
                false
            }
        })
    }

    /// Remove the most recently registered non-root manager and activate
    /// the manager registered before it.
    ///
    /// # Returns
    ///
    /// The removed manager's id, `None` if only the root remains
    pub fn pop_last(&self) -> Option<ManagerId> {
        let removed = self.state.mutate(|state| {
            if state.managers.len() <= 1 {
                return None;
            }
            let removed = state.managers.pop()?;
            state.active = state
                .managers
                .last()
                .map(|m| m.id().clone())
                .unwrap_or_else(ManagerId::root);
            Some(removed)
        })?;

        info!("Popped popup manager {}", removed.id());
        removed.teardown();
        Some(removed.id().clone())
    }

    pub fn manager_for(&self, id: &ManagerId) -> Option<Arc<PopupManager>> {
        self.state.get(|state| state.find(id).cloned())
    }

    /// The active manager; the root when nothing else is active
    pub fn active_manager(&self) -> Arc<PopupManager> {
        self.state.get(|state| state.active().clone())
    }

    pub fn active_id(&self) -> ManagerId {
        self.active_manager().id().clone()
    }

    pub fn root_manager(&self) -> Arc<PopupManager> {
        self.state.get(|state| state.root().clone())
    }

    pub fn contains(&self, id: &ManagerId) -> bool {
        self.state.get(|state| state.find(id).is_some())
    }

    /// Ids in registration order, root first
    pub fn ids(&self) -> Vec<ManagerId> {
        self.state
            .get(|state| state.managers.iter().map(|m| m.id().clone()).collect())
    }

    pub fn len(&self) -> usize {
        self.state.get(|state| state.managers.len())
    }

    /// Register a manager for a nested UI scope, make it active and
    /// unregister it when the returned guard is dropped.
    ///
    /// # Returns
    ///
    /// `None` when `id` is the reserved root id or already registered;
    /// a guard never owns a manager it did not create
    pub fn scoped(self: &Arc<Self>, id: Option<ManagerId>) -> Option<ScopedManager> {
        let (id, created) = self.insert(id, true, false)?;
        if !created {
            debug!("Manager {} already registered, not scoping it", id);
            return None;
        }
        Some(ScopedManager {
            registry: Arc::clone(self),
            scope: PopupScope::new(id),
        })
    }
}

impl fmt::Debug for ManagerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerRegistry")
            .field("managers", &self.ids())
            .field("active", &self.active_id())
            .finish()
    }
}

/// Names the manager that popups shown from a UI subtree should go to.
///
/// Pass it down the view hierarchy instead of looking up a global; the
/// default scope targets the root manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PopupScope {
    manager_id: ManagerId,
}

impl PopupScope {
    pub fn new(manager_id: ManagerId) -> Self {
        Self { manager_id }
    }

    pub fn root() -> Self {
        Self::new(ManagerId::root())
    }

    pub fn manager_id(&self) -> &ManagerId {
        &self.manager_id
    }

    /// The scope's manager, if it is still registered
    pub fn resolve(&self, registry: &ManagerRegistry) -> Option<Arc<PopupManager>> {
        registry.manager_for(&self.manager_id)
    }
}

impl Default for PopupScope {
    fn default() -> Self {
        Self::root()
    }
}

/// Manager registered for the lifetime of a nested UI scope
/// (e.g. a modal flow); unregistered on drop.
#[derive(Debug)]
pub struct ScopedManager {
    registry: Arc<ManagerRegistry>,
    scope: PopupScope,
}

impl ScopedManager {
    pub fn id(&self) -> &ManagerId {
        self.scope.manager_id()
    }

    /// Scope to hand to child views
    pub fn scope(&self) -> PopupScope {
        self.scope.clone()
    }

    pub fn manager(&self) -> Option<Arc<PopupManager>> {
        self.scope.resolve(&self.registry)
    }
}

impl Drop for ScopedManager {
    fn drop(&mut self) {
        self.registry.unregister(self.scope.manager_id());
    }
}
