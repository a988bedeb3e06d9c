//! Ordered popup collection
//!
//! This module provides the `PopupStack` data structure holding the popups of
//! one manager. Popups are ordered from bottom to top, the last popup being
//! the top-most (most recently shown) one. Ids are unique within a stack.
//!
//! The stack has no concurrency of its own; it is only ever mutated by the
//! [`StackEngine`](crate::engine::StackEngine) while it holds the manager's
//! state lock.

use crate::popup::{AnyPopup, PopupId};

/// Result of [`PopupStack::replace_last_or_ignore`]
#[derive(Debug)]
pub enum Replacement {
    /// The stack was empty and the popup was appended
    Appended,
    /// The previous top-most popup was overwritten and is returned
    Replaced(AnyPopup),
    /// A popup with the same id is already stacked; nothing changed
    Ignored,
}

/// Popups ordered from bottom to top with set-like id uniqueness.
///
/// # Examples
///
/// ```
/// use popup_stack::popup::{AnyPopup, PopupConfig, TopPopupConfig};
/// use popup_stack::stack::PopupStack;
///
/// let popup = |id: &str| AnyPopup::from_parts(id, PopupConfig::Top(TopPopupConfig::default()), ());
///
/// let mut stack = PopupStack::new();
/// assert!(stack.insert_or_ignore(popup("a")));
/// assert!(!stack.insert_or_ignore(popup("a")));
/// assert_eq!(stack.top().map(|p| p.id().as_str()), Some("a"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PopupStack {
    /// Popups ordered from bottom to top
    popups: Vec<AnyPopup>,
}

impl PopupStack {
    /// Creates a new empty popup stack.
    pub fn new() -> Self {
        Self { popups: Vec::new() }
    }

    /// Creates a popup stack with the specified initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            popups: Vec::with_capacity(capacity),
        }
    }

    /// Appends a popup on top of the stack.
    ///
    /// If a popup with the same id is already stacked, this is a no-op.
    ///
    /// # Returns
    ///
    /// `true` if the popup was added, `false` if its id was already present
    pub fn insert_or_ignore(&mut self, popup: AnyPopup) -> bool {
        if self.contains(popup.id()) {
            return false;
        }

        self.popups.push(popup);
        true
    }

    /// Overwrites the top-most popup.
    ///
    /// An empty stack behaves like [`insert_or_ignore`](Self::insert_or_ignore).
    /// An id collision with any stacked popup leaves the stack untouched.
    pub fn replace_last_or_ignore(&mut self, popup: AnyPopup) -> Replacement {
        if self.contains(popup.id()) {
            return Replacement::Ignored;
        }

        match self.popups.last_mut() {
            None => {
                self.popups.push(popup);
                Replacement::Appended
            }
            Some(last) => Replacement::Replaced(std::mem::replace(last, popup)),
        }
    }

    /// Removes the top-most popup, if any.
    pub fn remove_last(&mut self) -> Option<AnyPopup> {
        self.popups.pop()
    }

    /// Removes every popup with the given id.
    ///
    /// Uniqueness means at most one match, but all matches are removed.
    /// Removed popups are returned in bottom-to-top order.
    pub fn remove_by_id(&mut self, id: &PopupId) -> Vec<AnyPopup> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.popups.len());
        for popup in self.popups.drain(..) {
            if popup.id() == id {
                removed.push(popup);
            } else {
                kept.push(popup);
            }
        }
        self.popups = kept;
        removed
    }

    /// Clears the stack, returning the removed popups bottom to top.
    pub fn remove_all(&mut self) -> Vec<AnyPopup> {
        std::mem::take(&mut self.popups)
    }

    /// Returns the top-most popup in the stack.
    pub fn top(&self) -> Option<&AnyPopup> {
        self.popups.last()
    }

    /// Returns the bottom-most popup in the stack.
    pub fn bottom(&self) -> Option<&AnyPopup> {
        self.popups.first()
    }

    /// Returns an iterator over popups in bottom-to-top order.
    pub fn iter(&self) -> impl Iterator<Item = &AnyPopup> {
        self.popups.iter()
    }

    /// Returns the ids in bottom-to-top order.
    pub fn ids(&self) -> Vec<PopupId> {
        self.popups.iter().map(|p| p.id().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.popups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.popups.is_empty()
    }

    /// Checks if a popup with this id is stacked.
    pub fn contains(&self, id: &PopupId) -> bool {
        self.popups.iter().any(|p| p.id() == id)
    }

    /// Checks if this exact popup instance is still stacked.
    pub fn contains_token(&self, token: u64) -> bool {
        self.popups.iter().any(|p| p.token() == token)
    }

    /// Position 0 is the bottom-most popup, `len() - 1` the top-most.
    pub fn position(&self, id: &PopupId) -> Option<usize> {
        self.popups.iter().position(|p| p.id() == id)
    }

    /// Copies the stack for publishing to observers.
    pub fn to_vec(&self) -> Vec<AnyPopup> {
        self.popups.clone()
    }

    #[cfg(test)]
    pub(crate) fn push_unchecked(&mut self, popup: AnyPopup) {
        self.popups.push(popup);
    }
}
