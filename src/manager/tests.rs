//! Unit tests for the popup manager
//!
//! Tests show/dismiss semantics, dismissal callbacks, the debounce window,
//! per-anchor views and change notification.

use super::*;
use crate::engine::{NoopFocus, DEFAULT_COOLDOWN};
use crate::popup::{AnyPopup, Popup, PopupConfig};
use std::sync::atomic::{AtomicUsize, Ordering};

struct Banner;

impl Popup for Banner {
    type Config = TopPopupConfig;
}

struct Dialog;

impl Popup for Dialog {
    type Config = CentrePopupConfig;
}

struct Sheet;

impl Popup for Sheet {
    type Config = BottomPopupConfig;
}

fn manager() -> PopupManager {
    let engine = StackEngine::new(DEFAULT_COOLDOWN, Arc::new(NoopFocus));
    PopupManager::new(ManagerId::new("test"), Arc::new(engine))
}

fn centre(id: &str) -> AnyPopup {
    AnyPopup::from_parts(id, PopupConfig::Centre(CentrePopupConfig::default()), ())
}

fn counted(id: &str, count: &Arc<AtomicUsize>) -> AnyPopup {
    let count = count.clone();
    centre(id).on_dismiss(move || {
        count.fetch_add(1, Ordering::SeqCst);
    })
}

/// Let the debounce guard of the previous mutation release
async fn settle() {
    tokio::time::advance(DEFAULT_COOLDOWN).await;
}

fn ids(manager: &PopupManager) -> Vec<String> {
    manager.ids().iter().map(|id| id.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_replace_semantics() {
    let manager = manager();
    let a_dismissed = Arc::new(AtomicUsize::new(0));

    assert!(manager.show(counted("a", &a_dismissed), false).is_applied());
    settle().await;
    assert!(manager.show(centre("b"), false).is_applied());

    assert_eq!(ids(&manager), vec!["b"]);
    assert_eq!(a_dismissed.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stack_semantics() {
    let manager = manager();
    let a_dismissed = Arc::new(AtomicUsize::new(0));

    manager.show(counted("a", &a_dismissed), true);
    settle().await;
    manager.show(centre("b"), true);

    assert_eq!(ids(&manager), vec!["a", "b"]);
    assert_eq!(a_dismissed.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_id_is_suppressed() {
    let manager = manager();

    manager.show_and_stack(centre("a"));
    settle().await;
    let outcome = manager.show_and_stack(centre("a"));
    assert!(matches!(outcome, PerformOutcome::Unchanged));
    settle().await;
    let outcome = manager.show_and_replace(centre("a"));
    assert!(matches!(outcome, PerformOutcome::Unchanged));

    assert_eq!(manager.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_idempotent_dismissal() {
    let manager = manager();
    let count = Arc::new(AtomicUsize::new(0));

    manager.show_and_stack(counted("a", &count));
    settle().await;
    assert!(manager.dismiss("a").is_applied());
    settle().await;
    assert!(matches!(manager.dismiss("a"), PerformOutcome::Unchanged));

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(manager.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_debounce_drops_second_call() {
    let manager = manager();

    assert!(manager.show_and_stack(centre("a")).is_applied());
    tokio::time::advance(Duration::from_millis(100)).await;
    assert!(manager.show_and_stack(centre("b")).is_debounced());

    assert_eq!(ids(&manager), vec!["a"]);
    assert!(manager.cooldown_remaining().is_some());

    settle().await;
    assert!(manager.cooldown_remaining().is_none());
    assert!(manager.show_and_stack(centre("b")).is_applied());
    assert_eq!(ids(&manager), vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn test_debounced_dismiss_keeps_popup() {
    let manager = manager();
    let count = Arc::new(AtomicUsize::new(0));

    manager.show_and_stack(counted("a", &count));
    assert!(manager.dismiss_last().is_debounced());

    assert_eq!(manager.len(), 1);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dismiss_last_and_all_fire_in_order() {
    let manager = manager();
    let order = Arc::new(Mutex::new(Vec::new()));

    for id in ["a", "b", "c"] {
        let order = order.clone();
        manager.show_and_stack(centre(id).on_dismiss(move || order.lock().push(id)));
        settle().await;
    }

    manager.dismiss_last();
    settle().await;
    assert_eq!(ids(&manager), vec!["a", "b"]);

    manager.dismiss_all();
    assert!(manager.is_empty());
    assert_eq!(*order.lock(), vec!["c", "a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn test_dismiss_type_matches_default_ids_only() {
    let manager = manager();

    manager.show_and_stack(AnyPopup::new(Dialog));
    settle().await;
    manager.show_and_stack(AnyPopup::new(Dialog).with_id("custom-dialog"));
    settle().await;

    assert!(manager.dismiss_type::<Dialog>().is_applied());
    assert_eq!(ids(&manager), vec!["custom-dialog"]);
    settle().await;

    assert!(matches!(manager.dismiss_type::<Dialog>(), PerformOutcome::Unchanged));
}

#[tokio::test(start_paused = true)]
async fn test_anchor_views_partition_in_order() {
    let manager = manager();
    let popups = [
        AnyPopup::new(Banner).with_id("t1"),
        AnyPopup::new(Sheet).with_id("b1"),
        AnyPopup::new(Dialog).with_id("c1"),
        AnyPopup::new(Banner).with_id("t2"),
        AnyPopup::new(Sheet).with_id("b2"),
        AnyPopup::new(Dialog).with_id("c2"),
    ];
    for popup in popups {
        manager.show_and_stack(popup);
        settle().await;
    }

    let top: Vec<String> = manager.top_items().iter().map(|a| a.popup.id().to_string()).collect();
    let centre: Vec<String> = manager.centre_items().iter().map(|a| a.popup.id().to_string()).collect();
    let bottom: Vec<String> = manager.bottom_items().iter().map(|a| a.popup.id().to_string()).collect();

    assert_eq!(top, vec!["t1", "t2"]);
    assert_eq!(centre, vec!["c1", "c2"]);
    assert_eq!(bottom, vec!["b1", "b2"]);
    assert_eq!(top.len() + centre.len() + bottom.len(), manager.len());
}

#[tokio::test(start_paused = true)]
async fn test_anchored_config_is_typed() {
    let manager = manager();
    manager.show_and_stack(AnyPopup::new(Sheet));

    let items = manager.bottom_items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].config, BottomPopupConfig::default());
    assert!(manager.top_items().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_notifications_only_on_applied_mutations() {
    let manager = manager();
    let mut updates = manager.subscribe();
    assert!(!updates.has_changed().unwrap());

    manager.show_and_stack(centre("a"));
    assert!(updates.has_changed().unwrap());
    let snapshot = updates.borrow_and_update().clone();
    assert_eq!(snapshot.revision(), 1);
    assert_eq!(snapshot.len(), 1);

    // Debounced
    manager.show_and_stack(centre("b"));
    assert!(!updates.has_changed().unwrap());

    // No-op after the cooldown
    settle().await;
    manager.show_and_stack(centre("a"));
    assert!(!updates.has_changed().unwrap());

    settle().await;
    manager.dismiss("a");
    assert!(updates.has_changed().unwrap());
    let snapshot = updates.borrow_and_update().clone();
    assert_eq!(snapshot.revision(), 2);
    assert!(snapshot.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_callback_reentry_is_debounced() {
    let manager = Arc::new(manager());
    let reentry = Arc::new(Mutex::new(None));

    let handle = Arc::downgrade(&manager);
    let result = reentry.clone();
    manager.show_and_stack(centre("a").on_dismiss(move || {
        if let Some(manager) = handle.upgrade() {
            *result.lock() = Some(manager.show_and_stack(centre("from-callback")).is_debounced());
        }
    }));
    settle().await;

    manager.dismiss("a");
    assert_eq!(*reentry.lock(), Some(true));
    assert!(manager.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_teardown_fires_callbacks_and_publishes() {
    let manager = manager();
    let count = Arc::new(AtomicUsize::new(0));
    let mut updates = manager.subscribe();

    manager.show_and_stack(counted("a", &count));
    settle().await;
    manager.show_and_stack(counted("b", &count));
    updates.borrow_and_update();

    // Guard still armed: teardown bypasses it
    let removed = manager.teardown();
    assert_eq!(removed.len(), 2);
    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert!(updates.has_changed().unwrap());
    assert!(manager.snapshot().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_teardown_from_callback_is_not_overwritten() {
    let manager = Arc::new(manager());
    let mut updates = manager.subscribe();

    manager.show_and_stack(centre("keep"));
    settle().await;
    let handle = Arc::downgrade(&manager);
    manager.show_and_stack(centre("last").on_dismiss(move || {
        if let Some(manager) = handle.upgrade() {
            manager.teardown();
        }
    }));
    settle().await;
    let before = updates.borrow_and_update().revision();

    assert!(manager.dismiss_last().is_applied());

    let published = updates.borrow().clone();
    assert_eq!(published.revision(), before + 2);
    assert_eq!(published.ids(), manager.ids());
    assert!(manager.is_empty());
}
