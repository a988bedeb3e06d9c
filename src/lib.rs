//! # popup-stack
//!
//! Stack manager for overlay popups anchored to the top, centre or bottom
//! of the screen, above an application's view hierarchy.
//!
//! ## Architecture
//!
//! popup-stack is built around a single serialized mutation engine:
//! - `popup`: Popup capability trait, anchor configs and the erased `AnyPopup` record
//! - `stack`: Ordered popup collection with id uniqueness
//! - `engine`: Stack mutations, debounce guard and focus hook
//! - `manager`: Per-overlay-root popup manager with snapshot subscriptions
//! - `registry`: Named managers, the immortal root and scoped managers
//! - `context`: Process-wide context, cross-thread dispatcher and main loop
//! - `config`: Configuration parsing and management
//! - `scenario`: Scripted scenarios replayed by the CLI
//!
//! ## Usage
//!
//! ```rust,no_run
//! use popup_stack::{NoopFocus, Popup, PopupContext, StackConfig, TopPopupConfig};
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
//!     let root = context.registry().root_manager();
//!     let mut updates = root.subscribe();
//!
//!     context.dispatcher().show_and_stack(root.id(), context.popup(Toast));
//!     updates.changed().await?;
//!     assert_eq!(updates.borrow().top_items().len(), 1);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod manager;
pub mod popup;
pub mod registry;
pub mod scenario;
pub mod stack;
pub mod sync;

// Re-export main types for easy access
pub use config::StackConfig;
pub use context::{MainLoop, PopupContext, PopupDispatcher};
pub use engine::{FocusDismisser, NoopFocus, PerformOutcome, StackEngine, StackOperation};
pub use error::PopupError;
pub use manager::{Anchored, PopupManager, PopupSnapshot};
pub use popup::{
    Anchor, AnyPopup, AutoDismiss, BottomPopupConfig, CentrePopupConfig, Popup, PopupConfig, PopupId,
    TopPopupConfig,
};
pub use registry::{ManagerId, ManagerRegistry, PopupScope, ScopedManager, ROOT_ID};

// Re-export common error types
pub use anyhow::{Context, Error, Result};

/// Version information for popup-stack
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
