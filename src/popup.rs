//! Popup identity, anchor configuration and type erasure
//!
//! A popup is anything implementing [`Popup`]. Its associated `Config` type
//! decides which anchor (top, centre or bottom) it is rendered at. Before a
//! popup is stored it is erased into an [`AnyPopup`], which carries the anchor
//! tag explicitly in its [`PopupConfig`] so the rendering layer never has to
//! guess the variant from the content.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::PopupDefaults;

/// Identity key of a popup inside one manager's stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PopupId(String);

impl PopupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Default identifier of popup type `P`: its fully-qualified type name.
    pub fn of<P: ?Sized>() -> Self {
        Self(std::any::type_name::<P>().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PopupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PopupId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PopupId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Screen edge (or centre) a popup is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Top,
    Centre,
    Bottom,
}

impl Anchor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Anchor::Top => "top",
            Anchor::Centre => "centre",
            Anchor::Bottom => "bottom",
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration of popups anchored to the top edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopPopupConfig {
    /// Corner radius (points)
    pub corner_radius: f64,

    /// Horizontal padding from the screen edges (points)
    pub horizontal_padding: f64,

    /// Padding from the top edge (points)
    pub top_padding: f64,

    /// Opacity of the dimming overlay behind the stack (0.0-1.0)
    pub overlay_opacity: f64,

    /// Tapping outside the popup dismisses it
    pub tap_outside_dismisses: bool,

    /// Dragging the popup towards the edge dismisses it
    pub drag_to_dismiss: bool,

    /// Maximum number of stacked popups drawn behind the top-most one
    pub stack_limit: u32,
}

impl Default for TopPopupConfig {
    fn default() -> Self {
        Self {
            corner_radius: 24.0,
            horizontal_padding: 0.0,
            top_padding: 0.0,
            overlay_opacity: 0.44,
            tap_outside_dismisses: false,
            drag_to_dismiss: true,
            stack_limit: 3,
        }
    }
}

/// Configuration of popups shown in the centre of the screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentrePopupConfig {
    /// Corner radius (points)
    pub corner_radius: f64,

    /// Horizontal padding from the screen edges (points)
    pub horizontal_padding: f64,

    /// Opacity of the dimming overlay behind the popup (0.0-1.0)
    pub overlay_opacity: f64,

    /// Tapping outside the popup dismisses it
    pub tap_outside_dismisses: bool,
}

impl Default for CentrePopupConfig {
    fn default() -> Self {
        Self {
            corner_radius: 24.0,
            horizontal_padding: 12.0,
            overlay_opacity: 0.44,
            tap_outside_dismisses: false,
        }
    }
}

/// Configuration of popups anchored to the bottom edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BottomPopupConfig {
    /// Corner radius (points)
    pub corner_radius: f64,

    /// Horizontal padding from the screen edges (points)
    pub horizontal_padding: f64,

    /// Padding from the bottom edge (points)
    pub bottom_padding: f64,

    /// Opacity of the dimming overlay behind the stack (0.0-1.0)
    pub overlay_opacity: f64,

    /// Tapping outside the popup dismisses it
    pub tap_outside_dismisses: bool,

    /// Dragging the popup towards the edge dismisses it
    pub drag_to_dismiss: bool,

    /// Maximum number of stacked popups drawn behind the top-most one
    pub stack_limit: u32,

    /// Popup content stretches to the full screen height
    pub fills_screen: bool,
}

impl Default for BottomPopupConfig {
    fn default() -> Self {
        Self {
            corner_radius: 40.0,
            horizontal_padding: 0.0,
            bottom_padding: 0.0,
            overlay_opacity: 0.44,
            tap_outside_dismisses: false,
            drag_to_dismiss: true,
            stack_limit: 3,
            fills_screen: false,
        }
    }
}

/// Anchor-tagged configuration stored with every erased popup
#[derive(Debug, Clone, PartialEq)]
pub enum PopupConfig {
    Top(TopPopupConfig),
    Centre(CentrePopupConfig),
    Bottom(BottomPopupConfig),
}

impl PopupConfig {
    pub fn anchor(&self) -> Anchor {
        match self {
            PopupConfig::Top(_) => Anchor::Top,
            PopupConfig::Centre(_) => Anchor::Centre,
            PopupConfig::Bottom(_) => Anchor::Bottom,
        }
    }

    /// Base configuration for `anchor` taken from the configured defaults
    pub fn base(anchor: Anchor, defaults: &PopupDefaults) -> Self {
        match anchor {
            Anchor::Top => PopupConfig::Top(defaults.top.clone()),
            Anchor::Centre => PopupConfig::Centre(defaults.centre.clone()),
            Anchor::Bottom => PopupConfig::Bottom(defaults.bottom.clone()),
        }
    }
}

/// Implemented by the three anchor configurations.
pub trait AnchorConfig: Clone + Default + Send + Sync + 'static {
    const ANCHOR: Anchor;

    fn into_config(self) -> PopupConfig;

    /// Borrow `Self` out of a tagged config when the anchor matches.
    fn project(config: &PopupConfig) -> Option<&Self>;

    fn from_defaults(defaults: &PopupDefaults) -> Self;
}

impl AnchorConfig for TopPopupConfig {
    const ANCHOR: Anchor = Anchor::Top;

    fn into_config(self) -> PopupConfig {
        PopupConfig::Top(self)
    }

    fn project(config: &PopupConfig) -> Option<&Self> {
        match config {
            PopupConfig::Top(config) => Some(config),
            _ => None,
        }
    }

    fn from_defaults(defaults: &PopupDefaults) -> Self {
        defaults.top.clone()
    }
}

impl AnchorConfig for CentrePopupConfig {
    const ANCHOR: Anchor = Anchor::Centre;

    fn into_config(self) -> PopupConfig {
        PopupConfig::Centre(self)
    }

    fn project(config: &PopupConfig) -> Option<&Self> {
        match config {
            PopupConfig::Centre(config) => Some(config),
            _ => None,
        }
    }

    fn from_defaults(defaults: &PopupDefaults) -> Self {
        defaults.centre.clone()
    }
}

impl AnchorConfig for BottomPopupConfig {
    const ANCHOR: Anchor = Anchor::Bottom;

    fn into_config(self) -> PopupConfig {
        PopupConfig::Bottom(self)
    }

    fn project(config: &PopupConfig) -> Option<&Self> {
        match config {
            PopupConfig::Bottom(config) => Some(config),
            _ => None,
        }
    }

    fn from_defaults(defaults: &PopupDefaults) -> Self {
        defaults.bottom.clone()
    }
}

/// Self-dismissal request of a popup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AutoDismiss {
    #[default]
    Disabled,
    After(Duration),
}

/// A transient overlay view.
///
/// # Examples
///
/// ```
/// use popup_stack::popup::{AnyPopup, CentrePopupConfig, Popup};
///
/// struct Confirm;
///
/// impl Popup for Confirm {
///     type Config = CentrePopupConfig;
///
///     fn configure(&self, config: CentrePopupConfig) -> CentrePopupConfig {
///         CentrePopupConfig { tap_outside_dismisses: true, ..config }
///     }
/// }
///
/// let popup = AnyPopup::new(Confirm);
/// assert_eq!(popup.anchor(), popup_stack::popup::Anchor::Centre);
/// ```
pub trait Popup: Send + Sync + 'static {
    type Config: AnchorConfig;

    /// Identifier inside a manager. Override to show several instances of
    /// the same popup type at once.
    fn id(&self) -> PopupId {
        PopupId::of::<Self>()
    }

    /// Pure transform applied to the base configuration of the anchor.
    fn configure(&self, config: Self::Config) -> Self::Config {
        config
    }

    fn auto_dismiss(&self) -> AutoDismiss {
        AutoDismiss::Disabled
    }
}

type DismissCallback = Box<dyn FnOnce() + Send>;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Type-erased popup record stored in a [`PopupStack`](crate::stack::PopupStack).
///
/// Clones share the content and the dismissal slot, so the dismissal
/// callback fires at most once no matter how many snapshots hold a clone.
#[derive(Clone)]
pub struct AnyPopup {
    id: PopupId,
    token: u64,
    config: PopupConfig,
    content: Arc<dyn Any + Send + Sync>,
    on_dismiss: Arc<Mutex<Option<DismissCallback>>>,
    auto_dismiss: AutoDismiss,
}

impl AnyPopup {
    /// Erase `popup`, configuring it from the anchor's default config.
    pub fn new<P: Popup>(popup: P) -> Self {
        Self::with_base(popup, P::Config::default())
    }

    /// Erase `popup`, configuring it from the process-wide defaults.
    pub fn with_defaults<P: Popup>(popup: P, defaults: &PopupDefaults) -> Self {
        Self::with_base(popup, P::Config::from_defaults(defaults))
    }

    fn with_base<P: Popup>(popup: P, base: P::Config) -> Self {
        let id = popup.id();
        let config = popup.configure(base).into_config();
        let auto_dismiss = popup.auto_dismiss();
        Self::from_parts(id, config, popup).with_auto_dismiss(auto_dismiss)
    }

    /// Build a record whose anchor is only known at runtime.
    pub fn from_parts<T: Any + Send + Sync>(id: impl Into<PopupId>, config: PopupConfig, content: T) -> Self {
        Self {
            id: id.into(),
            token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
            config,
            content: Arc::new(content),
            on_dismiss: Arc::new(Mutex::new(None)),
            auto_dismiss: AutoDismiss::Disabled,
        }
    }

    pub fn with_id(mut self, id: impl Into<PopupId>) -> Self {
        self.id = id.into();
        self
    }

    /// Register the callback invoked once when the popup leaves its stack.
    pub fn on_dismiss<F>(self, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        *self.on_dismiss.lock() = Some(Box::new(callback));
        self
    }

    pub fn with_auto_dismiss(mut self, auto_dismiss: AutoDismiss) -> Self {
        self.auto_dismiss = auto_dismiss;
        self
    }

    pub fn auto_dismiss_after(self, delay: Duration) -> Self {
        self.with_auto_dismiss(AutoDismiss::After(delay))
    }

    pub fn id(&self) -> &PopupId {
        &self.id
    }

    /// Process-unique instance token, distinct even for equal ids.
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn anchor(&self) -> Anchor {
        self.config.anchor()
    }

    pub fn config(&self) -> &PopupConfig {
        &self.config
    }

    pub fn auto_dismiss(&self) -> AutoDismiss {
        self.auto_dismiss
    }

    /// Downcast the renderable content back to its concrete type.
    pub fn content<T: Any>(&self) -> Option<&T> {
        self.content.downcast_ref::<T>()
    }

    pub fn has_dismiss_callback(&self) -> bool {
        self.on_dismiss.lock().is_some()
    }

    /// Fire the dismissal callback if it has not fired yet.
    ///
    /// Returns `true` when a callback ran.
    pub(crate) fn notify_dismissed(&self) -> bool {
        // Take under the lock, call outside it: the callback may touch this popup.
        let callback = self.on_dismiss.lock().take();
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for AnyPopup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyPopup")
            .field("id", &self.id)
            .field("token", &self.token)
            .field("anchor", &self.anchor())
            .field("auto_dismiss", &self.auto_dismiss)
            .finish_non_exhaustive()
    }
}

/// Equality is identity: two records are equal when their ids match.
impl PartialEq for AnyPopup {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AnyPopup {}
