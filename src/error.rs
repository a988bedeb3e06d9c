//! Typed failure reasons
//!
//! Core stack mutations never fail; they degrade to no-ops. The variants
//! below explain why a request from outside the main context was not
//! accepted, for callers that want more than a `bool`.

use thiserror::Error;

use crate::registry::ManagerId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PopupError {
    #[error("no popup manager registered under id `{0}`")]
    ManagerNotFound(ManagerId),

    #[error("popup main loop has shut down")]
    ContextClosed,

    #[error("manager id `{0}` is reserved")]
    ReservedId(ManagerId),
}
