use core::fmt;
use thiserror::Error;

/// Contract violations reported by handle operations.
///
/// Exported from the crate root only:
///
/// ```compile_fail
/// use smart_ref::error::RefError;
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Error)]
pub enum RefError {
    /// `revive` was given an empty weak handle or a block that is not dead.
    #[error("invalid revive: control block is missing or not dead")]
    InvalidRevive,
    /// A holder was registered through a handle with no control block.
    #[error("handle is empty")]
    HandleEmpty,
    /// `shared_from_this` on an object that is not (or no longer) owned.
    #[error("object is not owned by a SharedRef")]
    NotOwned,
    /// A projected view cannot register a holder for its block.
    #[error("projected handle does not view its block's object")]
    Projected,
}

/// Failed revive. Carries back the object that was not installed.
#[derive(Error)]
#[error("invalid revive: control block is missing or not dead")]
pub struct ReviveError<T> {
    object: T,
}

impl<T> ReviveError<T> {
    pub(crate) fn new(object: T) -> Self {
        Self { object }
    }

    pub fn object(&self) -> &T {
        &self.object
    }

    /// Recover the rejected object.
    pub fn into_inner(self) -> T {
        self.object
    }
}

impl<T> fmt::Debug for ReviveError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviveError").finish_non_exhaustive()
    }
}

impl<T> From<ReviveError<T>> for RefError {
    fn from(_: ReviveError<T>) -> Self {
        RefError::InvalidRevive
    }
}
