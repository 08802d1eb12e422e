//! Self-reference capability: an object that can hand out handles to itself.

use crate::error::RefError;
use crate::shared_ref::SharedRef;
use crate::weak_ref::WeakRef;
use core::cell::RefCell;
use core::fmt;

/// Weak handle an object keeps to its own control block.
///
/// Empty until the object is placed into a block by
/// `SharedRef::new_with_self` or `SharedRef::revive_with_self`, or until a
/// `new_cyclic` constructor stores the weak handle it was given through
/// [`SelfRef::from_weak`]. Cloning yields an empty `SelfRef`: a copied object
/// is a different object and is not owned by anything yet.
pub struct SelfRef<T> {
    weak: RefCell<WeakRef<T>>,
}

impl<T> SelfRef<T> {
    pub const fn new() -> Self {
        Self {
            weak: RefCell::new(WeakRef::new()),
        }
    }

    /// For `SharedRef::new_cyclic` constructors.
    pub fn from_weak(weak: &WeakRef<T>) -> Self {
        Self {
            weak: RefCell::new(weak.clone()),
        }
    }

    pub(crate) fn install(&self, weak: WeakRef<T>) {
        let previous = self.weak.replace(weak);
        drop(previous);
    }

    /// Strong handle to the owning block, or `NotOwned` if the object was
    /// never wrapped or its block has died.
    pub fn shared(&self) -> Result<SharedRef<T>, RefError> {
        let strong = self.weak.borrow().lock();
        if strong.is_empty() {
            return Err(RefError::NotOwned);
        }
        Ok(strong)
    }

    /// Copy of the stored weak handle; may be empty or expired.
    pub fn weak(&self) -> WeakRef<T> {
        self.weak.borrow().clone()
    }
}

impl<T> Default for SelfRef<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SelfRef<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SelfRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SelfRef").field(&self.weak.borrow().id()).finish()
    }
}

/// Objects that embed a [`SelfRef`] to themselves.
///
/// ```
/// use smart_ref::{EnableSharedRefFromThis, SelfRef, SharedRef};
///
/// struct Node {
///     this: SelfRef<Node>,
///     label: &'static str,
/// }
///
/// impl EnableSharedRefFromThis for Node {
///     fn self_ref(&self) -> &SelfRef<Self> {
///         &self.this
///     }
/// }
///
/// let node = SharedRef::new_with_self(Node { this: SelfRef::new(), label: "a" });
/// let again = node.shared_from_this().unwrap();
/// assert_eq!(again.label, "a");
/// assert_eq!(node.strong_count(), 2);
/// ```
pub trait EnableSharedRefFromThis: Sized {
    fn self_ref(&self) -> &SelfRef<Self>;

    fn shared_from_this(&self) -> Result<SharedRef<Self>, RefError> {
        self.self_ref().shared()
    }

    fn weak_from_this(&self) -> WeakRef<Self> {
        self.self_ref().weak()
    }
}
