//! Holder protocol: synchronous lifecycle notifications for an external
//! container that indexes control blocks.
//!
//! A block stores at most one holder, as a non-owning `std::rc::Weak`, so
//! the block never controls the holder's lifetime. A holder that has been
//! dropped is simply not notified.

use crate::block::{BlockId, RefBlock};
use crate::trace;
use crate::weak_ref::WeakRef;
use core::any::Any;
use core::cell::Cell;
use core::ptr::NonNull;
use std::rc::{Rc, Weak};

/// Lifecycle observer for blocks whose native object type is `T`.
///
/// Both methods are invoked by the handle types only.
pub trait RefHolder<T>: 'static {
    /// Called once per registration that attaches this holder to a block.
    ///
    /// `handle` observes the block. The holder may record `handle.id()` or
    /// `handle.as_raw()` as an uncounted index entry, lock it, or clone it.
    /// A cloned weak handle keeps the block allocated, which also defers
    /// `unhold_ref` for as long as the clone exists.
    fn hold_ref(&self, handle: &WeakRef<T>);

    /// Called once when the block is detached from this holder: when both
    /// counts reach zero, right before the block is released, or when another
    /// holder replaces this one. Never when only the object dies.
    fn unhold_ref(&self, block: BlockId);

    /// Called instead of `unhold_ref` when a handle's `unregister_holder`
    /// detaches this holder. The block stays allocated; entries recorded
    /// from it in `hold_ref` must be dropped here.
    fn detach_ref(&self, block: BlockId) {
        let _ = block;
    }
}

pub(crate) struct ErasedHolder {
    holder: Weak<dyn Any>,
    unhold: fn(&dyn Any, BlockId),
    detach: fn(&dyn Any, BlockId),
}

fn unhold_as<T, H: RefHolder<T>>(holder: &dyn Any, block: BlockId) {
    if let Some(holder) = holder.downcast_ref::<H>() {
        holder.unhold_ref(block);
    }
}

fn detach_as<T, H: RefHolder<T>>(holder: &dyn Any, block: BlockId) {
    if let Some(holder) = holder.downcast_ref::<H>() {
        holder.detach_ref(block);
    }
}

impl ErasedHolder {
    fn new<T, H: RefHolder<T>>(holder: &Rc<H>) -> Self {
        let weak: Weak<H> = Rc::downgrade(holder);
        Self {
            holder: weak,
            unhold: unhold_as::<T, H>,
            detach: detach_as::<T, H>,
        }
    }

    fn is<H: ?Sized>(&self, holder: *const H) -> bool {
        self.holder.as_ptr().cast::<()>() == holder.cast::<()>()
    }

    pub(crate) fn notify_unhold(self, block: BlockId) {
        if let Some(holder) = self.holder.upgrade() {
            (self.unhold)(&*holder, block);
        }
    }

    fn notify_detach(self, block: BlockId) {
        if let Some(holder) = self.holder.upgrade() {
            (self.detach)(&*holder, block);
        }
    }
}

/// The holder field of a control block.
pub(crate) struct HolderSlot {
    current: Cell<Option<ErasedHolder>>,
}

impl HolderSlot {
    pub(crate) const fn new() -> Self {
        Self {
            current: Cell::new(None),
        }
    }

    pub(crate) fn take(&self) -> Option<ErasedHolder> {
        self.current.take()
    }

    fn replace(&self, holder: ErasedHolder) -> Option<ErasedHolder> {
        self.current.replace(Some(holder))
    }

    pub(crate) fn is_held_by<H: ?Sized>(&self, holder: *const H) -> bool {
        let current = self.current.take();
        let held = current.as_ref().is_some_and(|c| c.is(holder));
        self.current.set(current);
        held
    }

    pub(crate) fn is_empty(&self) -> bool {
        let current = self.current.take();
        let empty = current.is_none();
        self.current.set(current);
        empty
    }
}

/// Attach `holder` to `block` and deliver `hold_ref`.
///
/// Re-registering the holder already attached is a no-op. A different
/// holder already attached is detached (with `unhold_ref`) first.
///
/// # Safety
/// The caller holds a share on `block`, and `T` is the block's native type.
pub(crate) unsafe fn register<T, H: RefHolder<T>>(block: NonNull<RefBlock>, holder: &Rc<H>) {
    let b = block.as_ref();
    let _guard = b.registration.enter();
    if b.holder.is_held_by(Rc::as_ptr(holder)) {
        return;
    }
    let id = b.id();
    if let Some(previous) = b.holder.replace(ErasedHolder::new::<T, H>(holder)) {
        trace::holder_detached(id);
        previous.notify_unhold(id);
    }
    trace::holder_attached(id);
    let handle = WeakRef::<T>::from_block(block);
    holder.hold_ref(&handle);
}

/// Detach the holder attached to `block`, delivering `detach_ref`.
///
/// Returns false when no holder was attached.
///
/// # Safety
/// The caller holds a share on `block`.
pub(crate) unsafe fn unregister(block: NonNull<RefBlock>) -> bool {
    let b = block.as_ref();
    let _guard = b.registration.enter();
    let Some(previous) = b.holder.take() else {
        return false;
    };
    let id = b.id();
    trace::holder_detached(id);
    previous.notify_detach(id);
    true
}
