//! Control block: the shared bookkeeping record behind every handle.
//!
//! A block is a separate heap allocation holding the type-erased managed
//! object, the strong and weak counters, the optional holder and a tagged
//! lifecycle slot. The object is released the instant the strong count
//! reaches zero; the block itself survives until the weak count reaches zero
//! as well, so a dead block keeps a stable address for `lock` and `revive`.
//!
//! Only the handle types touch a block, and only through this module.

use crate::holder::HolderSlot;
use crate::reentrancy::DebugReentrancy;
use crate::tokens::{Count, StrongKind, Token, UsizeCount, WeakKind};
use crate::trace;
use core::cell::Cell;
use core::fmt;
use core::ptr::NonNull;

pub(crate) type StrongToken = Token<'static, UsizeCount<StrongKind>>;
pub(crate) type WeakToken = Token<'static, UsizeCount<WeakKind>>;

/// Lifecycle of a control block as observed through a handle.
///
/// A block is released once both counts reach zero, so no handle ever sees
/// it past `Dead`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Lifecycle {
    /// Allocated by `SharedRef::new_cyclic`; the object is still being built.
    Pending,
    /// Owns a live object.
    Live,
    /// Object dropped while weak observers remain. `revive` only accepts
    /// blocks in this state.
    Dead,
}

#[derive(Copy, Clone)]
enum Slot {
    Pending,
    Live {
        object: NonNull<()>,
        drop_object: unsafe fn(NonNull<()>),
    },
    Dead,
}

impl Slot {
    fn lifecycle(self) -> Lifecycle {
        match self {
            Slot::Pending => Lifecycle::Pending,
            Slot::Live { .. } => Lifecycle::Live,
            Slot::Dead => Lifecycle::Dead,
        }
    }
}

/// Identity of a control block.
///
/// Stable while any handle refers to the block, including the dead window
/// before a revive. Holders use it as a lookup key; it is handed to
/// `RefHolder::unhold_ref` right before the block is released, after which
/// the same value may be reused by a new allocation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct BlockId(usize);

impl BlockId {
    pub(crate) fn of(block: NonNull<RefBlock>) -> Self {
        BlockId(block.as_ptr() as usize)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

pub(crate) struct RefBlock {
    strong: UsizeCount<StrongKind>,
    weak: UsizeCount<WeakKind>,
    slot: Cell<Slot>,
    pub(crate) holder: HolderSlot,
    pub(crate) registration: DebugReentrancy,
}

unsafe fn drop_boxed<T>(object: NonNull<()>) {
    drop(Box::from_raw(object.cast::<T>().as_ptr()));
}

impl RefBlock {
    fn alloc(slot: Slot) -> NonNull<RefBlock> {
        let block = NonNull::from(Box::leak(Box::new(RefBlock {
            strong: UsizeCount::new(),
            weak: UsizeCount::new(),
            slot: Cell::new(slot),
            holder: HolderSlot::new(),
            registration: DebugReentrancy::new(),
        })));
        trace::block_allocated(unsafe { block.as_ref() }.id());
        block
    }

    /// Allocate a block owning `object` and mint the first strong share.
    pub(crate) fn new_live<T>(object: Box<T>) -> (NonNull<RefBlock>, NonNull<T>, StrongToken) {
        let block = Self::alloc(Slot::Pending);
        // Fresh block: `T` becomes its native type.
        let (object, token) = unsafe { block.as_ref().attach(object) };
        (block, object, token)
    }

    /// Allocate a block with no object yet and mint one weak share for the
    /// constructor that will complete it.
    pub(crate) fn new_pending() -> (NonNull<RefBlock>, WeakToken) {
        let block = Self::alloc(Slot::Pending);
        let token = unsafe { block.as_ref() }.weak.get();
        (block, token)
    }

    pub(crate) fn id(&self) -> BlockId {
        BlockId(self as *const Self as usize)
    }

    pub(crate) fn strong_count(&self) -> usize {
        self.strong.count()
    }

    pub(crate) fn weak_count(&self) -> usize {
        self.weak.count()
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        self.slot.get().lifecycle()
    }

    /// The managed object, if the block is live.
    pub(crate) fn object(&self) -> Option<NonNull<()>> {
        match self.slot.get() {
            Slot::Live { object, .. } => Some(object),
            _ => None,
        }
    }

    /// Mint another strong share. The block must be live.
    pub(crate) fn acquire_strong(&self) -> StrongToken {
        debug_assert!(self.object().is_some(), "strong share on a block without an object");
        self.strong.get()
    }

    pub(crate) fn acquire_weak(&self) -> WeakToken {
        self.weak.get()
    }

    /// Promote to ownership if the object is still alive.
    pub(crate) fn upgrade(&self) -> Option<(NonNull<()>, StrongToken)> {
        let object = self.object()?;
        Some((object, self.strong.get()))
    }

    /// Reattach a fresh object to a dead block.
    ///
    /// # Safety
    /// `T` must be the block's native object type.
    pub(crate) unsafe fn revive<T>(&self, object: Box<T>) -> Result<(NonNull<T>, StrongToken), Box<T>> {
        if !matches!(self.slot.get(), Slot::Dead) {
            return Err(object);
        }
        debug_assert_eq!(self.strong.count(), 0);
        let attached = self.attach(object);
        trace::block_revived(self.id());
        Ok(attached)
    }

    /// Install the object built by a cyclic constructor.
    ///
    /// # Safety
    /// `T` must be the block's native object type.
    pub(crate) unsafe fn complete<T>(&self, object: Box<T>) -> (NonNull<T>, StrongToken) {
        debug_assert!(matches!(self.slot.get(), Slot::Pending));
        self.attach(object)
    }

    unsafe fn attach<T>(&self, object: Box<T>) -> (NonNull<T>, StrongToken) {
        let object = NonNull::from(Box::leak(object));
        self.slot.set(Slot::Live {
            object: object.cast(),
            drop_object: drop_boxed::<T>,
        });
        (object, self.strong.get())
    }
}

/// Return a strong share.
///
/// When the last owner leaves, the object is dropped; if no observers
/// remain, the holder is detached and the block is freed first.
///
/// # Safety
/// `block` must not be freed and `token` must come from its strong counter.
pub(crate) unsafe fn release_strong(block: NonNull<RefBlock>, token: StrongToken) {
    let (object, drop_object, observed) = {
        let b = block.as_ref();
        if !b.strong.put(token) {
            return;
        }
        let Slot::Live { object, drop_object } = b.slot.replace(Slot::Dead) else {
            unreachable!("strong count reached zero on a block without a live object");
        };
        trace::object_dropped(b.id());
        (object, drop_object, b.weak.count() > 0)
    };
    if observed {
        // The object's drop may return the last weak share (a self
        // reference, for one) and free the block: do not touch it afterwards.
        drop_object(object);
    } else {
        free(block);
        drop_object(object);
    }
}

/// Return a weak share, freeing the block if it was the last share of any kind.
///
/// # Safety
/// `block` must not be freed and `token` must come from its weak counter.
pub(crate) unsafe fn release_weak(block: NonNull<RefBlock>, token: WeakToken) {
    let unreferenced = {
        let b = block.as_ref();
        b.weak.put(token) && b.strong.count() == 0
    };
    if unreferenced {
        free(block);
    }
}

unsafe fn free(block: NonNull<RefBlock>) {
    {
        let b = block.as_ref();
        let id = b.id();
        if let Some(holder) = b.holder.take() {
            trace::holder_detached(id);
            holder.notify_unhold(id);
        }
        trace::block_freed(id);
    }
    drop(Box::from_raw(block.as_ptr()));
}
