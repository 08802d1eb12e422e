//! Weak (observing) handle and the uncounted block identity.

use crate::block::{release_weak, BlockId, Lifecycle, RefBlock, WeakToken};
use crate::error::RefError;
use crate::holder::{self, RefHolder};
use crate::shared_ref::SharedRef;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::ptr::NonNull;
use std::rc::Rc;

struct WeakShare {
    block: NonNull<RefBlock>,
    token: WeakToken,
}

/// Non-owning reference to a control block whose native object type is `T`.
///
/// A weak handle never caches the object: every access re-checks the block,
/// so a handle taken before the object died observes a revived object
/// without being touched.
///
/// Invariant in `T`, like `SharedRef`:
///
/// ```compile_fail
/// use smart_ref::WeakRef;
///
/// fn shorten<'a>(w: &WeakRef<&'static str>) -> &WeakRef<&'a str> {
///     w
/// }
/// ```
pub struct WeakRef<T> {
    share: Option<WeakShare>,
    _marker: PhantomData<*mut T>,
}

impl<T> WeakRef<T> {
    /// An empty weak handle; `lock` always yields an empty `SharedRef`.
    pub const fn new() -> Self {
        Self {
            share: None,
            _marker: PhantomData,
        }
    }

    /// Take a weak share on `block`.
    ///
    /// Callers guarantee the block is not freed and that `T` is its native type.
    pub(crate) fn from_block(block: NonNull<RefBlock>) -> Self {
        let token = unsafe { block.as_ref() }.acquire_weak();
        Self::from_parts(block, token)
    }

    pub(crate) fn from_parts(block: NonNull<RefBlock>, token: WeakToken) -> Self {
        Self {
            share: Some(WeakShare { block, token }),
            _marker: PhantomData,
        }
    }

    fn block(&self) -> Option<&RefBlock> {
        // A weak share keeps the block allocated.
        self.share.as_ref().map(|s| unsafe { s.block.as_ref() })
    }

    pub(crate) fn block_ptr(&self) -> Option<NonNull<RefBlock>> {
        self.share.as_ref().map(|s| s.block)
    }

    /// Promote to a strong handle. Empty if this handle is empty or the
    /// object is gone.
    pub fn lock(&self) -> SharedRef<T> {
        let Some(share) = &self.share else {
            return SharedRef::empty();
        };
        match unsafe { share.block.as_ref() }.upgrade() {
            Some((object, token)) => SharedRef::from_parts(object.cast::<T>(), share.block, token, false),
            None => SharedRef::empty(),
        }
    }

    /// True iff this handle is empty or the object is gone.
    pub fn expired(&self) -> bool {
        self.block().map_or(true, |b| b.object().is_none())
    }

    /// True iff this handle refers to no block.
    pub fn is_empty(&self) -> bool {
        self.share.is_none()
    }

    /// Return the weak share and become empty.
    pub fn reset(&mut self) {
        if let Some(WeakShare { block, token }) = self.share.take() {
            unsafe { release_weak(block, token) };
        }
    }

    pub fn strong_count(&self) -> usize {
        self.block().map_or(0, RefBlock::strong_count)
    }

    pub fn weak_count(&self) -> usize {
        self.block().map_or(0, RefBlock::weak_count)
    }

    pub fn id(&self) -> Option<BlockId> {
        self.block().map(RefBlock::id)
    }

    pub fn lifecycle(&self) -> Option<Lifecycle> {
        self.block().map(RefBlock::lifecycle)
    }

    /// True iff both handles observe the same block (or both are empty).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    /// Uncounted identity of the block, for holders that index blocks
    /// without keeping them allocated.
    pub fn as_raw(&self) -> Option<RawBlock<T>> {
        self.block_ptr().map(RawBlock::new)
    }

    /// True iff `holder` is the holder currently registered on the block.
    pub fn is_held_by<H>(&self, holder: &H) -> bool {
        self.block()
            .is_some_and(|b| b.holder.is_held_by(holder as *const H))
    }

    pub fn has_holder(&self) -> bool {
        self.block().is_some_and(|b| !b.holder.is_empty())
    }

    /// Register `holder` on the observed block.
    ///
    /// Works on a dead block too: the holder tracks the block, not the object.
    pub fn register_holder<H: RefHolder<T>>(&self, holder: &Rc<H>) -> Result<(), RefError> {
        let block = self.block_ptr().ok_or(RefError::HandleEmpty)?;
        unsafe { holder::register::<T, H>(block, holder) };
        Ok(())
    }

    /// Detach the holder registered on the observed block, if any.
    ///
    /// See `SharedRef::unregister_holder`.
    pub fn unregister_holder(&self) -> Result<bool, RefError> {
        let block = self.block_ptr().ok_or(RefError::HandleEmpty)?;
        Ok(unsafe { holder::unregister(block) })
    }
}

impl<T> Default for WeakRef<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for WeakRef<T> {
    fn clone(&self) -> Self {
        match self.block_ptr() {
            Some(block) => Self::from_block(block),
            None => Self::new(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        if self.ptr_eq(source) {
            return;
        }
        *self = source.clone();
    }
}

impl<T> Drop for WeakRef<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T> From<&SharedRef<T>> for WeakRef<T> {
    fn from(strong: &SharedRef<T>) -> Self {
        SharedRef::downgrade(strong)
    }
}

impl<T> fmt::Debug for WeakRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.block() {
            Some(b) => f
                .debug_struct("WeakRef")
                .field("block", &b.id())
                .field("lifecycle", &b.lifecycle())
                .finish(),
            None => f.write_str("WeakRef(<empty>)"),
        }
    }
}

impl<T> PartialEq for WeakRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for WeakRef<T> {}

impl<T> PartialOrd for WeakRef<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for WeakRef<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id().cmp(&other.id())
    }
}

impl<T> Hash for WeakRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

/// Uncounted reference to a control block.
///
/// Does not keep the block allocated. It stays valid until `unhold_ref` is
/// delivered for its block to the holder that recorded it; holders must drop
/// it at that point.
pub struct RawBlock<T> {
    block: NonNull<RefBlock>,
    _marker: PhantomData<*mut T>,
}

impl<T> RawBlock<T> {
    fn new(block: NonNull<RefBlock>) -> Self {
        Self {
            block,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> BlockId {
        BlockId::of(self.block)
    }

    /// Take a counted weak share on the block.
    ///
    /// # Safety
    /// The block must not have been freed: `unhold_ref` must not yet have
    /// been delivered for it.
    pub unsafe fn upgrade_weak(self) -> WeakRef<T> {
        WeakRef::from_block(self.block)
    }
}

impl<T> Clone for RawBlock<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RawBlock<T> {}

impl<T> PartialEq for RawBlock<T> {
    fn eq(&self, other: &Self) -> bool {
        self.block == other.block
    }
}

impl<T> Eq for RawBlock<T> {}

impl<T> Hash for RawBlock<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl<T> fmt::Debug for RawBlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawBlock").field(&self.id()).finish()
    }
}
