//! Owning (strong) handle.
//!
//! A `SharedRef<T>` caches a view pointer next to its control block. For a
//! handle built from an object the view is the object itself ("native"); the
//! cast family produces handles whose view points elsewhere inside, or at a
//! different type for, the same object ("projected"). Every strong handle
//! holds one strong share on its block no matter how it was derived.

use crate::block::{release_strong, BlockId, Lifecycle, RefBlock, StrongToken};
use crate::error::{RefError, ReviveError};
use crate::holder::{self, RefHolder};
use crate::self_ref::EnableSharedRefFromThis;
use crate::weak_ref::{RawBlock, WeakRef};
use core::any::Any;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::ops::Deref;
use core::ptr::NonNull;
use std::rc::Rc;

struct Share<T: ?Sized> {
    view: NonNull<T>,
    block: NonNull<RefBlock>,
    token: StrongToken,
    projected: bool,
}

/// Strong, single-threaded handle to an object owned by a control block.
///
/// Invariant in `T`: `revive` writes a `T` into a block that other handles
/// already share, so a handle must not be viewed at a shorter lifetime.
///
/// ```compile_fail
/// use smart_ref::SharedRef;
///
/// fn shorten<'a>(s: &SharedRef<&'static str>) -> &SharedRef<&'a str> {
///     s
/// }
/// ```
pub struct SharedRef<T: ?Sized> {
    share: Option<Share<T>>,
    _owns: PhantomData<T>,
    _invariant: PhantomData<*mut T>,
}

impl<T: ?Sized> SharedRef<T> {
    /// The empty handle. Equal to every other empty handle and nothing else.
    pub const fn empty() -> Self {
        Self {
            share: None,
            _owns: PhantomData,
            _invariant: PhantomData,
        }
    }

    pub(crate) fn from_parts(
        view: NonNull<T>,
        block: NonNull<RefBlock>,
        token: StrongToken,
        projected: bool,
    ) -> Self {
        Self {
            share: Some(Share {
                view,
                block,
                token,
                projected,
            }),
            _owns: PhantomData,
            _invariant: PhantomData,
        }
    }

    fn block(&self) -> Option<&RefBlock> {
        // A strong share keeps the block allocated.
        self.share.as_ref().map(|s| unsafe { s.block.as_ref() })
    }

    /// Borrow the viewed object, or `None` for an empty handle.
    pub fn get(&self) -> Option<&T> {
        // A strong share keeps the object alive.
        self.share.as_ref().map(|s| unsafe { s.view.as_ref() })
    }

    pub fn is_empty(&self) -> bool {
        self.share.is_none()
    }

    pub fn is_some(&self) -> bool {
        self.share.is_some()
    }

    /// Return the strong share and become empty.
    ///
    /// Dropping the last owner drops the object; if nothing observes the
    /// block either, its holder receives `unhold_ref` and the block is freed.
    pub fn reset(&mut self) {
        if let Some(Share { block, token, .. }) = self.share.take() {
            unsafe { release_strong(block, token) };
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

    pub fn has_holder(&self) -> bool {
        self.block().is_some_and(|b| !b.holder.is_empty())
    }

    /// True iff this handle was derived by a projecting cast.
    pub fn is_projected(&self) -> bool {
        self.share.as_ref().is_some_and(|s| s.projected)
    }

    /// The cached view pointer.
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.share.as_ref().map(|s| s.view)
    }

    /// Thin address of the view; 0 when empty. Zero-sized views use the
    /// block address instead, since distinct zero-sized objects may share
    /// one address.
    fn addr(&self) -> usize {
        self.share.as_ref().map_or(0, |s| {
            // A strong share keeps the object alive.
            if core::mem::size_of_val(unsafe { s.view.as_ref() }) == 0 {
                s.block.as_ptr() as usize
            } else {
                s.view.as_ptr().cast::<()>() as usize
            }
        })
    }

    /// True iff both handles view the same address (or both are empty).
    pub fn ptr_eq<U: ?Sized>(this: &Self, other: &SharedRef<U>) -> bool {
        this.addr() == other.addr()
    }

    fn project<U: ?Sized>(this: &Self, view: NonNull<U>, projected: bool) -> SharedRef<U> {
        match &this.share {
            Some(s) => {
                let token = unsafe { s.block.as_ref() }.acquire_strong();
                SharedRef::from_parts(view, s.block, token, projected)
            }
            None => SharedRef::empty(),
        }
    }

    /// Reinterpret the view as a `U`, sharing ownership of the block.
    ///
    /// # Safety
    /// The viewed memory must be a valid `U` for as long as the object lives.
    pub unsafe fn cast<U>(this: &Self) -> SharedRef<U> {
        match &this.share {
            Some(s) => Self::project(this, s.view.cast::<U>(), true),
            None => SharedRef::empty(),
        }
    }
}

impl<T: ?Sized + 'static> SharedRef<T> {
    /// Aliasing view: a handle to something reachable from the object that
    /// shares ownership of the whole object.
    ///
    /// ```
    /// use smart_ref::SharedRef;
    ///
    /// let pair = SharedRef::new((1u8, String::from("two")));
    /// let second = SharedRef::map(&pair, |p| p.1.as_str());
    /// drop(pair);
    /// assert_eq!(&*second, "two");
    /// ```
    pub fn map<U: ?Sized, F>(this: &Self, f: F) -> SharedRef<U>
    where
        F: FnOnce(&T) -> &U,
    {
        match this.get() {
            Some(t) => {
                let view = NonNull::from(f(t));
                Self::project(this, view, true)
            }
            None => SharedRef::empty(),
        }
    }

    /// Fallible aliasing view. A `None` from `f` yields an empty handle and
    /// leaves the strong count untouched.
    pub fn try_map<U: ?Sized, F>(this: &Self, f: F) -> SharedRef<U>
    where
        F: FnOnce(&T) -> Option<&U>,
    {
        match this.get().and_then(f) {
            Some(u) => Self::project(this, NonNull::from(u), true),
            None => SharedRef::empty(),
        }
    }
}

impl<T: Any> SharedRef<T> {
    /// Upcast to `dyn Any`, keeping the handle native when it was native.
    pub fn to_any(this: &Self) -> SharedRef<dyn Any> {
        match &this.share {
            Some(s) => {
                let view: NonNull<dyn Any> = s.view;
                Self::project(this, view, s.projected)
            }
            None => SharedRef::empty(),
        }
    }

    /// Consuming upcast to `dyn Any`; moves the share without touching the counts.
    pub fn into_any(mut this: Self) -> SharedRef<dyn Any> {
        match this.share.take() {
            Some(Share {
                view,
                block,
                token,
                projected,
            }) => {
                let view: NonNull<dyn Any> = view;
                SharedRef::from_parts(view, block, token, projected)
            }
            None => SharedRef::empty(),
        }
    }
}

impl SharedRef<dyn Any> {
    /// Checked downcast. A type mismatch yields an empty handle and leaves
    /// the strong count untouched.
    pub fn downcast<U: Any>(this: &Self) -> SharedRef<U> {
        match &this.share {
            Some(s) if this.get().is_some_and(|a| a.is::<U>()) => {
                Self::project(this, s.view.cast::<U>(), s.projected)
            }
            _ => SharedRef::empty(),
        }
    }
}

impl<T> SharedRef<T> {
    /// Allocate a new control block owning `value`. Strong count 1, weak 0.
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    pub fn from_box(object: Box<T>) -> Self {
        let (block, view, token) = RefBlock::new_live(object);
        Self::from_parts(view, block, token, false)
    }

    /// Two-phase construction: `build` receives a weak handle to the block
    /// that will own its result. The handle is expired until `build`
    /// returns; it may be stored in the object or used to register a holder.
    ///
    /// If `build` panics, the block is released as an unreferenced block.
    pub fn new_cyclic<F>(build: F) -> Self
    where
        F: FnOnce(&WeakRef<T>) -> T,
    {
        let (block, token) = RefBlock::new_pending();
        let weak = WeakRef::from_parts(block, token);
        let value = build(&weak);
        // `weak` holds a share, so the block is still allocated.
        let (view, token) = unsafe { block.as_ref().complete(Box::new(value)) };
        let strong = Self::from_parts(view, block, token, false);
        drop(weak);
        strong
    }

    /// Weak handle over this handle's block. Empty for an empty or projected
    /// handle.
    pub fn downgrade(this: &Self) -> WeakRef<T> {
        match &this.share {
            Some(s) if !s.projected => WeakRef::from_block(s.block),
            _ => WeakRef::new(),
        }
    }

    /// Register `holder` on this handle's block and deliver `hold_ref`.
    pub fn register_holder<H: RefHolder<T>>(&self, holder: &Rc<H>) -> Result<(), RefError> {
        let share = self.share.as_ref().ok_or(RefError::HandleEmpty)?;
        if share.projected {
            return Err(RefError::Projected);
        }
        unsafe { holder::register::<T, H>(share.block, holder) };
        Ok(())
    }

    /// Detach the holder registered on this handle's block, if any.
    ///
    /// The detached holder receives `detach_ref`, never `unhold_ref`, for
    /// this attachment. Returns whether a holder was attached.
    pub fn unregister_holder(&self) -> Result<bool, RefError> {
        let share = self.share.as_ref().ok_or(RefError::HandleEmpty)?;
        Ok(unsafe { holder::unregister(share.block) })
    }

    /// Install `value` into the dead block observed by `weak`.
    ///
    /// Fails when `weak` is empty or its block is not dead, handing `value`
    /// back untouched. On success the strong count restarts at 1 and every
    /// weak handle on the block observes the new object.
    ///
    /// ```
    /// use smart_ref::SharedRef;
    ///
    /// let first = SharedRef::new(100);
    /// let weak = SharedRef::downgrade(&first);
    /// drop(first);
    /// assert!(weak.expired());
    ///
    /// let second = SharedRef::revive(200, &weak).unwrap();
    /// assert_eq!(*second, 200);
    /// assert_eq!(*weak.lock(), 200);
    /// ```
    ///
    /// The new value must have exactly the block's type, lifetimes included:
    ///
    /// ```compile_fail
    /// use smart_ref::{SharedRef, WeakRef};
    ///
    /// fn extend<'a>(x: &'a str) -> &'static str {
    ///     let s = SharedRef::new("");
    ///     let w: WeakRef<&'static str> = SharedRef::downgrade(&s);
    ///     drop(s);
    ///     let r = SharedRef::revive(x, &w).ok().unwrap();
    ///     let out = *w.lock();
    ///     drop(r);
    ///     out
    /// }
    /// ```
    pub fn revive(value: T, weak: &WeakRef<T>) -> Result<Self, ReviveError<T>> {
        let Some(block) = weak.block_ptr() else {
            return Err(ReviveError::new(value));
        };
        if weak.lifecycle() != Some(Lifecycle::Dead) {
            return Err(ReviveError::new(value));
        }
        // A weak share keeps the block allocated; `T` is its native type.
        match unsafe { block.as_ref().revive(Box::new(value)) } {
            Ok((view, token)) => Ok(Self::from_parts(view, block, token, false)),
            Err(object) => Err(ReviveError::new(*object)),
        }
    }

    /// `revive` through an uncounted block identity recorded by a holder.
    ///
    /// # Safety
    /// `unhold_ref` must not yet have been delivered for `raw`'s block.
    pub unsafe fn revive_raw(value: T, raw: RawBlock<T>) -> Result<Self, ReviveError<T>> {
        let weak = raw.upgrade_weak();
        Self::revive(value, &weak)
    }
}

impl<T: EnableSharedRefFromThis> SharedRef<T> {
    /// `new`, then point the object's self reference at its block.
    pub fn new_with_self(value: T) -> Self {
        let strong = Self::new(value);
        strong.install_self();
        strong
    }

    /// `revive`, then point the new object's self reference at the block.
    pub fn revive_with_self(value: T, weak: &WeakRef<T>) -> Result<Self, ReviveError<T>> {
        let strong = Self::revive(value, weak)?;
        strong.install_self();
        Ok(strong)
    }

    fn install_self(&self) {
        if let Some(object) = self.get() {
            object.self_ref().install(Self::downgrade(self));
        }
    }
}

impl<T: ?Sized> Clone for SharedRef<T> {
    fn clone(&self) -> Self {
        match &self.share {
            Some(s) => Self::project(self, s.view, s.projected),
            None => Self::empty(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        if let (Some(mine), Some(theirs)) = (&mut self.share, &source.share) {
            if mine.block == theirs.block {
                // Same block: only the view changes.
                mine.view = theirs.view;
                mine.projected = theirs.projected;
                return;
            }
        }
        if self.is_empty() && source.is_empty() {
            return;
        }
        *self = source.clone();
    }
}

impl<T: ?Sized> Drop for SharedRef<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized> Default for SharedRef<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> Deref for SharedRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced an empty SharedRef"),
        }
    }
}

impl<T> From<Box<T>> for SharedRef<T> {
    fn from(object: Box<T>) -> Self {
        Self::from_box(object)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SharedRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("SharedRef").field(&value).finish(),
            None => f.write_str("SharedRef(<empty>)"),
        }
    }
}

impl<T: ?Sized> fmt::Pointer for SharedRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&(self.addr() as *const ()), f)
    }
}

impl<T: ?Sized, U: ?Sized> PartialEq<SharedRef<U>> for SharedRef<T> {
    fn eq(&self, other: &SharedRef<U>) -> bool {
        self.addr() == other.addr()
    }
}

impl<T: ?Sized> Eq for SharedRef<T> {}

impl<T: ?Sized, U: ?Sized> PartialOrd<SharedRef<U>> for SharedRef<T> {
    fn partial_cmp(&self, other: &SharedRef<U>) -> Option<Ordering> {
        Some(self.addr().cmp(&other.addr()))
    }
}

impl<T: ?Sized> Ord for SharedRef<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.addr().cmp(&other.addr())
    }
}

impl<T: ?Sized> Hash for SharedRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}
