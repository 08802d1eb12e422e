//! Linear share tokens and the counting trait behind strong/weak counts.
//!
//! Every share a handle holds on a control block is represented by a
//! zero-sized token minted by one of the block's counters. Dropping a token
//! panics; the only valid way to dispose of it is to hand it back to the
//! counter that minted it via `Count::put`.

use core::cell::Cell;
use core::fmt;
use core::marker::PhantomData;

/// Zero-sized, linear token tied to its originating counter type.
pub struct Token<'a, C: ?Sized> {
    _lt: PhantomData<&'a ()>,
    _ctr: PhantomData<*const C>,
}

impl<'a, C: ?Sized> Token<'a, C> {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            _lt: PhantomData,
            _ctr: PhantomData,
        }
    }
}

impl<C: ?Sized> fmt::Debug for Token<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token")
    }
}

impl<'a, C: ?Sized> Drop for Token<'a, C> {
    fn drop(&mut self) {
        // A share was lost without being returned; counts are now wrong.
        panic!("Token dropped without Count::put");
    }
}

/// A source of counted shares, enforced by linear token flow.
pub trait Count {
    /// The token type minted by this counter.
    type Token<'a>: Sized
    where
        Self: 'a;

    /// Acquire one share and return a linear token for it.
    fn get(&self) -> Self::Token<'static>;

    /// Return (consume) a previously acquired token.
    /// Returns true if the count is now zero.
    fn put<'a>(&'a self, t: Self::Token<'a>) -> bool;

    /// Number of outstanding shares.
    fn count(&self) -> usize;
}

/// Marker for the owning (strong) counter of a control block.
pub enum StrongKind {}

/// Marker for the observing (weak) counter of a control block.
pub enum WeakKind {}

/// Single-threaded counter. The kind parameter brands its tokens so a
/// strong share can never be returned to a weak counter.
pub struct UsizeCount<K> {
    count: Cell<usize>,
    _kind: PhantomData<K>,
}

impl<K> UsizeCount<K> {
    pub const fn new() -> Self {
        Self {
            count: Cell::new(0),
            _kind: PhantomData,
        }
    }
}

impl<K> Default for UsizeCount<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for UsizeCount<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UsizeCount").field(&self.count.get()).finish()
    }
}

impl<K: 'static> Count for UsizeCount<K> {
    type Token<'a>
        = Token<'a, Self>
    where
        Self: 'a;

    #[inline]
    fn get(&self) -> Self::Token<'static> {
        let n = self.count.get().wrapping_add(1);
        self.count.set(n);
        if n == 0 {
            // Follow Rc semantics: abort on overflow rather than continue unsafely.
            std::process::abort();
        }
        Token::<'static, Self>::new()
    }

    #[inline]
    fn put<'a>(&'a self, t: Self::Token<'a>) -> bool {
        let c = self.count.get();
        assert!(c > 0, "UsizeCount underflow");
        let n = c - 1;
        self.count.set(n);
        core::mem::forget(t);
        n == 0
    }

    #[inline]
    fn count(&self) -> usize {
        self.count.get()
    }
}
