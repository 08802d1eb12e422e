//! Control-block lifecycle events.
//!
//! With the `tracing` feature enabled every lifecycle transition of a block
//! emits a `TRACE` event carrying the block id. Without it the hooks compile
//! to nothing.

#[cfg(feature = "tracing")]
mod internal {
    use crate::block::BlockId;

    #[inline]
    pub fn block_allocated(block: BlockId) {
        tracing::trace!(block = %block, "block_allocated");
    }

    /// Strong count reached zero; the object is about to be dropped.
    #[inline]
    pub fn object_dropped(block: BlockId) {
        tracing::trace!(block = %block, "object_dropped");
    }

    #[inline]
    pub fn block_revived(block: BlockId) {
        tracing::debug!(block = %block, "block_revived");
    }

    #[inline]
    pub fn block_freed(block: BlockId) {
        tracing::trace!(block = %block, "block_freed");
    }

    #[inline]
    pub fn holder_attached(block: BlockId) {
        tracing::trace!(block = %block, "holder_attached");
    }

    #[inline]
    pub fn holder_detached(block: BlockId) {
        tracing::trace!(block = %block, "holder_detached");
    }
}

#[cfg(not(feature = "tracing"))]
mod internal {
    use crate::block::BlockId;

    #[inline(always)]
    pub fn block_allocated(_: BlockId) {}
    #[inline(always)]
    pub fn object_dropped(_: BlockId) {}
    #[inline(always)]
    pub fn block_revived(_: BlockId) {}
    #[inline(always)]
    pub fn block_freed(_: BlockId) {}
    #[inline(always)]
    pub fn holder_attached(_: BlockId) {}
    #[inline(always)]
    pub fn holder_detached(_: BlockId) {}
}

pub(crate) use internal::*;
