//! smart-ref: single-threaded shared/weak handles whose control blocks
//! outlive their objects, report their lifecycle to an external holder,
//! and can be revived in place.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: `Rc`/`Weak`-style ownership where the bookkeeping record (the
//!   control block) has an identity of its own that an external index can
//!   track across the death of the managed object.
//! - Layers:
//!   - `tokens`: linear share tokens; every strong or weak share a handle
//!     holds is a token minted by the block's counter and must be put back.
//!   - `block`: the type-erased control block with its lifecycle slot
//!     (`Pending` -> `Live` <-> `Dead`) and the two release paths.
//!   - `holder`: the `RefHolder` notification protocol and the block's
//!     non-owning holder slot, guarded against nested registration.
//!   - `SharedRef`/`WeakRef`: the only code that mints or returns shares.
//!   - `SelfRef`/`EnableSharedRefFromThis`: objects that can hand out
//!     handles to themselves.
//!   - `KeyedHolder`: a ready-made holder indexing blocks by key, with
//!     get-or-insert and revive-by-key.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` (raw pointers, no atomics).
//! - The object is dropped the instant the strong count reaches zero; the
//!   block is freed only once both counts are zero.
//! - `unhold_ref` fires exactly once per attachment: when the block is
//!   about to be freed, or when another holder replaces it. Object death
//!   alone never notifies. `unregister_holder` detaches with `detach_ref`
//!   instead.
//! - `revive` succeeds only on a dead block and never touches weak handles;
//!   they observe the new object on their next access.
//!
//! Views and projections
//! - A strong handle caches a view pointer. Handles made from an object are
//!   native; `map`, `try_map` and `cast` make projected handles that share
//!   ownership but cannot be downgraded or register holders, since weak
//!   handles always re-derive the native object from the block.
//! - Equality, ordering and hashing use the thin address of the view, so
//!   handles sharing a view compare equal whatever their static type.
//!   Zero-sized views use the block address.
//! - Handles are invariant in `T`: `revive` writes a new `T` into a block
//!   other handles already share.
//!
//! Overflow semantics
//! - Count overflow aborts the process, matching `Rc`. Underflow is a bug
//!   and panics.
//!
//! Notes and non-goals
//! - No cycle collection: a cycle of strong handles leaks.
//! - `revive` takes a fresh object; weak handles are never re-seated.
//! - Holders are held through `std::rc::Weak`; a dropped holder is skipped.

mod block;
mod block_proptest;
mod error;
mod holder;
mod keyed_holder;
mod reentrancy;
mod self_ref;
mod shared_ref;
pub mod tokens;
mod trace;
mod weak_ref;

// Public surface
pub use block::{BlockId, Lifecycle};
pub use error::{RefError, ReviveError};
pub use holder::RefHolder;
pub use keyed_holder::KeyedHolder;
pub use self_ref::{EnableSharedRefFromThis, SelfRef};
pub use shared_ref::SharedRef;
pub use weak_ref::{RawBlock, WeakRef};
