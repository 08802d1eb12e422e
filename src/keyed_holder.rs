//! Ready-made holder indexing blocks by a key derived from their object.
//!
//! The index stores uncounted [`RawBlock`]s, so it never keeps a block
//! alive: an entry stays while the block exists (live or dead) and is removed
//! by `unhold_ref` right before the block is freed, or by `detach_ref` when
//! the holder is unregistered from it. A dead entry can be brought back with
//! a new object carrying the same key.

use crate::block::BlockId;
use crate::error::{RefError, ReviveError};
use crate::holder::RefHolder;
use crate::shared_ref::SharedRef;
use crate::weak_ref::{RawBlock, WeakRef};
use core::cell::RefCell;
use core::fmt;
use core::hash::Hash;
use hashbrown::HashMap;
use std::rc::Rc;

struct Index<K, T> {
    by_key: HashMap<K, RawBlock<T>>,
    by_block: HashMap<BlockId, K>,
}

/// Holder keeping a `key -> block` index over every block registered on it.
///
/// ```
/// use smart_ref::{KeyedHolder, SharedRef};
/// use std::rc::Rc;
///
/// let names = Rc::new(KeyedHolder::new(|s: &String| s.len()));
/// let first = names.adopt(String::from("abc")).unwrap();
/// let weak = SharedRef::downgrade(&first);
/// drop(first);
///
/// // Key 3 is still indexed through the dead block; a new object revives it.
/// let second = names.adopt(String::from("xyz")).unwrap();
/// assert_eq!(*weak.lock(), "xyz");
/// assert_eq!(second.id(), weak.id());
///
/// drop((second, weak));
/// assert!(names.is_empty());
/// ```
pub struct KeyedHolder<K, T> {
    key_of: fn(&T) -> K,
    index: RefCell<Index<K, T>>,
}

impl<K, T> KeyedHolder<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: 'static,
{
    pub fn new(key_of: fn(&T) -> K) -> Self {
        Self {
            key_of,
            index: RefCell::new(Index {
                by_key: HashMap::new(),
                by_block: HashMap::new(),
            }),
        }
    }

    /// Number of indexed blocks, live or dead.
    pub fn len(&self) -> usize {
        self.index.borrow().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.borrow().by_key.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.borrow().by_key.contains_key(key)
    }

    /// True iff `block` is indexed.
    pub fn holds(&self, block: BlockId) -> bool {
        self.index.borrow().by_block.contains_key(&block)
    }

    pub fn key_of_block(&self, block: BlockId) -> Option<K> {
        self.index.borrow().by_block.get(&block).cloned()
    }

    /// Weak handle to the block indexed under `key`; may be expired.
    pub fn lookup(&self, key: &K) -> Option<WeakRef<T>> {
        let raw = self.index.borrow().by_key.get(key).copied()?;
        // Indexed blocks are removed in `unhold_ref`, before they are freed.
        Some(unsafe { raw.upgrade_weak() })
    }

    /// Live object indexed under `key`.
    pub fn get(&self, key: &K) -> Option<SharedRef<T>> {
        let strong = self.lookup(key)?.lock();
        strong.is_some().then_some(strong)
    }

    /// Install `value` into the dead block indexed under its key.
    ///
    /// Fails, handing `value` back, when the key is not indexed or its block
    /// is still alive.
    pub fn revive(&self, value: T) -> Result<SharedRef<T>, ReviveError<T>> {
        let key = (self.key_of)(&value);
        let raw = self.index.borrow().by_key.get(&key).copied();
        match raw {
            Some(raw) => unsafe { SharedRef::revive_raw(value, raw) },
            None => Err(ReviveError::new(value)),
        }
    }

    /// Get-or-insert by the key of `value`.
    ///
    /// Returns the live object under that key (dropping `value`), revives a
    /// dead block under that key with `value`, or wraps `value` in a new
    /// block registered on this holder.
    pub fn adopt(self: &Rc<Self>, value: T) -> Result<SharedRef<T>, RefError> {
        let key = (self.key_of)(&value);
        if let Some(weak) = self.lookup(&key) {
            let live = weak.lock();
            if live.is_some() {
                return Ok(live);
            }
            return Ok(SharedRef::revive(value, &weak)?);
        }
        let strong = SharedRef::new(value);
        strong.register_holder(self)?;
        Ok(strong)
    }

    /// Unregister from every indexed block, leaving the index empty.
    ///
    /// The blocks and their objects are untouched; they just stop reporting
    /// to this holder.
    pub fn detach_all(&self) {
        let raws: Vec<RawBlock<T>> = self.index.borrow().by_key.values().copied().collect();
        for raw in raws {
            // Still indexed, so still allocated.
            let weak = unsafe { raw.upgrade_weak() };
            if weak.is_held_by(self) {
                // `detach_ref` removes the entry.
                let _ = weak.unregister_holder();
            }
        }
    }

    fn unindex(&self, block: BlockId) {
        let mut index = self.index.borrow_mut();
        if let Some(key) = index.by_block.remove(&block) {
            index.by_key.remove(&key);
        }
    }
}

impl<K, T> RefHolder<T> for KeyedHolder<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: 'static,
{
    fn hold_ref(&self, handle: &WeakRef<T>) {
        // Only index blocks that will report back through `unhold_ref`.
        if !handle.is_held_by(self) {
            return;
        }
        let Some(raw) = handle.as_raw() else {
            return;
        };
        // A dead or pending block has no object to derive a key from.
        let key = match handle.lock().get() {
            Some(object) => (self.key_of)(object),
            None => return,
        };
        let mut index = self.index.borrow_mut();
        if index.by_key.contains_key(&key) {
            return;
        }
        index.by_block.insert(raw.id(), key.clone());
        index.by_key.insert(key, raw);
    }

    fn unhold_ref(&self, block: BlockId) {
        self.unindex(block);
    }

    fn detach_ref(&self, block: BlockId) {
        self.unindex(block);
    }
}

impl<K, T> fmt::Debug for KeyedHolder<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedHolder")
            .field("len", &self.index.borrow().by_key.len())
            .finish_non_exhaustive()
    }
}
