#![cfg(test)]

// Property tests for the control block kept inside the crate so they can
// drive shares and tokens directly.

use crate::block::{release_strong, release_weak, Lifecycle, RefBlock, StrongToken, WeakToken};
use proptest::prelude::*;
use std::cell::Cell;
use std::rc::Rc;

struct Counted(Rc<Cell<usize>>);

impl Drop for Counted {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[derive(Clone, Debug)]
enum Op {
    AcquireStrong,
    ReleaseStrong,
    AcquireWeak,
    ReleaseWeak,
    Upgrade,
    Revive,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::AcquireStrong),
        Just(Op::ReleaseStrong),
        Just(Op::AcquireWeak),
        Just(Op::ReleaseWeak),
        Just(Op::Upgrade),
        Just(Op::Revive),
    ]
}

proptest! {
    // Lifecycle follows the counts; every installed object is dropped
    // exactly once; the block is freed when both counts reach zero.
    #[test]
    fn prop_block_lifecycle(ops in proptest::collection::vec(op(), 1..200)) {
        let drops = Rc::new(Cell::new(0usize));
        let mut installed = 1usize;
        let (block, _obj, first) = RefBlock::new_live(Box::new(Counted(drops.clone())));
        let mut strong: Vec<StrongToken> = vec![first];
        let mut weak: Vec<WeakToken> = Vec::new();

        for op in ops {
            let b = unsafe { block.as_ref() };
            match op {
                Op::AcquireStrong => {
                    if !strong.is_empty() {
                        strong.push(b.acquire_strong());
                    }
                }
                Op::ReleaseStrong => {
                    if let Some(t) = strong.pop() {
                        unsafe { release_strong(block, t) };
                    }
                }
                Op::AcquireWeak => weak.push(b.acquire_weak()),
                Op::ReleaseWeak => {
                    if let Some(t) = weak.pop() {
                        unsafe { release_weak(block, t) };
                    }
                }
                Op::Upgrade => match b.upgrade() {
                    Some((_, t)) => {
                        prop_assert!(!strong.is_empty());
                        strong.push(t);
                    }
                    None => prop_assert!(strong.is_empty()),
                },
                Op::Revive => {
                    match unsafe { b.revive(Box::new(Counted(drops.clone()))) } {
                        Ok((_, t)) => {
                            prop_assert!(strong.is_empty());
                            installed += 1;
                            strong.push(t);
                        }
                        Err(rejected) => {
                            prop_assert!(!strong.is_empty());
                            // The rejected object is dropped here, not by the block.
                            drop(rejected);
                            drops.set(drops.get() - 1);
                        }
                    }
                }
            }

            if strong.is_empty() && weak.is_empty() {
                prop_assert_eq!(drops.get(), installed);
                return Ok(());
            }
            let b = unsafe { block.as_ref() };
            prop_assert_eq!(b.strong_count(), strong.len());
            prop_assert_eq!(b.weak_count(), weak.len());
            let expected = if strong.is_empty() { Lifecycle::Dead } else { Lifecycle::Live };
            prop_assert_eq!(b.lifecycle(), expected);
            prop_assert_eq!(drops.get(), installed - usize::from(!strong.is_empty()));
        }

        for t in strong {
            unsafe { release_strong(block, t) };
        }
        for t in weak {
            unsafe { release_weak(block, t) };
        }
        prop_assert_eq!(drops.get(), installed);
    }
}
