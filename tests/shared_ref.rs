use smart_ref::{Lifecycle, SharedRef};
use std::cell::Cell;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

struct Tracked {
    value: i32,
    drops: Rc<Cell<usize>>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

fn tracked(value: i32) -> (Tracked, Rc<Cell<usize>>) {
    let drops = Rc::new(Cell::new(0));
    (
        Tracked {
            value,
            drops: drops.clone(),
        },
        drops,
    )
}

fn hash_of<T: Hash>(t: &T) -> u64 {
    let mut h = DefaultHasher::new();
    t.hash(&mut h);
    h.finish()
}

#[test]
fn new_handle_has_one_owner_and_no_observers() {
    let s = SharedRef::new(5u64);
    assert!(s.is_some());
    assert_eq!(s.strong_count(), 1);
    assert_eq!(s.weak_count(), 0);
    assert_eq!(s.lifecycle(), Some(Lifecycle::Live));
    assert_eq!(*s, 5);
}

#[test]
fn clone_and_drop_move_the_strong_count() {
    let (obj, drops) = tracked(1);
    let s = SharedRef::new(obj);
    let t = s.clone();
    assert_eq!(s.strong_count(), 2);
    assert!(SharedRef::ptr_eq(&s, &t));
    drop(t);
    assert_eq!(s.strong_count(), 1);
    assert_eq!(drops.get(), 0);
    drop(s);
    assert_eq!(drops.get(), 1);
}

#[test]
fn self_assignment_keeps_counts() {
    let s = SharedRef::new(String::from("x"));
    let mut t = s.clone();
    t.clone_from(&s);
    assert_eq!(s.strong_count(), 2);
    let alias = t.clone();
    t.clone_from(&alias);
    assert_eq!(s.strong_count(), 3);
}

#[test]
fn assigning_another_block_releases_the_old_one() {
    let (a, a_drops) = tracked(1);
    let (b, b_drops) = tracked(2);
    let mut s = SharedRef::new(a);
    let t = SharedRef::new(b);
    s.clone_from(&t);
    assert_eq!(a_drops.get(), 1);
    assert_eq!(b_drops.get(), 0);
    assert_eq!(s.value, 2);
    assert_eq!(t.strong_count(), 2);
}

#[test]
fn reset_and_empty_assignment() {
    let (obj, drops) = tracked(3);
    let mut s = SharedRef::new(obj);
    let w = SharedRef::downgrade(&s);
    s.reset();
    assert!(s.is_empty());
    assert_eq!(s.strong_count(), 0);
    assert_eq!(drops.get(), 1);
    assert!(w.expired());

    let mut t = SharedRef::new(7u8);
    assert_eq!(*t, 7);
    t = SharedRef::empty();
    assert!(t.get().is_none());
}

#[test]
fn empty_handles_compare_equal_only_to_each_other() {
    let a: SharedRef<u32> = SharedRef::empty();
    let b: SharedRef<u32> = SharedRef::default();
    let c = SharedRef::new(0u32);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a < c);
    assert_eq!(hash_of(&a), hash_of(&b));
    assert_eq!(format!("{a:?}"), "SharedRef(<empty>)");
}

#[test]
fn identity_not_value_drives_equality() {
    let a = SharedRef::new(10);
    let b = SharedRef::new(10);
    assert_ne!(a, b);
    assert_eq!(a, a.clone());

    let set: HashSet<SharedRef<i32>> = [a.clone(), a.clone(), b.clone()].into_iter().collect();
    assert_eq!(set.len(), 2);
    assert!(set.contains(&b));
}

#[test]
fn ordering_is_total_over_addresses() {
    let mut handles: Vec<SharedRef<u16>> = (0..8).map(SharedRef::new).collect();
    handles.push(SharedRef::empty());
    handles.sort();
    assert!(handles[0].is_empty());
    for pair in handles.windows(2) {
        assert!(pair[0] < pair[1]);
    }
}

#[test]
fn from_box_takes_ownership() {
    let s: SharedRef<Vec<u8>> = Box::new(vec![1, 2, 3]).into();
    assert_eq!(s.len(), 3);
    assert_eq!(format!("{s:?}"), "SharedRef([1, 2, 3])");
}

#[test]
fn block_identity_is_stable_across_clones() {
    let s = SharedRef::new(());
    let id = s.id().unwrap();
    let w = SharedRef::downgrade(&s);
    assert_eq!(s.clone().id(), Some(id));
    drop(s);
    assert_eq!(w.id(), Some(id));
}

#[test]
fn zero_sized_objects_keep_distinct_identities() {
    let a = SharedRef::new(());
    let b = SharedRef::new(());
    assert_ne!(a, b);
    assert!(!SharedRef::ptr_eq(&a, &b));
    assert_eq!(a, a.clone());
    assert_eq!(SharedRef::to_any(&a), a);
    assert_ne!(SharedRef::to_any(&a), b);

    let set: HashSet<SharedRef<()>> = [a.clone(), a.clone(), b.clone()].into_iter().collect();
    assert_eq!(set.len(), 2);
}
