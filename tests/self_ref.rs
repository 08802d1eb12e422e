use smart_ref::{EnableSharedRefFromThis, RefError, SelfRef, SharedRef, WeakRef};
use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug)]
struct Node {
    this: SelfRef<Node>,
    name: &'static str,
}

impl Node {
    fn new(name: &'static str) -> Self {
        Self {
            this: SelfRef::new(),
            name,
        }
    }
}

impl EnableSharedRefFromThis for Node {
    fn self_ref(&self) -> &SelfRef<Self> {
        &self.this
    }
}

#[test]
fn shared_from_this_joins_the_owning_block() {
    let s = SharedRef::new_with_self(Node::new("n"));
    assert_eq!(s.strong_count(), 1);
    // The self reference is an observer of its own block.
    assert_eq!(s.weak_count(), 1);

    let again = s.shared_from_this().unwrap();
    assert_eq!(again, s);
    assert_eq!(s.strong_count(), 2);
    assert_eq!(again.name, "n");
    assert_eq!(s.weak_from_this(), SharedRef::downgrade(&s));
}

#[test]
fn unowned_object_is_not_owned() {
    let loose = Node::new("loose");
    assert_eq!(loose.shared_from_this().unwrap_err(), RefError::NotOwned);
    assert!(loose.weak_from_this().is_empty());

    // Plain `new` does not install the self reference.
    let s = SharedRef::new(Node::new("plain"));
    assert_eq!(s.shared_from_this().unwrap_err(), RefError::NotOwned);
}

#[test]
fn object_dies_and_frees_its_block_through_the_self_reference() {
    let s = SharedRef::new_with_self(Node::new("gone"));
    let w = s.weak_from_this();
    drop(s);
    assert!(w.expired());
    assert_eq!(w.weak_count(), 1);
}

#[test]
fn revive_with_self_reinstalls_the_self_reference() {
    let s = SharedRef::new_with_self(Node::new("first"));
    let w = SharedRef::downgrade(&s);
    drop(s);

    let s2 = SharedRef::revive_with_self(Node::new("second"), &w).unwrap();
    let via_self = s2.shared_from_this().unwrap();
    assert_eq!(via_self.name, "second");
    assert_eq!(via_self.id(), w.id());
}

#[test]
fn cloned_self_ref_starts_empty() {
    let s = SharedRef::new_with_self(Node::new("orig"));
    let copy = Node {
        this: s.this.clone(),
        name: "copy",
    };
    assert!(copy.shared_from_this().is_err());
}

#[derive(Debug)]
struct Parent {
    this: SelfRef<Parent>,
    children: Vec<Child>,
}

#[derive(Debug)]
struct Child {
    parent: WeakRef<Parent>,
}

impl EnableSharedRefFromThis for Parent {
    fn self_ref(&self) -> &SelfRef<Self> {
        &self.this
    }
}

#[test]
fn new_cyclic_hands_out_the_block_before_the_object_exists() {
    let seen_expired = Rc::new(Cell::new(false));
    let flag = seen_expired.clone();
    let p = SharedRef::new_cyclic(|weak: &WeakRef<Parent>| {
        flag.set(weak.expired() && weak.lock().is_empty());
        Parent {
            this: SelfRef::from_weak(weak),
            children: vec![
                Child {
                    parent: weak.clone(),
                },
                Child {
                    parent: weak.clone(),
                },
            ],
        }
    });
    assert!(seen_expired.get());
    assert_eq!(p.strong_count(), 1);
    assert_eq!(p.weak_count(), 3);
    for child in &p.children {
        assert_eq!(child.parent.lock(), p);
    }
    assert_eq!(p.shared_from_this().unwrap(), p);
}

#[test]
fn panicking_cyclic_constructor_releases_the_block() {
    let res = std::panic::catch_unwind(|| {
        SharedRef::<u8>::new_cyclic(|_| panic!("constructor failed"))
    });
    assert!(res.is_err());
}
