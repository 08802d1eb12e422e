//! Lifecycle events emitted with the `tracing` feature.

#![cfg(feature = "tracing")]

use smart_ref::{BlockId, RefHolder, SharedRef, WeakRef};
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<String>>>);

struct MessageVisitor(Option<String>);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}

impl<S: Subscriber> Layer<S> for Capture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(None);
        event.record(&mut visitor);
        if let Some(message) = visitor.0 {
            self.0.lock().unwrap().push(message);
        }
    }
}

fn capture<F: FnOnce()>(f: F) -> Vec<String> {
    let events = Capture::default();
    let subscriber = tracing_subscriber::registry().with(events.clone());
    tracing::subscriber::with_default(subscriber, f);
    let out = events.0.lock().unwrap().clone();
    out
}

struct Silent;

impl RefHolder<u8> for Silent {
    fn hold_ref(&self, _: &WeakRef<u8>) {}
    fn unhold_ref(&self, _: BlockId) {}
}

#[test]
fn dead_and_revived_block_lifecycle() {
    let events = capture(|| {
        let s = SharedRef::new(1u8);
        let w = SharedRef::downgrade(&s);
        drop(s);
        let s2 = SharedRef::revive(2u8, &w).unwrap();
        drop(s2);
        drop(w);
    });
    assert_eq!(
        events,
        [
            "block_allocated",
            "object_dropped",
            "block_revived",
            "object_dropped",
            "block_freed",
        ]
    );
}

#[test]
fn holder_attach_and_detach() {
    let holder = Rc::new(Silent);
    let events = capture(|| {
        let s = SharedRef::new(0u8);
        s.register_holder(&holder).unwrap();
        drop(s);
    });
    assert_eq!(
        events,
        [
            "block_allocated",
            "holder_attached",
            "object_dropped",
            "holder_detached",
            "block_freed",
        ]
    );
}
