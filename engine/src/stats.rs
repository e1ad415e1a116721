//! In-flight work accounting, used by the runtime's quiescence predicate.
//! Every `DNSRequest` admitted at the name source increments the counter;
//! every stage that finally retires one (drops it, persists it, or replaces
//! it with derived requests that get their own count) decrements it.

use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Default)]
pub struct Stats {
    in_flight: AtomicI64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    pub fn retire(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight() <= 0
    }
}
