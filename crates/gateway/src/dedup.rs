//! Bounded memory of recently handled inbound message ids.
//!
//! The transport may redeliver a message; ids seen here are skipped. An id
//! is reserved by [`RecentIds::claim`] while it is being handled, so a
//! concurrent redelivery is skipped too. Only successfully handled messages
//! are remembered; a dropped claim releases the id so a failed message can
//! be retried by a redelivery.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

pub struct RecentIds {
    capacity: usize,
    inner: Mutex<Window>,
}

#[derive(Default)]
struct Window {
    order: VecDeque<String>,
    seen: HashSet<String>,
    in_flight: HashSet<String>,
}

/// An id reserved for handling. Call [`Claim::complete`] on success;
/// dropping it otherwise releases the id.
pub struct Claim<'a> {
    ids: &'a RecentIds,
    id: Option<String>,
}

impl Claim<'_> {
    pub fn complete(mut self) {
        if let Some(id) = self.id.take() {
            self.ids.finish(&id, true);
        }
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.ids.finish(&id, false);
        }
    }
}

impl RecentIds {
    /// A capacity of 0 disables the guard.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Window::default()),
        }
    }

    /// Reserve `id` for handling. `None` when it was already handled or is
    /// being handled right now.
    pub fn claim(&self, id: &str) -> Option<Claim<'_>> {
        if self.capacity == 0 || id.is_empty() {
            return Some(Claim { ids: self, id: None });
        }
        let mut window = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if window.seen.contains(id) || !window.in_flight.insert(id.to_string()) {
            return None;
        }
        Some(Claim {
            ids: self,
            id: Some(id.to_string()),
        })
    }

    fn finish(&self, id: &str, handled: bool) {
        {
            let mut window = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            window.in_flight.remove(id);
        }
        if handled {
            self.insert(id);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        if self.capacity == 0 || id.is_empty() {
            return false;
        }
        let window = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        window.seen.contains(id)
    }

    /// Remember an id, evicting the oldest when full.
    pub fn insert(&self, id: &str) {
        if self.capacity == 0 || id.is_empty() {
            return;
        }
        let mut window = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if !window.seen.insert(id.to_string()) {
            return;
        }
        window.order.push_back(id.to_string());
        while window.order.len() > self.capacity {
            if let Some(oldest) = window.order.pop_front() {
                window.seen.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
