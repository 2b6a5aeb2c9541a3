//! Query result cache
//!
//! Results are stamped with the registry they came from. A stamp mismatch on
//! access flushes everything, so no result outlives the registry state it was
//! computed against.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::Manifest;
use crate::registry::Registry;

/// Registry instance and generation a result was computed against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub instance: Uuid,
    pub generation: u64,
}

impl Stamp {
    pub fn of(registry: &Registry) -> Self {
        Self {
            instance: registry.instance(),
            generation: registry.generation(),
        }
    }
}

#[derive(Debug)]
pub struct QueryCache {
    capacity: usize,
    stamp: Option<Stamp>,
    entries: HashMap<String, Vec<Arc<Manifest>>>,
    order: VecDeque<String>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            stamp: None,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&mut self, stamp: Stamp, key: &str) -> Option<Vec<Arc<Manifest>>> {
        self.sync(stamp);
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, stamp: Stamp, key: String, results: Vec<Arc<Manifest>>) {
        self.sync(stamp);
        if self.capacity == 0 || self.entries.contains_key(&key) {
            return;
        }
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, results);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.stamp = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sync(&mut self, stamp: Stamp) {
        if self.stamp != Some(stamp) {
            self.entries.clear();
            self.order.clear();
            self.stamp = Some(stamp);
        }
    }
}
