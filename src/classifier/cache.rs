//! Memoization of analysis results

use std::collections::{HashMap, VecDeque};

use crate::models::{AnalysisResult, FieldDefinition, FieldType, RenderContext};

/// Everything that can influence an analysis result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnalysisKey {
    name: String,
    field_type: FieldType,
    context: RenderContext,
    value: String,
    threshold: u8,
}

impl AnalysisKey {
    pub fn new(field: &FieldDefinition, context: RenderContext, threshold: u8) -> Self {
        let value = field
            .value
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default();
        Self {
            name: field.name.clone(),
            field_type: field.field_type,
            context,
            value,
            threshold,
        }
    }
}

/// Bounded FIFO cache; a capacity of zero stores nothing
#[derive(Debug)]
pub struct AnalysisCache {
    capacity: usize,
    entries: HashMap<AnalysisKey, AnalysisResult>,
    order: VecDeque<AnalysisKey>,
}

impl AnalysisCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, key: &AnalysisKey) -> Option<&AnalysisResult> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: AnalysisKey, result: AnalysisResult) {
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
        self.entries.insert(key, result);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
