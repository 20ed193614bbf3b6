//! Batch partitioning for staged drafting.
//!
//! These only decide an order of batches; a caller submits each batch to
//! [`DraftScheduler::schedule`](super::DraftScheduler::schedule) in turn.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use super::types::DraftItem;

/// Consecutive chunks of at most `batch_size` items, order preserved
///
/// A `batch_size` of 0 is treated as 1.
pub fn batch_by_size<T>(items: Vec<T>, batch_size: usize) -> Vec<Vec<T>> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size);

    for item in items {
        current.push(item);
        if current.len() == batch_size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(batch_size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }

    batches
}

/// One batch per priority level, highest priority first
///
/// Items missing from `priorities` get priority 0.
pub fn batch_by_priority<T: DraftItem>(items: Vec<T>, priorities: &HashMap<String, i32>) -> Vec<Vec<T>> {
    let mut levels: BTreeMap<Reverse<i32>, Vec<T>> = BTreeMap::new();
    for item in items {
        let priority = priorities.get(item.id()).copied().unwrap_or(0);
        levels.entry(Reverse(priority)).or_default().push(item);
    }
    levels.into_values().collect()
}

/// One batch per outline depth, shallowest first
///
/// Items without a depth are treated as depth 0.
pub fn batch_by_depth<T: DraftItem>(items: Vec<T>) -> Vec<Vec<T>> {
    let mut levels: BTreeMap<u32, Vec<T>> = BTreeMap::new();
    for item in items {
        levels.entry(item.depth().unwrap_or(0)).or_default().push(item);
    }
    levels.into_values().collect()
}
