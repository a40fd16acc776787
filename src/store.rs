//! In-memory state manager.
//!
//! Each collection is a `DashMap` keyed by document or material number.
//! Mutations run against a clone of the locked entry and are committed only
//! when the closure succeeds, so validate-then-apply is atomic per document.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::{ServiceError, ServiceResult};
use crate::models::{Material, Order, Requisition};

/// A record that can live in a [`DocumentStore`].
pub trait Document: Clone + Send + Sync + 'static {
    /// Human readable kind used in error messages ("Order", "Material", ...).
    const KIND: &'static str;

    fn key(&self) -> &str;

    fn created_at(&self) -> DateTime<Utc>;
}

impl Document for Material {
    const KIND: &'static str = "Material";

    fn key(&self) -> &str {
        &self.material_number
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Document for Requisition {
    const KIND: &'static str = "Requisition";

    fn key(&self) -> &str {
        &self.document_number
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Document for Order {
    const KIND: &'static str = "Order";

    fn key(&self) -> &str {
        &self.document_number
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

fn not_found<T: Document>(key: &str) -> ServiceError {
    ServiceError::not_found(format!("{} {} not found", T::KIND, key))
}

pub struct DocumentStore<T: Document> {
    entries: DashMap<String, T>,
}

impl<T: Document> Default for DocumentStore<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<T: Document> DocumentStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> ServiceResult<T> {
        self.entries
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| not_found::<T>(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns every record ordered by creation time, then key.
    pub fn list(&self) -> Vec<T> {
        let mut values: Vec<T> = self.entries.iter().map(|e| e.value().clone()).collect();
        values.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.key().cmp(b.key()))
        });
        values
    }

    pub fn insert(&self, value: T) -> ServiceResult<T> {
        match self.entries.entry(value.key().to_string()) {
            Entry::Occupied(entry) => Err(ServiceError::conflict(format!(
                "{} {} already exists",
                T::KIND,
                entry.key()
            ))
            .with_detail("document_number", entry.key().as_str())
            .with_detail("conflict_reason", "already_exists")),
            Entry::Vacant(entry) => {
                entry.insert(value.clone());
                Ok(value)
            }
        }
    }

    /// Applies `apply` to a copy of the record and stores it on success.
    /// The entry stays locked for the duration of the closure.
    pub fn update<F>(&self, key: &str, apply: F) -> ServiceResult<T>
    where
        F: FnOnce(&mut T) -> ServiceResult<()>,
    {
        let mut entry = self.entries.get_mut(key).ok_or_else(|| not_found::<T>(key))?;
        let mut draft = entry.value().clone();
        apply(&mut draft)?;
        *entry.value_mut() = draft.clone();
        Ok(draft)
    }

    /// Removes the record if `check` accepts it.
    pub fn remove_if<F>(&self, key: &str, check: F) -> ServiceResult<T>
    where
        F: FnOnce(&T) -> ServiceResult<()>,
    {
        match self.entries.entry(key.to_string()) {
            Entry::Vacant(_) => Err(not_found::<T>(key)),
            Entry::Occupied(entry) => {
                check(entry.get())?;
                Ok(entry.remove())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Monotonic number generator that skips numbers already taken.
#[derive(Default)]
pub struct Sequence {
    next: AtomicU64,
}

impl Sequence {
    pub fn next_value(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Produces `prefix` + zero padded counter, retrying while `taken` says so.
    pub fn next_number(&self, prefix: &str, width: usize, taken: impl Fn(&str) -> bool) -> String {
        loop {
            let candidate = format!("{}{:0width$}", prefix, self.next_value(), width = width);
            if !taken(&candidate) {
                return candidate;
            }
        }
    }

    pub fn reset(&self) {
        self.next.store(0, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StoreCounts {
    pub materials: usize,
    pub requisitions: usize,
    pub orders: usize,
}

/// Shared state for all services.
#[derive(Default)]
pub struct StateManager {
    pub materials: DocumentStore<Material>,
    pub requisitions: DocumentStore<Requisition>,
    pub orders: DocumentStore<Order>,
    pub requisition_numbers: Sequence,
    pub order_numbers: Sequence,
    pub material_numbers: DashMap<&'static str, Arc<Sequence>>,
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_requisition_number(&self) -> String {
        self.requisition_numbers
            .next_number("PR", 6, |n| self.requisitions.contains(n))
    }

    pub fn next_order_number(&self) -> String {
        self.order_numbers
            .next_number("PO", 6, |n| self.orders.contains(n))
    }

    pub fn next_material_number(&self, prefix: &'static str) -> String {
        let sequence = self
            .material_numbers
            .entry(prefix)
            .or_insert_with(|| Arc::new(Sequence::default()))
            .clone();
        sequence.next_number(prefix, 5, |n| self.materials.contains(n))
    }

    pub fn counts(&self) -> StoreCounts {
        StoreCounts {
            materials: self.materials.len(),
            requisitions: self.requisitions.len(),
            orders: self.orders.len(),
        }
    }

    pub fn clear(&self) {
        self.materials.clear();
        self.requisitions.clear();
        self.orders.clear();
        self.requisition_numbers.reset();
        self.order_numbers.reset();
        self.material_numbers.clear();
    }
}
