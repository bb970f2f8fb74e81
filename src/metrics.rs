use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub users_registered: Arc<AtomicUsize>,
    pub tokens_issued: Arc<AtomicUsize>,
    pub recipes_created: Arc<AtomicUsize>,
    pub recipes_deleted: Arc<AtomicUsize>,
    pub shopping_list_exports: Arc<AtomicUsize>,
    pub shopping_list_export_failures: Arc<AtomicUsize>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            users_registered: Arc::new(AtomicUsize::new(0)),
            tokens_issued: Arc::new(AtomicUsize::new(0)),
            recipes_created: Arc::new(AtomicUsize::new(0)),
            recipes_deleted: Arc::new(AtomicUsize::new(0)),
            shopping_list_exports: Arc::new(AtomicUsize::new(0)),
            shopping_list_export_failures: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_users_registered(&self) {
        self.users_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tokens_issued(&self) {
        self.tokens_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_recipes_created(&self) {
        self.recipes_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_recipes_deleted(&self) {
        self.recipes_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_exports(&self) {
        self.shopping_list_exports.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_export_failures(&self) {
        self.shopping_list_export_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            users_registered: self.users_registered.load(Ordering::Relaxed),
            tokens_issued: self.tokens_issued.load(Ordering::Relaxed),
            recipes_created: self.recipes_created.load(Ordering::Relaxed),
            recipes_deleted: self.recipes_deleted.load(Ordering::Relaxed),
            shopping_list_exports: self.shopping_list_exports.load(Ordering::Relaxed),
            shopping_list_export_failures: self.shopping_list_export_failures.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub users_registered: usize,
    pub tokens_issued: usize,
    pub recipes_created: usize,
    pub recipes_deleted: usize,
    pub shopping_list_exports: usize,
    pub shopping_list_export_failures: usize,
    pub uptime_seconds: u64,
}
