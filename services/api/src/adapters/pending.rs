//! services/api/src/adapters/pending.rs
//!
//! Pending registrations held in a `moka` cache. Entries are evicted a fixed
//! time after their last write, so an abandoned signup frees itself without
//! anyone sweeping the store. A rotation rewrites the entry and restarts its clock.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use shop_core::domain::PendingRegistration;
use shop_core::ports::{PendingRegistrationStore, PortResult};

#[derive(Clone)]
pub struct MokaPendingStore {
    cache: Cache<String, PendingRegistration>,
}

impl MokaPendingStore {
    pub fn new(time_to_live: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(time_to_live)
            .build();
        Self { cache }
    }
}

#[async_trait]
impl PendingRegistrationStore for MokaPendingStore {
    async fn get(&self, email: &str) -> PortResult<Option<PendingRegistration>> {
        Ok(self.cache.get(email).await)
    }

    async fn put(&self, pending: PendingRegistration) -> PortResult<()> {
        self.cache.insert(pending.email.clone(), pending).await;
        Ok(())
    }

    async fn remove(&self, email: &str) -> PortResult<Option<PendingRegistration>> {
        Ok(self.cache.remove(email).await)
    }
}
