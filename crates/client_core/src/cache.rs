use std::{collections::HashMap, future::Future, sync::Arc};

use alloy_primitives::Address;
use shared::error::RegistryError;
use tokio::sync::{watch, Mutex};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Events,
    OwnerTickets,
}

/// Identity of a read query. Any field change forces a fresh fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub kind: QueryKind,
    pub refresh_token: u64,
    pub chain_id: Option<u64>,
    pub owner: Option<Address>,
}

impl QueryKey {
    pub fn events(refresh_token: u64, chain_id: Option<u64>) -> Self {
        Self {
            kind: QueryKind::Events,
            refresh_token,
            chain_id,
            owner: None,
        }
    }

    pub fn owner_tickets(refresh_token: u64, chain_id: Option<u64>, owner: Address) -> Self {
        Self {
            kind: QueryKind::OwnerTickets,
            refresh_token,
            chain_id,
            owner: Some(owner),
        }
    }

    pub fn slot(&self) -> SlotId {
        SlotId {
            kind: self.kind,
            owner: self.owner,
        }
    }
}

/// Logical place a query result is displayed in; successive keys replace each other here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    pub kind: QueryKind,
    pub owner: Option<Address>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Loading,
    Ready,
    Failed,
}

#[derive(Debug)]
pub struct QuerySnapshot<V> {
    pub key: Option<QueryKey>,
    pub status: QueryStatus,
    pub data: Option<Arc<V>>,
    pub error: Option<RegistryError>,
}

impl<V> Clone for QuerySnapshot<V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
        }
    }
}

impl<V> Default for QuerySnapshot<V> {
    fn default() -> Self {
        Self {
            key: None,
            status: QueryStatus::Idle,
            data: None,
            error: None,
        }
    }
}

#[derive(Debug)]
pub enum Fetched<V> {
    Fresh(Arc<V>),
    Cached(Arc<V>),
    /// The slot moved on to a newer key, or the refresh token was bumped, while this fetch was
    /// running; its result was dropped.
    Superseded,
}

/// Keyed cache of async query results with last-key-wins completion.
pub struct QueryCache<V> {
    slots: Mutex<HashMap<SlotId, QuerySnapshot<V>>>,
    refresh: Option<watch::Receiver<u64>>,
}

impl<V> Default for QueryCache<V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            refresh: None,
        }
    }
}

impl<V> QueryCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache whose completions are also dropped once `refresh` has moved past the key's token.
    pub fn watching(refresh: watch::Receiver<u64>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            refresh: Some(refresh),
        }
    }

    fn latest_token(&self) -> Option<u64> {
        self.refresh.as_ref().map(|refresh| *refresh.borrow())
    }

    pub async fn fetch<F, Fut>(
        &self,
        key: QueryKey,
        fetcher: F,
    ) -> Result<Fetched<V>, RegistryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, RegistryError>>,
    {
        {
            let mut slots = self.slots.lock().await;
            let slot = slots.entry(key.slot()).or_default();
            if slot.key == Some(key) && slot.status == QueryStatus::Ready {
                if let Some(data) = &slot.data {
                    return Ok(Fetched::Cached(Arc::clone(data)));
                }
            }
            slot.key = Some(key);
            slot.status = QueryStatus::Loading;
        }

        debug!(
            "query: fetching kind={:?} token={} chain={:?}",
            key.kind, key.refresh_token, key.chain_id
        );
        let result = fetcher().await;

        let mut slots = self.slots.lock().await;
        let slot = slots.entry(key.slot()).or_default();
        let latest = self.latest_token();
        if slot.key != Some(key) || latest.is_some_and(|token| token != key.refresh_token) {
            debug!(
                "query: discarding stale result kind={:?} token={} slot={:?} latest={latest:?}",
                key.kind,
                key.refresh_token,
                slot.key.map(|current| current.refresh_token)
            );
            if slot.key == Some(key) {
                slot.status = QueryStatus::Idle;
            }
            return Ok(Fetched::Superseded);
        }

        match result {
            Ok(value) => {
                let data = Arc::new(value);
                slot.status = QueryStatus::Ready;
                slot.data = Some(Arc::clone(&data));
                slot.error = None;
                Ok(Fetched::Fresh(data))
            }
            Err(err) => {
                slot.status = QueryStatus::Failed;
                slot.error = Some(err.clone());
                Err(err)
            }
        }
    }

    pub async fn snapshot(&self, slot: SlotId) -> QuerySnapshot<V> {
        self.slots
            .lock()
            .await
            .get(&slot)
            .cloned()
            .unwrap_or_default()
    }

    /// Forces the next fetch of every slot to hit the registry; data stays available meanwhile.
    pub async fn invalidate_all(&self) {
        for entry in self.slots.lock().await.values_mut() {
            entry.key = None;
            entry.status = QueryStatus::Idle;
        }
    }
}
