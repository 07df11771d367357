//! Pantry items, the service boundary to the remote pantry store, and a
//! read-through cache kept fresh by the store's change feed.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, broadcast};

use crate::error::{PipelineError, Result};

const CHANGE_FEED_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PantryItem {
    pub id: String,
    #[serde(alias = "title")]
    pub name: String,
    #[serde(default, alias = "qty")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// ISO date (`YYYY-MM-DD`).
    #[serde(default, alias = "expiryDate", skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_low_stock: bool,
    /// Display copy of [`PantryItem::days_until_expiry`]; may be stale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_until_expiry: Option<i64>,
}

impl PantryItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            quantity: None,
            unit: None,
            expires_on: None,
            category: None,
            is_pinned: false,
            is_low_stock: false,
            days_until_expiry: None,
        }
    }

    pub fn expiring(mut self, expires_on: NaiveDate) -> Self {
        self.expires_on = Some(expires_on);
        self
    }

    /// Negative once expired; `None` when no date is known.
    pub fn days_until_expiry(&self, today: NaiveDate) -> Option<i64> {
        self.expires_on.map(|date| (date - today).num_days())
    }

    pub fn refresh_display(&mut self, today: NaiveDate) {
        self.days_until_expiry = self.days_until_expiry(today);
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.days_until_expiry(today).is_some_and(|days| days < 0)
    }

    pub fn is_expiring_soon(&self, today: NaiveDate, within_days: i64) -> bool {
        self.days_until_expiry(today)
            .is_some_and(|days| (0..=within_days).contains(&days))
    }
}

/// Names of usable items, soonest expiry first, undated items last.
/// Duplicates (case-insensitive) are listed once.
pub fn ingredient_names(items: &[PantryItem], today: NaiveDate) -> Vec<String> {
    let mut usable: Vec<&PantryItem> = items
        .iter()
        .filter(|item| !item.is_expired(today) && !item.name.trim().is_empty())
        .collect();
    usable.sort_by_key(|item| item.expires_on.map_or((1, NaiveDate::MAX), |date| (0, date)));

    let mut seen = HashSet::new();
    usable
        .into_iter()
        .map(|item| item.name.trim().to_string())
        .filter(|name| seen.insert(name.to_lowercase()))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum PantryChange {
    Upserted(PantryItem),
    Removed(String),
}

/// Boundary to the remote pantry store.
#[async_trait]
pub trait PantryService: Send + Sync {
    async fn list(&self) -> Result<Vec<PantryItem>>;

    /// Inserts or replaces the item with the same id.
    async fn upsert(&self, item: PantryItem) -> Result<()>;

    /// Returns whether an item was removed.
    async fn remove(&self, id: &str) -> Result<bool>;

    fn subscribe(&self) -> broadcast::Receiver<PantryChange>;
}

pub struct InMemoryPantry {
    items: RwLock<Vec<PantryItem>>,
    changes: broadcast::Sender<PantryChange>,
}

impl Default for InMemoryPantry {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            items: RwLock::new(Vec::new()),
            changes,
        }
    }
}

impl InMemoryPantry {
    pub fn new() -> Self {
        Self::default()
    }

    fn publish(&self, change: PantryChange) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }
}

#[async_trait]
impl PantryService for InMemoryPantry {
    async fn list(&self) -> Result<Vec<PantryItem>> {
        Ok(self.items.read().await.clone())
    }

    async fn upsert(&self, item: PantryItem) -> Result<()> {
        if item.id.trim().is_empty() {
            return Err(PipelineError::InvalidInput("pantry item id must not be empty".to_string()));
        }
        {
            let mut items = self.items.write().await;
            match items.iter_mut().find(|existing| existing.id == item.id) {
                Some(existing) => *existing = item.clone(),
                None => items.push(item.clone()),
            }
        }
        self.publish(PantryChange::Upserted(item));
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let removed = {
            let mut items = self.items.write().await;
            let before = items.len();
            items.retain(|item| item.id != id);
            items.len() != before
        };
        if removed {
            self.publish(PantryChange::Removed(id.to_string()));
        }
        Ok(removed)
    }

    fn subscribe(&self) -> broadcast::Receiver<PantryChange> {
        self.changes.subscribe()
    }
}

/// Read-through copy of the remote pantry list. Any change seen on the
/// subscription drops the copy so the next read refetches.
pub struct PantryCache {
    service: Arc<dyn PantryService>,
    items: RwLock<Option<Vec<PantryItem>>>,
    changes: Mutex<broadcast::Receiver<PantryChange>>,
}

impl PantryCache {
    pub fn new(service: Arc<dyn PantryService>) -> Self {
        let changes = Mutex::new(service.subscribe());
        Self {
            service,
            items: RwLock::new(None),
            changes,
        }
    }

    async fn drain_changes(&self) -> bool {
        let mut changes = self.changes.lock().await;
        let mut stale = false;
        loop {
            match changes.try_recv() {
                Ok(change) => {
                    tracing::debug!(?change, "pantry changed");
                    stale = true;
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "pantry change feed lagged");
                    stale = true;
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => break,
            }
        }
        stale
    }

    pub async fn items(&self, today: NaiveDate) -> Result<Vec<PantryItem>> {
        if self.drain_changes().await {
            self.invalidate().await;
        }
        if let Some(items) = self.items.read().await.as_ref() {
            return Ok(items.clone());
        }

        let mut items = self.service.list().await?;
        for item in &mut items {
            item.refresh_display(today);
        }
        *self.items.write().await = Some(items.clone());
        Ok(items)
    }

    pub async fn invalidate(&self) {
        self.items.write().await.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn accepts_alternate_field_names() {
        let item: PantryItem = serde_json::from_str(
            r#"{"id": "p1", "title": "Milk", "qty": 2, "unit": "l", "expiryDate": "2026-10-21", "isPinned": true}"#,
        )
        .unwrap();
        assert_eq!(item.name, "Milk");
        assert_eq!(item.quantity, Some(2.0));
        assert_eq!(item.expires_on, Some(day("2026-10-21")));
        assert!(item.is_pinned);

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["expiresOn"], "2026-10-21");
        assert_eq!(value["name"], "Milk");
    }

    #[test]
    fn expiry_is_derived_from_the_date() {
        let today = day("2026-10-19");
        let mut item = PantryItem::new("p1", "Yogurt").expiring(day("2026-10-21"));
        assert_eq!(item.days_until_expiry(today), Some(2));
        assert!(item.is_expiring_soon(today, 3));
        assert!(!item.is_expiring_soon(today, 1));
        assert!(!item.is_expired(today));
        assert!(item.is_expired(day("2026-10-22")));

        item.refresh_display(today);
        assert_eq!(item.days_until_expiry, Some(2));
        assert_eq!(PantryItem::new("p2", "Rice").days_until_expiry(today), None);
    }

    #[test]
    fn names_skip_expired_and_put_urgent_first() {
        let today = day("2026-10-19");
        let items = vec![
            PantryItem::new("1", "Rice"),
            PantryItem::new("2", "Spinach").expiring(day("2026-10-20")),
            PantryItem::new("3", "Old milk").expiring(day("2026-10-10")),
            PantryItem::new("4", "Chicken").expiring(day("2026-10-19")),
            PantryItem::new("5", "rice"),
        ];
        assert_eq!(ingredient_names(&items, today), vec!["Chicken", "Spinach", "Rice"]);
    }

    struct CountingPantry {
        inner: InMemoryPantry,
        lists: AtomicUsize,
    }

    #[async_trait]
    impl PantryService for CountingPantry {
        async fn list(&self) -> Result<Vec<PantryItem>> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            self.inner.list().await
        }
        async fn upsert(&self, item: PantryItem) -> Result<()> {
            self.inner.upsert(item).await
        }
        async fn remove(&self, id: &str) -> Result<bool> {
            self.inner.remove(id).await
        }
        fn subscribe(&self) -> broadcast::Receiver<PantryChange> {
            self.inner.subscribe()
        }
    }

    #[tokio::test]
    async fn cache_refetches_only_after_a_change() {
        let today = day("2026-10-19");
        let service = Arc::new(CountingPantry {
            inner: InMemoryPantry::new(),
            lists: AtomicUsize::new(0),
        });
        service
            .upsert(PantryItem::new("p1", "Eggs").expiring(day("2026-10-25")))
            .await
            .unwrap();
        let cache = PantryCache::new(service.clone());

        let first = cache.items(today).await.unwrap();
        assert_eq!(first[0].days_until_expiry, Some(6));
        cache.items(today).await.unwrap();
        assert_eq!(service.lists.load(Ordering::SeqCst), 1);

        service.upsert(PantryItem::new("p2", "Butter")).await.unwrap();
        let refreshed = cache.items(today).await.unwrap();
        assert_eq!(refreshed.len(), 2);
        assert_eq!(service.lists.load(Ordering::SeqCst), 2);

        assert!(service.remove("p1").await.unwrap());
        assert!(!service.remove("p1").await.unwrap());
        assert_eq!(cache.items(today).await.unwrap().len(), 1);
        assert_eq!(service.lists.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let pantry = InMemoryPantry::new();
        let mut changes = pantry.subscribe();
        pantry.upsert(PantryItem::new("p1", "Flour")).await.unwrap();
        let mut renamed = PantryItem::new("p1", "Bread flour");
        renamed.is_low_stock = true;
        pantry.upsert(renamed.clone()).await.unwrap();

        assert_eq!(pantry.list().await.unwrap(), vec![renamed.clone()]);
        assert!(matches!(changes.recv().await.unwrap(), PantryChange::Upserted(_)));
        assert_eq!(changes.recv().await.unwrap(), PantryChange::Upserted(renamed));
        assert!(matches!(
            pantry.upsert(PantryItem::new(" ", "x")).await,
            Err(PipelineError::InvalidInput(_))
        ));
    }
}
