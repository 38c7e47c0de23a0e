use crate::error::{Result, ScraperError};
use crate::types::{derive_status_tags, Event, EventStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Storage collaborator for canonical event records.
///
/// Uniqueness of the dedup key (`source`, `source_url`) is enforced here,
/// when both halves are non-empty; `insert` reports a collision as
/// `ScraperError::DuplicateKey` so the caller can convert it to an update.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn find_by_key(&self, source: &str, source_url: &str) -> Result<Option<Event>>;
    async fn insert(&self, event: &mut Event) -> Result<()>;
    async fn update(&self, event: &Event) -> Result<()>;
    /// Batch-transition records last scraped before `cutoff` and not already
    /// inactive. Returns how many records were rewritten.
    async fn mark_stale_inactive(&self, cutoff: DateTime<Utc>) -> Result<usize>;
    async fn all_events(&self) -> Result<Vec<Event>>;
}

/// In-memory storage implementation for development/testing
pub struct InMemoryStorage {
    events: Arc<Mutex<HashMap<Uuid, Event>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn find_by_key(&self, source: &str, source_url: &str) -> Result<Option<Event>> {
        let events = self.events.lock().unwrap();
        let event = events
            .values()
            .find(|e| e.source == source && e.source_url == source_url)
            .cloned();
        Ok(event)
    }

    async fn insert(&self, event: &mut Event) -> Result<()> {
        let mut events = self.events.lock().unwrap();

        // Records missing either half of the key are exempt from dedup
        if !event.source.is_empty() && !event.source_url.is_empty() {
            let collision = events
                .values()
                .any(|e| e.source == event.source && e.source_url == event.source_url);
            if collision {
                return Err(ScraperError::DuplicateKey {
                    event_source: event.source.clone(),
                    source_url: event.source_url.clone(),
                });
            }
        }

        let id = Uuid::new_v4();
        event.id = Some(id);
        events.insert(id, event.clone());

        debug!("Inserted event: {} with id {}", event.title, id);
        Ok(())
    }

    async fn update(&self, event: &Event) -> Result<()> {
        let event_id = event.id.ok_or_else(|| ScraperError::Storage {
            message: "Cannot update event without ID".to_string(),
        })?;

        let mut events = self.events.lock().unwrap();
        events.insert(event_id, event.clone());

        debug!("Updated event: {} with id {}", event.title, event_id);
        Ok(())
    }

    async fn mark_stale_inactive(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut events = self.events.lock().unwrap();
        let mut flipped = 0;

        for event in events.values_mut() {
            if event.status == EventStatus::Inactive {
                continue;
            }
            let stale = match event.last_scraped {
                Some(last_scraped) => last_scraped < cutoff,
                None => false,
            };
            if stale {
                event.status = EventStatus::Inactive;
                event.status_tags = derive_status_tags(EventStatus::Inactive, event.imported_at);
                flipped += 1;
            }
        }

        debug!("Marked {} stale events inactive", flipped);
        Ok(flipped)
    }

    async fn all_events(&self) -> Result<Vec<Event>> {
        let events = self.events.lock().unwrap();
        Ok(events.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Event;

    fn scraped_event(source: &str, source_url: &str) -> Event {
        let mut event = Event::manual("Gig".into(), String::new(), "Sydney".into());
        event.source = source.to_string();
        event.source_url = source_url.to_string();
        event
    }

    #[tokio::test]
    async fn insert_enforces_dedup_key_uniqueness() {
        let storage = InMemoryStorage::new();
        let mut first = scraped_event("Eventbrite", "https://x/1");
        storage.insert(&mut first).await.unwrap();

        let mut second = scraped_event("Eventbrite", "https://x/1");
        let err = storage.insert(&mut second).await.unwrap_err();
        assert!(matches!(err, ScraperError::DuplicateKey { .. }));

        // Same URL under a different source is a different logical event
        let mut other_source = scraped_event("Meetup", "https://x/1");
        storage.insert(&mut other_source).await.unwrap();
    }

    #[tokio::test]
    async fn keyless_records_are_exempt_from_dedup() {
        let storage = InMemoryStorage::new();
        let mut first = Event::manual("One".into(), String::new(), "Sydney".into());
        let mut second = Event::manual("Two".into(), String::new(), "Sydney".into());
        storage.insert(&mut first).await.unwrap();
        storage.insert(&mut second).await.unwrap();
        assert_eq!(storage.all_events().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn find_by_key_round_trips() {
        let storage = InMemoryStorage::new();
        let mut event = scraped_event("Eventbrite", "https://x/1");
        storage.insert(&mut event).await.unwrap();

        let found = storage
            .find_by_key("Eventbrite", "https://x/1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, event.id);
        assert!(storage
            .find_by_key("Eventbrite", "https://x/2")
            .await
            .unwrap()
            .is_none());
    }
}
