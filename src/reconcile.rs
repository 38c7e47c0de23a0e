use crate::error::{Result, ScraperError};
use crate::storage::Storage;
use crate::types::{derive_status_tags, Event, EventDraft, EventStatus};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Outcome of reconciling one draft against stored state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Created,
    Updated,
    Unchanged,
    Skipped,
}

/// Compare optional timestamps by their RFC 3339 text so that two
/// representations of the same instant never read as a change.
fn date_repr(value: Option<DateTime<Utc>>) -> String {
    value.map(|v| v.to_rfc3339()).unwrap_or_default()
}

/// True when any watched field differs between the stored record and the
/// draft. Unwatched fields (title, category, city) refresh silently.
fn watched_fields_changed(existing: &Event, draft: &EventDraft) -> bool {
    existing.date_text != draft.date_text
        || date_repr(existing.start_date) != date_repr(draft.start_date)
        || existing.venue_name != draft.venue_name
        || existing.venue_address != draft.venue_address
        || existing.description != draft.description
        || existing.image_url != draft.image_url
}

/// Pure status transition: given the stored record (if any) and the fresh
/// draft, produce the next record version and what happened.
///
/// The newest scrape is authoritative, so every scraped field is overwritten
/// regardless of whether a change was detected. `status` only ever moves
/// toward `Updated` here; it never reverts to `New`, and an `Inactive`
/// record whose content changed silently re-enters `Updated`.
pub fn reconcile(
    existing: Option<&Event>,
    draft: &EventDraft,
    now: DateTime<Utc>,
) -> (Event, Transition) {
    match existing {
        None => {
            let event = Event {
                id: None,
                title: draft.title.clone(),
                date_text: draft.date_text.clone(),
                start_date: draft.start_date,
                end_date: draft.end_date,
                venue_name: draft.venue_name.clone(),
                venue_address: draft.venue_address.clone(),
                city: draft.city.clone(),
                description: draft.description.clone(),
                category: draft.category.clone(),
                image_url: draft.image_url.clone(),
                source: draft.source.clone(),
                source_url: draft.source_url.clone(),
                last_scraped: Some(now),
                status: EventStatus::New,
                status_tags: derive_status_tags(EventStatus::New, None),
                imported_at: None,
                imported_by: None,
                import_notes: None,
                created_at: now,
            };
            (event, Transition::Created)
        }
        Some(existing) => {
            let changed = watched_fields_changed(existing, draft);

            let mut next = existing.clone();
            next.title = draft.title.clone();
            next.date_text = draft.date_text.clone();
            next.start_date = draft.start_date;
            next.end_date = draft.end_date;
            next.venue_name = draft.venue_name.clone();
            next.venue_address = draft.venue_address.clone();
            next.city = draft.city.clone();
            next.description = draft.description.clone();
            next.category = draft.category.clone();
            next.image_url = draft.image_url.clone();

            if changed {
                next.status = EventStatus::Updated;
            }
            // last_scraped advances on every observation, changed or not
            next.last_scraped = Some(now);
            next.status_tags = derive_status_tags(next.status, next.imported_at);

            let transition = if changed {
                Transition::Updated
            } else {
                Transition::Unchanged
            };
            (next, transition)
        }
    }
}

/// Persists reconciliation outcomes through the storage collaborator
pub struct Reconciler {
    storage: Arc<dyn Storage>,
}

impl Reconciler {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Reconcile one draft: look up by dedup key, insert or update, and
    /// recover an insert race by replaying as an update.
    #[instrument(skip(self, draft), fields(source = %draft.source, source_url = %draft.source_url))]
    pub async fn reconcile_draft(&self, draft: &EventDraft, now: DateTime<Utc>) -> Result<Transition> {
        if !draft.has_dedup_key() {
            debug!("Draft has no dedup key, skipping reconciliation");
            return Ok(Transition::Skipped);
        }

        if let Some(existing) = self
            .storage
            .find_by_key(&draft.source, &draft.source_url)
            .await?
        {
            return self.apply_update(&existing, draft, now).await;
        }

        let (mut event, transition) = reconcile(None, draft, now);
        match self.storage.insert(&mut event).await {
            Ok(()) => {
                info!("Created new event: {}", event.title);
                Ok(transition)
            }
            Err(ScraperError::DuplicateKey { .. }) => {
                // A concurrent pass inserted the same key first; replay as an
                // update against whatever won the race.
                warn!("Insert race on dedup key, replaying as update");
                let existing = self
                    .storage
                    .find_by_key(&draft.source, &draft.source_url)
                    .await?
                    .ok_or_else(|| ScraperError::Storage {
                        message: format!(
                            "Record for ({}, {}) vanished after duplicate-key conflict",
                            draft.source, draft.source_url
                        ),
                    })?;
                self.apply_update(&existing, draft, now).await
            }
            Err(e) => Err(e),
        }
    }

    async fn apply_update(
        &self,
        existing: &Event,
        draft: &EventDraft,
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        let (next, transition) = reconcile(Some(existing), draft, now);
        self.storage.update(&next).await?;
        if transition == Transition::Updated {
            info!("Updated existing event: {}", next.title);
        } else {
            debug!("No changes for event: {}", next.title);
        }
        Ok(transition)
    }
}
