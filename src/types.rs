use crate::constants::{IMPORTED_TAG, MANUAL_SOURCE};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw candidate record as emitted by the extractor or a site adapter
pub type RawEventData = serde_json::Value;

/// Lifecycle status owned by the reconciliation engine and the sweeper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    New,
    Updated,
    Inactive,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::New => "new",
            EventStatus::Updated => "updated",
            EventStatus::Inactive => "inactive",
        }
    }
}

/// Display tags derived from status plus the import marker.
///
/// Tags are never authoritative on their own; every write path recomputes
/// them so they cannot go stale.
pub fn derive_status_tags(status: EventStatus, imported_at: Option<DateTime<Utc>>) -> Vec<String> {
    let mut tags = vec![status.as_str().to_string()];
    if imported_at.is_some() {
        tags.push(IMPORTED_TAG.to_string());
    }
    tags
}

/// A canonical event record, the unit of reconciliation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Option<Uuid>,
    pub title: String,
    pub date_text: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub venue_name: String,
    pub venue_address: String,
    pub city: String,
    pub description: String,
    pub category: Vec<String>,
    pub image_url: String,
    pub source: String,
    pub source_url: String,
    pub last_scraped: Option<DateTime<Utc>>,
    pub status: EventStatus,
    pub status_tags: Vec<String>,
    pub imported_at: Option<DateTime<Utc>>,
    pub imported_by: Option<String>,
    pub import_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A normalized, not-yet-persisted event produced by the normalizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub date_text: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub venue_name: String,
    pub venue_address: String,
    pub city: String,
    pub description: String,
    pub category: Vec<String>,
    pub image_url: String,
    pub source: String,
    pub source_url: String,
}

impl EventDraft {
    /// A draft without both halves of the dedup key cannot be reconciled
    pub fn has_dedup_key(&self) -> bool {
        !self.source.is_empty() && !self.source_url.is_empty()
    }
}

impl Event {
    /// Create a manually entered record, the way the admin entry form does
    pub fn manual(title: String, date_text: String, city: String) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            title,
            date_text,
            start_date: None,
            end_date: None,
            venue_name: String::new(),
            venue_address: String::new(),
            city,
            description: String::new(),
            category: Vec::new(),
            image_url: String::new(),
            source: MANUAL_SOURCE.to_string(),
            source_url: String::new(),
            last_scraped: None,
            status: EventStatus::New,
            status_tags: derive_status_tags(EventStatus::New, None),
            imported_at: None,
            imported_by: None,
            import_notes: None,
            created_at: now,
        }
    }

    /// The import workflow's only write: stamp import metadata and refresh
    /// the tags. `status` stays untouched, it belongs to the pipeline.
    pub fn mark_imported(&mut self, now: DateTime<Utc>, by: String, notes: Option<String>) {
        self.imported_at = Some(now);
        self.imported_by = Some(by);
        self.import_notes = notes;
        self.status_tags = derive_status_tags(self.status, self.imported_at);
    }
}

/// Site-specific fallback extraction, tried only when structured-data
/// extraction finds nothing on a page
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source name this adapter serves, matching the configured source
    fn name(&self) -> &'static str;

    /// Extract raw candidate records from rendered page markup
    async fn extract(&self, page_html: &str) -> Result<Vec<RawEventData>>;
}
