use crate::config::Config;
use crate::error::Result;
use crate::extractor;
use crate::fetch::PageFetcher;
use crate::normalize::normalize;
use crate::reconcile::{Reconciler, Transition};
use crate::storage::Storage;
use crate::sweep::Sweeper;
use crate::types::{EventDraft, SourceAdapter};
use chrono::{Duration, Utc};
use metrics::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Result of a complete ingestion cycle
#[derive(Debug, Default)]
pub struct CycleResult {
    pub sources_total: usize,
    pub sources_failed: Vec<String>,
    /// Sources never fetched because the cycle deadline expired first
    pub sources_skipped: usize,
    pub drafts: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub expired: usize,
    pub deadline_hit: bool,
}

/// Ingestion orchestrator: fetch, extract, normalize, reconcile, sweep.
///
/// Sources run in configured order and fail independently; reconciliation
/// and the staleness sweep run once over everything gathered, so the sweep
/// never penalizes a source that was merely slow within the cycle.
pub struct Harvester {
    fetcher: Arc<dyn PageFetcher>,
    storage: Arc<dyn Storage>,
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
    config: Config,
}

impl Harvester {
    pub fn new(fetcher: Arc<dyn PageFetcher>, storage: Arc<dyn Storage>, config: Config) -> Self {
        Self {
            fetcher,
            storage,
            adapters: HashMap::new(),
            config,
        }
    }

    /// Register a site-specific fallback adapter, tried only when
    /// structured-data extraction yields nothing for that source.
    pub fn with_adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.insert(adapter.name().to_string(), adapter);
        self
    }

    /// Fetch and extract one source into normalized drafts.
    async fn gather_source(&self, name: &str, url: &str) -> Result<Vec<EventDraft>> {
        let page = self.fetcher.fetch(url).await?;

        let mut raw_records = extractor::extract_from_html(&page);
        if raw_records.is_empty() {
            if let Some(adapter) = self.adapters.get(name) {
                debug!("No structured data for {}, trying fallback adapter", name);
                raw_records = adapter.extract(&page).await?;
            }
        }

        info!("Extracted {} raw records from {}", raw_records.len(), name);
        Ok(raw_records
            .iter()
            .map(|raw| normalize(raw, name, &self.config.city))
            .collect())
    }

    /// Run one full ingestion cycle. `sweep` gates the trailing staleness
    /// sweep so a diagnostic run can ingest without expiring anything.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self, sweep: bool) -> Result<CycleResult> {
        let cycle_start = std::time::Instant::now();
        counter!("ses_cycle_runs_total").increment(1);

        let deadline = self
            .config
            .cycle_deadline_seconds
            .map(std::time::Duration::from_secs);

        let mut result = CycleResult {
            sources_total: self.config.sources.len(),
            ..Default::default()
        };
        let mut drafts: Vec<EventDraft> = Vec::new();

        // Phase 1: fetch + extract + normalize, one source at a time
        for (idx, source) in self.config.sources.iter().enumerate() {
            if let Some(deadline) = deadline {
                if cycle_start.elapsed() >= deadline {
                    // Whatever was already gathered still gets reconciled
                    // and swept; only further fetches are abandoned.
                    warn!("Cycle deadline reached, skipping remaining sources");
                    result.deadline_hit = true;
                    result.sources_skipped = self.config.sources.len() - idx;
                    break;
                }
            }

            let t_fetch = std::time::Instant::now();
            match self.gather_source(&source.name, &source.url).await {
                Ok(source_drafts) => {
                    histogram!("ses_source_fetch_duration_seconds", "source" => source.name.clone())
                        .record(t_fetch.elapsed().as_secs_f64());
                    drafts.extend(source_drafts);
                }
                Err(e) => {
                    // One source failing must never abort the cycle
                    warn!("Failed to scrape {}: {}", source.name, e);
                    counter!("ses_source_failures_total", "source" => source.name.clone())
                        .increment(1);
                    result.sources_failed.push(source.name.clone());
                }
            }
        }

        result.drafts = drafts.len();
        counter!("ses_drafts_total").increment(drafts.len() as u64);

        // Phase 2: reconcile every draft that can be de-duplicated
        let reconciler = Reconciler::new(self.storage.clone());
        for draft in &drafts {
            if draft.title.is_empty() || !draft.has_dedup_key() {
                result.skipped += 1;
                continue;
            }
            match reconciler.reconcile_draft(draft, Utc::now()).await? {
                Transition::Created => result.created += 1,
                Transition::Updated => result.updated += 1,
                Transition::Unchanged => result.unchanged += 1,
                Transition::Skipped => result.skipped += 1,
            }
        }
        counter!("ses_events_created_total").increment(result.created as u64);
        counter!("ses_events_updated_total").increment(result.updated as u64);

        // Phase 3: expire records no longer observed, exactly once per cycle
        if sweep {
            let sweeper = Sweeper::new(self.storage.clone());
            result.expired = sweeper
                .run(Duration::days(self.config.retention_days), Utc::now())
                .await?;
        }

        histogram!("ses_cycle_duration_seconds").record(cycle_start.elapsed().as_secs_f64());
        info!(
            "Cycle finished: {} drafts, {} created, {} updated, {} unchanged, {} skipped, {} expired, {} sources failed",
            result.drafts,
            result.created,
            result.updated,
            result.unchanged,
            result.skipped,
            result.expired,
            result.sources_failed.len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::error::ScraperError;
    use crate::storage::InMemoryStorage;
    use crate::types::RawEventData;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Canned pages keyed by URL; unknown URLs fail like a dead site
    struct FakeFetcher {
        pages: Mutex<HashMap<String, String>>,
    }

    impl FakeFetcher {
        fn new(pages: Vec<(&str, String)>) -> Self {
            Self {
                pages: Mutex::new(
                    pages
                        .into_iter()
                        .map(|(url, body)| (url.to_string(), body))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.pages
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| ScraperError::Config(format!("navigation failed for {url}")))
        }
    }

    struct FakeAdapter;

    #[async_trait]
    impl SourceAdapter for FakeAdapter {
        fn name(&self) -> &'static str {
            "Meetup"
        }

        async fn extract(&self, _page_html: &str) -> Result<Vec<RawEventData>> {
            Ok(vec![json!({
                "title": "Rust Meetup",
                "dateText": "2025-09-20",
                "sourceUrl": "https://meetup/rust"
            })])
        }
    }

    fn page_with_event(title: &str, url: &str) -> String {
        format!(
            r#"<html><head><script type="application/ld+json">{}</script></head></html>"#,
            json!({
                "@type": "Event",
                "name": title,
                "startDate": "2025-09-12T19:00:00+10:00",
                "url": url,
                "location": { "name": "The Metro" }
            })
        )
    }

    fn config_for(sources: Vec<(&str, &str)>) -> Config {
        Config {
            sources: sources
                .into_iter()
                .map(|(name, url)| SourceConfig {
                    name: name.into(),
                    url: url.into(),
                })
                .collect(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn one_dead_source_does_not_abort_the_cycle() {
        let fetcher = Arc::new(FakeFetcher::new(vec![(
            "https://a",
            page_with_event("Jazz Night", "https://x/1"),
        )]));
        let storage = Arc::new(InMemoryStorage::new());
        let config = config_for(vec![("Eventbrite", "https://a"), ("TimeOut", "https://dead")]);

        let harvester = Harvester::new(fetcher, storage.clone(), config);
        let result = harvester.run_cycle(true).await.unwrap();

        assert_eq!(result.created, 1);
        assert_eq!(result.sources_failed, vec!["TimeOut"]);
        assert_eq!(storage.all_events().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn adapter_fallback_kicks_in_when_no_structured_data() {
        let fetcher = Arc::new(FakeFetcher::new(vec![(
            "https://m",
            "<html><body>cards only, no json-ld</body></html>".to_string(),
        )]));
        let storage = Arc::new(InMemoryStorage::new());
        let config = config_for(vec![("Meetup", "https://m")]);

        let harvester =
            Harvester::new(fetcher, storage.clone(), config).with_adapter(Arc::new(FakeAdapter));
        let result = harvester.run_cycle(true).await.unwrap();

        assert_eq!(result.created, 1);
        let events = storage.all_events().await.unwrap();
        assert_eq!(events[0].title, "Rust Meetup");
        assert_eq!(events[0].source, "Meetup");
    }

    #[tokio::test]
    async fn keyless_drafts_are_counted_as_skipped() {
        let block = json!([
            { "@type": "Event", "name": "No URL" },
            { "@type": "Event", "name": "Has URL", "url": "https://x/ok" }
        ]);
        let page = format!(
            r#"<html><script type="application/ld+json">{block}</script></html>"#
        );
        let fetcher = Arc::new(FakeFetcher::new(vec![("https://a", page)]));
        let storage = Arc::new(InMemoryStorage::new());

        let harvester = Harvester::new(
            fetcher,
            storage.clone(),
            config_for(vec![("Eventbrite", "https://a")]),
        );
        let result = harvester.run_cycle(false).await.unwrap();

        assert_eq!(result.drafts, 2);
        assert_eq!(result.created, 1);
        assert_eq!(result.skipped, 1);
    }

    #[tokio::test]
    async fn expired_deadline_skips_fetches_but_still_sweeps() {
        use crate::types::{derive_status_tags, Event, EventStatus};

        // A record that should be expired regardless of how the cycle ends
        let storage = Arc::new(InMemoryStorage::new());
        let mut stale = Event::manual("Old Gig".into(), String::new(), "Sydney".into());
        stale.source = "Eventbrite".into();
        stale.source_url = "https://x/old".into();
        stale.status = EventStatus::Updated;
        stale.status_tags = derive_status_tags(EventStatus::Updated, None);
        stale.last_scraped = Some(Utc::now() - Duration::days(8));
        storage.insert(&mut stale).await.unwrap();

        let fetcher = Arc::new(FakeFetcher::new(vec![(
            "https://a",
            page_with_event("Jazz Night", "https://x/1"),
        )]));
        let mut config = config_for(vec![("Eventbrite", "https://a"), ("TimeOut", "https://b")]);
        config.cycle_deadline_seconds = Some(0);

        let harvester = Harvester::new(fetcher, storage.clone(), config);
        let result = harvester.run_cycle(true).await.unwrap();

        assert!(result.deadline_hit);
        assert_eq!(result.sources_skipped, 2);
        assert_eq!(result.drafts, 0);
        // Skipped is not failed: the sources were never attempted
        assert!(result.sources_failed.is_empty());
        assert_eq!(result.expired, 1);

        let events = storage.all_events().await.unwrap();
        assert_eq!(events[0].status, EventStatus::Inactive);
    }

    #[tokio::test]
    async fn second_cycle_without_changes_is_idempotent() {
        let fetcher = Arc::new(FakeFetcher::new(vec![(
            "https://a",
            page_with_event("Jazz Night", "https://x/1"),
        )]));
        let storage = Arc::new(InMemoryStorage::new());
        let config = config_for(vec![("Eventbrite", "https://a")]);
        let harvester = Harvester::new(fetcher, storage.clone(), config);

        let first = harvester.run_cycle(true).await.unwrap();
        assert_eq!(first.created, 1);

        let second = harvester.run_cycle(true).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.unchanged, 1);
        assert_eq!(storage.all_events().await.unwrap().len(), 1);
    }
}
