/// Source name constants to ensure consistency across the codebase.
///
/// A source name doubles as the `source` half of the dedup key, so renaming
/// one orphans every stored record that carries the old name.

// Scraped sources (used in CLI, config, and stored records)
pub const EVENTBRITE_SOURCE: &str = "Eventbrite";
pub const MEETUP_SOURCE: &str = "Meetup";
pub const TIMEOUT_SOURCE: &str = "TimeOut";

/// Provenance marker for records entered by hand rather than scraped.
pub const MANUAL_SOURCE: &str = "Manual";

/// Added to `status_tags` once the import workflow touches a record.
pub const IMPORTED_TAG: &str = "imported";

/// City assigned to every record in this single-city deployment.
pub const DEFAULT_CITY: &str = "Sydney";

/// Records untouched for this many days are swept to inactive.
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Navigation/read timeout applied to each page fetch.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

/// Stable identifying header sent with every fetch.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Default listing URLs, used when config.toml carries no `[[sources]]`.
pub fn default_source_urls() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            EVENTBRITE_SOURCE,
            "https://www.eventbrite.com.au/d/australia--sydney/events/",
        ),
        (
            MEETUP_SOURCE,
            "https://www.meetup.com/find/?location=au--sydney&source=EVENTS",
        ),
        (TIMEOUT_SOURCE, "https://www.timeout.com/sydney/things-to-do"),
    ]
}

/// All source names the CLI accepts.
pub fn supported_sources() -> Vec<&'static str> {
    vec![EVENTBRITE_SOURCE, MEETUP_SOURCE, TIMEOUT_SOURCE]
}
