use crate::types::{EventDraft, RawEventData};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// First non-empty string among the named keys, else ""
fn first_non_empty(raw: &RawEventData, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| raw[*key].as_str())
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_default()
}

/// Lenient timestamp parsing for scraped date strings.
///
/// Scraped date information is unreliable; anything unparseable degrades to
/// `None` rather than failing the record. Naive forms are taken as UTC.
pub fn safe_parse_date(value: &str) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&parsed));
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&parsed.and_hms_opt(0, 0, 0)?));
    }
    None
}

/// Maps one raw candidate record into a canonical event draft.
///
/// Raw records come from the extractor or from site adapters, which disagree
/// on field names; each canonical field takes the first non-empty candidate.
pub fn normalize(raw: &RawEventData, source_name: &str, city: &str) -> EventDraft {
    let start_raw = first_non_empty(raw, &["startDate", "start_time", "date"]);
    let end_raw = first_non_empty(raw, &["endDate", "end_time"]);

    let category = match &raw["category"] {
        Value::String(label) if !label.is_empty() => vec![label.clone()],
        _ => Vec::new(),
    };

    EventDraft {
        title: first_non_empty(raw, &["title", "name"]),
        date_text: first_non_empty(raw, &["dateText", "date", "startDate", "start_time"]),
        start_date: safe_parse_date(&start_raw),
        end_date: safe_parse_date(&end_raw),
        venue_name: first_non_empty(raw, &["venueName", "venue", "locationName"]),
        venue_address: first_non_empty(raw, &["venueAddress", "locationAddress"]),
        city: city.to_string(),
        description: first_non_empty(raw, &["description", "summary"]),
        category,
        image_url: first_non_empty(raw, &["imageUrl", "image"]),
        source: source_name.to_string(),
        source_url: first_non_empty(raw, &["sourceUrl", "url"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_fallbacks_take_first_non_empty() {
        let raw = json!({
            "name": "Harbour Markets",
            "date": "Every Saturday",
            "venue": "The Rocks",
            "summary": "Weekly market",
            "url": "https://x/markets"
        });

        let draft = normalize(&raw, "TimeOut", "Sydney");
        assert_eq!(draft.title, "Harbour Markets");
        assert_eq!(draft.date_text, "Every Saturday");
        assert_eq!(draft.venue_name, "The Rocks");
        assert_eq!(draft.description, "Weekly market");
        assert_eq!(draft.source_url, "https://x/markets");
        assert_eq!(draft.source, "TimeOut");
        assert_eq!(draft.city, "Sydney");
    }

    #[test]
    fn unparseable_dates_become_none_but_date_text_survives() {
        let raw = json!({
            "title": "Jazz Night",
            "dateText": "Friday from 7pm",
            "startDate": "Friday from 7pm"
        });

        let draft = normalize(&raw, "Eventbrite", "Sydney");
        assert!(draft.start_date.is_none());
        assert_eq!(draft.date_text, "Friday from 7pm");
    }

    #[test]
    fn iso_offset_and_naive_forms_both_parse() {
        let with_offset = safe_parse_date("2025-09-12T19:00:00+10:00").unwrap();
        assert_eq!(with_offset.to_rfc3339(), "2025-09-12T09:00:00+00:00");

        assert!(safe_parse_date("2025-09-12T19:00:00").is_some());
        assert!(safe_parse_date("2025-09-12").is_some());
        assert!(safe_parse_date("").is_none());
    }

    #[test]
    fn scalar_category_becomes_single_element_set() {
        let raw = json!({ "title": "Expo", "category": "Business" });
        assert_eq!(normalize(&raw, "Meetup", "Sydney").category, vec!["Business"]);

        let raw = json!({ "title": "Expo" });
        assert!(normalize(&raw, "Meetup", "Sydney").category.is_empty());
    }

    #[test]
    fn absent_fields_default_to_empty_strings() {
        let raw = json!({ "title": "Bare" });
        let draft = normalize(&raw, "Meetup", "Sydney");
        assert_eq!(draft.venue_address, "");
        assert_eq!(draft.image_url, "");
        assert!(!draft.has_dedup_key());
    }
}
