use crate::types::RawEventData;
use scraper::{Html, Selector};
use serde_json::{json, Value};
use tracing::debug;

/// Pulls every JSON-LD Event out of a rendered page.
///
/// Each `<script type="application/ld+json">` block is parsed independently;
/// malformed blocks are common on third-party sites and are skipped without
/// aborting extraction.
pub fn extract_from_html(page_html: &str) -> Vec<RawEventData> {
    let document = Html::parse_document(page_html);
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).unwrap();

    let blocks: Vec<String> = document
        .select(&selector)
        .map(|node| node.text().collect::<String>())
        .collect();

    extract_from_blocks(blocks.iter().map(String::as_str))
}

/// Runs extraction over raw structured-data block texts.
pub fn extract_from_blocks<'a>(blocks: impl IntoIterator<Item = &'a str>) -> Vec<RawEventData> {
    let mut records = Vec::new();

    for block in blocks {
        let parsed: Value = match serde_json::from_str(block) {
            Ok(value) => value,
            Err(e) => {
                debug!("Skipping malformed structured-data block: {}", e);
                continue;
            }
        };

        for event in find_event_objects(parsed) {
            if let Some(record) = project_event(&event) {
                records.push(record);
            }
        }
    }

    records
}

/// Depth-first walk over a parsed structured-data document.
///
/// Arrays are flattened back onto the work stack, objects typed `Event` are
/// collected, and `@graph` containers are descended into. Match order within
/// a block is not significant.
fn find_event_objects(root: Value) -> Vec<Value> {
    let mut matches = Vec::new();
    let mut stack = match root {
        Value::Array(items) => items,
        other => vec![other],
    };

    while let Some(item) = stack.pop() {
        match item {
            Value::Array(items) => stack.extend(items),
            Value::Object(ref map) => {
                if map.get("@type").and_then(Value::as_str) == Some("Event") {
                    matches.push(item);
                } else if let Some(graph) = map.get("@graph") {
                    stack.push(graph.clone());
                }
            }
            _ => {}
        }
    }

    matches
}

/// Projects one matched Event object into a raw candidate record with
/// canonical keys. Title-less matches yield `None`: without a title the
/// record can be neither displayed nor meaningfully de-duplicated.
fn project_event(item: &Value) -> Option<RawEventData> {
    let title = item["name"].as_str().unwrap_or("");
    if title.is_empty() {
        return None;
    }

    let location = &item["location"];
    let address = &location["address"];

    // Street through country, absent parts skipped
    let venue_address = [
        address["streetAddress"].as_str(),
        address["addressLocality"].as_str(),
        address["addressRegion"].as_str(),
        address["postalCode"].as_str(),
        address["addressCountry"].as_str(),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(", ");

    let image_url = match &item["image"] {
        Value::Array(items) => items.first().and_then(Value::as_str).unwrap_or(""),
        other => other.as_str().unwrap_or(""),
    };

    Some(json!({
        "title": title,
        "description": item["description"].as_str().unwrap_or(""),
        "startDate": item["startDate"].as_str().unwrap_or(""),
        "endDate": item["endDate"].as_str().unwrap_or(""),
        "dateText": item["startDate"].as_str().unwrap_or(""),
        "venueName": location["name"].as_str().unwrap_or(""),
        "venueAddress": venue_address,
        "imageUrl": image_url,
        "sourceUrl": item["url"].as_str().unwrap_or(""),
    }))
}
