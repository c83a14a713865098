//! Turn a feed's JSON body into a [`Page`].

use chrono::{DateTime, Utc};
use serde_json::Value;
use trawl_core::config::{FeedConfig, PaginationStyle};
use trawl_core::{Cursor, Page, ResultItem};

use super::FeedError;

fn string_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Item ids are strings in some APIs and numbers in others.
fn id_at(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn item_from(config: &FeedConfig, raw: &Value) -> Option<ResultItem> {
    let fields = &config.fields;
    let Some(url) = string_at(raw, &fields.url) else {
        tracing::debug!(feed = %config.id, "dropping result without a URL");
        return None;
    };
    let title = string_at(raw, &fields.title).unwrap_or(url);

    match ResultItem::new(&config.id, url, title) {
        Ok(item) => Some(
            item.with_thumbnail(fields.thumbnail.as_deref().and_then(|p| string_at(raw, p)).map(str::to_string))
                .with_author(fields.author.as_deref().and_then(|p| string_at(raw, p)).map(str::to_string))
                .with_published_at(
                    fields
                        .published_at
                        .as_deref()
                        .and_then(|p| string_at(raw, p))
                        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                        .map(|dt| dt.with_timezone(&Utc)),
                ),
        ),
        Err(e) => {
            tracing::debug!(feed = %config.id, %url, "dropping result: {}", e);
            None
        }
    }
}

/// Build a page from a feed response.
///
/// `position` is the `(page, offset)` that was requested, for page-numbered
/// feeds.
///
/// # Errors
///
/// Returns `FeedError::Shape` if the results array is missing.
pub fn parse_page(config: &FeedConfig, body: &Value, position: Option<(u32, u32)>) -> Result<Page, FeedError> {
    let raw_items = body
        .pointer(&config.items_pointer)
        .and_then(Value::as_array)
        .ok_or_else(|| FeedError::Shape(format!("no results array at '{}'", config.items_pointer)))?;

    let items: Vec<ResultItem> = raw_items.iter().filter_map(|raw| item_from(config, raw)).collect();

    let reported = config
        .has_more_pointer
        .as_deref()
        .and_then(|p| body.pointer(p))
        .and_then(Value::as_bool);

    let (has_more, next_cursor) = match &config.pagination {
        PaginationStyle::Token { next_pointer, .. } => {
            let next = string_at(body, next_pointer).map(|t| Cursor::OpaqueToken { token: t.to_string() });
            (reported.unwrap_or(true) && next.is_some(), next)
        }
        PaginationStyle::Cursor { next_pointer, .. } => {
            let next = string_at(body, next_pointer).map(|c| Cursor::OpaqueCursor { cursor: c.to_string() });
            (reported.unwrap_or(true) && next.is_some(), next)
        }
        PaginationStyle::Watermark { id_pointer, .. } => {
            let last = raw_items.last().and_then(|raw| id_at(raw, id_pointer));
            let more = reported.unwrap_or(!raw_items.is_empty()) && last.is_some();
            (more, last.filter(|_| more).map(|id| Cursor::Watermark { id }))
        }
        PaginationStyle::PageOffset { first_page, .. } => {
            let (page, offset) = position.unwrap_or((*first_page, 0));
            let more = reported.unwrap_or(!raw_items.is_empty());
            let next = Cursor::PageOffset { page: page + 1, offset: offset + raw_items.len() as u32 };
            (more, more.then_some(next))
        }
    };

    Ok(Page { items, has_more, next_cursor: next_cursor.filter(|_| has_more) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trawl_core::config::FieldMap;

    fn feed(pagination: PaginationStyle) -> FeedConfig {
        FeedConfig {
            id: "feed".into(),
            endpoint: "https://feed.example/search".into(),
            query_param: "q".into(),
            pagination,
            items_pointer: "/data".into(),
            fields: FieldMap {
                url: "/link".into(),
                title: "/name".into(),
                thumbnail: Some("/image/src".into()),
                author: Some("/by".into()),
                published_at: Some("/created".into()),
            },
            has_more_pointer: None,
            api_key: None,
            api_key_env: None,
            api_key_header: "X-Api-Key".into(),
            timeout_ms: None,
            strips_hashtag: false,
            enabled: true,
        }
    }

    fn token_style() -> PaginationStyle {
        PaginationStyle::Token { param: "pageToken".into(), next_pointer: "/next".into() }
    }

    #[test]
    fn test_fields_are_mapped() {
        let body = json!({
            "data": [{
                "link": "https://Feed.example/a/",
                "name": "A",
                "image": { "src": "https://img.example/a.png" },
                "by": "someone",
                "created": "2025-03-01T12:00:00Z"
            }],
            "next": "t2"
        });

        let page = parse_page(&feed(token_style()), &body, None).unwrap();

        let item = &page.items[0];
        assert_eq!(item.canonical_url, "https://feed.example/a");
        assert_eq!(item.title, "A");
        assert_eq!(item.thumbnail.as_deref(), Some("https://img.example/a.png"));
        assert_eq!(item.author.as_deref(), Some("someone"));
        assert!(item.published_at.is_some());
        assert_eq!(item.source_id, "feed");
        assert!(page.has_more);
        assert_eq!(page.next_cursor, Some(Cursor::OpaqueToken { token: "t2".into() }));
    }

    #[test]
    fn test_items_without_url_are_dropped() {
        let body = json!({ "data": [{ "name": "no link" }, { "link": "https://feed.example/b" }] });
        let page = parse_page(&feed(token_style()), &body, None).unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].title, "https://feed.example/b");
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_missing_array_is_malformed() {
        let err = parse_page(&feed(token_style()), &json!({ "results": [] }), None).unwrap_err();
        assert!(matches!(err, FeedError::Shape(_)));
    }

    #[test]
    fn test_reported_has_more_wins() {
        let mut config = feed(PaginationStyle::Cursor { param: "after".into(), next_pointer: "/meta/next".into() });
        config.has_more_pointer = Some("/meta/more".into());
        let body = json!({ "data": [{ "link": "https://feed.example/c" }], "meta": { "next": "c2", "more": false } });

        let page = parse_page(&config, &body, None).unwrap();
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_watermark_uses_last_item_id() {
        let config = feed(PaginationStyle::Watermark { param: "max_id".into(), id_pointer: "/id".into() });
        let body = json!({ "data": [
            { "link": "https://feed.example/1", "id": 30 },
            { "link": "https://feed.example/2", "id": 29 }
        ]});

        let page = parse_page(&config, &body, None).unwrap();
        assert!(page.has_more);
        assert_eq!(page.next_cursor, Some(Cursor::Watermark { id: "29".into() }));

        let empty = parse_page(&config, &json!({ "data": [] }), None).unwrap();
        assert!(!empty.has_more);
    }

    #[test]
    fn test_page_offset_counts_raw_items() {
        let config = feed(PaginationStyle::PageOffset { page_param: "page".into(), offset_param: None, first_page: 1 });
        let body = json!({ "data": [
            { "link": "https://feed.example/1" },
            { "name": "dropped" },
            { "link": "https://feed.example/3" }
        ]});

        let page = parse_page(&config, &body, Some((2, 10))).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_cursor, Some(Cursor::PageOffset { page: 3, offset: 13 }));
    }

    #[test]
    fn test_root_array() {
        let mut config = feed(PaginationStyle::PageOffset { page_param: "p".into(), offset_param: None, first_page: 0 });
        config.items_pointer = String::new();
        let body = json!([{ "link": "https://feed.example/1" }]);

        let page = parse_page(&config, &body, None).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next_cursor, Some(Cursor::PageOffset { page: 1, offset: 1 }));
    }
}
