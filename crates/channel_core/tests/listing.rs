use std::sync::Arc;

use channel_core::{
    parse_source_id, parse_source_url, to_listing, Handle, ListingAdapter, Message, PLATFORM,
};
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;

fn message(handle: &str, id: i64, media: Option<Vec<u8>>) -> Message {
    Message {
        channel_handle: Handle::parse(handle).unwrap(),
        message_id: id,
        text: "Сдается квартира 15000 сом".to_string(),
        timestamp: Utc.with_ymd_and_hms(2026, 2, 1, 9, 30, 0).unwrap(),
        view_count: 120,
        forward_count: 3,
        has_media: media.is_some(),
        media_bytes: media,
    }
}

#[test]
fn derived_keys_use_normalized_handle() {
    let msg = message("Kvartira_BishkekKg", 42, None);
    assert_eq!(msg.url(), "https://t.me/kvartira_bishkekkg/42");
    assert_eq!(msg.source_id(), "tg_kvartira_bishkekkg_42");
}

#[test]
fn source_url_and_id_round_trip() {
    let msg = message("rent_v_tashkente", 9001, None);
    let record = to_listing(&msg, Utc::now());

    assert_eq!(
        parse_source_url(&record.source_url),
        Some((msg.channel_handle.clone(), 9001))
    );
    assert_eq!(
        parse_source_id(&record.source_id),
        Some((msg.channel_handle.clone(), 9001))
    );
}

#[test]
fn malformed_keys_are_rejected() {
    assert_eq!(parse_source_url("https://example.com/a/1"), None);
    assert_eq!(parse_source_url("https://t.me/a/not-a-number"), None);
    assert_eq!(parse_source_id("tg_a"), None);
    assert_eq!(parse_source_id("fb_a_1"), None);
}

#[test]
fn record_carries_all_fields() {
    let scraped_at = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
    let adapter = ListingAdapter::new(Arc::new(move || scraped_at));
    let msg = message("arentash", 7, Some(vec![1, 2, 3]));

    let record = adapter.map(&msg);

    assert_eq!(record.raw_text, msg.text);
    assert_eq!(record.photos, vec![vec![1, 2, 3]]);
    assert_eq!(record.platform, PLATFORM);
    assert_eq!(record.scraped_at, scraped_at);
    assert_eq!(record.message_date, msg.timestamp);
    assert_eq!(record.views, 120);
    assert_eq!(record.forwards, 3);
    assert_eq!(record.channel, "arentash");
}

#[test]
fn missing_media_maps_to_empty_photos() {
    let mut msg = message("arentash", 8, None);
    msg.has_media = true;
    let record = to_listing(&msg, Utc::now());
    assert!(record.photos.is_empty());
}

#[test]
fn record_serializes_with_pipeline_field_names() {
    let scraped_at = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
    let record = to_listing(&message("arentash", 7, None), scraped_at);
    let json = serde_json::to_value(&record).unwrap();

    for key in [
        "sourceUrl",
        "sourceId",
        "rawText",
        "photos",
        "platform",
        "scrapedAt",
        "views",
        "forwards",
        "channel",
        "messageDate",
    ] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    assert_eq!(json["platform"], "telegram");
    assert_eq!(json["scrapedAt"], "2026-10-19T12:00:00Z");
}
