mod support;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use channel_core::{DiscoveryMethod, RateBudget};
use channel_engine::{CrawlError, EntityKind, ServiceError, SpiderEngine, SpiderSettings};
use pretty_assertions::assert_eq;
use support::{
    entity, event_log, events, handle, handles, EventLog, RecordingSleeper, ScriptedService,
    StalledSleeper,
};
use tokio_util::sync::CancellationToken;

fn engine(service: ScriptedService, log: &EventLog, settings: SpiderSettings) -> SpiderEngine {
    SpiderEngine::new(Arc::new(service), settings)
        .with_sleeper(Arc::new(RecordingSleeper::new(log.clone())))
}

fn budget() -> RateBudget {
    RateBudget::new(100)
}

#[tokio::test]
async fn follows_links_breadth_first_and_reports_the_frontier() {
    crawl_logging::initialize_for_tests();
    let log = event_log();
    let service = ScriptedService::new(log.clone())
        .channel("alpha", 1, &["Great deals, see https://t.me/beta"])
        .channel("beta", 2, &["Partners: t.me/alpha and t.me/gamma"])
        .channel("gamma", 3, &["nothing here"]);
    let spider = engine(service, &log, SpiderSettings::default());

    let report = spider
        .spider(&handles(&["alpha"]), 2, 100, budget())
        .await
        .unwrap();

    let found: Vec<_> = report
        .channels
        .iter()
        .map(|c| (c.handle.to_string(), c.discovery_method))
        .collect();
    assert_eq!(
        found,
        vec![
            ("alpha".to_string(), DiscoveryMethod::Seed),
            ("beta".to_string(), DiscoveryMethod::Spider),
        ]
    );
    assert_eq!(report.pending, handles(&["gamma"]));
    assert_eq!(report.depth_reached, 2);
    assert_eq!(report.budget.spent(), 2);
    assert!(!report.cancelled);
    assert_eq!(report.channels[1].numeric_id, 2);
    assert_eq!(report.channels[1].title, "beta title");
}

#[tokio::test]
async fn waits_exactly_the_signaled_duration_before_retrying_the_same_handle() {
    let log = event_log();
    let service = ScriptedService::new(log.clone())
        .channel("xray", 1, &["no links"])
        .channel("yankee", 2, &["no links"])
        .fail_resolve(
            "xray",
            ServiceError::RateLimited {
                retry_after: Duration::from_secs(5),
            },
        );
    let spider = engine(service, &log, SpiderSettings::default());

    let report = spider
        .spider(&handles(&["xray", "yankee"]), 1, 100, budget())
        .await
        .unwrap();

    assert_eq!(report.channels.len(), 2);
    assert_eq!(
        events(&log),
        vec![
            "connect",
            "is_authorized",
            "resolve:xray",
            "sleep:5s",
            "resolve:xray",
            "messages:xray",
            "sleep:1s",
            "resolve:yankee",
            "messages:yankee",
            "sleep:1s",
            "disconnect",
        ]
    );
    // Retries of the same handle are not charged again.
    assert_eq!(report.budget.spent(), 2);
}

#[tokio::test]
async fn rate_limit_while_reading_history_restarts_that_handle() {
    let log = event_log();
    let service = ScriptedService::new(log.clone())
        .channel("xray", 1, &["t.me/zulu"])
        .fail_messages(
            1,
            ServiceError::RateLimited {
                retry_after: Duration::from_secs(3),
            },
        );
    let spider = engine(service, &log, SpiderSettings::default());

    let report = spider
        .spider(&handles(&["xray"]), 1, 100, budget())
        .await
        .unwrap();

    assert_eq!(report.pending, handles(&["zulu"]));
    assert_eq!(
        events(&log)[2..7].to_vec(),
        vec![
            "resolve:xray",
            "messages:xray",
            "sleep:3s",
            "resolve:xray",
            "messages:xray",
        ]
    );
}

#[tokio::test]
async fn resolved_channel_is_kept_when_its_history_breaks_off() {
    let log = event_log();
    let service = ScriptedService::new(log.clone())
        .channel("alpha", 1, &["t.me/beta", "t.me/gamma"])
        .break_history(1, 1, ServiceError::Transport("history read reset".into()))
        .channel("beta", 2, &[]);
    let spider = engine(service, &log, SpiderSettings::default());

    let report = spider
        .spider(&handles(&["alpha"]), 2, 100, budget())
        .await
        .unwrap();

    let found: Vec<_> = report
        .channels
        .iter()
        .map(|c| (c.handle.to_string(), c.discovery_method))
        .collect();
    assert_eq!(
        found,
        vec![
            ("alpha".to_string(), DiscoveryMethod::Seed),
            ("beta".to_string(), DiscoveryMethod::Spider),
        ]
    );
    assert!(report.failed.is_empty());
    assert!(report.pending.is_empty());
}

#[tokio::test]
async fn private_history_still_records_the_resolved_channel() {
    let log = event_log();
    let service = ScriptedService::new(log.clone())
        .channel("alpha", 1, &["t.me/beta"])
        .fail_messages(1, ServiceError::PrivateResource("alpha".into()));
    let spider = engine(service, &log, SpiderSettings::default());

    let report = spider
        .spider(&handles(&["alpha"]), 1, 100, budget())
        .await
        .unwrap();

    assert_eq!(report.channels.len(), 1);
    assert_eq!(report.channels[0].handle, handle("alpha"));
    assert!(report.private.is_empty());
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn private_and_unresolvable_handles_are_recorded_and_skipped() {
    let log = event_log();
    let service = ScriptedService::new(log.clone())
        .channel("open_one", 1, &["hi"])
        .entity(entity(9, EntityKind::User, Some("somebody"), "A person"))
        .fail_resolve("secret", ServiceError::PrivateResource("secret".into()));
    let spider = engine(service, &log, SpiderSettings::default());

    let report = spider
        .spider(
            &handles(&["secret", "somebody", "missing", "open_one"]),
            1,
            100,
            budget(),
        )
        .await
        .unwrap();

    assert_eq!(report.channels.len(), 1);
    assert_eq!(report.channels[0].handle, handle("open_one"));
    assert_eq!(report.private, handles(&["secret"]));
    assert_eq!(report.skipped, vec![(handle("somebody"), EntityKind::User)]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, handle("missing"));

    // Pacing applies after every handle, whatever its outcome.
    let pauses = events(&log).iter().filter(|e| *e == "sleep:1s").count();
    assert_eq!(pauses, 4);
}

#[tokio::test]
async fn budget_caps_the_level_and_leaves_the_rest_pending() {
    let log = event_log();
    let service = ScriptedService::new(log.clone())
        .channel("one", 1, &[])
        .channel("two", 2, &[])
        .channel("three", 3, &[]);
    let spider = engine(service, &log, SpiderSettings::default());

    let report = spider
        .spider(&handles(&["one", "two", "three"]), 3, 100, RateBudget::new(2))
        .await
        .unwrap();

    assert_eq!(report.channels.len(), 2);
    assert_eq!(report.pending, handles(&["three"]));
    assert!(report.budget.is_exhausted());
    assert_eq!(report.depth_reached, 1);
    assert!(!events(&log).contains(&"resolve:three".to_string()));
}

#[tokio::test]
async fn channels_resolved_after_the_first_level_are_tagged_spider() {
    let log = event_log();
    let service = ScriptedService::new(log.clone())
        .channel("first", 1, &["t.me/linked"])
        .channel("second", 2, &[])
        .channel("linked", 3, &[]);
    let settings = SpiderSettings {
        level_ceiling: 1,
        ..SpiderSettings::default()
    };
    let spider = engine(service, &log, settings);

    let report = spider
        .spider(&handles(&["first", "second"]), 2, 100, budget())
        .await
        .unwrap();

    let found: Vec<_> = report
        .channels
        .iter()
        .map(|c| (c.handle.to_string(), c.discovery_method))
        .collect();
    assert_eq!(
        found,
        vec![
            ("first".to_string(), DiscoveryMethod::Seed),
            ("second".to_string(), DiscoveryMethod::Spider),
        ]
    );
    assert_eq!(report.pending, handles(&["linked"]));
}

#[tokio::test]
async fn densely_linked_channels_are_visited_once() {
    let log = event_log();
    let names = ["ch_a", "ch_b", "ch_c", "ch_d", "ch_e"];
    let everything = names
        .iter()
        .map(|n| format!("t.me/{n}"))
        .collect::<Vec<_>>()
        .join(" ");
    let mut service = ScriptedService::new(log.clone());
    for (i, name) in names.iter().enumerate() {
        service = service.channel(name, i as i64 + 1, &[everything.as_str()]);
    }
    let spider = engine(service, &log, SpiderSettings::default());

    let report = spider
        .spider(&handles(&["ch_a"]), 5, 100, budget())
        .await
        .unwrap();

    let resolved: Vec<_> = report.channels.iter().map(|c| c.handle.clone()).collect();
    let unique: HashSet<_> = resolved.iter().cloned().collect();
    assert_eq!(resolved.len(), unique.len());
    assert_eq!(resolved.len(), names.len());
    assert!(report.pending.iter().all(|h| !unique.contains(h)));
    let resolves = events(&log)
        .iter()
        .filter(|e| e.starts_with("resolve:"))
        .count();
    assert_eq!(resolves, names.len());
}

#[tokio::test]
async fn cancellation_stops_at_the_next_handle_boundary() {
    let log = event_log();
    let token = CancellationToken::new();
    let service = ScriptedService::new(log.clone())
        .channel("one", 1, &[])
        .channel("two", 2, &[]);
    let spider = SpiderEngine::new(Arc::new(service), SpiderSettings::default())
        .with_sleeper(Arc::new(RecordingSleeper::cancelling(log.clone(), token.clone())))
        .with_cancellation(token);

    let report = spider
        .spider(&handles(&["one", "two"]), 2, 100, budget())
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.channels.len(), 1);
    assert_eq!(report.pending, handles(&["two"]));
    assert_eq!(events(&log).last().map(String::as_str), Some("disconnect"));
}

#[tokio::test]
async fn dropping_a_suspended_run_still_disconnects() {
    let log = event_log();
    let service = ScriptedService::new(log.clone()).channel("alpha", 1, &["t.me/beta"]);
    let spider = SpiderEngine::new(Arc::new(service), SpiderSettings::default())
        .with_sleeper(Arc::new(StalledSleeper));

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        spider.spider(&handles(&["alpha"]), 2, 100, budget()),
    )
    .await;
    assert!(outcome.is_err());
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(
        events(&log),
        vec![
            "connect",
            "is_authorized",
            "resolve:alpha",
            "messages:alpha",
            "disconnect",
        ]
    );
}

#[tokio::test]
async fn rejects_empty_seeds_without_connecting() {
    let log = event_log();
    let spider = engine(ScriptedService::new(log.clone()), &log, SpiderSettings::default());

    let err = spider.spider(&[], 2, 100, budget()).await.unwrap_err();

    assert!(matches!(err, CrawlError::InvalidInput(_)));
    assert!(events(&log).is_empty());
}

#[tokio::test]
async fn unauthorized_session_is_a_setup_error_and_is_released() {
    let log = event_log();
    let service = ScriptedService::new(log.clone()).unauthorized();
    let spider = engine(service, &log, SpiderSettings::default());

    let err = spider
        .spider(&handles(&["one"]), 1, 100, budget())
        .await
        .unwrap_err();

    assert!(err.is_setup());
    assert_eq!(events(&log), vec!["connect", "is_authorized", "disconnect"]);
}

#[tokio::test]
async fn refused_connection_is_a_setup_error() {
    let log = event_log();
    let service = ScriptedService::new(log.clone())
        .refuse_connect(ServiceError::Transport("connection refused".into()));
    let spider = engine(service, &log, SpiderSettings::default());

    let err = spider
        .spider(&handles(&["one"]), 1, 100, budget())
        .await
        .unwrap_err();

    match err {
        CrawlError::Setup { message, remediation } => {
            assert!(message.contains("connection refused"));
            assert!(!remediation.is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
