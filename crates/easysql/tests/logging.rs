//! The query error logging hook

mod common;

use std::sync::{Arc, Mutex};

use common::{mock_registry, mock_settings};
use easysql::{EasySql, LogLevel, QueryLogging};
use rstest::rstest;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Collects the levels of events emitted by the query hook
#[derive(Clone, Default)]
struct QueryEvents(Arc<Mutex<Vec<Level>>>);

impl QueryEvents {
    fn levels(&self) -> Vec<Level> {
        self.0.lock().expect("events lock").clone()
    }
}

impl<S: Subscriber> Layer<S> for QueryEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target() == "easysql::query" {
            self.0
                .lock()
                .expect("events lock")
                .push(*event.metadata().level());
        }
    }
}

#[rstest]
#[case::warn(LogLevel::Warn, Level::WARN)]
#[case::error(LogLevel::Error, Level::ERROR)]
#[case::debug(LogLevel::Debug, Level::DEBUG)]
#[tokio::test]
async fn test_failed_query_logs_one_event_at_configured_level(
    #[case] level: LogLevel,
    #[case] expected: Level,
) {
    let events = QueryEvents::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(events.clone()));

    let (registry, _driver) = mock_registry();
    let settings = mock_settings().with_logging(QueryLogging::new(level));
    let db = EasySql::connect(&registry, &settings).expect("facade");

    let err = db.execute("BOGUSselect 1", ()).await.unwrap_err();
    assert!(err.is_query());
    db.execute("select 1", ()).await.expect("valid statement");

    assert_eq!(events.levels(), vec![expected]);
}

#[tokio::test]
async fn test_no_hook_no_event() {
    let events = QueryEvents::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(events.clone()));

    let (registry, _driver) = mock_registry();
    let db = EasySql::connect(&registry, &mock_settings()).expect("facade");
    let _ = db.execute("BOGUSselect 1", ()).await;

    assert!(events.levels().is_empty());
}

#[tokio::test]
async fn test_with_logging_overrides_settings() {
    let events = QueryEvents::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(events.clone()));

    let (registry, _driver) = mock_registry();
    let db = EasySql::connect(&registry, &mock_settings())
        .expect("facade")
        .with_logging(QueryLogging::new(LogLevel::Info));
    let _ = db.get_one("BOGUSselect 1", ()).await;

    assert_eq!(events.levels(), vec![Level::INFO]);
}
