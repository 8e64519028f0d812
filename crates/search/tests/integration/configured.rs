use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use quarry_search::scripted::ScriptedFetcher;
use quarry_search::{ConfigError, SearchConfig, SessionSpec, SessionState};

use crate::common::{RecordingObserver, good, named_sources, query, settle};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
	let mut file = tempfile::NamedTempFile::new().expect("temp config");
	file.write_all(contents.as_bytes()).expect("write config");
	file
}

#[tokio::test(start_paused = true)]
async fn loaded_config_drives_workers_and_throttle() {
	let file = write_config("workers = 1\npublish_interval_ms = 50\nsource_timeout_ms = 1000\n");
	let config = SearchConfig::load(file.path()).expect("config loads");

	let fetcher = Arc::new(
		ScriptedFetcher::new()
			.reply("a", Duration::from_millis(30), good())
			.reply("b", Duration::from_millis(30), good())
			.reply("c", Duration::from_millis(30), good()),
	);
	let observer = RecordingObserver::new();
	let session = SessionSpec::new(query(), named_sources(&["a", "b", "c"]), fetcher.clone(), observer.clone())
		.config(config)
		.build().expect("valid config");

	session.start().expect("session starts");
	assert_eq!(settle(&session).await, SessionState::Idle);

	assert_eq!(fetcher.max_in_flight(), 1);
	// One worker answers every 30ms; with a 50ms interval the second answer is
	// deferred and the third lands after the deferred publish fired.
	assert_eq!(
		observer.published(),
		vec![
			vec!["a".to_owned()],
			vec!["a".to_owned(), "b".to_owned()],
			vec!["a".to_owned(), "b".to_owned(), "c".to_owned()],
		]
	);
}

#[tokio::test(start_paused = true)]
async fn short_timeout_from_config_gives_up_on_hanging_sources() {
	let config = SearchConfig::from_toml_str("source_timeout_ms = 250").expect("config parses");
	let fetcher = Arc::new(ScriptedFetcher::new().reply("a", Duration::ZERO, quarry_search::scripted::Reply::Hang));
	let observer = RecordingObserver::new();
	let session = SessionSpec::new(query(), named_sources(&["a"]), fetcher, observer).config(config).build().expect("valid config");

	let started = tokio::time::Instant::now();
	session.start().expect("session starts");
	settle(&session).await;
	let elapsed = started.elapsed();
	assert!(elapsed >= Duration::from_millis(250) && elapsed < Duration::from_millis(300), "{elapsed:?}");
}

#[test]
fn invalid_config_file_is_reported() {
	let file = write_config("publish_interval_ms = 0\n");
	let err = SearchConfig::load(file.path()).expect_err("zero interval is invalid");
	assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
}
