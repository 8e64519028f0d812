use std::sync::Arc;
use std::time::Duration;

use quarry_search::scripted::{Reply, ScriptedFetcher};
use quarry_search::{MemoryStore, ResultStore, SearchConfig, SessionAction, SessionSpec, SessionState};

use crate::common::{RecordingObserver, good, named_sources, query, settle, wait_until};

#[tokio::test(start_paused = true)]
async fn five_sources_two_workers() {
	let fetcher = Arc::new(
		ScriptedFetcher::new()
			.reply("a", Duration::ZERO, Reply::Hang)
			.reply("b", Duration::from_millis(120), good())
			.reply("c", Duration::ZERO, Reply::Hang)
			.reply("d", Duration::from_millis(80), good())
			.reply("e", Duration::from_millis(30), Reply::hit("The Long Road", "Someone Else", "cover")),
	);
	let observer = RecordingObserver::new();
	let session = SessionSpec::new(query(), named_sources(&["a", "b", "c", "d", "e"]), fetcher.clone(), observer.clone())
		.config(SearchConfig::default().with_workers(2))
		.build().expect("valid config");

	session.start().expect("session starts");
	assert_eq!(settle(&session).await, SessionState::Idle);

	assert_eq!(observer.last_published(), Some(vec!["b".to_owned(), "d".to_owned()]));
	assert_eq!(observer.toggles(), vec![true, false]);
	assert!(fetcher.max_in_flight() <= 2);
}

#[tokio::test(start_paused = true)]
async fn no_enabled_sources() {
	let fetcher = Arc::new(ScriptedFetcher::new());
	let observer = RecordingObserver::new();
	let session = SessionSpec::new(query(), Vec::new(), fetcher.clone(), observer.clone()).build().expect("valid config");

	session.start().expect("session starts");
	assert_eq!(session.state(), SessionState::Idle);
	assert_eq!(observer.published(), vec![Vec::<String>::new()]);
	assert_eq!(observer.toggles(), vec![true, false]);
	assert!(fetcher.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_ten_millis_in() {
	let ids = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
	let mut script = ScriptedFetcher::new();
	for id in ids {
		script = script.reply(id, Duration::from_millis(200), good());
	}
	let fetcher = Arc::new(script.ignore_cancellation("a").ignore_cancellation("b"));
	let observer = RecordingObserver::new();
	let session = SessionSpec::new(query(), named_sources(&ids), fetcher.clone(), observer.clone())
		.config(SearchConfig::default().with_workers(4))
		.build().expect("valid config");

	session.start().expect("session starts");
	tokio::time::sleep(Duration::from_millis(10)).await;
	assert_eq!(session.stop(), SessionAction::Stopped);

	tokio::time::sleep(Duration::from_secs(2)).await;
	assert!(session.results().is_empty());
	assert_eq!(observer.published(), vec![Vec::<String>::new()]);
	assert_eq!(observer.toggles(), vec![true, false]);
	assert_eq!(fetcher.calls().len(), 4);
	assert_eq!(session.state(), SessionState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn toggle_from_stopped_starts_again() {
	let fetcher = Arc::new(ScriptedFetcher::new().reply("a", Duration::from_millis(50), good()));
	let observer = RecordingObserver::new();
	let session = SessionSpec::new(query(), named_sources(&["a"]), fetcher, observer.clone()).build().expect("valid config");

	assert_eq!(session.stop(), SessionAction::Started);
	assert_eq!(session.stop(), SessionAction::Stopped);
	assert_eq!(session.stop(), SessionAction::Started);
	assert_eq!(settle(&session).await, SessionState::Idle);
	assert_eq!(observer.toggles(), vec![true, false, true, false]);
	assert_eq!(observer.last_published(), Some(vec!["a".to_owned()]));
}

#[tokio::test(start_paused = true)]
async fn results_follow_source_order_not_arrival_order() {
	let fetcher = Arc::new(
		ScriptedFetcher::new()
			.reply("slow", Duration::from_millis(900), good())
			.reply("medium", Duration::from_millis(400), good())
			.reply("fast", Duration::from_millis(5), good()),
	);
	let observer = RecordingObserver::new();
	let session = SessionSpec::new(query(), named_sources(&["slow", "medium", "fast"]), fetcher, observer.clone()).build().expect("valid config");

	session.start().expect("session starts");
	settle(&session).await;

	assert_eq!(observer.published().first(), Some(&vec!["fast".to_owned()]));
	assert_eq!(
		observer.last_published(),
		Some(vec!["slow".to_owned(), "medium".to_owned(), "fast".to_owned()])
	);
}

#[tokio::test(start_paused = true)]
async fn second_open_is_served_from_what_the_first_stored() {
	let fetcher = Arc::new(
		ScriptedFetcher::new()
			.reply("a", Duration::from_millis(10), good())
			.reply("b", Duration::from_millis(20), good())
			.reply("c", Duration::from_millis(30), Reply::Fail("503".into())),
	);
	let store = Arc::new(MemoryStore::new());
	let observer = RecordingObserver::new();
	let session = SessionSpec::new(query(), named_sources(&["a", "b", "c"]), fetcher.clone(), observer.clone())
		.store(store.clone())
		.build().expect("valid config");

	assert_eq!(session.open(), Ok(SessionAction::Started));
	settle(&session).await;
	assert!(wait_until(Duration::from_secs(5), || store.len() == 2).await);
	assert_eq!(fetcher.calls().len(), 3);

	assert_eq!(session.open(), Ok(SessionAction::ServedFromCache));
	assert_eq!(fetcher.calls().len(), 3);
	assert_eq!(observer.last_published(), Some(vec!["a".to_owned(), "b".to_owned()]));
	assert_eq!(store.cached(session.query()).len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_under_real_concurrency_never_inserts_afterwards() {
	for round in 0..20u64 {
		let ids: Vec<String> = (0..16).map(|i| format!("s{i}")).collect();
		let mut script = ScriptedFetcher::new();
		for (i, id) in ids.iter().enumerate() {
			let delay = if i == 15 { 200 } else { (i as u64 * 3 + round) % 11 };
			script = script.reply(id.as_str(), Duration::from_millis(delay), good());
			if i % 2 == 0 {
				script = script.ignore_cancellation(id.as_str());
			}
		}
		let fetcher = Arc::new(script);
		let observer = RecordingObserver::new();
		let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
		let session = SessionSpec::new(query(), named_sources(&refs), fetcher.clone(), observer.clone()).build().expect("valid config");

		session.start().expect("session starts");
		tokio::time::sleep(Duration::from_millis(round % 7)).await;
		assert_eq!(session.stop(), SessionAction::Stopped, "round {round}");

		let at_stop = session.results();
		let published_at_stop = observer.published().len();
		tokio::time::sleep(Duration::from_millis(40)).await;

		assert_eq!(session.results(), at_stop, "round {round}");
		assert_eq!(observer.published().len(), published_at_stop, "round {round}");
		assert_eq!(observer.toggles(), vec![true, false], "round {round}");
		assert_eq!(session.state(), SessionState::Stopped, "round {round}");
	}
}
