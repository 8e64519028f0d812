//! Quarry demo binary.
//!
//! Loads a scenario file describing a query, search tuning and a list of
//! scripted sources, runs one search session over it and prints every
//! result list the session publishes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use quarry_search::scripted::{Reply, ScriptedFetcher};
use quarry_search::{Candidate, MemoryStore, Query, SearchConfig, SearchObserver, SessionAction, SessionSpec, SessionState, Source};
use serde::Deserialize;
use tracing::info;

/// Demo command line arguments.
#[derive(Parser, Debug)]
#[command(name = "quarry-demo")]
#[command(about = "Run a scripted fan-out search and print published results")]
struct Args {
	/// Scenario file (TOML)
	#[arg(value_name = "SCENARIO")]
	scenario: PathBuf,

	/// Open the session a second time once the first search finishes
	#[arg(long)]
	reopen: bool,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Scenario {
	query: QuerySection,
	#[serde(default)]
	config: SearchConfig,
	#[serde(default)]
	sources: Vec<SourceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct QuerySection {
	name: String,
	author: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SourceEntry {
	id: String,
	name: String,
	#[serde(default = "default_cover")]
	cover: bool,
	#[serde(default)]
	delay_ms: u64,
	reply: ReplyKind,
	cover_url: Option<String>,
}

fn default_cover() -> bool {
	true
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ReplyKind {
	Hit,
	Mismatch,
	Empty,
	Fail,
	Hang,
}

impl SourceEntry {
	fn reply(&self, query: &Query) -> Reply {
		let cover = self.cover_url.clone().unwrap_or_else(|| format!("https://covers.example/{}.jpg", self.id));
		match self.reply {
			ReplyKind::Hit => Reply::hit(query.name(), query.author(), cover),
			ReplyKind::Mismatch => Reply::hit(query.name(), format!("{} and others", query.author()), cover),
			ReplyKind::Empty => Reply::Empty,
			ReplyKind::Fail => Reply::Fail(format!("{} refused the connection", self.name)),
			ReplyKind::Hang => Reply::Hang,
		}
	}
}

/// Prints each published list to stdout.
struct PrintingObserver;

impl SearchObserver for PrintingObserver {
	fn on_results_changed(&self, results: Vec<Candidate>) {
		println!("-- {} result(s)", results.len());
		for candidate in results {
			println!(
				"   #{} {} / {} [{}] {}",
				candidate.origin_order,
				candidate.name,
				candidate.author,
				candidate.source,
				candidate.auxiliary.as_deref().unwrap_or("-")
			);
		}
	}

	fn on_searching_changed(&self, searching: bool) {
		println!("-- searching: {searching}");
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	let input = std::fs::read_to_string(&args.scenario).with_context(|| format!("reading scenario {}", args.scenario.display()))?;
	let scenario: Scenario = toml::from_str(&input).with_context(|| format!("parsing scenario {}", args.scenario.display()))?;
	if scenario.sources.is_empty() {
		info!("scenario lists no sources; the search completes immediately");
	}

	let query = Query::new(scenario.query.name, scenario.query.author);
	let mut fetcher = ScriptedFetcher::new();
	let mut sources = Vec::with_capacity(scenario.sources.len());
	for entry in &scenario.sources {
		fetcher = fetcher.reply(entry.id.as_str(), Duration::from_millis(entry.delay_ms), entry.reply(&query));
		sources.push(Source::new(entry.id.as_str(), entry.name.as_str(), entry.cover));
	}

	info!(
		query = %query.name(),
		author = %query.author(),
		sources = sources.len(),
		workers = scenario.config.effective_workers(),
		"starting quarry-demo"
	);

	let store = Arc::new(MemoryStore::new());
	let session = SessionSpec::new(query, sources, Arc::new(fetcher), Arc::new(PrintingObserver))
		.config(scenario.config)
		.store(store.clone())
		.build()
		.context("invalid [config] section")?;

	run_once(&session).await?;
	if args.reopen {
		wait_for_store(&store, session.results().len()).await;
		println!("== reopening");
		run_once(&session).await?;
	}

	Ok(())
}

async fn run_once(session: &quarry_search::SearchSession) -> anyhow::Result<()> {
	let mut state = session.subscribe_state();
	match session.open()? {
		SessionAction::ServedFromCache => info!("served from stored results"),
		SessionAction::Started => {
			let settled = *state.wait_for(|state| *state != SessionState::Searching).await?;
			if settled != SessionState::Idle {
				bail!("search ended in state {settled:?}");
			}
		}
		SessionAction::Stopped => bail!("open never stops a search"),
	}
	Ok(())
}

/// Persistence runs in the background; give it a moment to catch up.
async fn wait_for_store(store: &MemoryStore, expected: usize) {
	for _ in 0..100 {
		if store.len() >= expected {
			return;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("quarry_search=debug,quarry_worker=debug,quarry_demo=debug,info")
		} else {
			EnvFilter::new("quarry_search=info,quarry_demo=info,warn")
		}
	});

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
