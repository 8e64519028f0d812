//! Sources, queries and the candidates they produce.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

/// Opaque, cheaply cloneable identity of one source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(Arc<str>);

impl SourceId {
	pub fn new(id: impl AsRef<str>) -> Self {
		Self(Arc::from(id.as_ref()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for SourceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for SourceId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

impl From<String> for SourceId {
	fn from(id: String) -> Self {
		Self(Arc::from(id))
	}
}

/// One externally defined provider that can be asked for a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
	id: SourceId,
	name: String,
	supports_auxiliary: bool,
}

impl Source {
	/// Creates a source; `supports_auxiliary` records whether the source can
	/// produce the auxiliary field (a cover rule is configured).
	pub fn new(id: impl Into<SourceId>, name: impl Into<String>, supports_auxiliary: bool) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			supports_auxiliary,
		}
	}

	pub fn id(&self) -> &SourceId {
		&self.id
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub const fn supports_auxiliary(&self) -> bool {
		self.supports_auxiliary
	}
}

/// Strips "author:" style prefixes and a trailing authorship marker.
static AUTHOR_DECORATION: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^\s*作\s*者[:：\s]+|\s+著").expect("author decoration pattern is valid"));

/// The target item every source is asked about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
	name: String,
	author: String,
}

impl Query {
	/// Creates a query, normalizing decorations out of `author`.
	pub fn new(name: impl Into<String>, author: impl AsRef<str>) -> Self {
		Self {
			name: name.into(),
			author: normalize_author(author.as_ref()),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn author(&self) -> &str {
		&self.author
	}
}

/// Removes an "author:" label prefix and a trailing " 著" marker.
pub fn normalize_author(author: &str) -> String {
	AUTHOR_DECORATION.replace_all(author, "").into_owned()
}

/// One raw record returned by the fetch layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
	pub name: String,
	pub author: String,
	pub auxiliary: Option<String>,
}

impl SearchHit {
	pub fn new(name: impl Into<String>, author: impl Into<String>, auxiliary: Option<String>) -> Self {
		Self {
			name: name.into(),
			author: author.into(),
			auxiliary,
		}
	}
}

/// A match produced by one source for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
	pub source: SourceId,
	pub name: String,
	pub author: String,
	pub auxiliary: Option<String>,
	/// Dispatch index of the producing source; the display order.
	pub origin_order: usize,
}

/// Deduplication key: the same record from the same source is kept once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateKey {
	pub name: String,
	pub author: String,
	pub source: SourceId,
}

impl Candidate {
	/// Stamps a fetched hit with its producing source and dispatch index.
	pub fn from_hit(hit: SearchHit, source: &Source, origin_order: usize) -> Self {
		Self {
			source: source.id().clone(),
			name: hit.name,
			author: hit.author,
			auxiliary: hit.auxiliary,
			origin_order,
		}
	}

	pub fn key(&self) -> CandidateKey {
		CandidateKey {
			name: self.name.clone(),
			author: self.author.clone(),
			source: self.source.clone(),
		}
	}

	/// Returns true when the auxiliary field is present and non-empty.
	pub fn has_auxiliary(&self) -> bool {
		self.auxiliary.as_deref().is_some_and(|value| !value.is_empty())
	}
}
