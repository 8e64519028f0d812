/// Execution classes used to label spawned work in traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// One dispatch slot pulling sources off the shared cursor.
	Dispatch,
	/// Deferred observer notification.
	Publish,
	/// Blocking persistence of accepted results.
	Persist,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Dispatch => "dispatch",
			Self::Publish => "publish",
			Self::Persist => "persist",
		}
	}
}
