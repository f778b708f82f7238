//! Run-once caches.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::error::FixtureResult;

/// Async memoization keyed by string.
///
/// The first caller of a key runs the initializer; concurrent callers of the
/// same key await that in-flight result instead of starting their own. A
/// failed initializer leaves the key empty.
pub(crate) struct AsyncMemo<V> {
	cells: Mutex<HashMap<String, Arc<OnceCell<V>>>>,
}

impl<V: Clone> AsyncMemo<V> {
	pub(crate) fn new() -> Self {
		Self {
			cells: Mutex::new(HashMap::new()),
		}
	}

	fn cell(&self, key: &str) -> Arc<OnceCell<V>> {
		Arc::clone(self.cells.lock().entry(key.to_string()).or_default())
	}

	/// Completed value of `key`, if any.
	pub(crate) fn get(&self, key: &str) -> Option<V> {
		self.cells
			.lock()
			.get(key)
			.and_then(|cell| cell.get().cloned())
	}

	/// Returns the value of `key`, running `init` if nobody has yet.
	pub(crate) async fn get_or_try_init<F, Fut>(&self, key: &str, init: F) -> FixtureResult<V>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = FixtureResult<V>>,
	{
		let cell = self.cell(key);
		cell.get_or_try_init(init).await.cloned()
	}

	pub(crate) fn clear(&self) {
		self.cells.lock().clear();
	}
}

/// Keys already seen, for once-only diagnostics.
#[derive(Default)]
pub(crate) struct SeenSet {
	seen: Mutex<HashSet<String>>,
}

impl SeenSet {
	/// Returns true the first time `key` is inserted.
	pub(crate) fn first(&self, key: impl Into<String>) -> bool {
		self.seen.lock().insert(key.into())
	}

	pub(crate) fn clear(&self) {
		self.seen.lock().clear();
	}
}
