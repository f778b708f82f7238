//! Run statistics.

use parking_lot::Mutex;
use serde::Serialize;

/// Snapshot of what an importer run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
	/// Fixtures created.
	pub imported: usize,
	/// Distinct circular reference chains broken with placeholders.
	pub circular_refs: usize,
	/// Generated modules whose batch was imported.
	pub generated_modules: usize,
	/// Same-batch references resolved with placeholders.
	pub generated_conflicts: usize,
	/// Possible bad data fields seen.
	pub bad_fields: usize,
	/// Placeholders issued.
	pub placeholders: usize,
	/// Entities still holding unresolved placeholders.
	pub unresolved: usize,
	/// Identifiers of the created fixtures, in creation order.
	pub fixtures: Vec<String>,
	/// Circular reference chains (`a -> b -> a`).
	pub circular: Vec<String>,
	/// Bases of the imported generated modules.
	pub modules: Vec<String>,
}

impl ImportStats {
	/// Logs the end-of-run summary.
	pub fn log(&self) {
		tracing::info!("Fixtures imported: {}", self.imported);
		if self.generated_modules > 0 {
			tracing::info!(
				"Generated modules: {} ({})",
				self.generated_modules,
				self.modules.join(", ")
			);
		}
		if self.circular_refs > 0 {
			tracing::info!(
				"Circular references: {} (placeholders referenced: {})",
				self.circular_refs,
				self.placeholders
			);
		}
		if self.unresolved > 0 {
			tracing::warn!("Entities with unresolved references: {}", self.unresolved);
		}
	}
}

#[derive(Default)]
pub(crate) struct StatsRecorder {
	stats: Mutex<ImportStats>,
}

impl StatsRecorder {
	pub(crate) fn fixture(&self, id: &str) {
		let mut stats = self.stats.lock();
		stats.imported += 1;
		stats.fixtures.push(id.to_string());
	}

	pub(crate) fn circular(&self, chain: &str) {
		let mut stats = self.stats.lock();
		stats.circular_refs += 1;
		stats.circular.push(chain.to_string());
	}

	pub(crate) fn module(&self, base: &str) {
		let mut stats = self.stats.lock();
		stats.generated_modules += 1;
		stats.modules.push(base.to_string());
	}

	pub(crate) fn generated_conflict(&self) {
		self.stats.lock().generated_conflicts += 1;
	}

	pub(crate) fn bad_field(&self) {
		self.stats.lock().bad_fields += 1;
	}

	pub(crate) fn snapshot(&self, placeholders: usize, unresolved: usize) -> ImportStats {
		ImportStats {
			placeholders,
			unresolved,
			..self.stats.lock().clone()
		}
	}

	pub(crate) fn reset(&self) {
		*self.stats.lock() = ImportStats::default();
	}
}
