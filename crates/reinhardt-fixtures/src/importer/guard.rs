//! Cycle detection for recursive imports.
//!
//! Two mechanisms cooperate:
//!
//! - Every import runs in an [`ImportFrame`] linked to the frame that asked
//!   for it. A reference to any ancestor's key is a circular reference.
//! - The [`WaitGraph`] records which in-flight import is awaiting which.
//!   Concurrently running branches cannot see each other's frames, so a
//!   reference whose wait edge would close a loop is circular as well.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::identifier::FixtureId;

/// One step of the import call chain.
#[derive(Debug)]
pub struct ImportFrame {
	key: String,
	wait_node: String,
	fixture: Option<FixtureId>,
	entity_type: Option<String>,
	definition: Option<Arc<Value>>,
	generated: Option<String>,
	parent: Option<Arc<ImportFrame>>,
}

impl ImportFrame {
	/// Frame creating the entity of a fixture.
	///
	/// Members of a generated batch pass `generated = Some(base)`; others
	/// await them through the batch, so the batch base is their wait node.
	pub(crate) fn document(
		id: FixtureId,
		entity_type: String,
		definition: Arc<Value>,
		generated: Option<String>,
		parent: Option<Arc<ImportFrame>>,
	) -> Self {
		let key = id.to_string();
		let wait_node = generated.clone().unwrap_or_else(|| key.clone());
		Self {
			key,
			wait_node,
			fixture: Some(id),
			entity_type: Some(entity_type),
			definition: Some(definition),
			generated,
			parent,
		}
	}

	/// Frame creating an upload for a resolved file. Inherits the fixture of
	/// the requesting frame.
	pub(crate) fn upload(key: String, parent: &Arc<ImportFrame>) -> Self {
		Self {
			wait_node: key.clone(),
			key,
			fixture: parent.fixture.clone(),
			entity_type: None,
			definition: None,
			generated: None,
			parent: Some(Arc::clone(parent)),
		}
	}

	/// Cycle key (`users/admin`, `file:<path>`).
	pub fn key(&self) -> &str {
		&self.key
	}

	pub(crate) fn wait_node(&self) -> &str {
		&self.wait_node
	}

	/// Fixture this frame imports or imports on behalf of.
	pub fn fixture(&self) -> Option<&FixtureId> {
		self.fixture.as_ref()
	}

	/// Entity type being created.
	pub fn entity_type(&self) -> Option<&str> {
		self.entity_type.as_deref()
	}

	/// Raw definition being created.
	pub fn definition(&self) -> Option<&Value> {
		self.definition.as_deref()
	}

	/// Closest generated batch in the call chain.
	pub fn generated_context(&self) -> Option<&str> {
		self.ancestors().find_map(|frame| frame.generated.as_deref())
	}

	/// Frames from this one up to the outermost.
	pub fn ancestors(&self) -> impl Iterator<Item = &ImportFrame> {
		std::iter::successors(Some(self), |frame| frame.parent.as_deref())
	}

	/// If `target` is this frame or an ancestor, the chain from that
	/// ancestor down to `target` (`a -> b -> a`).
	pub fn cycle_to(&self, target: &str) -> Option<String> {
		let mut chain = vec![target];
		for frame in self.ancestors() {
			chain.push(&frame.key);
			if frame.key == target {
				chain.reverse();
				return Some(chain.join(" -> "));
			}
		}
		None
	}
}

/// Wait-for graph of in-flight imports.
#[derive(Default)]
pub(crate) struct WaitGraph {
	edges: Mutex<HashMap<String, HashMap<String, usize>>>,
}

impl WaitGraph {
	/// Registers that `from` is about to await `to`.
	///
	/// Fails with the closed loop (`from -> to -> .. -> from`) if `to`
	/// already transitively awaits `from`.
	pub(crate) fn enter<'a>(&'a self, from: &str, to: &str) -> Result<WaitGuard<'a>, Vec<String>> {
		let mut edges = self.edges.lock();
		if let Some(path) = Self::path(&edges, to, from) {
			let mut cycle = vec![from.to_string()];
			cycle.extend(path);
			return Err(cycle);
		}
		*edges
			.entry(from.to_string())
			.or_default()
			.entry(to.to_string())
			.or_insert(0) += 1;
		Ok(WaitGuard {
			graph: self,
			from: from.to_string(),
			to: to.to_string(),
		})
	}

	/// Shortest path of nodes from `start` to `goal`, both included.
	fn path(
		edges: &HashMap<String, HashMap<String, usize>>,
		start: &str,
		goal: &str,
	) -> Option<Vec<String>> {
		if start == goal {
			return Some(vec![start.to_string()]);
		}
		let mut previous: HashMap<&str, &str> = HashMap::new();
		let mut visited: HashSet<&str> = HashSet::from([start]);
		let mut queue = VecDeque::from([start]);
		while let Some(node) = queue.pop_front() {
			let Some(targets) = edges.get(node) else {
				continue;
			};
			for next in targets.keys().map(String::as_str) {
				if !visited.insert(next) {
					continue;
				}
				previous.insert(next, node);
				if next == goal {
					let mut path = vec![goal.to_string()];
					let mut cursor = goal;
					while let Some(&prev) = previous.get(cursor) {
						path.push(prev.to_string());
						cursor = prev;
					}
					path.reverse();
					return Some(path);
				}
				queue.push_back(next);
			}
		}
		None
	}

	fn leave(&self, from: &str, to: &str) {
		let mut edges = self.edges.lock();
		if let Some(targets) = edges.get_mut(from) {
			if let Some(count) = targets.get_mut(to) {
				*count -= 1;
				if *count == 0 {
					targets.remove(to);
				}
			}
			if targets.is_empty() {
				edges.remove(from);
			}
		}
	}

	pub(crate) fn clear(&self) {
		self.edges.lock().clear();
	}

	#[cfg(test)]
	fn is_empty(&self) -> bool {
		self.edges.lock().is_empty()
	}
}

/// Removes its wait edge when dropped.
pub(crate) struct WaitGuard<'a> {
	graph: &'a WaitGraph,
	from: String,
	to: String,
}

impl Drop for WaitGuard<'_> {
	fn drop(&mut self) {
		self.graph.leave(&self.from, &self.to);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	fn frame(id: &str, generated: Option<&str>, parent: Option<Arc<ImportFrame>>) -> Arc<ImportFrame> {
		Arc::new(ImportFrame::document(
			FixtureId::parse(id).unwrap(),
			"Thing".to_string(),
			Arc::new(json!({})),
			generated.map(str::to_string),
			parent,
		))
	}

	#[rstest]
	fn test_cycle_chain_starts_at_repeated_ancestor() {
		let a = frame("users/a", None, None);
		let b = frame("shops/b", None, Some(a));
		let c = frame("products/c", None, Some(b));

		assert_eq!(
			c.cycle_to("shops/b").as_deref(),
			Some("shops/b -> products/c -> shops/b")
		);
		assert_eq!(c.cycle_to("users/z"), None);
	}

	#[rstest]
	fn test_generated_context_is_inherited() {
		let member = frame("colors/red", Some("colors"), None);
		let nested = frame("shops/b", None, Some(member.clone()));
		assert_eq!(nested.generated_context(), Some("colors"));
		assert_eq!(member.wait_node(), "colors");
		assert_eq!(nested.wait_node(), "shops/b");
	}

	#[rstest]
	fn test_upload_frame_inherits_fixture() {
		let parent = frame("users/a", None, None);
		let upload = ImportFrame::upload("file:a.png".to_string(), &parent);
		assert_eq!(upload.fixture(), parent.fixture());
		assert_eq!(upload.cycle_to("users/a").as_deref(), Some("users/a -> file:a.png -> users/a"));
	}

	#[rstest]
	fn test_wait_graph_detects_cross_branch_cycle() {
		let graph = WaitGraph::default();
		let ab = graph.enter("a", "b").unwrap();
		let _bc = graph.enter("b", "c").unwrap();

		let cycle = graph.enter("c", "a").err().unwrap();
		assert_eq!(cycle, vec!["c", "a", "b", "c"]);

		drop(ab);
		assert!(graph.enter("c", "a").is_ok());
	}

	#[rstest]
	fn test_wait_graph_counts_duplicate_edges() {
		let graph = WaitGraph::default();
		let first = graph.enter("batch", "x").unwrap();
		let second = graph.enter("batch", "x").unwrap();
		drop(first);
		assert!(graph.enter("x", "batch").is_err());
		drop(second);
		assert!(graph.is_empty());
	}

	#[rstest]
	fn test_self_wait_is_a_cycle() {
		let graph = WaitGraph::default();
		assert_eq!(graph.enter("a", "a").err().unwrap(), vec!["a", "a"]);
	}
}
