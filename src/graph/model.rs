use std::collections::{HashMap, HashSet};

use super::types::{Edge, EdgeRecord, GraphFragment, Node, NodeRecord, PathStep};

/// Slots of elements that a merge inserted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergeOutcome {
	/// Slots of inserted nodes.
	pub added_nodes: Vec<usize>,
	/// Slots of inserted edges.
	pub added_edges: Vec<usize>,
}

impl MergeOutcome {
	/// Whether the merge changed nothing.
	pub fn is_empty(&self) -> bool {
		self.added_nodes.is_empty() && self.added_edges.is_empty()
	}
}

/// Deduplicated node/edge store. `Node::index` always equals the node's slot,
/// and every edge's endpoint indices resolve to live nodes.
#[derive(Clone, Debug, Default)]
pub struct GraphModel {
	nodes: Vec<Node>,
	edges: Vec<Edge>,
	node_slots: HashMap<String, usize>,
	edge_slots: HashMap<String, usize>,
	// node id -> incident edge slots; rebuilt on every structural change
	adjacency: HashMap<String, Vec<usize>>,
}

impl GraphModel {
	/// An empty model.
	pub fn new() -> Self {
		Self::default()
	}

	/// Nodes by slot.
	pub fn nodes(&self) -> &[Node] {
		&self.nodes
	}

	/// Nodes by slot, for moving them.
	pub fn nodes_mut(&mut self) -> &mut [Node] {
		&mut self.nodes
	}

	/// Edges by slot.
	pub fn edges(&self) -> &[Edge] {
		&self.edges
	}

	/// Whether there are no nodes.
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Node `id`, if present.
	pub fn node(&self, id: &str) -> Option<&Node> {
		self.node_slots.get(id).map(|&i| &self.nodes[i])
	}

	/// Node `id`, if present, for moving it.
	pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
		self.node_slots.get(id).map(|&i| &mut self.nodes[i])
	}

	/// Edge `id`, if present.
	pub fn edge(&self, id: &str) -> Option<&Edge> {
		self.edge_slots.get(id).map(|&i| &self.edges[i])
	}

	/// Slot of edge `id` in [`GraphModel::edges`].
	pub fn edge_slot(&self, id: &str) -> Option<usize> {
		self.edge_slots.get(id).copied()
	}

	/// Whether node `id` is present.
	pub fn contains_node(&self, id: &str) -> bool {
		self.node_slots.contains_key(id)
	}

	/// Whether edge `id` is present.
	pub fn contains_edge(&self, id: &str) -> bool {
		self.edge_slots.contains_key(id)
	}

	/// Edges with node `id` at either end. A self-loop appears once.
	pub fn incident_edges<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a Edge> + 'a {
		self.adjacency
			.get(id)
			.into_iter()
			.flatten()
			.map(|&slot| &self.edges[slot])
	}

	/// Number of edges touching node `id`.
	pub fn degree(&self, id: &str) -> usize {
		self.adjacency.get(id).map_or(0, Vec::len)
	}

	/// Inserts the fragment's unknown nodes and edges and updates path ranks.
	pub fn merge_fragment(&mut self, fragment: &GraphFragment) -> MergeOutcome {
		let mut outcome = MergeOutcome::default();
		let ranks = self.path_ranks(&fragment.paths);

		for record in &fragment.nodes {
			if let Some(slot) = self.insert_node(record) {
				outcome.added_nodes.push(slot);
			}
		}
		for record in &fragment.edges {
			for endpoint in [record.source(), record.target()] {
				if let Some(slot) = self.insert_node(&endpoint) {
					outcome.added_nodes.push(slot);
				}
			}
			if let Some(slot) = self.insert_edge(record) {
				outcome.added_edges.push(slot);
			}
		}
		for (id, rank) in ranks {
			if let Some(node) = self.node_mut(&id) {
				node.path_index = Some(rank);
			}
		}
		if !outcome.added_edges.is_empty() {
			self.rebuild_adjacency();
		}
		outcome
	}

	/// Ranks for every node on the given paths. The first node of a path keeps
	/// its known rank (else 0); each later node gets at least one more than the
	/// node before it, and never less than it already had.
	fn path_ranks(&self, paths: &[Vec<PathStep>]) -> HashMap<String, u32> {
		let mut ranks: HashMap<String, u32> = HashMap::new();
		let known = |ranks: &HashMap<String, u32>, id: &str| {
			ranks
				.get(id)
				.copied()
				.or_else(|| self.node(id).and_then(|n| n.path_index))
		};
		for path in paths {
			let mut prev: Option<u32> = None;
			for id in path.iter().filter_map(PathStep::node_id) {
				let existing = known(&ranks, id);
				let rank = match prev {
					None => existing.unwrap_or(0),
					Some(p) => existing.map_or(p + 1, |e| e.max(p + 1)),
				};
				ranks.insert(id.to_string(), rank);
				prev = Some(rank);
			}
		}
		ranks
	}

	fn insert_node(&mut self, record: &NodeRecord) -> Option<usize> {
		if self.node_slots.contains_key(&record.id) {
			return None;
		}
		let index = self.nodes.len();
		self.nodes.push(Node {
			id: record.id.clone(),
			label: record.label.clone(),
			x: 0.0,
			y: 0.0,
			fx: None,
			fy: None,
			path_index: None,
			index,
		});
		self.node_slots.insert(record.id.clone(), index);
		Some(index)
	}

	fn insert_edge(&mut self, record: &EdgeRecord) -> Option<usize> {
		if self.edge_slots.contains_key(&record.id) {
			return None;
		}
		let source_index = *self.node_slots.get(&record.source_id)?;
		let target_index = *self.node_slots.get(&record.target_id)?;
		let slot = self.edges.len();
		self.edges.push(Edge {
			id: record.id.clone(),
			label: record.label.clone(),
			source_id: record.source_id.clone(),
			target_id: record.target_id.clone(),
			source_index,
			target_index,
		});
		self.edge_slots.insert(record.id.clone(), slot);
		Some(slot)
	}

	/// Removes a node together with every edge touching it.
	pub fn remove_node(&mut self, id: &str) -> bool {
		if !self.node_slots.contains_key(id) {
			return false;
		}
		self.nodes.retain(|n| n.id != id);
		self.edges.retain(|e| !e.touches(id));
		self.reindex();
		true
	}

	/// Removes every node without incident edges, returning their ids.
	pub fn prune_unconnected(&mut self) -> Vec<String> {
		let connected: HashSet<&str> = self
			.edges
			.iter()
			.flat_map(|e| [e.source_id.as_str(), e.target_id.as_str()])
			.collect();
		let removed: Vec<String> = self
			.nodes
			.iter()
			.filter(|n| !connected.contains(n.id.as_str()))
			.map(|n| n.id.clone())
			.collect();
		if removed.is_empty() {
			return removed;
		}
		let removed_set: HashSet<&str> = removed.iter().map(String::as_str).collect();
		self.nodes.retain(|n| !removed_set.contains(n.id.as_str()));
		self.reindex();
		removed
	}

	/// Removes every node and edge.
	pub fn clear(&mut self) {
		self.nodes.clear();
		self.edges.clear();
		self.node_slots.clear();
		self.edge_slots.clear();
		self.adjacency.clear();
	}

	fn reindex(&mut self) {
		self.node_slots.clear();
		for (i, node) in self.nodes.iter_mut().enumerate() {
			node.index = i;
			self.node_slots.insert(node.id.clone(), i);
		}
		self.edge_slots.clear();
		for (i, edge) in self.edges.iter_mut().enumerate() {
			edge.source_index = self.node_slots[&edge.source_id];
			edge.target_index = self.node_slots[&edge.target_id];
			self.edge_slots.insert(edge.id.clone(), i);
		}
		self.rebuild_adjacency();
	}

	fn rebuild_adjacency(&mut self) {
		self.adjacency.clear();
		for (slot, edge) in self.edges.iter().enumerate() {
			self.adjacency
				.entry(edge.source_id.clone())
				.or_default()
				.push(slot);
			if edge.target_id != edge.source_id {
				self.adjacency
					.entry(edge.target_id.clone())
					.or_default()
					.push(slot);
			}
		}
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::graph::decode::decode;
	use crate::graph::decode::tests::{edge_json, path_json, vertex_json};

	pub(crate) fn chain(ids: &[&str]) -> GraphFragment {
		let mut objects = Vec::new();
		for (i, id) in ids.iter().enumerate() {
			if i > 0 {
				let prev = ids[i - 1];
				objects.push(edge_json(&format!("{prev}-{id}"), "flight", prev, id));
			}
			objects.push(vertex_json(id, "city"));
		}
		decode(&path_json(objects)).unwrap()
	}

	fn snapshot(model: &GraphModel) -> (Vec<(String, usize)>, Vec<(String, usize, usize)>) {
		(
			model.nodes().iter().map(|n| (n.id.clone(), n.index)).collect(),
			model
				.edges()
				.iter()
				.map(|e| (e.id.clone(), e.source_index, e.target_index))
				.collect(),
		)
	}

	fn assert_consistent(model: &GraphModel) {
		for (i, node) in model.nodes().iter().enumerate() {
			assert_eq!(node.index, i);
		}
		for (slot, edge) in model.edges().iter().enumerate() {
			assert_eq!(model.edge_slot(&edge.id), Some(slot));
			assert_eq!(model.nodes()[edge.source_index].id, edge.source_id);
			assert_eq!(model.nodes()[edge.target_index].id, edge.target_id);
		}
	}

	#[test]
	fn remerge_is_noop() {
		let fragment = chain(&["a", "b", "c"]);
		let mut model = GraphModel::new();
		let first = model.merge_fragment(&fragment);
		assert_eq!(first.added_nodes.len(), 3);
		assert_eq!(first.added_edges.len(), 2);
		let before = snapshot(&model);

		let second = model.merge_fragment(&fragment);
		assert!(second.is_empty());
		assert_eq!(snapshot(&model), before);
	}

	#[test]
	fn fresh_path_ranks() {
		let mut model = GraphModel::new();
		model.merge_fragment(&chain(&["a", "b", "c"]));
		let rank = |id| model.node(id).unwrap().path_index;
		assert_eq!((rank("a"), rank("b"), rank("c")), (Some(0), Some(1), Some(2)));
	}

	#[test]
	fn ranks_never_decrease() {
		let mut model = GraphModel::new();
		model.merge_fragment(&chain(&["a", "b", "c"]));
		model.merge_fragment(&chain(&["x", "y", "a"]));
		assert_eq!(model.node("a").unwrap().path_index, Some(2));

		model.merge_fragment(&chain(&["a", "b", "c"]));
		let rank = |id| model.node(id).unwrap().path_index.unwrap();
		assert_eq!(rank("a"), 2);
		assert!(rank("b") >= 3);
		assert!(rank("c") >= 4);
	}

	#[test]
	fn nodes_outside_paths_have_no_rank() {
		let mut model = GraphModel::new();
		model.merge_fragment(&decode(&vertex_json("solo", "city")).unwrap());
		assert_eq!(model.node("solo").unwrap().path_index, None);
	}

	#[test]
	fn edge_endpoints_are_stubbed() {
		let mut fragment = GraphFragment::default();
		fragment.edges.push(EdgeRecord {
			id: "e".into(),
			label: "knows".into(),
			source_id: "p".into(),
			source_label: "person".into(),
			target_id: "q".into(),
			target_label: "person".into(),
		});
		let mut model = GraphModel::new();
		let outcome = model.merge_fragment(&fragment);
		assert_eq!(outcome.added_nodes.len(), 2);
		assert_eq!(model.node("q").unwrap().label, "person");
		assert_consistent(&model);
	}

	#[test]
	fn remove_cascades_and_compacts() {
		let mut model = GraphModel::new();
		model.merge_fragment(&chain(&["a", "b", "c", "d"]));
		assert!(model.remove_node("b"));
		assert!(!model.remove_node("b"));

		assert!(model.edges().iter().all(|e| !e.touches("b")));
		assert_eq!(model.edges().len(), 1);
		assert_eq!(model.edge_slot("c-d"), Some(0));
		assert_eq!(model.edge_slot("a-b"), None);
		assert_eq!(model.degree("a"), 0);
		assert_eq!(model.incident_edges("c").count(), 1);
		assert_consistent(&model);

		for id in ["a", "d"] {
			model.remove_node(id);
			assert!(model.edges().iter().all(|e| !e.touches(id)));
			assert_consistent(&model);
		}
	}

	#[test]
	fn prune_is_idempotent() {
		let mut model = GraphModel::new();
		model.merge_fragment(&chain(&["a", "b", "c"]));
		model.merge_fragment(&decode(&vertex_json("lonely", "city")).unwrap());
		model.remove_node("b");

		let mut removed = model.prune_unconnected();
		removed.sort();
		assert_eq!(removed, ["a", "c", "lonely"]);
		assert!(model.prune_unconnected().is_empty());
		assert!(model.is_empty());
	}

	#[test]
	fn self_loop_counts_once_in_adjacency() {
		let mut model = GraphModel::new();
		model.merge_fragment(&decode(&edge_json("loop", "self", "a", "a")).unwrap());
		assert_eq!(model.degree("a"), 1);
		assert!(model.prune_unconnected().is_empty());
	}
}
