//! Merging query results into the live graph without disturbing what the
//! user already sees.
//!
//! Nodes that were on screen before a merge are pinned for the duration of
//! the partial run that places the newcomers, then released again unless the
//! user pinned them by dragging.

use std::collections::{HashMap, HashSet};

use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::config::GraphOptions;
use crate::graph::{GraphFragment, GraphModel, Point, PropertyRecord};
use crate::layout::seed::seed_positions;
use crate::layout::{LayoutArena, LayoutEngine, LayoutHandle, LayoutKind, RunStatus, Tick, default_gap};

const SEED: u64 = 0x9e3779b97f4a7c15;

/// The merged graph, its fetched properties and the layout placing it.
pub struct MergeCoordinator {
	model: GraphModel,
	records: HashMap<String, PropertyRecord>,
	engine: LayoutEngine,
	kind: LayoutKind,
	gap: Option<f64>,
	manual_pins: HashSet<String>,
	// pinned only for the active run
	run_pins: HashSet<String>,
	rng: SmallRng,
}

impl MergeCoordinator {
	/// Empty session laid out with `kind`.
	pub fn new(kind: LayoutKind, gap: Option<f64>) -> Self {
		Self::with_engine(LayoutEngine::new(), kind, gap)
	}

	/// Empty session configured from `options`. `clock` enables run latency logs.
	pub fn from_options(options: &GraphOptions, clock: Option<fn() -> f64>) -> Self {
		let engine = clock.map_or_else(LayoutEngine::new, LayoutEngine::with_clock);
		Self::with_engine(engine, options.layout, options.gap)
	}

	fn with_engine(engine: LayoutEngine, kind: LayoutKind, gap: Option<f64>) -> Self {
		Self {
			model: GraphModel::new(),
			records: HashMap::new(),
			engine,
			kind,
			gap,
			manual_pins: HashSet::new(),
			run_pins: HashSet::new(),
			rng: SmallRng::seed_from_u64(SEED),
		}
	}

	/// The merged graph.
	pub fn model(&self) -> &GraphModel {
		&self.model
	}

	/// Property records fetched so far, by element id.
	pub fn records(&self) -> &HashMap<String, PropertyRecord> {
		&self.records
	}

	/// Property records, for storing fetch results.
	pub fn records_mut(&mut self) -> &mut HashMap<String, PropertyRecord> {
		&mut self.records
	}

	/// Record for element `id`, if fetched.
	pub fn record(&self, id: &str) -> Option<&PropertyRecord> {
		self.records.get(id)
	}

	/// Number of nodes.
	pub fn node_count(&self) -> usize {
		self.model.nodes().len()
	}

	/// Number of edges.
	pub fn edge_count(&self) -> usize {
		self.model.edges().len()
	}

	/// Layout used for the next run.
	pub fn layout_kind(&self) -> LayoutKind {
		self.kind
	}

	/// Whether a run is in progress.
	pub fn is_running(&self) -> bool {
		self.engine.is_running()
	}

	/// State of the latest run.
	pub fn status(&self) -> RunStatus {
		self.engine.status()
	}

	/// Whether the user pinned node `id` by dragging it.
	pub fn is_manually_pinned(&self, id: &str) -> bool {
		self.manual_pins.contains(id)
	}

	fn current_gap(&self) -> f64 {
		self.gap.unwrap_or_else(|| {
			default_gap(self.kind, self.model.nodes().iter().map(|n| n.path_index))
		})
	}

	/// Takes in one decoded response. Property records are kept; graph
	/// elements are merged and a run places whatever was new. Returns the
	/// run's handle, or `None` when nothing new arrived.
	pub fn on_new_fragment(&mut self, fragment: GraphFragment) -> Option<LayoutHandle> {
		for record in &fragment.properties {
			self.records.insert(record.id.clone(), record.clone());
		}
		if !fragment.has_graph_elements() {
			return None;
		}
		let outcome = self.model.merge_fragment(&fragment);
		if outcome.is_empty() {
			debug!("fragment added nothing new");
			return None;
		}
		self.cancel_run();

		let gap = self.current_gap();
		seed_positions(&mut self.model, &outcome.added_nodes, self.kind, gap, &mut self.rng);
		let added: HashSet<usize> = outcome.added_nodes.iter().copied().collect();
		for node in self.model.nodes_mut() {
			if !added.contains(&node.index) && !node.is_pinned() {
				node.pin();
				self.run_pins.insert(node.id.clone());
			}
		}
		info!(
			"merged {} nodes and {} edges",
			outcome.added_nodes.len(),
			outcome.added_edges.len()
		);
		Some(self.engine.run(LayoutArena::from_model(&self.model), self.kind, Some(gap)))
	}

	/// Releases every pin, drag pins included, and lays the whole graph out
	/// again, optionally with a different kind.
	pub fn relayout(&mut self, kind: Option<LayoutKind>) -> Option<LayoutHandle> {
		self.cancel_run();
		if let Some(kind) = kind {
			self.kind = kind;
		}
		self.manual_pins.clear();
		for node in self.model.nodes_mut() {
			node.unpin();
		}
		if self.model.is_empty() {
			return None;
		}
		let gap = self.current_gap();
		Some(self.engine.run(LayoutArena::from_model(&self.model), self.kind, Some(gap)))
	}

	/// Advances the active run by one iteration. Returns whether positions
	/// moved.
	pub fn tick(&mut self) -> bool {
		let model = &mut self.model;
		match self.engine.tick(|nodes| {
			LayoutArena::write_positions(nodes, model);
		}) {
			Tick::Idle => false,
			Tick::Running => true,
			Tick::Settled { .. } => {
				self.release_run_pins();
				true
			}
		}
	}

	/// Fixes a node where the user dropped it. Survives the end of runs.
	pub fn pin_manually(&mut self, id: &str, pos: Point) -> bool {
		let Some(node) = self.model.node_mut(id) else {
			return false;
		};
		node.x = pos.x;
		node.y = pos.y;
		node.pin();
		let slot = node.index;
		self.engine.pin(slot, pos.x, pos.y);
		self.run_pins.remove(id);
		self.manual_pins.insert(id.to_string());
		true
	}

	/// Removes node `id` and its edges, cancelling any run.
	pub fn remove_node(&mut self, id: &str) -> bool {
		self.cancel_run();
		self.manual_pins.remove(id);
		self.model.remove_node(id)
	}

	/// Removes nodes without edges, cancelling any run. Returns their ids.
	pub fn prune_unconnected(&mut self) -> Vec<String> {
		self.cancel_run();
		let removed = self.model.prune_unconnected();
		for id in &removed {
			self.manual_pins.remove(id);
		}
		removed
	}

	/// Drops the graph and every fetched record.
	pub fn clear(&mut self) {
		self.cancel_run();
		self.model.clear();
		self.records.clear();
		self.manual_pins.clear();
	}

	fn cancel_run(&mut self) {
		if let Some((_, arena)) = self.engine.cancel() {
			LayoutArena::write_positions(&arena.nodes, &mut self.model);
		}
		self.release_run_pins();
	}

	fn release_run_pins(&mut self) {
		for id in self.run_pins.drain() {
			if self.manual_pins.contains(&id) {
				continue;
			}
			if let Some(node) = self.model.node_mut(&id) {
				node.unpin();
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use futures::executor::block_on;
	use serde_json::json;

	use super::*;
	use crate::graph::decode;
	use crate::graph::decode::tests::{edge_json, path_json, vertex_json};
	use crate::graph::model::tests::chain;
	use crate::layout::LayoutOutcome;

	fn settle(session: &mut MergeCoordinator) -> usize {
		let mut ticks = 0;
		while session.is_running() {
			session.tick();
			ticks += 1;
		}
		ticks
	}

	fn dist(session: &MergeCoordinator, id: &str) -> f64 {
		session.model().node(id).unwrap().pos().dist_sq(Point::default()).sqrt()
	}

	#[test]
	fn radial_path_end_to_end() {
		let fragment = decode(&path_json(vec![
			vertex_json("A", "city"),
			edge_json("AB", "flight", "A", "B"),
			vertex_json("B", "city"),
		]))
		.unwrap();
		let mut session = MergeCoordinator::new(LayoutKind::Radial, None);
		let handle = session.on_new_fragment(fragment).unwrap();
		assert_eq!((session.node_count(), session.edge_count()), (2, 1));
		let rank = |id| session.model().node(id).unwrap().path_index;
		assert_eq!((rank("A"), rank("B")), (Some(0), Some(1)));

		assert_eq!(settle(&mut session), 99);
		assert_eq!(block_on(handle), LayoutOutcome::Completed);
		assert_eq!(session.status(), RunStatus::Completed);
		assert!(dist(&session, "A") < 15.0);
		assert!((dist(&session, "B") - 150.0).abs() < 15.0);
	}

	#[test]
	fn existing_nodes_hold_still_while_newcomers_settle() {
		let mut session = MergeCoordinator::new(LayoutKind::Force, None);
		session.on_new_fragment(chain(&["a", "b"]));
		settle(&mut session);
		let before: Vec<Point> = session.model().nodes().iter().map(|n| n.pos()).collect();
		assert!(session.model().nodes().iter().all(|n| !n.is_pinned()));

		session.pin_manually("a", Point::new(40.0, 40.0));
		session.on_new_fragment(chain(&["b", "c"]));
		assert!(session.model().node("b").unwrap().is_pinned());
		assert!(!session.model().node("c").unwrap().is_pinned());
		settle(&mut session);

		assert_eq!(session.model().node("a").unwrap().pos(), Point::new(40.0, 40.0));
		assert_eq!(session.model().node("b").unwrap().pos(), before[1]);
		assert!(session.model().node("a").unwrap().is_pinned());
		assert!(!session.model().node("b").unwrap().is_pinned());
		assert!(session.is_manually_pinned("a"));
	}

	#[test]
	fn newer_fragment_cancels_the_run_in_flight() {
		let mut session = MergeCoordinator::new(LayoutKind::Force, None);
		let first = session.on_new_fragment(chain(&["a", "b"])).unwrap();
		for _ in 0..5 {
			session.tick();
		}
		let second = session.on_new_fragment(chain(&["b", "c"])).unwrap();
		assert_eq!(block_on(first), LayoutOutcome::Cancelled);
		settle(&mut session);
		assert_eq!(block_on(second), LayoutOutcome::Completed);
		assert!(session.model().nodes().iter().all(|n| !n.is_pinned()));
	}

	#[test]
	fn nothing_new_means_no_run() {
		let mut session = MergeCoordinator::new(LayoutKind::Force, None);
		session.on_new_fragment(chain(&["a", "b"]));
		settle(&mut session);
		assert!(session.on_new_fragment(chain(&["a", "b"])).is_none());

		let props = decode(&json!({"@type": "g:Map", "@value": [
			{"@type": "g:T", "@value": "id"}, "a",
			{"@type": "g:T", "@value": "label"}, "city",
			"name", "Lima",
		]}))
		.unwrap();
		assert!(session.on_new_fragment(props).is_none());
		assert_eq!(session.record("a").unwrap().get("name").as_deref(), Some("Lima"));
		assert!(!session.is_running());
	}

	#[test]
	fn removal_mid_run_cancels_and_keeps_the_model_consistent() {
		let mut session = MergeCoordinator::new(LayoutKind::Force, None);
		let handle = session.on_new_fragment(chain(&["a", "b", "c"])).unwrap();
		session.tick();
		assert!(session.remove_node("b"));
		assert_eq!(block_on(handle), LayoutOutcome::Cancelled);
		assert_eq!((session.node_count(), session.edge_count()), (2, 0));
		assert!(!session.tick());

		assert_eq!(session.prune_unconnected().len(), 2);
		assert!(session.prune_unconnected().is_empty());
	}

	#[test]
	fn relayout_releases_drag_pins() {
		let mut session = MergeCoordinator::new(LayoutKind::Force, None);
		session.on_new_fragment(chain(&["a", "b", "c"]));
		settle(&mut session);
		session.pin_manually("a", Point::new(500.0, 0.0));

		let handle = session.relayout(Some(LayoutKind::Vertical)).unwrap();
		assert_eq!(session.layout_kind(), LayoutKind::Vertical);
		assert!(!session.is_manually_pinned("a"));
		assert!(session.model().nodes().iter().all(|n| !n.is_pinned()));
		settle(&mut session);
		assert_eq!(block_on(handle), LayoutOutcome::Completed);

		session.clear();
		assert_eq!(session.node_count(), 0);
		assert!(session.records().is_empty());
		assert!(session.relayout(None).is_none());
	}
}
