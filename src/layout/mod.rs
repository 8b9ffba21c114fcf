//! Cancellable, stepwise layout runs.
//!
//! A [`LayoutEngine`] owns at most one run at a time. The run takes ownership
//! of a [`LayoutArena`], advances one iteration per [`LayoutEngine::tick`], and
//! hands the arena back when it settles or is cancelled. Each run also
//! resolves a [`LayoutHandle`] exactly once.

/// Forces the simulations combine.
pub mod forces;
mod quadtree;
/// Starting positions for merged nodes.
pub mod seed;
/// The stepwise simulation behind a run.
pub mod simulation;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::graph::GraphModel;
use simulation::Simulation;

/// Which arrangement a run computes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
	/// Free force-directed placement.
	#[default]
	Force,
	/// Rings around the origin by path rank.
	Radial,
	/// Columns by path rank.
	Vertical,
}

impl LayoutKind {
	/// Every layout, in menu order.
	pub const ALL: [LayoutKind; 3] = [LayoutKind::Force, LayoutKind::Radial, LayoutKind::Vertical];

	/// Lowercase name used in options and menus.
	pub fn as_str(self) -> &'static str {
		match self {
			LayoutKind::Force => "force",
			LayoutKind::Radial => "radial",
			LayoutKind::Vertical => "vertical",
		}
	}
}

impl fmt::Display for LayoutKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Name that matches no [`LayoutKind`].
#[derive(Debug, thiserror::Error)]
#[error("unknown layout `{0}`")]
pub struct UnknownLayout(String);

impl FromStr for LayoutKind {
	type Err = UnknownLayout;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		LayoutKind::ALL
			.into_iter()
			.find(|kind| kind.as_str() == s)
			.ok_or_else(|| UnknownLayout(s.to_string()))
	}
}

/// Ranks at or beyond this are left out of gap estimation.
const MAX_COUNTED_RANK: u32 = 99;

/// Spacing used when no override is given. Radial and vertical layouts
/// widen it with the number of nodes sharing a rank.
pub fn default_gap(kind: LayoutKind, ranks: impl IntoIterator<Item = Option<u32>>) -> f64 {
	let mut counts = [0usize; MAX_COUNTED_RANK as usize];
	for rank in ranks {
		let rank = rank.unwrap_or(0);
		if rank < MAX_COUNTED_RANK {
			counts[rank as usize] += 1;
		}
	}
	let widest = |f: &dyn Fn(usize, usize) -> f64| {
		counts
			.iter()
			.enumerate()
			.map(|(i, &c)| f(i, c))
			.fold(0.0, f64::max)
	};
	match kind {
		LayoutKind::Force => 100.0,
		LayoutKind::Radial => widest(&|i, c| c as f64 / (i + 1) as f64).max(150.0),
		LayoutKind::Vertical => widest(&|_, c| c as f64 / 2.0).max(200.0),
	}
}

/// Simulation state of one node.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimNode {
	/// Horizontal position.
	pub x: f64,
	/// Vertical position.
	pub y: f64,
	/// Horizontal velocity.
	pub vx: f64,
	/// Vertical velocity.
	pub vy: f64,
	/// Fixed horizontal position.
	pub fx: Option<f64>,
	/// Fixed vertical position.
	pub fy: Option<f64>,
	/// Path rank.
	pub path_index: Option<u32>,
}

/// Everything a run needs, moved into the engine for the run's lifetime.
/// Node `i` is the model node with `index == i`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayoutArena {
	/// Per-node state, by model slot.
	pub nodes: Vec<SimNode>,
	/// Source and target slots of every edge.
	pub links: Vec<(usize, usize)>,
}

impl LayoutArena {
	/// Arena holding the model's current positions and pins.
	pub fn from_model(model: &GraphModel) -> Self {
		Self {
			nodes: model
				.nodes()
				.iter()
				.map(|n| SimNode {
					x: n.x,
					y: n.y,
					fx: n.fx,
					fy: n.fy,
					path_index: n.path_index,
					..SimNode::default()
				})
				.collect(),
			links: model
				.edges()
				.iter()
				.map(|e| (e.source_index, e.target_index))
				.collect(),
		}
	}

	/// Highest path rank in the arena.
	pub fn max_rank(&self) -> u32 {
		self.nodes.iter().filter_map(|n| n.path_index).max().unwrap_or(0)
	}

	/// Copies positions back into the model. Does nothing if the model's
	/// node count changed since the arena was taken.
	pub fn write_positions(nodes: &[SimNode], model: &mut GraphModel) -> bool {
		let targets = model.nodes_mut();
		if targets.len() != nodes.len() {
			return false;
		}
		for (node, sim) in targets.iter_mut().zip(nodes) {
			node.x = sim.x;
			node.y = sim.y;
		}
		true
	}
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutOutcome {
	/// The run settled.
	Completed,
	/// The run was replaced or stopped.
	Cancelled,
}

/// State of the engine's latest run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunStatus {
	/// No run has started yet.
	#[default]
	Idle,
	/// A run is in progress.
	Running,
	/// The latest run settled.
	Completed,
	/// The latest run was cancelled.
	Cancelled,
}

/// Resolves once with the outcome of one run.
#[derive(Debug)]
pub struct LayoutHandle {
	id: u64,
	rx: oneshot::Receiver<LayoutOutcome>,
}

impl LayoutHandle {
	/// Id of the run this handle belongs to.
	pub fn id(&self) -> u64 {
		self.id
	}

	/// Outcome if the run has already finished.
	pub fn try_outcome(&mut self) -> Option<LayoutOutcome> {
		match self.rx.try_recv() {
			Ok(outcome) => outcome,
			Err(_) => Some(LayoutOutcome::Cancelled),
		}
	}
}

impl Future for LayoutHandle {
	type Output = LayoutOutcome;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.rx)
			.poll(cx)
			.map(|res| res.unwrap_or(LayoutOutcome::Cancelled))
	}
}

/// Result of advancing the engine by one iteration.
#[derive(Debug, PartialEq)]
pub enum Tick {
	/// No run is active.
	Idle,
	/// The run advanced and continues.
	Running,
	/// The run settled and returned the arena.
	Settled {
		/// Id of the settled run.
		run: u64,
		/// Final positions.
		arena: LayoutArena,
	},
}

struct ActiveRun {
	id: u64,
	kind: LayoutKind,
	simulation: Simulation,
	done: oneshot::Sender<LayoutOutcome>,
	started: f64,
}

/// Owns the active run and advances it frame by frame.
#[derive(Default)]
pub struct LayoutEngine {
	active: Option<ActiveRun>,
	status: RunStatus,
	next_id: u64,
	clock: Option<fn() -> f64>,
}

impl LayoutEngine {
	/// Engine without a clock.
	pub fn new() -> Self {
		Self::default()
	}

	/// Engine that reports run latency using `clock` (milliseconds).
	pub fn with_clock(clock: fn() -> f64) -> Self {
		Self {
			clock: Some(clock),
			..Self::default()
		}
	}

	/// State of the latest run.
	pub fn status(&self) -> RunStatus {
		self.status
	}

	/// Whether a run is in progress.
	pub fn is_running(&self) -> bool {
		self.active.is_some()
	}

	/// Id of the active run.
	pub fn active_run(&self) -> Option<u64> {
		self.active.as_ref().map(|run| run.id)
	}

	/// Starts a run over `arena`, cancelling any run in progress first.
	/// `gap` overrides the kind's default spacing.
	pub fn run(&mut self, arena: LayoutArena, kind: LayoutKind, gap: Option<f64>) -> LayoutHandle {
		self.cancel();
		let gap = gap.unwrap_or_else(|| default_gap(kind, arena.nodes.iter().map(|n| n.path_index)));
		let (done, rx) = oneshot::channel();
		let id = self.next_id;
		self.next_id += 1;
		info!(
			"start {kind} layout #{id}: {} nodes, {} links, gap {gap}",
			arena.nodes.len(),
			arena.links.len()
		);
		self.active = Some(ActiveRun {
			id,
			kind,
			simulation: Simulation::new(arena, kind, gap),
			done,
			started: self.now(),
		});
		self.status = RunStatus::Running;
		LayoutHandle { id, rx }
	}

	/// Advances the active run by one iteration, passing the new positions to
	/// `on_tick`. A settled run gives its arena back.
	pub fn tick(&mut self, on_tick: impl FnOnce(&[SimNode])) -> Tick {
		let Some(run) = self.active.as_mut() else {
			return Tick::Idle;
		};
		let running = run.simulation.step();
		on_tick(&run.simulation.arena().nodes);
		if running {
			return Tick::Running;
		}
		let Some(run) = self.active.take() else {
			return Tick::Idle;
		};
		info!(
			"end {} layout #{} after {} iterations. latency: {:.0}ms",
			run.kind,
			run.id,
			run.simulation.iterations(),
			self.now() - run.started
		);
		let _ = run.done.send(LayoutOutcome::Completed);
		self.status = RunStatus::Completed;
		Tick::Settled {
			run: run.id,
			arena: run.simulation.into_arena(),
		}
	}

	/// Pins a node of the active run in place. False when nothing is running
	/// or the slot is out of range.
	pub fn pin(&mut self, slot: usize, x: f64, y: f64) -> bool {
		self.active
			.as_mut()
			.is_some_and(|run| run.simulation.pin(slot, x, y))
	}

	/// Stops the active run. No tick callback fires for it afterwards and its
	/// handle resolves as cancelled. Returns the run id and arena as they were.
	pub fn cancel(&mut self) -> Option<(u64, LayoutArena)> {
		let run = self.active.take()?;
		debug!(
			"{} layout #{} cancelled after {} iterations",
			run.kind,
			run.id,
			run.simulation.iterations()
		);
		let _ = run.done.send(LayoutOutcome::Cancelled);
		self.status = RunStatus::Cancelled;
		Some((run.id, run.simulation.into_arena()))
	}

	fn now(&self) -> f64 {
		self.clock.map_or(0.0, |clock| clock())
	}
}

#[cfg(test)]
mod tests {
	use futures::executor::block_on;

	use super::*;
	use crate::graph::decode;
	use crate::graph::decode::tests::{edge_json, path_json, vertex_json};
	use crate::graph::model::tests::chain;

	fn arena(n: usize) -> LayoutArena {
		LayoutArena {
			nodes: (0..n)
				.map(|i| SimNode {
					x: i as f64 * 10.0,
					y: (i % 3) as f64 * 7.0,
					..SimNode::default()
				})
				.collect(),
			links: (1..n).map(|i| (i - 1, i)).collect(),
		}
	}

	#[test]
	fn kind_round_trips_through_text() {
		for kind in LayoutKind::ALL {
			assert_eq!(kind.to_string().parse::<LayoutKind>().unwrap(), kind);
		}
		assert!("spiral".parse::<LayoutKind>().is_err());
	}

	#[test]
	fn default_gaps() {
		assert_eq!(default_gap(LayoutKind::Force, [Some(5)]), 100.0);
		assert_eq!(default_gap(LayoutKind::Radial, [Some(0), Some(1)]), 150.0);
		assert_eq!(default_gap(LayoutKind::Radial, vec![Some(1); 400]), 200.0);
		assert_eq!(default_gap(LayoutKind::Vertical, vec![None; 500]), 250.0);
		assert_eq!(default_gap(LayoutKind::Vertical, vec![Some(120); 500]), 200.0);
	}

	#[test]
	fn run_completes_and_returns_arena() {
		let mut engine = LayoutEngine::new();
		let mut handle = engine.run(arena(4), LayoutKind::Force, None);
		assert_eq!(engine.status(), RunStatus::Running);
		assert_eq!(handle.try_outcome(), None);

		let mut ticks = 0;
		let settled = loop {
			match engine.tick(|_| ticks += 1) {
				Tick::Running => continue,
				Tick::Settled { run, arena } => break (run, arena),
				Tick::Idle => panic!("engine went idle before settling"),
			}
		};
		assert_eq!(settled.0, handle.id());
		assert_eq!(settled.1.nodes.len(), 4);
		assert_eq!(ticks, 99);
		assert_eq!(engine.status(), RunStatus::Completed);
		assert_eq!(engine.tick(|_| panic!("no run")), Tick::Idle);
		assert_eq!(block_on(handle), LayoutOutcome::Completed);
	}

	#[test]
	fn cancelled_run_stops_and_keeps_positions() {
		let mut engine = LayoutEngine::new();
		let handle = engine.run(arena(5), LayoutKind::Force, None);
		let mut last = Vec::new();
		for _ in 0..10 {
			engine.tick(|nodes| last = nodes.to_vec());
		}

		let (run, arena) = engine.cancel().unwrap();
		assert_eq!(run, handle.id());
		assert_eq!(arena.nodes, last);
		assert_eq!(engine.status(), RunStatus::Cancelled);

		let mut fired = false;
		assert_eq!(engine.tick(|_| fired = true), Tick::Idle);
		assert!(!fired);
		assert_eq!(block_on(handle), LayoutOutcome::Cancelled);
		assert!(engine.cancel().is_none());
	}

	#[test]
	fn new_run_cancels_previous() {
		let mut engine = LayoutEngine::new();
		let first = engine.run(arena(3), LayoutKind::Force, None);
		engine.tick(|_| {});
		let second = engine.run(arena(3), LayoutKind::Radial, Some(80.0));
		assert_ne!(first.id(), second.id());
		assert_eq!(engine.active_run(), Some(second.id()));
		assert_eq!(block_on(first), LayoutOutcome::Cancelled);
	}

	#[test]
	fn radial_run_places_path_on_rings() {
		let fragment = decode(&path_json(vec![
			vertex_json("A", "city"),
			edge_json("AB", "flight", "A", "B"),
			vertex_json("B", "city"),
		]))
		.unwrap();
		let mut model = GraphModel::new();
		let outcome = model.merge_fragment(&fragment);
		assert_eq!((model.nodes().len(), model.edges().len()), (2, 1));
		let rank = |id| model.node(id).unwrap().path_index;
		assert_eq!((rank("A"), rank("B")), (Some(0), Some(1)));

		let gap = default_gap(LayoutKind::Radial, model.nodes().iter().map(|n| n.path_index));
		let mut rng = rand::SeedableRng::seed_from_u64(3);
		seed::seed_positions(&mut model, &outcome.added_nodes, LayoutKind::Radial, gap, &mut rng);

		let mut engine = LayoutEngine::new();
		let handle = engine.run(LayoutArena::from_model(&model), LayoutKind::Radial, None);
		let mut arena = None;
		for _ in 0..200 {
			if let Tick::Settled { arena: a, .. } = engine.tick(|_| {}) {
				arena = Some(a);
				break;
			}
		}
		let arena = arena.expect("radial run settles");
		assert!(LayoutArena::write_positions(&arena.nodes, &mut model));
		assert_eq!(block_on(handle), LayoutOutcome::Completed);

		let radius = |id| model.node(id).unwrap().pos().dist_sq(Default::default()).sqrt();
		assert!(radius("A") < 15.0, "A at {}", radius("A"));
		assert!((radius("B") - gap).abs() < 15.0, "B at {}", radius("B"));
	}

	#[test]
	fn write_positions_rejects_stale_arena() {
		let mut model = GraphModel::new();
		model.merge_fragment(&chain(&["a", "b"]));
		let arena = arena(3);
		assert!(!LayoutArena::write_positions(&arena.nodes, &mut model));
	}
}
