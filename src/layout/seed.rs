//! Initial positions for nodes that join a live layout.

use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

use rand::Rng;
use rand::rngs::SmallRng;

use super::LayoutKind;
use super::forces::Columns;
use crate::graph::{GraphModel, Point};

/// How far a new node may land from the neighbour it is seeded next to.
pub const NEIGHBOUR_JITTER: f64 = 30.0;
/// Vertical distance between nodes seeded into the same column.
pub const COLUMN_SPACING: f64 = 40.0;

/// Point `i` of a sunflower spiral around `center`; spreads any number of
/// nodes without overlap.
pub fn spiral(center: Point, i: usize) -> Point {
	let radius = 10.0 * (0.5 + i as f64).sqrt();
	let angle = i as f64 * PI * (3.0 - 5f64.sqrt());
	Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
}

/// `k`-th of `n` evenly spaced points on the ring for `rank`.
pub fn ring(rank: u32, gap: f64, k: usize, n: usize) -> Point {
	let radius = rank as f64 * gap;
	let angle = 2.0 * PI * k as f64 / n.max(1) as f64;
	Point::new(radius * angle.cos(), radius * angle.sin())
}

/// `k`-th of `n` points stacked in the column of `rank`.
pub fn column(columns: &Columns, rank: Option<u32>, k: usize, n: usize) -> Point {
	let y = (k as f64 - (n as f64 - 1.0) / 2.0) * COLUMN_SPACING;
	Point::new(columns.target_x(rank), y)
}

/// Positions the nodes at `slots`, which must be new to the layout.
/// Force layouts place a node next to an already placed neighbour; radial
/// and vertical layouts place it on its rank's ring or column.
pub fn seed_positions(
	model: &mut GraphModel,
	slots: &[usize],
	kind: LayoutKind,
	gap: f64,
	rng: &mut SmallRng,
) {
	if slots.is_empty() {
		return;
	}
	let positions = match kind {
		LayoutKind::Force => seed_near_neighbours(model, slots, rng),
		LayoutKind::Radial | LayoutKind::Vertical => seed_by_rank(model, slots, kind, gap),
	};
	let nodes = model.nodes_mut();
	for (&slot, p) in slots.iter().zip(positions) {
		nodes[slot].x = p.x;
		nodes[slot].y = p.y;
	}
}

fn seed_near_neighbours(model: &GraphModel, slots: &[usize], rng: &mut SmallRng) -> Vec<Point> {
	let pending: HashSet<usize> = slots.iter().copied().collect();
	let mut placed: HashMap<usize, Point> = HashMap::new();
	let nodes = model.nodes();
	let mut orphans = 0;

	slots
		.iter()
		.map(|&slot| {
			let id = &nodes[slot].id;
			let anchor = model.incident_edges(id).find_map(|edge| {
				let other = if edge.source_index == slot {
					edge.target_index
				} else {
					edge.source_index
				};
				if other == slot {
					None
				} else if !pending.contains(&other) {
					Some(nodes[other].pos())
				} else {
					placed.get(&other).copied()
				}
			});
			let p = match anchor {
				Some(a) => {
					let angle = rng.gen_range(0.0..2.0 * PI);
					let distance = rng.gen_range(0.5..1.0) * NEIGHBOUR_JITTER;
					Point::new(a.x + distance * angle.cos(), a.y + distance * angle.sin())
				}
				None => {
					orphans += 1;
					spiral(Point::default(), orphans - 1)
				}
			};
			placed.insert(slot, p);
			p
		})
		.collect()
}

fn seed_by_rank(model: &GraphModel, slots: &[usize], kind: LayoutKind, gap: f64) -> Vec<Point> {
	let nodes = model.nodes();
	let mut per_rank: HashMap<Option<u32>, usize> = HashMap::new();
	for &slot in slots {
		*per_rank.entry(nodes[slot].path_index).or_default() += 1;
	}
	let columns = Columns {
		gap,
		strength: 0.0,
		max_rank: nodes.iter().filter_map(|n| n.path_index).max().unwrap_or(0),
	};
	let mut seen: HashMap<Option<u32>, usize> = HashMap::new();

	slots
		.iter()
		.map(|&slot| {
			let rank = nodes[slot].path_index;
			let n = per_rank[&rank];
			let k = seen.entry(rank).or_default();
			let p = match (kind, rank.unwrap_or(0)) {
				(LayoutKind::Vertical, _) => column(&columns, rank, *k, n),
				(_, 0) => spiral(Point::default(), *k),
				(_, r) => ring(r, gap, *k, n),
			};
			*k += 1;
			p
		})
		.collect()
}
