//! Forces acting on a [`SimNode`] array. Each force adds to node velocities
//! (centering moves positions) scaled by the simulation's current alpha.

use std::collections::HashMap;

use rand::Rng;
use rand::rngs::SmallRng;

use super::SimNode;
use super::quadtree::QuadTree;

/// One contribution to node velocities, applied once per iteration.
pub trait Force {
	/// Adds this force's contribution for the current `alpha`.
	fn apply(&mut self, nodes: &mut [SimNode], alpha: f64, rng: &mut SmallRng);
}

/// Tiny random offset that separates coincident points.
pub fn jiggle(rng: &mut SmallRng) -> f64 {
	(rng.gen_range(0.0..1.0) - 0.5) * 1e-6
}

fn nonzero(v: f64, rng: &mut SmallRng) -> f64 {
	if v == 0.0 { jiggle(rng) } else { v }
}

/// Charge between all pairs, approximated with Barnes–Hut. Negative
/// strength repels.
pub struct ManyBody {
	/// Charge per node.
	pub strength: f64,
	/// Squared Barnes–Hut opening angle.
	pub theta2: f64,
	/// Squared distance below which pairs stop strengthening.
	pub distance_min2: f64,
}

impl ManyBody {
	/// Charge `strength` with the usual opening angle.
	pub fn new(strength: f64) -> Self {
		Self {
			strength,
			theta2: 0.81,
			distance_min2: 1.0,
		}
	}
}

impl Force for ManyBody {
	fn apply(&mut self, nodes: &mut [SimNode], alpha: f64, rng: &mut SmallRng) {
		let positions: Vec<(f64, f64)> = nodes.iter().map(|n| (n.x, n.y)).collect();
		let tree = QuadTree::build(&positions);
		let k = self.strength * alpha;

		for (i, node) in nodes.iter_mut().enumerate() {
			let (x, y) = positions[i];
			let (mut vx, mut vy) = (0.0, 0.0);
			tree.visit(|width, count, (cx, cy), leaf| {
				let (dx, dy) = (cx - x, cy - y);
				let l2 = dx * dx + dy * dy;
				if leaf.is_none() && width * width / self.theta2 < l2 {
					let l2 = l2.max(self.distance_min2);
					vx += dx * k * count as f64 / l2;
					vy += dy * k * count as f64 / l2;
					return true;
				}
				for &j in leaf.unwrap_or_default() {
					if j == i {
						continue;
					}
					let dx = nonzero(positions[j].0 - x, rng);
					let dy = nonzero(positions[j].1 - y, rng);
					let mut l2 = dx * dx + dy * dy;
					if l2 < self.distance_min2 {
						l2 = (self.distance_min2 * l2).sqrt();
					}
					vx += dx * k / l2;
					vy += dy * k / l2;
				}
				false
			});
			node.vx += vx;
			node.vy += vy;
		}
	}
}

/// Springs along links toward a rest length.
pub struct Link {
	links: Vec<(usize, usize)>,
	distance: f64,
	strengths: Vec<f64>,
	biases: Vec<f64>,
}

impl Link {
	/// Springs whose stiffness is `1 / min(degree)` of the two endpoints.
	pub fn new(links: &[(usize, usize)], node_count: usize, distance: f64) -> Self {
		let links: Vec<(usize, usize)> = links.iter().copied().filter(|(s, t)| s != t).collect();
		let mut degree = vec![0usize; node_count];
		for &(s, t) in &links {
			degree[s] += 1;
			degree[t] += 1;
		}
		let strengths = links
			.iter()
			.map(|&(s, t)| 1.0 / degree[s].min(degree[t]) as f64)
			.collect();
		let biases = links
			.iter()
			.map(|&(s, t)| degree[s] as f64 / (degree[s] + degree[t]) as f64)
			.collect();
		Self {
			links,
			distance,
			strengths,
			biases,
		}
	}

	/// Uses one stiffness for every spring.
	pub fn with_strength(mut self, strength: f64) -> Self {
		self.strengths.iter_mut().for_each(|s| *s = strength);
		self
	}
}

impl Force for Link {
	fn apply(&mut self, nodes: &mut [SimNode], alpha: f64, rng: &mut SmallRng) {
		for (k, &(s, t)) in self.links.iter().enumerate() {
			let (source, target) = (&nodes[s], &nodes[t]);
			let mut x = nonzero(target.x + target.vx - source.x - source.vx, rng);
			let mut y = nonzero(target.y + target.vy - source.y - source.vy, rng);
			let l = (x * x + y * y).sqrt();
			let scale = (l - self.distance) / l * alpha * self.strengths[k];
			x *= scale;
			y *= scale;
			let bias = self.biases[k];
			nodes[t].vx -= x * bias;
			nodes[t].vy -= y * bias;
			nodes[s].vx += x * (1.0 - bias);
			nodes[s].vy += y * (1.0 - bias);
		}
	}
}

/// Shifts all nodes so their mean moves toward the origin.
pub struct Center {
	/// Fraction of the mean offset removed per iteration.
	pub strength: f64,
}

impl Force for Center {
	fn apply(&mut self, nodes: &mut [SimNode], _alpha: f64, _rng: &mut SmallRng) {
		if nodes.is_empty() {
			return;
		}
		let n = nodes.len() as f64;
		let (sx, sy) = nodes.iter().fold((0.0, 0.0), |(sx, sy), node| (sx + node.x, sy + node.y));
		let (sx, sy) = (sx / n * self.strength, sy / n * self.strength);
		for node in nodes {
			node.x -= sx;
			node.y -= sy;
		}
	}
}

/// Pulls every node toward a circle around the origin whose radius is its
/// rank times `gap`.
pub struct Radial {
	/// Distance between consecutive rings.
	pub gap: f64,
	/// Pull toward the ring, scaled by alpha.
	pub strength: f64,
}

impl Force for Radial {
	fn apply(&mut self, nodes: &mut [SimNode], alpha: f64, _rng: &mut SmallRng) {
		for node in nodes {
			let radius = node.path_index.unwrap_or(0) as f64 * self.gap;
			let dx = if node.x == 0.0 { 1e-6 } else { node.x };
			let dy = if node.y == 0.0 { 1e-6 } else { node.y };
			let r = (dx * dx + dy * dy).sqrt();
			let k = (radius - r) * self.strength * alpha / r;
			node.vx += dx * k;
			node.vy += dy * k;
		}
	}
}

/// Pulls every node toward the column of its rank, centered on x = 0.
pub struct Columns {
	/// Distance between consecutive columns.
	pub gap: f64,
	/// Pull toward the column, scaled by alpha.
	pub strength: f64,
	/// Highest rank, used to center the columns.
	pub max_rank: u32,
}

impl Columns {
	/// Column position for a node of `rank`; unranked nodes go to the middle.
	pub fn target_x(&self, rank: Option<u32>) -> f64 {
		rank.map_or(0.0, |r| (r as f64 - self.max_rank as f64 / 2.0) * self.gap)
	}
}

impl Force for Columns {
	fn apply(&mut self, nodes: &mut [SimNode], alpha: f64, _rng: &mut SmallRng) {
		for node in nodes {
			node.vx += (self.target_x(node.path_index) - node.x) * self.strength * alpha;
		}
	}
}

/// Keeps nodes at least `distance` apart, using a spatial hash on the
/// velocity-predicted positions.
pub struct Collide {
	/// Minimum distance between node centres.
	pub distance: f64,
	/// Fraction of the overlap resolved per iteration.
	pub strength: f64,
}

impl Force for Collide {
	fn apply(&mut self, nodes: &mut [SimNode], _alpha: f64, rng: &mut SmallRng) {
		let cell = self.distance;
		let predicted: Vec<(f64, f64)> = nodes.iter().map(|n| (n.x + n.vx, n.y + n.vy)).collect();
		let key = |(x, y): (f64, f64)| ((x / cell).floor() as i64, (y / cell).floor() as i64);
		let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
		for (i, &p) in predicted.iter().enumerate() {
			grid.entry(key(p)).or_default().push(i);
		}

		let min2 = self.distance * self.distance;
		for i in 0..nodes.len() {
			let (gx, gy) = key(predicted[i]);
			for (ox, oy) in (-1..=1).flat_map(|ox| (-1..=1).map(move |oy| (ox, oy))) {
				let Some(bucket) = grid.get(&(gx + ox, gy + oy)) else {
					continue;
				};
				for &j in bucket {
					if j <= i {
						continue;
					}
					let mut x = predicted[i].0 - predicted[j].0;
					let mut y = predicted[i].1 - predicted[j].1;
					let l2 = x * x + y * y;
					if l2 >= min2 {
						continue;
					}
					x = nonzero(x, rng);
					y = nonzero(y, rng);
					let l = (x * x + y * y).sqrt();
					let push = (self.distance - l) / l * self.strength * 0.5;
					nodes[i].vx += x * push;
					nodes[i].vy += y * push;
					nodes[j].vx -= x * push;
					nodes[j].vy -= y * push;
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use rand::SeedableRng;

	use super::*;

	fn at(x: f64, y: f64) -> SimNode {
		SimNode {
			x,
			y,
			..SimNode::default()
		}
	}

	fn rng() -> SmallRng {
		SmallRng::seed_from_u64(7)
	}

	#[test]
	fn many_body_repels_pair() {
		let mut nodes = vec![at(-10.0, 0.0), at(10.0, 0.0)];
		ManyBody::new(-150.0).apply(&mut nodes, 1.0, &mut rng());
		assert!(nodes[0].vx < 0.0 && nodes[1].vx > 0.0);
		assert!((nodes[0].vx + nodes[1].vx).abs() < 1e-9);
	}

	#[test]
	fn many_body_far_cluster_matches_exact_sum() {
		let mut nodes = vec![at(0.0, 0.0), at(1000.0, 0.0), at(1001.0, 1.0), at(1000.0, 1.0)];
		ManyBody::new(-100.0).apply(&mut nodes, 1.0, &mut rng());
		let exact: f64 = [(1000.0, 0.0), (1001.0, 1.0), (1000.0, 1.0)]
			.iter()
			.map(|&(x, y): &(f64, f64)| -100.0 * x / (x * x + y * y))
			.sum();
		assert!((nodes[0].vx - exact).abs() / exact.abs() < 0.01);
	}

	#[test]
	fn link_pulls_stretched_pair_together() {
		let mut nodes = vec![at(0.0, 0.0), at(300.0, 0.0)];
		Link::new(&[(0, 1)], 2, 100.0).apply(&mut nodes, 1.0, &mut rng());
		assert!(nodes[0].vx > 0.0 && nodes[1].vx < 0.0);
	}

	#[test]
	fn link_ignores_self_loops() {
		let force = Link::new(&[(0, 0), (0, 1)], 2, 100.0);
		assert_eq!(force.links, vec![(0, 1)]);
		assert_eq!(force.strengths, vec![1.0]);
	}

	#[test]
	fn radial_pulls_toward_ring() {
		let mut nodes = vec![
			SimNode {
				path_index: Some(1),
				..at(10.0, 0.0)
			},
			at(50.0, 0.0),
		];
		Radial {
			gap: 100.0,
			strength: 0.8,
		}
		.apply(&mut nodes, 1.0, &mut rng());
		assert!((nodes[0].vx - 72.0).abs() < 1e-9);
		assert!((nodes[1].vx + 40.0).abs() < 1e-9);
	}

	#[test]
	fn columns_center_on_middle_rank() {
		let columns = Columns {
			gap: 200.0,
			strength: 0.8,
			max_rank: 2,
		};
		assert_eq!(columns.target_x(Some(0)), -200.0);
		assert_eq!(columns.target_x(Some(1)), 0.0);
		assert_eq!(columns.target_x(Some(2)), 200.0);
		assert_eq!(columns.target_x(None), 0.0);
	}

	#[test]
	fn collide_separates_overlapping_nodes() {
		let mut nodes = vec![at(0.0, 0.0), at(5.0, 0.0), at(100.0, 0.0)];
		Collide {
			distance: 15.0,
			strength: 1.0,
		}
		.apply(&mut nodes, 1.0, &mut rng());
		assert!(nodes[0].vx < 0.0 && nodes[1].vx > 0.0);
		assert_eq!(nodes[2].vx, 0.0);
	}

	#[test]
	fn center_moves_mean_toward_origin() {
		let mut nodes = vec![at(100.0, 0.0), at(200.0, 0.0)];
		Center { strength: 0.5 }.apply(&mut nodes, 1.0, &mut rng());
		assert_eq!((nodes[0].x, nodes[1].x), (25.0, 125.0));
	}
}
