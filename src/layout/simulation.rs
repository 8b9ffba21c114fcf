use rand::SeedableRng;
use rand::rngs::SmallRng;

use super::forces::{Center, Collide, Columns, Force, Link, ManyBody, Radial};
use super::{LayoutArena, LayoutKind};

/// Alpha below which a run has settled.
pub const ALPHA_MIN: f64 = 0.05;
/// Fraction of the remaining alpha lost per iteration.
pub const ALPHA_DECAY: f64 = 0.03;
/// Fraction of velocity kept per iteration.
pub const VELOCITY_RETAIN: f64 = 0.6;

const SEED: u64 = 0x5eed_1a70;

/// One relaxation over an owned arena. Alpha starts at 1 and decays toward 0;
/// the run has settled once it drops below [`ALPHA_MIN`].
pub struct Simulation {
	arena: LayoutArena,
	forces: Vec<Box<dyn Force>>,
	alpha: f64,
	iterations: u32,
	rng: SmallRng,
}

impl Simulation {
	/// Simulation of `kind` with spacing `gap`.
	pub fn new(arena: LayoutArena, kind: LayoutKind, gap: f64) -> Self {
		let n = arena.nodes.len();
		let forces: Vec<Box<dyn Force>> = match kind {
			LayoutKind::Force => vec![
				Box::new(ManyBody::new(-150.0)),
				Box::new(Link::new(&arena.links, n, gap)),
				Box::new(Center { strength: 0.01 }),
			],
			LayoutKind::Radial => vec![
				Box::new(ManyBody::new(-250.0)),
				Box::new(Link::new(&arena.links, n, gap)),
				Box::new(Radial { gap, strength: 0.8 }),
			],
			LayoutKind::Vertical => vec![
				Box::new(Collide {
					distance: 15.0,
					strength: 1.0,
				}),
				Box::new(Link::new(&arena.links, n, gap).with_strength(0.01)),
				Box::new(Columns {
					gap,
					strength: 0.8,
					max_rank: arena.max_rank(),
				}),
			],
		};
		Self {
			arena,
			forces,
			alpha: 1.0,
			iterations: 0,
			rng: SmallRng::seed_from_u64(SEED),
		}
	}

	/// Current alpha.
	pub fn alpha(&self) -> f64 {
		self.alpha
	}

	/// Iterations run so far.
	pub fn iterations(&self) -> u32 {
		self.iterations
	}

	/// Positions as of the last iteration.
	pub fn arena(&self) -> &LayoutArena {
		&self.arena
	}

	/// Fixes node `slot` at `(x, y)` from the next iteration on.
	pub fn pin(&mut self, slot: usize, x: f64, y: f64) -> bool {
		let Some(node) = self.arena.nodes.get_mut(slot) else {
			return false;
		};
		(node.x, node.y) = (x, y);
		(node.fx, node.fy) = (Some(x), Some(y));
		true
	}

	/// Ends the simulation, returning its arena.
	pub fn into_arena(self) -> LayoutArena {
		self.arena
	}

	/// Whether alpha has dropped below [`ALPHA_MIN`].
	pub fn is_settled(&self) -> bool {
		self.alpha < ALPHA_MIN
	}

	/// Advances one iteration. Returns `false` once the run has settled.
	pub fn step(&mut self) -> bool {
		if self.is_settled() {
			return false;
		}
		self.alpha += (0.0 - self.alpha) * ALPHA_DECAY;
		for force in &mut self.forces {
			force.apply(&mut self.arena.nodes, self.alpha, &mut self.rng);
		}
		for node in &mut self.arena.nodes {
			match node.fx {
				Some(fx) => {
					node.x = fx;
					node.vx = 0.0;
				}
				None => {
					node.vx *= VELOCITY_RETAIN;
					node.x += node.vx;
				}
			}
			match node.fy {
				Some(fy) => {
					node.y = fy;
					node.vy = 0.0;
				}
				None => {
					node.vy *= VELOCITY_RETAIN;
					node.y += node.vy;
				}
			}
		}
		self.iterations += 1;
		!self.is_settled()
	}
}
