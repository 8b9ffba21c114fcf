//! Per-pass edge geometry: parallel edges between the same two positions fan
//! out as curves, self-loops become a fixed loop above their node.

use std::collections::HashMap;

use super::types::{Edge, Node, Point};

/// Perpendicular distance between neighbouring parallel edges.
pub const PARALLEL_SPACING: f64 = 20.0;
/// Size of the loop drawn for an edge from a node to itself.
pub const LOOP_RADIUS: f64 = 50.0;

/// Bezier control points of a curved parallel edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurveControlPoints {
	/// Control point near the source.
	pub c1: Point,
	/// Control point near the target.
	pub c2: Point,
	/// Apex of the curve, where its label and arrow sit.
	pub mid: Point,
}

/// How an edge is drawn this pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EdgeShape {
	/// A straight segment.
	Line,
	/// A loop above the node through two control points.
	SelfLoop {
		/// Right-hand control point.
		c1: Point,
		/// Left-hand control point.
		c2: Point,
	},
	/// A curve bent away from its parallel siblings.
	Curve(CurveControlPoints),
}

/// Geometry of one edge for the current pass.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeGeometry {
	/// Slot of the edge in the model.
	pub slot: usize,
	/// Source position.
	pub source: Point,
	/// Target position.
	pub target: Point,
	/// Position within the group of edges sharing both ends.
	pub group_index: usize,
	/// Size of that group.
	pub group_count: usize,
	/// Shape to draw.
	pub shape: EdgeShape,
}

impl EdgeGeometry {
	/// Whether the edge starts and ends at the same node.
	pub fn is_self_loop(&self) -> bool {
		matches!(self.shape, EdgeShape::SelfLoop { .. })
	}

	/// Where the edge label and arrow sit.
	pub fn midpoint(&self) -> Point {
		match self.shape {
			EdgeShape::Curve(curve) => curve.mid,
			_ => Point::new(
				(self.source.x + self.target.x) / 2.0,
				(self.source.y + self.target.y) / 2.0,
			),
		}
	}

	/// Point that gives the direction in which the edge leaves `from_source`'s end.
	pub fn heading_point(&self, from_source: bool) -> Point {
		match (self.shape, from_source) {
			(EdgeShape::Curve(curve), true) => curve.c1,
			(EdgeShape::Curve(curve), false) => curve.c2,
			(_, true) => self.target,
			(_, false) => self.source,
		}
	}

	/// Direction from source to target, in radians.
	pub fn angle(&self) -> f64 {
		(self.target.y - self.source.y).atan2(self.target.x - self.source.x)
	}
}

fn canonical_key(a: Point, b: Point) -> [u64; 4] {
	let (a, b) = if sorts_after(a, b) { (b, a) } else { (a, b) };
	// +0.0 folds negative zero into positive zero
	[a.x + 0.0, a.y + 0.0, b.x + 0.0, b.y + 0.0].map(f64::to_bits)
}

fn sorts_after(a: Point, b: Point) -> bool {
	a.x > b.x || (a.x == b.x && a.y > b.y)
}

/// Signed fan position of the `index`-th of `count` parallel edges.
pub fn diff_index(index: usize, count: usize) -> i64 {
	let (index, parity) = (index as i64, ((count + 1) % 2) as i64);
	if index % 2 == 0 {
		index + parity
	} else {
		-index - 1 + parity
	}
}

/// Computes geometry for the edges at `slots`, in the given order.
pub fn resolve(edges: &[Edge], nodes: &[Node], slots: &[usize]) -> Vec<EdgeGeometry> {
	let ends: Vec<(Point, Point)> = slots
		.iter()
		.map(|&slot| {
			let edge = &edges[slot];
			(nodes[edge.source_index].pos(), nodes[edge.target_index].pos())
		})
		.collect();

	let mut counts: HashMap<[u64; 4], usize> = HashMap::new();
	let mut group_indices = Vec::with_capacity(slots.len());
	for &(source, target) in &ends {
		if source == target {
			group_indices.push(0);
			continue;
		}
		let count = counts.entry(canonical_key(source, target)).or_insert(0);
		group_indices.push(*count);
		*count += 1;
	}

	slots
		.iter()
		.zip(ends)
		.zip(group_indices)
		.map(|((&slot, (source, target)), group_index)| {
			if source == target {
				return EdgeGeometry {
					slot,
					source,
					target,
					group_index: 0,
					group_count: 1,
					shape: EdgeShape::SelfLoop {
						c1: Point::new(source.x + LOOP_RADIUS, source.y - LOOP_RADIUS),
						c2: Point::new(source.x - LOOP_RADIUS, source.y - LOOP_RADIUS),
					},
				};
			}
			let group_count = counts[&canonical_key(source, target)];
			let shape = if group_count > 1 {
				let mut diff = diff_index(group_index, group_count);
				if sorts_after(source, target) {
					diff = -diff;
				}
				EdgeShape::Curve(curve(source, target, diff))
			} else {
				EdgeShape::Line
			};
			EdgeGeometry {
				slot,
				source,
				target,
				group_index,
				group_count,
				shape,
			}
		})
		.collect()
}

/// Like [`resolve`], keeping only the first `limit` edges. Groups are counted
/// over every slot, so a kept curve has the same offset it would have with
/// no limit at all.
pub fn resolve_capped(edges: &[Edge], nodes: &[Node], slots: &[usize], limit: usize) -> Vec<EdgeGeometry> {
	let mut geometry = resolve(edges, nodes, slots);
	geometry.truncate(limit);
	geometry
}

fn curve(source: Point, target: Point, diff: i64) -> CurveControlPoints {
	let (dx, dy) = (target.x - source.x, target.y - source.y);
	let distance = (dx * dx + dy * dy).sqrt();
	let (ux, uy) = (dx / distance, dy / distance);
	let offset = diff as f64 * PARALLEL_SPACING;
	let mid = Point::new(
		(source.x + target.x) / 2.0 - uy * offset,
		(source.y + target.y) / 2.0 + ux * offset,
	);
	let quarter = distance / 4.0;
	CurveControlPoints {
		c1: Point::new(mid.x - ux * quarter, mid.y - uy * quarter),
		c2: Point::new(mid.x + ux * quarter, mid.y + uy * quarter),
		mid,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn node(id: &str, index: usize, x: f64, y: f64) -> Node {
		Node {
			id: id.into(),
			label: "v".into(),
			x,
			y,
			fx: None,
			fy: None,
			path_index: None,
			index,
		}
	}

	fn edge(id: &str, source_index: usize, target_index: usize) -> Edge {
		Edge {
			id: id.into(),
			label: "e".into(),
			source_id: format!("n{source_index}"),
			target_id: format!("n{target_index}"),
			source_index,
			target_index,
		}
	}

	fn offsets(geometry: &[EdgeGeometry]) -> Vec<f64> {
		geometry
			.iter()
			.map(|g| match g.shape {
				EdgeShape::Curve(c) => c.mid.y,
				_ => 0.0,
			})
			.collect()
	}

	fn all(edges: &[Edge]) -> Vec<usize> {
		(0..edges.len()).collect()
	}

	#[test]
	fn single_edge_is_straight() {
		let nodes = [node("n0", 0, 0.0, 0.0), node("n1", 1, 100.0, 0.0)];
		let edges = [edge("a", 0, 1)];
		let geometry = resolve(&edges, &nodes, &all(&edges));
		assert_eq!(geometry[0].group_count, 1);
		assert_eq!(geometry[0].shape, EdgeShape::Line);
		assert_eq!(geometry[0].midpoint(), Point::new(50.0, 0.0));
	}

	#[test]
	fn two_parallel_edges_fan_opposite() {
		let nodes = [node("n0", 0, 0.0, 0.0), node("n1", 1, 100.0, 0.0)];
		let edges = [edge("a", 0, 1), edge("b", 0, 1)];
		let geometry = resolve(&edges, &nodes, &all(&edges));
		assert!(geometry.iter().all(|g| g.group_count == 2));
		assert_eq!((geometry[0].group_index, geometry[1].group_index), (0, 1));
		let off = offsets(&geometry);
		assert_eq!(off, vec![20.0, -20.0]);
	}

	#[test]
	fn third_edge_redistributes_symmetrically() {
		let nodes = [node("n0", 0, 0.0, 0.0), node("n1", 1, 100.0, 0.0)];
		let edges = [edge("a", 0, 1), edge("b", 0, 1), edge("c", 0, 1)];
		let geometry = resolve(&edges, &nodes, &all(&edges));
		assert!(geometry.iter().all(|g| g.group_count == 3));
		assert_eq!(
			(0..3).map(|i| diff_index(i, 3)).collect::<Vec<_>>(),
			vec![0, -2, 2]
		);
		assert_eq!(offsets(&geometry), vec![0.0, -40.0, 40.0]);
	}

	#[test]
	fn capping_keeps_whole_group_offsets() {
		let nodes = [node("n0", 0, 0.0, 0.0), node("n1", 1, 100.0, 0.0)];
		let edges = [edge("a", 0, 1), edge("b", 0, 1), edge("c", 0, 1)];
		let geometry = resolve_capped(&edges, &nodes, &all(&edges), 2);
		assert_eq!(geometry.len(), 2);
		assert!(geometry.iter().all(|g| g.group_count == 3));
		assert_eq!(offsets(&geometry), vec![0.0, -40.0]);
	}

	#[test]
	fn reversed_edges_share_a_group_and_separate() {
		let nodes = [node("n0", 0, 0.0, 0.0), node("n1", 1, 100.0, 0.0)];
		let edges = [edge("ab", 0, 1), edge("ba", 1, 0)];
		let geometry = resolve(&edges, &nodes, &all(&edges));
		assert_eq!(geometry[1].group_count, 2);
		let off = offsets(&geometry);
		assert!(off[0] * off[1] < 0.0);
	}

	#[test]
	fn curve_control_points_straddle_mid() {
		let nodes = [node("n0", 0, 0.0, 0.0), node("n1", 1, 100.0, 0.0)];
		let edges = [edge("a", 0, 1), edge("b", 0, 1)];
		let geometry = resolve(&edges, &nodes, &all(&edges));
		let EdgeShape::Curve(c) = geometry[0].shape else {
			panic!("expected curve");
		};
		assert_eq!(c.c1, Point::new(25.0, 20.0));
		assert_eq!(c.c2, Point::new(75.0, 20.0));
		assert_eq!(geometry[0].heading_point(true), c.c1);
		assert_eq!(geometry[0].heading_point(false), c.c2);
	}

	#[test]
	fn self_loop_is_excluded_from_groups() {
		let nodes = [node("n0", 0, 10.0, 10.0), node("n1", 1, 100.0, 0.0)];
		let edges = [edge("loop", 0, 0), edge("loop2", 0, 0), edge("a", 0, 1)];
		let geometry = resolve(&edges, &nodes, &all(&edges));
		assert!(geometry[0].is_self_loop() && geometry[1].is_self_loop());
		assert_eq!(geometry[1].group_count, 1);
		assert_eq!(
			geometry[0].shape,
			EdgeShape::SelfLoop {
				c1: Point::new(60.0, -40.0),
				c2: Point::new(-40.0, -40.0)
			}
		);
		assert_eq!(geometry[2].shape, EdgeShape::Line);
	}

	#[test]
	fn deterministic_for_same_input() {
		let nodes = [node("n0", 0, 3.0, 4.0), node("n1", 1, -7.0, 2.0)];
		let edges = [edge("a", 0, 1), edge("b", 1, 0), edge("c", 0, 1)];
		let slots = all(&edges);
		assert_eq!(resolve(&edges, &nodes, &slots), resolve(&edges, &nodes, &slots));
	}
}
