//! Region quadtree over node positions, aggregating count and centroid per
//! cell for Barnes–Hut approximation.

// Past this depth coincident points share one leaf.
const MAX_DEPTH: u32 = 24;

#[derive(Debug)]
struct Cell {
	width: f64,
	count: usize,
	cx: f64,
	cy: f64,
	children: [Option<usize>; 4],
	points: Vec<usize>,
}

impl Cell {
	fn is_leaf(&self) -> bool {
		self.children.iter().all(Option::is_none)
	}
}

/// Flattened quadtree; cell 0 is the root.
#[derive(Debug)]
pub struct QuadTree {
	cells: Vec<Cell>,
}

impl QuadTree {
	/// Tree over `positions`, indexed like the input.
	pub fn build(positions: &[(f64, f64)]) -> Self {
		let mut tree = QuadTree { cells: Vec::new() };
		if positions.is_empty() {
			return tree;
		}
		let (mut x0, mut y0, mut x1, mut y1) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
		for &(x, y) in positions {
			x0 = x0.min(x);
			y0 = y0.min(y);
			x1 = x1.max(x);
			y1 = y1.max(y);
		}
		let size = (x1 - x0).max(y1 - y0).max(1.0);
		let mut indices: Vec<usize> = (0..positions.len()).collect();
		tree.insert(positions, &mut indices, (x0, y0), size, 0);
		tree
	}

	fn insert(
		&mut self,
		positions: &[(f64, f64)],
		indices: &mut [usize],
		origin: (f64, f64),
		size: f64,
		depth: u32,
	) -> usize {
		let count = indices.len();
		let (sx, sy) = indices.iter().fold((0.0, 0.0), |(sx, sy), &i| {
			(sx + positions[i].0, sy + positions[i].1)
		});
		let slot = self.cells.len();
		self.cells.push(Cell {
			width: size,
			count,
			cx: sx / count as f64,
			cy: sy / count as f64,
			children: [None; 4],
			points: Vec::new(),
		});

		if count == 1 || depth >= MAX_DEPTH {
			self.cells[slot].points = indices.to_vec();
			return slot;
		}

		let half = size / 2.0;
		let (mx, my) = (origin.0 + half, origin.1 + half);
		let quadrant = |i: &usize| {
			let (x, y) = positions[*i];
			usize::from(x >= mx) | (usize::from(y >= my) << 1)
		};
		indices.sort_by_key(quadrant);

		let mut start = 0;
		for q in 0..4 {
			let end = start + indices[start..].iter().take_while(|&&i| quadrant(&i) == q).count();
			if end > start {
				let child_origin = (
					if q & 1 == 1 { mx } else { origin.0 },
					if q & 2 == 2 { my } else { origin.1 },
				);
				let child =
					self.insert(positions, &mut indices[start..end], child_origin, half, depth + 1);
				self.cells[slot].children[q] = Some(child);
			}
			start = end;
		}
		slot
	}

	/// Visits cells depth-first from the root. `visit` gets the cell's width,
	/// point count, centroid and, for leaves, its points; returning `true`
	/// skips the cell's children.
	pub fn visit(&self, mut visit: impl FnMut(f64, usize, (f64, f64), Option<&[usize]>) -> bool) {
		if self.cells.is_empty() {
			return;
		}
		let mut stack = vec![0];
		while let Some(slot) = stack.pop() {
			let cell = &self.cells[slot];
			let leaf = cell.is_leaf().then_some(cell.points.as_slice());
			if visit(cell.width, cell.count, (cell.cx, cell.cy), leaf) {
				continue;
			}
			stack.extend(cell.children.iter().rev().flatten());
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn root_aggregates_all_points() {
		let tree = QuadTree::build(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)]);
		let mut root = None;
		tree.visit(|_, count, centroid, _| {
			root.get_or_insert((count, centroid));
			false
		});
		assert_eq!(root, Some((4, (5.0, 5.0))));
	}

	#[test]
	fn every_point_lands_in_one_leaf() {
		let positions: Vec<(f64, f64)> = (0..50)
			.map(|i| ((i * 37 % 101) as f64, (i * 53 % 89) as f64))
			.collect();
		let tree = QuadTree::build(&positions);
		let mut seen = vec![0; positions.len()];
		tree.visit(|_, _, _, leaf| {
			for &i in leaf.unwrap_or_default() {
				seen[i] += 1;
			}
			false
		});
		assert!(seen.iter().all(|&n| n == 1));
	}

	#[test]
	fn coincident_points_terminate() {
		let tree = QuadTree::build(&[(3.0, 3.0); 5]);
		let mut leaves = 0;
		tree.visit(|_, count, _, leaf| {
			if let Some(points) = leaf {
				leaves += 1;
				assert_eq!(points.len(), count);
			}
			false
		});
		assert_eq!(leaves, 1);
	}
}
