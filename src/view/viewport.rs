//! Camera state and the transforms between screen and world coordinates.
//!
//! The camera is described by a scale and a pan offset measured in screen
//! pixels from the canvas centre. While the canvas is being panned the
//! in-progress drag delta is kept separately and folded into the pan on
//! release.

use crate::graph::Point;

/// Furthest the camera zooms out.
pub const MIN_SCALE: f64 = 0.1;
/// Furthest the camera zooms in.
pub const MAX_SCALE: f64 = 3.0;
/// Scale change per wheel notch.
pub const ZOOM_STEP: f64 = 0.025;
/// Scale-to-fit never zooms in further than this.
pub const FIT_MAX_SCALE: f64 = 2.0;
/// World-space margin around the node bounding box: left, right, top, bottom.
pub const FIT_PADDING: [f64; 4] = [20.0, 80.0, 50.0, 20.0];
/// World-space distance between background grid lines.
pub const GRID_SPACING: f64 = 100.0;

/// Scale, pan and in-progress drag of the canvas camera.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
	width: f64,
	height: f64,
	scale: f64,
	pan: Point,
	drag: Point,
	fit: bool,
	fit_by_default: bool,
}

impl Viewport {
	/// Camera at unit scale for a `width` by `height` canvas.
	pub fn new(width: f64, height: f64, scale_to_fit: bool) -> Self {
		Self {
			width,
			height,
			scale: 1.0,
			pan: Point::default(),
			drag: Point::default(),
			fit: scale_to_fit,
			fit_by_default: scale_to_fit,
		}
	}

	/// Canvas width in pixels.
	pub fn width(&self) -> f64 {
		self.width
	}

	/// Canvas height in pixels.
	pub fn height(&self) -> f64 {
		self.height
	}

	/// Current scale.
	pub fn scale(&self) -> f64 {
		self.scale
	}

	/// Committed pan offset.
	pub fn pan(&self) -> Point {
		self.pan
	}

	/// Whether the camera follows the graph's bounding box.
	pub fn is_fit_active(&self) -> bool {
		self.fit
	}

	/// World point drawn at the canvas' top-left corner.
	pub fn pivot(&self) -> Point {
		Point::new(
			(-self.width / 2.0 + self.pan.x - self.drag.x) / self.scale,
			(-self.height / 2.0 + self.pan.y - self.drag.y) / self.scale,
		)
	}

	/// World point under screen point `p`.
	pub fn screen_to_world(&self, p: Point) -> Point {
		let pivot = self.pivot();
		Point::new(p.x / self.scale + pivot.x, p.y / self.scale + pivot.y)
	}

	/// Screen point where world point `p` is drawn.
	pub fn world_to_screen(&self, p: Point) -> Point {
		let pivot = self.pivot();
		Point::new((p.x - pivot.x) * self.scale, (p.y - pivot.y) * self.scale)
	}

	/// Adopts a new canvas size.
	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}

	/// Sets the scale, leaving scale-to-fit.
	pub fn set_scale(&mut self, scale: f64) {
		self.fit = false;
		self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
	}

	/// One wheel notch at `cursor` (canvas pixels). The world point under the
	/// cursor stays under it.
	pub fn zoom_at(&mut self, cursor: Point, zoom_in: bool) {
		self.fit = false;
		let step = if zoom_in { ZOOM_STEP } else { -ZOOM_STEP };
		let next = (self.scale + step).clamp(MIN_SCALE, MAX_SCALE);
		let factor = next / self.scale;
		let mouse = Point::new(cursor.x - self.width / 2.0, cursor.y - self.height / 2.0);
		self.pan.x += (mouse.x + self.pan.x) * (factor - 1.0);
		self.pan.y += (mouse.y + self.pan.y) * (factor - 1.0);
		self.scale = next;
	}

	/// Live canvas drag by `delta` pixels since the press.
	pub fn set_drag(&mut self, delta: Point) {
		if delta != Point::default() {
			self.fit = false;
		}
		self.drag = delta;
	}

	/// Folds the live drag into the pan.
	pub fn commit_drag(&mut self) {
		self.pan.x -= self.drag.x;
		self.pan.y -= self.drag.y;
		self.drag = Point::default();
	}

	/// Puts world point `p` at the canvas centre.
	pub fn center_on(&mut self, p: Point) {
		self.fit = false;
		self.pan = Point::new(p.x * self.scale, p.y * self.scale);
	}

	/// Back to the initial camera: fitted when the canvas fits by default,
	/// otherwise scale 1 centred on the origin.
	pub fn reset(&mut self) {
		self.drag = Point::default();
		if self.fit_by_default || self.fit {
			self.fit = true;
		} else {
			self.scale = 1.0;
			self.pan = Point::default();
		}
	}

	/// Turns scale-to-fit on.
	pub fn enable_fit(&mut self) {
		self.fit = true;
	}

	/// Zooms and pans so every point is visible. Returns `false` when there
	/// is nothing to fit.
	pub fn scale_to_fit(&mut self, points: impl IntoIterator<Item = Point>) -> bool {
		let mut points = points.into_iter();
		let Some(first) = points.next() else {
			return false;
		};
		let (mut min, mut max) = (first, first);
		for p in points {
			min = Point::new(min.x.min(p.x), min.y.min(p.y));
			max = Point::new(max.x.max(p.x), max.y.max(p.y));
		}
		let [left, right, top, bottom] = FIT_PADDING;
		let (min_x, max_x) = (min.x - left, max.x + right);
		let (min_y, max_y) = (min.y - top, max.y + bottom);

		let mut scale = FIT_MAX_SCALE;
		let content_w = max_x - min_x;
		if content_w * scale > self.width {
			scale = self.width / content_w;
		}
		let content_h = max_y - min_y;
		if content_h * scale > self.height {
			scale = self.height / content_h;
		}
		self.scale = scale.max(MIN_SCALE);
		self.pan = Point::new(
			(min_x + max_x) * self.scale / 2.0,
			(min_y + max_y) * self.scale / 2.0,
		);
		true
	}

	/// Re-fits while scale-to-fit is active.
	pub fn refit(&mut self, points: impl IntoIterator<Item = Point>) {
		if self.fit {
			self.scale_to_fit(points);
		}
	}

	/// Whether a circle of world radius `r` at `p` may be visible.
	pub fn is_node_on_screen(&self, p: Point, r: f64) -> bool {
		let s = self.world_to_screen(p);
		let pad = r * self.scale;
		s.x >= -pad && s.x <= self.width + pad && s.y >= -pad && s.y <= self.height + pad
	}

	/// Whether any part of the segment from `source` to `target` may be visible.
	pub fn is_edge_on_screen(&self, source: Point, target: Point) -> bool {
		let (s, t) = (self.world_to_screen(source), self.world_to_screen(target));
		let (w, h) = (self.width, self.height);
		if (s.x < 0.0 && t.x < 0.0)
			|| (s.x > w && t.x > w)
			|| (s.y < 0.0 && t.y < 0.0)
			|| (s.y > h && t.y > h)
		{
			return false;
		}
		if self.contains_screen(s) || self.contains_screen(t) {
			return true;
		}
		let corners = [
			Point::new(0.0, 0.0),
			Point::new(w, 0.0),
			Point::new(w, h),
			Point::new(0.0, h),
		];
		(0..4).any(|i| segments_intersect(s, t, corners[i], corners[(i + 1) % 4]))
	}

	/// Whether screen point `p` is inside the canvas.
	pub fn contains_screen(&self, p: Point) -> bool {
		p.x >= 0.0 && p.x <= self.width && p.y >= 0.0 && p.y <= self.height
	}

	/// Screen offsets of the vertical and horizontal background grid lines.
	pub fn grid_lines(&self) -> (Vec<f64>, Vec<f64>) {
		let spacing = GRID_SPACING * self.scale;
		let lines = |offset: f64, extent: f64| {
			let mut v = Vec::new();
			let mut at = offset.rem_euclid(spacing);
			while at < extent {
				v.push(at);
				at += spacing;
			}
			v
		};
		(
			lines(-self.pan.x + self.drag.x + self.width / 2.0, self.width),
			lines(-self.pan.y + self.drag.y + self.height / 2.0, self.height),
		)
	}
}

fn segments_intersect(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
	let (dx1, dy1) = (a2.x - a1.x, a2.y - a1.y);
	let (dx2, dy2) = (b2.x - b1.x, b2.y - b1.y);
	let det = dx1 * dy2 - dy1 * dx2;
	if det == 0.0 {
		return false;
	}
	let t = ((b1.x - a1.x) * dy2 - (b1.y - a1.y) * dx2) / det;
	let u = ((b1.x - a1.x) * dy1 - (b1.y - a1.y) * dx1) / det;
	(0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)
}
