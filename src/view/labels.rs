//! Picks which node and edge labels to draw so that they do not pile up.

use std::collections::HashMap;
use std::f64::consts::FRAC_PI_2;

use super::interaction::Selection;
use super::palette::Palette;
use super::viewport::Viewport;
use crate::graph::geometry::EdgeGeometry;
use crate::graph::{Edge, ElementRef, Node, Point, PropertyRecord};

/// Labels are only shown wholesale at or above this scale.
pub const LABEL_SCALE_LIMIT: f64 = 1.0;
/// Estimated width of one character, in pixels.
pub const CHAR_WIDTH: f64 = 8.0;
/// Height of a label box, in pixels.
pub const LABEL_HEIGHT: f64 = 15.0;
/// Labels placed before ordinary ones stop being offered.
pub const MAX_NORMAL_LABELS: usize = 50;
/// Hard cap including hovered and clicked labels.
pub const MAX_LABELS: usize = 100;

/// Text colour of clicked elements.
pub const CLICKED_COLOR: &str = "#c62828";
/// Text colour of hovered elements.
pub const FOCUSED_COLOR: &str = "#1e88e5";
/// Text colour of everything else.
pub const NORMAL_COLOR: &str = "#90a4ae";

const NODE_LABEL_OFFSET: f64 = 12.0;
const LOOP_LABEL_OFFSET: f64 = 35.0;

/// Screen-space rectangle rotated about its centre.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabelRect {
	/// Centre on screen.
	pub center: Point,
	/// Width along the text.
	pub width: f64,
	/// Height across the text.
	pub height: f64,
	/// Rotation in radians.
	pub rotation: f64,
}

impl LabelRect {
	/// Box of `text` drawn with its bottom-centre at `anchor`.
	pub fn for_text(anchor: Point, text: &str, rotation: f64) -> Self {
		let half = LABEL_HEIGHT / 2.0;
		Self {
			center: Point::new(anchor.x + half * rotation.sin(), anchor.y - half * rotation.cos()),
			width: text.chars().count() as f64 * CHAR_WIDTH,
			height: LABEL_HEIGHT,
			rotation,
		}
	}

	fn axes(&self) -> [Point; 2] {
		let (sin, cos) = self.rotation.sin_cos();
		[Point::new(cos, sin), Point::new(-sin, cos)]
	}

	fn corners(&self) -> [Point; 4] {
		let [u, v] = self.axes();
		let (hw, hh) = (self.width / 2.0, self.height / 2.0);
		[(1.0, 1.0), (1.0, -1.0), (-1.0, -1.0), (-1.0, 1.0)].map(|(a, b)| {
			Point::new(
				self.center.x + u.x * hw * a + v.x * hh * b,
				self.center.y + u.y * hw * a + v.y * hh * b,
			)
		})
	}

	/// Whether screen point `p` lies inside.
	pub fn contains(&self, p: Point) -> bool {
		let [u, v] = self.axes();
		let (dx, dy) = (p.x - self.center.x, p.y - self.center.y);
		(dx * u.x + dy * u.y).abs() <= self.width / 2.0
			&& (dx * v.x + dy * v.y).abs() <= self.height / 2.0
	}

	/// Separating-axis test between two oriented rectangles.
	pub fn overlaps(&self, other: &LabelRect) -> bool {
		let (a, b) = (self.corners(), other.corners());
		let project = |corners: &[Point; 4], axis: Point| {
			corners
				.iter()
				.map(|c| c.x * axis.x + c.y * axis.y)
				.fold((f64::MAX, f64::MIN), |(lo, hi), d| (lo.min(d), hi.max(d)))
		};
		self.axes().into_iter().chain(other.axes()).all(|axis| {
			let (a_lo, a_hi) = project(&a, axis);
			let (b_lo, b_hi) = project(&b, axis);
			a_hi >= b_lo && b_hi >= a_lo
		})
	}
}

/// A label chosen for drawing this frame.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedLabel {
	/// Element the label names.
	pub target: ElementRef,
	/// Text to draw.
	pub text: String,
	/// Bottom-centre of the text on screen.
	pub anchor: Point,
	/// Box used for overlap and hit tests.
	pub rect: LabelRect,
	/// Text colour.
	pub color: &'static str,
	/// Whether the element is hovered or clicked; such labels skip overlap rejection.
	pub highlight: bool,
}

/// Fills `{prop}` placeholders from the element's property record. Without
/// a record, or without a template, the element id is shown.
pub fn format_label(template: Option<&str>, id: &str, record: Option<&PropertyRecord>) -> String {
	let Some(record) = record else {
		return id.to_string();
	};
	let Some(template) = template else {
		return id.to_string();
	};
	let mut out = String::with_capacity(template.len());
	let mut rest = template;
	while let Some(open) = rest.find('{') {
		out.push_str(&rest[..open]);
		let after = &rest[open + 1..];
		let key_len = after
			.find(|c: char| !(c.is_alphanumeric() || c == '_'))
			.unwrap_or(after.len());
		let key = &after[..key_len];
		if key_len > 0 && after[key_len..].starts_with('}') {
			match record.get(key) {
				Some(value) => out.push_str(&value),
				None => {
					out.push('{');
					out.push_str(key);
					out.push('}');
				}
			}
			rest = &after[key_len + 1..];
		} else {
			out.push('{');
			rest = after;
		}
	}
	out.push_str(rest);
	out
}

/// Everything label placement looks at for one frame.
pub struct LabelScene<'a> {
	/// Camera of this frame.
	pub viewport: &'a Viewport,
	/// Nodes by slot.
	pub nodes: &'a [Node],
	/// Edges by slot.
	pub edges: &'a [Edge],
	/// Geometry of the edges drawn this frame, keyed by edge slot.
	pub geometry: &'a HashMap<usize, EdgeGeometry>,
	/// Hovered and clicked elements.
	pub selection: &'a Selection,
	/// Node colours and hidden node labels.
	pub node_palette: &'a Palette,
	/// Edge colours and hidden edge labels.
	pub edge_palette: &'a Palette,
	/// Labels switched on by the user.
	pub show_labels: bool,
}

#[derive(Default)]
struct Placement {
	labels: Vec<PlacedLabel>,
}

impl Placement {
	fn offer(&mut self, label: PlacedLabel) {
		if label.highlight {
			if self.labels.len() < MAX_LABELS {
				self.labels.push(label);
			}
			return;
		}
		if self.labels.len() >= MAX_NORMAL_LABELS {
			return;
		}
		if !self.labels.iter().any(|l| l.rect.overlaps(&label.rect)) {
			self.labels.push(label);
		}
	}
}

fn color(clicked: bool, focused: bool) -> &'static str {
	if clicked {
		CLICKED_COLOR
	} else if focused {
		FOCUSED_COLOR
	} else {
		NORMAL_COLOR
	}
}

impl LabelScene<'_> {
	fn node_label(&self, node: &Node, text: &dyn Fn(&ElementRef, &str) -> String) -> Option<PlacedLabel> {
		if self.node_palette.is_hidden(&node.label) {
			return None;
		}
		let screen = self.viewport.world_to_screen(node.pos());
		if !self.viewport.contains_screen(screen) {
			return None;
		}
		let target = ElementRef::node(node.id.clone());
		let text = text(&target, &node.label);
		let anchor = Point::new(screen.x, screen.y - NODE_LABEL_OFFSET * self.viewport.scale());
		let clicked = self.selection.click_node.as_deref() == Some(node.id.as_str());
		let focused = self.selection.hover_node.as_deref() == Some(node.id.as_str());
		Some(PlacedLabel {
			rect: LabelRect::for_text(anchor, &text, 0.0),
			target,
			text,
			anchor,
			color: color(clicked, focused),
			highlight: clicked || focused,
		})
	}

	fn edge_label(
		&self,
		slot: usize,
		edge: &Edge,
		text: &dyn Fn(&ElementRef, &str) -> String,
	) -> Option<PlacedLabel> {
		if edge.is_connective() || self.edge_palette.is_hidden(&edge.label) {
			return None;
		}
		let source = self.nodes[edge.source_index].pos();
		let target = self.nodes[edge.target_index].pos();
		let mid = self.geometry.get(&slot).map_or(
			Point::new((source.x + target.x) / 2.0, (source.y + target.y) / 2.0),
			EdgeGeometry::midpoint,
		);
		let mut screen = self.viewport.world_to_screen(mid);
		if source == target {
			screen.y -= LOOP_LABEL_OFFSET * self.viewport.scale();
		}
		if !self.viewport.contains_screen(screen) {
			return None;
		}
		let mut angle = (target.y - source.y).atan2(target.x - source.x);
		if angle > FRAC_PI_2 {
			angle -= std::f64::consts::PI;
		}
		if angle < -FRAC_PI_2 {
			angle += std::f64::consts::PI;
		}
		let element = ElementRef::edge(edge.id.clone());
		let text = text(&element, &edge.label);
		let clicked = self.selection.click_edge.as_deref() == Some(edge.id.as_str());
		let focused = self.selection.hover_edge.as_deref() == Some(edge.id.as_str());
		Some(PlacedLabel {
			rect: LabelRect::for_text(screen, &text, angle),
			target: element,
			text,
			anchor: screen,
			color: color(clicked, focused),
			highlight: clicked || focused,
		})
	}

	/// Labels to draw, normal ones before highlighted ones. `text` renders
	/// an element's label text from its reference and graph label.
	pub fn place(&self, text: &dyn Fn(&ElementRef, &str) -> String) -> Vec<PlacedLabel> {
		let mut placement = Placement::default();
		let selection = self.selection;

		if self.show_labels && self.viewport.scale() >= LABEL_SCALE_LIMIT {
			for node in self.nodes {
				if let Some(label) = self.node_label(node, text) {
					placement.offer(label);
				}
			}
			for (slot, edge) in self.edges.iter().enumerate() {
				if let Some(label) = self.edge_label(slot, edge, text) {
					placement.offer(label);
				}
			}
		} else {
			for (slot, edge) in self.edges.iter().enumerate() {
				let selected = [&selection.click_edge, &selection.hover_edge]
					.into_iter()
					.flatten()
					.any(|id| *id == edge.id);
				if selected {
					if let Some(label) = self.edge_label(slot, edge, text) {
						placement.offer(label);
					}
				}
			}
			for id in [&selection.hover_node, &selection.click_node].into_iter().flatten() {
				if let Some(node) = self.nodes.iter().find(|n| &n.id == id) {
					if let Some(label) = self.node_label(node, text) {
						placement.offer(label);
					}
				}
			}
		}

		let mut labels = placement.labels;
		labels.sort_by_key(|l| l.highlight);
		labels
	}
}

/// Topmost label under a screen point.
pub fn label_at(labels: &[PlacedLabel], p: Point) -> Option<&PlacedLabel> {
	labels.iter().rev().find(|l| l.rect.contains(p))
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::config::UserConfigs;
	use crate::graph::GraphModel;
	use crate::graph::model::tests::chain;
	use crate::view::palette::PaletteKind;

	fn record() -> PropertyRecord {
		let serde_json::Value::Object(properties) = json!({"name": "Oslo", "code": "OSL"}) else {
			unreachable!()
		};
		PropertyRecord {
			id: "1".into(),
			label: "city".into(),
			properties,
		}
	}

	#[test]
	fn templates_fill_known_placeholders() {
		let r = record();
		assert_eq!(format_label(Some("{name} ({code})"), "1", Some(&r)), "Oslo (OSL)");
		assert_eq!(format_label(Some("{label}:{id}"), "1", Some(&r)), "city:1");
		assert_eq!(format_label(Some("{missing} {"), "1", Some(&r)), "{missing} {");
		assert_eq!(format_label(Some("{name}"), "1", None), "1");
		assert_eq!(format_label(None, "1", Some(&r)), "1");
	}

	#[test]
	fn rect_overlap() {
		let a = LabelRect {
			center: Point::new(0.0, 0.0),
			width: 40.0,
			height: 15.0,
			rotation: 0.0,
		};
		let near = LabelRect {
			center: Point::new(30.0, 5.0),
			..a
		};
		let far = LabelRect {
			center: Point::new(45.0, 0.0),
			..a
		};
		assert!(a.overlaps(&near) && near.overlaps(&a));
		assert!(!a.overlaps(&far));

		// an upright box beside the first clears it; tilted toward horizontal it reaches in
		let upright = LabelRect {
			center: Point::new(28.0, 0.0),
			rotation: FRAC_PI_2,
			..a
		};
		assert!(!a.overlaps(&upright));
		let tilted = LabelRect {
			rotation: 0.3,
			..upright
		};
		assert!(a.overlaps(&tilted));
	}

	#[test]
	fn rect_contains_rotated_points() {
		let r = LabelRect {
			center: Point::new(0.0, 0.0),
			width: 40.0,
			height: 10.0,
			rotation: FRAC_PI_2,
		};
		assert!(r.contains(Point::new(0.0, 18.0)));
		assert!(!r.contains(Point::new(18.0, 0.0)));
	}

	struct Fixture {
		model: GraphModel,
		viewport: Viewport,
		geometry: HashMap<usize, EdgeGeometry>,
		nodes: Palette,
		edges: Palette,
	}

	fn fixture(count: usize) -> Fixture {
		let ids: Vec<String> = (0..count).map(|i| format!("n{i}")).collect();
		let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
		let mut model = GraphModel::new();
		model.merge_fragment(&chain(&refs));
		for (i, node) in model.nodes_mut().iter_mut().enumerate() {
			node.x = (i % 10) as f64 * 60.0 - 270.0;
			node.y = (i / 10) as f64 * 40.0 - 200.0;
		}
		let configs = UserConfigs::default();
		let mut nodes = Palette::new(PaletteKind::Node);
		let mut edges = Palette::new(PaletteKind::Edge);
		nodes.observe(model.nodes().iter().map(|n| n.label.as_str()), &configs);
		edges.observe(model.edges().iter().map(|e| e.label.as_str()), &configs);
		Fixture {
			model,
			viewport: Viewport::new(800.0, 600.0, false),
			geometry: HashMap::new(),
			nodes,
			edges,
		}
	}

	impl Fixture {
		fn place(&self, selection: &Selection, show_labels: bool) -> Vec<PlacedLabel> {
			LabelScene {
				viewport: &self.viewport,
				nodes: self.model.nodes(),
				edges: self.model.edges(),
				geometry: &self.geometry,
				selection,
				node_palette: &self.nodes,
				edge_palette: &self.edges,
				show_labels,
			}
			.place(&|element, _| element.id.clone())
		}
	}

	#[test]
	fn budget_and_no_overlap() {
		let f = fixture(100);
		let labels = f.place(&Selection::default(), true);
		assert!(labels.len() <= MAX_NORMAL_LABELS);
		assert!(!labels.is_empty());
		for (i, a) in labels.iter().enumerate() {
			for b in &labels[i + 1..] {
				assert!(!a.rect.overlaps(&b.rect), "{} overlaps {}", a.text, b.text);
			}
		}
	}

	#[test]
	fn highlighted_labels_bypass_overlap() {
		let f = fixture(100);
		let selection = Selection {
			click_node: Some("n99".into()),
			hover_node: Some("n98".into()),
			..Selection::default()
		};
		let labels = f.place(&selection, true);
		let clicked = labels.iter().find(|l| l.target.id == "n99").unwrap();
		assert_eq!(clicked.color, CLICKED_COLOR);
		let hovered = labels.iter().find(|l| l.target.id == "n98").unwrap();
		assert_eq!(hovered.color, FOCUSED_COLOR);
		assert!(labels.last().unwrap().highlight);
	}

	#[test]
	fn labels_off_shows_only_selection() {
		let f = fixture(4);
		let edge_id = f.model.edges()[0].id.clone();
		let selection = Selection {
			click_node: Some("n1".into()),
			hover_edge: Some(edge_id.clone()),
			..Selection::default()
		};
		let labels = f.place(&selection, false);
		let targets: Vec<&str> = labels.iter().map(|l| l.target.id.as_str()).collect();
		assert_eq!(targets, vec![edge_id.as_str(), "n1"]);
	}

	#[test]
	fn hidden_and_offscreen_are_skipped() {
		let mut f = fixture(3);
		f.model.nodes_mut()[2].x = 5000.0;
		f.nodes.toggle_hidden("city");
		let labels = f.place(&Selection::default(), true);
		assert!(labels.iter().all(|l| l.target.kind == crate::graph::ElementKind::Edge));
		assert_eq!(labels.len(), 1);
	}

	#[test]
	fn edge_label_reads_left_to_right() {
		let mut f = fixture(2);
		f.model.nodes_mut()[0].x = 100.0;
		f.model.nodes_mut()[0].y = 0.0;
		f.model.nodes_mut()[1].x = -100.0;
		f.model.nodes_mut()[1].y = 0.0;
		let labels = f.place(&Selection::default(), true);
		let edge = labels.iter().find(|l| l.target.kind == crate::graph::ElementKind::Edge).unwrap();
		assert!(edge.rect.rotation.abs() < 1e-9);
		assert_eq!(label_at(&labels, edge.rect.center).unwrap().target, edge.target);
	}
}
