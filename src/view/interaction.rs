//! Pointer gestures, hit-testing and the selection state machine.
//!
//! Handlers take canvas-relative screen points and return [`Command`]s for
//! whoever owns the model, the layout and the outside world.

use std::collections::HashMap;
use std::f64::consts::PI;

use super::labels::{LABEL_SCALE_LIMIT, PlacedLabel, label_at};
use super::palette::Palette;
use super::viewport::Viewport;
use crate::config::{ExpandPreset, ExpandRequest, UserConfigs};
use crate::graph::geometry::EdgeGeometry;
use crate::graph::{ElementKind, ElementRef, GraphModel, Node, Point};

/// Squared pointer travel before a node press turns into a drag.
pub const DRAG_THRESHOLD_SQ: f64 = 25.0;
/// Largest angle between pointer and edge direction that focuses the edge.
pub const EDGE_FOCUS_TOLERANCE: f64 = PI / 45.0;

/// World radius within which a node counts as under the pointer.
pub fn hit_radius(scale: f64) -> f64 {
	12.0 + 4.0 / scale
}

/// Hovered and clicked elements. A node and an edge can each be both.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
	/// Node under the pointer.
	pub hover_node: Option<String>,
	/// Node last clicked.
	pub click_node: Option<String>,
	/// Edge under the pointer or focused from a selected node.
	pub hover_edge: Option<String>,
	/// Edge last clicked.
	pub click_edge: Option<String>,
}

impl Selection {
	/// Forgets every hovered and clicked element.
	pub fn clear(&mut self) {
		*self = Self::default();
	}

	/// Drops references to elements the model no longer has.
	pub fn retain_existing(&mut self, model: &GraphModel) {
		for slot in [&mut self.hover_node, &mut self.click_node] {
			if slot.as_deref().is_some_and(|id| !model.contains_node(id)) {
				*slot = None;
			}
		}
		for slot in [&mut self.hover_edge, &mut self.click_edge] {
			if slot.as_deref().is_some_and(|id| !model.contains_edge(id)) {
				*slot = None;
			}
		}
	}

	/// Whether node `id` is hovered or clicked.
	pub fn is_highlighted_node(&self, id: &str) -> bool {
		self.hover_node.as_deref() == Some(id) || self.click_node.as_deref() == Some(id)
	}

	/// The element whose details should be shown.
	pub fn clicked(&self) -> Option<ElementRef> {
		self.click_edge
			.as_ref()
			.map(|id| ElementRef::edge(id.clone()))
			.or_else(|| self.click_node.as_ref().map(|id| ElementRef::node(id.clone())))
	}
}

/// Mouse button of a press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Button {
	/// Left button.
	Primary,
	/// Right button, which opens menus.
	Secondary,
}

/// What a context menu was opened on.
#[derive(Clone, Debug, PartialEq)]
pub enum MenuKind {
	/// A node.
	Node {
		/// Id of the node.
		node_id: String,
	},
	/// Empty canvas.
	Canvas,
}

/// An open context menu.
#[derive(Clone, Debug, PartialEq)]
pub struct Menu {
	/// Node or canvas.
	pub kind: MenuKind,
	/// Screen point the menu was opened at.
	pub position: Point,
}

/// Entries of the node context menu.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeAction {
	/// Center the camera on the node.
	Center,
	/// Select the node and show its details.
	View,
	/// Expand with these parameters and remember them for the node's label.
	Expand(ExpandPreset),
	/// Expand along every edge, unfiltered.
	ExpandAll,
	/// Remove the node and its edges.
	Remove,
}

/// Entries of the canvas context menu.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CanvasAction {
	/// Back to unit scale and no pan.
	ResetView,
	/// Lay out the whole graph again.
	RefreshLayout,
	/// Enter or leave full screen.
	ToggleFullscreen,
	/// Switch property prefetch on or off.
	TogglePrefetch,
	/// Keep the graph fitted to the canvas.
	ScaleToFit,
	/// Switch labels on or off, zooming in far enough to show them.
	ToggleLabels,
	/// Switch the grid on or off.
	ToggleGrid,
	/// Remove nodes without edges.
	PruneUnconnected,
	/// Download the canvas as a PNG.
	ExportImage,
}

/// Requests for collaborators outside the canvas.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
	/// Show the element's properties.
	ViewDetails(ElementRef),
	/// Fix a dragged node at a world position.
	PinNode {
		/// Id of the node.
		id: String,
		/// Where it was dropped.
		pos: Point,
	},
	/// Ask the host for a node's neighbourhood.
	Expand(ExpandRequest),
	/// Remove a node and its edges.
	RemoveNode(String),
	/// Lay out the whole graph again.
	Relayout,
	/// Remove nodes without edges.
	PruneUnconnected,
	/// Enter or leave full screen.
	ToggleFullscreen,
	/// Switch property prefetch on or off.
	TogglePrefetch,
	/// Download the canvas as a PNG.
	ExportImage,
	/// Persist user preferences.
	SaveConfigs,
}

#[derive(Clone, Debug, Default, PartialEq)]
enum Gesture {
	#[default]
	Idle,
	Panning {
		start: Point,
	},
	NodePress {
		node_id: String,
		start: Point,
		confirmed: bool,
	},
}

/// Read-only view of what is on the canvas this frame.
pub struct Scene<'a> {
	/// The merged graph.
	pub model: &'a GraphModel,
	/// Geometry of the edges drawn this frame, by slot.
	pub geometry: &'a HashMap<usize, EdgeGeometry>,
	/// Node colours and hidden node labels.
	pub node_palette: &'a Palette,
	/// Edge colours and hidden edge labels.
	pub edge_palette: &'a Palette,
	/// Labels placed this frame.
	pub labels: &'a [PlacedLabel],
}

/// Nearest visible node to `world`, by exhaustive scan.
pub fn nearest_node<'a>(nodes: &'a [Node], palette: &Palette, world: Point) -> Option<&'a Node> {
	nodes
		.iter()
		.filter(|n| !palette.is_hidden(&n.label))
		.min_by(|a, b| a.pos().dist_sq(world).total_cmp(&b.pos().dist_sq(world)))
}

/// Signed difference between two angles, in `[-PI, PI]`.
pub fn angle_between(a: f64, b: f64) -> f64 {
	(a - b + PI).rem_euclid(2.0 * PI) - PI
}

/// The edge at `anchor` that points most nearly toward `world`, if any
/// points within [`EDGE_FOCUS_TOLERANCE`].
pub fn focus_edge_by_direction(scene: &Scene<'_>, anchor: &Node, world: Point) -> Option<String> {
	let nodes = scene.model.nodes();
	let pointer = (world.y - anchor.y).atan2(world.x - anchor.x);
	scene
		.model
		.incident_edges(&anchor.id)
		.filter(|edge| !scene.edge_palette.is_hidden(&edge.label))
		.filter_map(|edge| {
			let slot = scene.model.edge_slot(&edge.id)?;
			let from_source = edge.source_id == anchor.id;
			let toward = match scene.geometry.get(&slot) {
				Some(geometry) if !geometry.is_self_loop() => geometry.heading_point(from_source),
				_ if from_source => nodes[edge.target_index].pos(),
				_ => nodes[edge.source_index].pos(),
			};
			if toward == anchor.pos() {
				return None;
			}
			let direction = (toward.y - anchor.y).atan2(toward.x - anchor.x);
			let deviation = angle_between(pointer, direction).abs();
			(deviation < EDGE_FOCUS_TOLERANCE).then(|| (deviation, edge.id.clone()))
		})
		.min_by(|a, b| a.0.total_cmp(&b.0))
		.map(|(_, id)| id)
}

/// Selection, menus and the gesture in progress.
#[derive(Clone, Debug, PartialEq)]
pub struct Interaction {
	/// Hovered and clicked elements.
	pub selection: Selection,
	/// Open context menu, if any.
	pub menu: Option<Menu>,
	/// Labels switched on.
	pub show_labels: bool,
	/// Grid switched on.
	pub show_grid: bool,
	/// Ids matched by the last property search.
	pub search_matches: Vec<String>,
	/// Screen point the details panel hangs from.
	pub details_anchor: Point,
	gesture: Gesture,
}

impl Interaction {
	/// Idle state with the given toggles.
	pub fn new(show_labels: bool, show_grid: bool) -> Self {
		Self {
			selection: Selection::default(),
			menu: None,
			show_labels,
			show_grid,
			search_matches: Vec::new(),
			details_anchor: Point::default(),
			gesture: Gesture::Idle,
		}
	}

	/// Whether an empty-canvas drag is moving the camera.
	pub fn is_panning(&self) -> bool {
		matches!(self.gesture, Gesture::Panning { .. })
	}

	/// Whether a node is being dragged.
	pub fn is_dragging_node(&self) -> bool {
		matches!(self.gesture, Gesture::NodePress { confirmed: true, .. })
	}

	/// Whether labels are drawn wholesale at the current scale.
	pub fn labels_shown(&self, viewport: &Viewport) -> bool {
		self.show_labels && viewport.scale() >= LABEL_SCALE_LIMIT
	}

	/// CSS cursor for the canvas.
	pub fn cursor(&self) -> &'static str {
		if self.selection.hover_edge.is_some() {
			"pointer"
		} else {
			"default"
		}
	}

	fn node_under(&self, scene: &Scene<'_>, viewport: &Viewport, p: Point) -> Option<String> {
		let world = viewport.screen_to_world(p);
		let node = nearest_node(scene.model.nodes(), scene.node_palette, world)?;
		let r = hit_radius(viewport.scale());
		(node.pos().dist_sq(world) <= r * r).then(|| node.id.clone())
	}

	/// Closes any open menu.
	pub fn close_menu(&mut self) {
		self.menu = None;
	}

	/// Handles a press at screen point `p`.
	pub fn pointer_down(
		&mut self,
		scene: &Scene<'_>,
		viewport: &mut Viewport,
		p: Point,
		button: Button,
	) -> Vec<Command> {
		if self.menu.is_some() {
			if button == Button::Primary {
				self.close_menu();
			}
			return Vec::new();
		}
		if !viewport.contains_screen(p) {
			return Vec::new();
		}
		let hit = self.node_under(scene, viewport, p);

		if button == Button::Secondary {
			let kind = match hit {
				Some(node_id) => MenuKind::Node { node_id },
				None => MenuKind::Canvas,
			};
			self.menu = Some(Menu { kind, position: p });
			return Vec::new();
		}

		if let Some(label) = label_at(scene.labels, p) {
			return self.click_element(label.target.clone(), p);
		}

		if let Some(node_id) = hit {
			self.gesture = Gesture::NodePress {
				node_id,
				start: p,
				confirmed: false,
			};
			return Vec::new();
		}

		self.gesture = Gesture::Panning { start: p };
		self.selection.click_node = None;
		self.selection.hover_node = None;
		let focused = self.selection.hover_edge.take();
		if focused.is_some() && focused == self.selection.click_edge {
			self.selection.click_edge = None;
			return Vec::new();
		}
		self.selection.click_edge = focused;
		match &self.selection.click_edge {
			Some(id) => {
				self.details_anchor = p;
				vec![Command::ViewDetails(ElementRef::edge(id.clone()))]
			}
			None => Vec::new(),
		}
	}

	/// Handles pointer movement to `p`.
	pub fn pointer_move(
		&mut self,
		scene: &Scene<'_>,
		viewport: &mut Viewport,
		p: Point,
	) -> Vec<Command> {
		if self.menu.is_some() {
			return Vec::new();
		}
		match &mut self.gesture {
			Gesture::Panning { start } => {
				viewport.set_drag(Point::new(p.x - start.x, p.y - start.y));
				return Vec::new();
			}
			Gesture::NodePress {
				node_id,
				start,
				confirmed,
			} => {
				if !*confirmed && p.dist_sq(*start) < DRAG_THRESHOLD_SQ {
					return Vec::new();
				}
				*confirmed = true;
				let id = node_id.clone();
				self.selection.hover_node = Some(id.clone());
				self.selection.click_node = None;
				return vec![Command::PinNode {
					id,
					pos: viewport.screen_to_world(p),
				}];
			}
			Gesture::Idle => {}
		}
		if !viewport.contains_screen(p) {
			return Vec::new();
		}

		if let Some(label) = label_at(scene.labels, p) {
			self.hover_element(&label.target);
			return Vec::new();
		}
		if let Some(id) = self.node_under(scene, viewport, p) {
			if self.selection.click_node.as_deref() != Some(id.as_str()) {
				self.selection.hover_node = Some(id);
			}
			self.selection.hover_edge = None;
			return Vec::new();
		}
		let anchor = self
			.selection
			.click_node
			.as_deref()
			.or(self.selection.hover_node.as_deref())
			.and_then(|id| scene.model.node(id));
		if let Some(anchor) = anchor {
			self.selection.hover_edge =
				focus_edge_by_direction(scene, anchor, viewport.screen_to_world(p));
			if self.selection.hover_edge.is_some() {
				self.details_anchor = p;
			}
		}
		Vec::new()
	}

	/// Ends the gesture in progress at `p`.
	pub fn pointer_up(&mut self, viewport: &mut Viewport, p: Point) -> Vec<Command> {
		match std::mem::take(&mut self.gesture) {
			Gesture::Panning { .. } => {
				viewport.commit_drag();
				Vec::new()
			}
			Gesture::NodePress {
				node_id,
				confirmed: false,
				..
			} => self.click_element(ElementRef::node(node_id), p),
			_ => Vec::new(),
		}
	}

	/// Zooms around `p`, in when `delta_y` is negative.
	pub fn wheel(&mut self, viewport: &mut Viewport, p: Point, delta_y: f64) {
		viewport.zoom_at(p, delta_y < 0.0);
	}

	fn hover_element(&mut self, element: &ElementRef) {
		let (hover, click) = match element.kind {
			ElementKind::Vertex => (&mut self.selection.hover_node, &self.selection.click_node),
			ElementKind::Edge => (&mut self.selection.hover_edge, &self.selection.click_edge),
		};
		if click.as_deref() != Some(element.id.as_str()) {
			*hover = Some(element.id.clone());
		}
	}

	/// Makes `element` the clicked selection.
	pub fn click_element(&mut self, element: ElementRef, p: Point) -> Vec<Command> {
		self.selection.clear();
		match element.kind {
			ElementKind::Vertex => self.selection.click_node = Some(element.id.clone()),
			ElementKind::Edge => self.selection.click_edge = Some(element.id.clone()),
		}
		self.details_anchor = p;
		vec![Command::ViewDetails(element)]
	}

	/// Runs a node menu entry on the menu's node and closes the menu.
	pub fn node_action(
		&mut self,
		action: NodeAction,
		model: &GraphModel,
		viewport: &mut Viewport,
		configs: &mut UserConfigs,
	) -> Vec<Command> {
		let Some(Menu {
			kind: MenuKind::Node { node_id },
			position,
		}) = self.menu.take()
		else {
			return Vec::new();
		};
		let Some(node) = model.node(&node_id) else {
			return Vec::new();
		};
		match action {
			NodeAction::Center => {
				viewport.center_on(node.pos());
				Vec::new()
			}
			NodeAction::View => self.click_element(ElementRef::node(node_id), position),
			NodeAction::Expand(preset) => {
				configs.set_expand_preset(&node.label, &preset);
				vec![
					Command::SaveConfigs,
					Command::Expand(ExpandRequest::from_preset(node_id, &preset)),
				]
			}
			NodeAction::ExpandAll => vec![Command::Expand(ExpandRequest::all(node_id))],
			NodeAction::Remove => {
				self.selection.clear();
				vec![Command::RemoveNode(node_id)]
			}
		}
	}

	/// Runs a canvas menu entry and closes the menu.
	pub fn canvas_action(&mut self, action: CanvasAction, viewport: &mut Viewport) -> Vec<Command> {
		self.close_menu();
		match action {
			CanvasAction::ResetView => viewport.reset(),
			CanvasAction::RefreshLayout => {
				self.selection.clear();
				return vec![Command::Relayout];
			}
			CanvasAction::ToggleFullscreen => return vec![Command::ToggleFullscreen],
			CanvasAction::TogglePrefetch => return vec![Command::TogglePrefetch],
			CanvasAction::ScaleToFit => viewport.enable_fit(),
			CanvasAction::ToggleLabels => {
				let enable = !self.labels_shown(viewport);
				if enable && viewport.scale() < LABEL_SCALE_LIMIT {
					viewport.set_scale(LABEL_SCALE_LIMIT);
				}
				self.show_labels = enable;
			}
			CanvasAction::ToggleGrid => self.show_grid = !self.show_grid,
			CanvasAction::PruneUnconnected => return vec![Command::PruneUnconnected],
			CanvasAction::ExportImage => return vec![Command::ExportImage],
		}
		Vec::new()
	}

	/// Highlights search matches; a single node match is focused and centred.
	pub fn apply_search(&mut self, ids: Vec<String>, model: &GraphModel, viewport: &mut Viewport) {
		if let [id] = ids.as_slice() {
			if let Some(node) = model.node(id) {
				self.selection.hover_node = Some(node.id.clone());
				self.selection.click_node = None;
				viewport.center_on(node.pos());
			}
		}
		self.search_matches = ids;
	}

	/// Forgets anything that refers to elements no longer in `model`.
	pub fn retain_existing(&mut self, model: &GraphModel) {
		self.selection.retain_existing(model);
		if let Some(Menu {
			kind: MenuKind::Node { node_id },
			..
		}) = &self.menu
		{
			if !model.contains_node(node_id) {
				self.menu = None;
			}
		}
		if let Gesture::NodePress { node_id, .. } = &self.gesture {
			if !model.contains_node(node_id) {
				self.gesture = Gesture::Idle;
			}
		}
	}
}
