use std::collections::HashMap;

use serde_json::Value;

use super::types::{DetailsView, LegendEntry, MenuView, OverlayView, StatusView, UiAction};
use crate::config::{ExpandRequest, GraphOptions, UserConfigs};
use crate::graph::geometry::{self, EdgeGeometry};
use crate::graph::{DecodeError, ElementRef, PATH_EDGE_PREFIX, Point, decode, search, value_to_text};
use crate::session::prefetch::{Batch, DetailsTicket, PrefetchStatus};
use crate::session::{Details, DetailsLoader, MergeCoordinator, PropsPrefetcher};
use crate::view::labels::format_label;
use crate::view::{
	Button, Command, Interaction, LabelScene, Menu, MenuKind, Palette, PaletteKind, PlacedLabel, Scene,
	Viewport,
};

/// Upper bound on edges given geometry and drawn in one frame.
pub const MAX_DRAWN_EDGES: usize = 3000;

/// Work the canvas state hands to the component, which owns the browser.
#[derive(Clone, Debug, PartialEq)]
pub enum Outbound {
	Expand(ExpandRequest),
	FetchDetails(DetailsTicket),
	ToggleFullscreen,
	ExportImage,
	SaveConfigs,
}

pub struct GraphVisState {
	pub session: MergeCoordinator,
	pub viewport: Viewport,
	pub interaction: Interaction,
	pub node_palette: Palette,
	pub edge_palette: Palette,
	pub configs: UserConfigs,
	pub prefetch: PropsPrefetcher,
	pub details: DetailsLoader,
	pub watermark: Option<String>,
	pub fullscreen: bool,
	search_term: String,
	// label formats chosen for this session only
	format_overrides: HashMap<String, String>,
	geometry: HashMap<usize, EdgeGeometry>,
	drawn_edges: Vec<usize>,
	labels: Vec<PlacedLabel>,
}

impl GraphVisState {
	pub fn new(
		options: &GraphOptions,
		configs: UserConfigs,
		width: f64,
		height: f64,
		clock: Option<fn() -> f64>,
	) -> Self {
		Self {
			session: MergeCoordinator::from_options(options, clock),
			viewport: Viewport::new(width, height, options.scale_to_fit),
			interaction: Interaction::new(options.show_labels, options.show_grid),
			node_palette: Palette::new(PaletteKind::Node),
			edge_palette: Palette::new(PaletteKind::Edge),
			configs,
			prefetch: PropsPrefetcher::new(options.prefetch_page_size),
			details: DetailsLoader::new(),
			watermark: options.watermark_text.clone(),
			fullscreen: false,
			search_term: String::new(),
			format_overrides: HashMap::new(),
			geometry: HashMap::new(),
			drawn_edges: Vec::new(),
			labels: Vec::new(),
		}
	}

	pub fn geometry(&self) -> &HashMap<usize, EdgeGeometry> {
		&self.geometry
	}

	/// Edge slots drawn this frame, in draw order.
	pub fn drawn_edges(&self) -> &[usize] {
		&self.drawn_edges
	}

	pub fn labels(&self) -> &[PlacedLabel] {
		&self.labels
	}

	pub fn palette(&self, kind: PaletteKind) -> &Palette {
		match kind {
			PaletteKind::Node => &self.node_palette,
			PaletteKind::Edge => &self.edge_palette,
		}
	}

	/// Decodes one query response and merges it into the graph.
	pub fn ingest(&mut self, response: &Value) -> Result<(), DecodeError> {
		let fragment = decode(response)?;
		if self.session.on_new_fragment(fragment).is_some() {
			self.interaction.close_menu();
		}
		let model = self.session.model();
		self.node_palette
			.observe(model.nodes().iter().map(|n| n.label.as_str()), &self.configs);
		self.edge_palette
			.observe(model.edges().iter().map(|e| e.label.as_str()), &self.configs);
		self.refresh_details();
		Ok(())
	}

	pub fn clear(&mut self) {
		self.session.clear();
		self.node_palette.clear();
		self.edge_palette.clear();
		self.prefetch.reset();
		self.details.clear();
		self.interaction.selection.clear();
		self.interaction.search_matches.clear();
		self.interaction.close_menu();
		self.geometry.clear();
		self.drawn_edges.clear();
		self.labels.clear();
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.viewport.resize(width, height);
	}

	/// Advances the layout and rebuilds this frame's geometry and labels.
	pub fn frame(&mut self) {
		self.session.tick();
		let model = self.session.model();
		self.viewport.refit(model.nodes().iter().map(|n| n.pos()));
		self.resolve_geometry();
		self.place_labels();
	}

	fn resolve_geometry(&mut self) {
		let model = self.session.model();
		let (nodes, edges) = (model.nodes(), model.edges());
		let visible: Vec<usize> = edges
			.iter()
			.enumerate()
			.filter(|(_, e)| {
				!self.edge_palette.is_hidden(&e.label)
					&& !self.node_palette.is_hidden(&nodes[e.source_index].label)
					&& !self.node_palette.is_hidden(&nodes[e.target_index].label)
			})
			.filter(|(_, e)| {
				self.viewport
					.is_edge_on_screen(nodes[e.source_index].pos(), nodes[e.target_index].pos())
			})
			.map(|(slot, _)| slot)
			.collect();
		let resolved = geometry::resolve_capped(edges, nodes, &visible, MAX_DRAWN_EDGES);
		self.drawn_edges = resolved.iter().map(|g| g.slot).collect();
		self.geometry = resolved.into_iter().map(|g| (g.slot, g)).collect();
	}

	fn place_labels(&mut self) {
		let model = self.session.model();
		let scene = LabelScene {
			viewport: &self.viewport,
			nodes: model.nodes(),
			edges: model.edges(),
			geometry: &self.geometry,
			selection: &self.interaction.selection,
			node_palette: &self.node_palette,
			edge_palette: &self.edge_palette,
			show_labels: self.interaction.show_labels,
		};
		let text = |element: &ElementRef, label: &str| self.label_text(element, label);
		self.labels = scene.place(&text);
	}

	pub fn label_format(&self, label: &str) -> Option<&str> {
		self.format_overrides
			.get(label)
			.map(String::as_str)
			.or_else(|| self.configs.label_format(label))
	}

	fn label_text(&self, element: &ElementRef, label: &str) -> String {
		format_label(self.label_format(label), &element.id, self.session.record(&element.id))
	}

	pub fn pointer_down(&mut self, p: Point, button: Button) -> Vec<Outbound> {
		let scene = Scene {
			model: self.session.model(),
			geometry: &self.geometry,
			node_palette: &self.node_palette,
			edge_palette: &self.edge_palette,
			labels: &self.labels,
		};
		let commands = self.interaction.pointer_down(&scene, &mut self.viewport, p, button);
		self.apply(commands)
	}

	pub fn pointer_move(&mut self, p: Point) -> Vec<Outbound> {
		let scene = Scene {
			model: self.session.model(),
			geometry: &self.geometry,
			node_palette: &self.node_palette,
			edge_palette: &self.edge_palette,
			labels: &self.labels,
		};
		let commands = self.interaction.pointer_move(&scene, &mut self.viewport, p);
		self.apply(commands)
	}

	pub fn pointer_up(&mut self, p: Point) -> Vec<Outbound> {
		let commands = self.interaction.pointer_up(&mut self.viewport, p);
		self.apply(commands)
	}

	pub fn wheel(&mut self, p: Point, delta_y: f64) {
		if self.interaction.menu.is_none() {
			self.interaction.wheel(&mut self.viewport, p, delta_y);
		}
	}

	pub fn dispatch(&mut self, action: UiAction) -> Vec<Outbound> {
		match action {
			UiAction::Canvas(action) => {
				let commands = self.interaction.canvas_action(action, &mut self.viewport);
				self.apply(commands)
			}
			UiAction::Node(action) => {
				let commands = self.interaction.node_action(
					action,
					self.session.model(),
					&mut self.viewport,
					&mut self.configs,
				);
				self.apply(commands)
			}
			UiAction::CloseMenu => {
				self.interaction.close_menu();
				Vec::new()
			}
			UiAction::ToggleHidden { kind, label } => {
				match kind {
					PaletteKind::Node => self.node_palette.toggle_hidden(&label),
					PaletteKind::Edge => self.edge_palette.toggle_hidden(&label),
				}
				Vec::new()
			}
			UiAction::SetColor { kind, label, color } => {
				let palette = match kind {
					PaletteKind::Node => &mut self.node_palette,
					PaletteKind::Edge => &mut self.edge_palette,
				};
				palette.set_color(&label, color, &mut self.configs);
				vec![Outbound::SaveConfigs]
			}
			UiAction::SetFormat {
				label,
				format,
				remember,
			} => {
				if remember {
					self.format_overrides.remove(&label);
					self.configs.set_label_format(&label, &format);
					return vec![Outbound::SaveConfigs];
				}
				self.format_overrides.insert(label, format);
				Vec::new()
			}
			UiAction::SearchInput(term) => {
				self.search_term = term;
				Vec::new()
			}
			UiAction::Search(term) => {
				let ids = search::search(&term, self.session.records());
				self.search_term = term;
				self.interaction
					.apply_search(ids, self.session.model(), &mut self.viewport);
				Vec::new()
			}
			UiAction::Layout(kind) => {
				self.interaction.selection.clear();
				self.session.relayout(Some(kind));
				Vec::new()
			}
			UiAction::Clear => {
				self.clear();
				Vec::new()
			}
		}
	}

	fn apply(&mut self, commands: Vec<Command>) -> Vec<Outbound> {
		let mut out = Vec::new();
		for command in commands {
			match command {
				Command::ViewDetails(element) => {
					if let Some(ticket) = self.details.request(element, self.session.records()) {
						out.push(Outbound::FetchDetails(ticket));
					}
				}
				Command::PinNode { id, pos } => {
					self.session.pin_manually(&id, pos);
				}
				Command::Expand(request) => out.push(Outbound::Expand(request)),
				Command::RemoveNode(id) => {
					self.session.remove_node(&id);
					self.after_structure_change();
				}
				Command::Relayout => {
					self.session.relayout(None);
				}
				Command::PruneUnconnected => {
					self.session.prune_unconnected();
					self.after_structure_change();
				}
				Command::ToggleFullscreen => {
					self.fullscreen = !self.fullscreen;
					out.push(Outbound::ToggleFullscreen);
				}
				Command::TogglePrefetch => self.prefetch.toggle(),
				Command::ExportImage => out.push(Outbound::ExportImage),
				Command::SaveConfigs => out.push(Outbound::SaveConfigs),
			}
		}
		out
	}

	fn after_structure_change(&mut self) {
		self.interaction.retain_existing(self.session.model());
		let model = self.session.model();
		self.interaction.search_matches.retain(|id| model.contains_node(id));
		self.refresh_details();
	}

	// the panel follows the clicked element, and empties when it goes away
	fn refresh_details(&mut self) {
		let shown = match self.details.details() {
			Details::Loading(element) | Details::Unavailable(element) => Some(element.id.clone()),
			Details::Ready(record) => Some(record.id.clone()),
			Details::Empty => None,
		};
		let model = self.session.model();
		if let Some(id) = shown {
			if !model.contains_node(&id) && !model.contains_edge(&id) {
				self.details.clear();
			}
		}
	}

	pub fn next_prefetch(&mut self) -> Option<Batch> {
		self.prefetch.next_batch(self.session.model(), self.session.records())
	}

	/// Snapshot of everything the HTML overlays show.
	pub fn overlay(&self) -> OverlayView {
		let model = self.session.model();
		let prefetch = self.prefetch.status(model, self.session.records());
		OverlayView {
			menu: self.interaction.menu.as_ref().map(|menu| self.menu_view(menu)),
			details: self.details_view(),
			details_anchor: self.interaction.details_anchor,
			legend: self.legend(),
			suggestions: if self.search_term.is_empty() {
				Vec::new()
			} else {
				search::suggestions(&self.search_term, self.session.records().values())
			},
			search_term: self.search_term.clone(),
			search_matches: self.interaction.search_matches.len(),
			status: StatusView {
				nodes: self.session.node_count(),
				edges: self.session.edge_count(),
				running: self.session.is_running(),
				layout: self.session.layout_kind(),
				prefetch: match prefetch {
					PrefetchStatus::Running(p) | PrefetchStatus::Stalled(p) => Some((p.done, p.total)),
					PrefetchStatus::Disabled | PrefetchStatus::Done(_) => None,
				},
				prefetch_stalled: matches!(prefetch, PrefetchStatus::Stalled(_)),
			},
			cursor: if self.session.is_running() {
				"wait"
			} else {
				self.interaction.cursor()
			},
			fullscreen: self.fullscreen,
		}
	}

	fn menu_view(&self, menu: &Menu) -> MenuView {
		match &menu.kind {
			MenuKind::Node { node_id } => {
				let model = self.session.model();
				let label = model.node(node_id).map(|n| n.label.as_str()).unwrap_or_default();
				let mut edge_labels: Vec<String> = model
					.incident_edges(node_id)
					.filter(|e| !e.is_connective())
					.map(|e| e.label.clone())
					.collect();
				edge_labels.sort();
				edge_labels.dedup();
				MenuView::Node {
					position: menu.position,
					node_id: node_id.clone(),
					preset: self.configs.expand_preset(label).unwrap_or_default(),
					edge_labels,
				}
			}
			MenuKind::Canvas => MenuView::Canvas {
				position: menu.position,
				show_labels: self.interaction.labels_shown(&self.viewport),
				show_grid: self.interaction.show_grid,
				fit: self.viewport.is_fit_active(),
				prefetch: self.prefetch.is_enabled(),
				fullscreen: self.fullscreen,
			},
		}
	}

	fn details_view(&self) -> DetailsView {
		let Some(element) = self.interaction.selection.clicked() else {
			return DetailsView::Hidden;
		};
		match self.details.details() {
			Details::Ready(record) if record.id == element.id => DetailsView::Ready {
				rows: record
					.properties
					.iter()
					.map(|(k, v)| (k.clone(), value_to_text(v)))
					.collect(),
				element,
			},
			Details::Loading(shown) if *shown == element => DetailsView::Loading { element },
			Details::Unavailable(shown) if *shown == element => DetailsView::Unavailable { element },
			_ => DetailsView::Hidden,
		}
	}

	fn legend(&self) -> Vec<LegendEntry> {
		let entries = |palette: &Palette| {
			palette
				.entries()
				.iter()
				.map(|entry| LegendEntry {
					kind: palette.kind(),
					label: entry.label.clone(),
					display: entry
						.label
						.strip_prefix(PATH_EDGE_PREFIX)
						.unwrap_or(&entry.label)
						.to_string(),
					color: entry.color,
					hex: entry.swatch().strong,
					hidden: entry.hidden,
					format: self.label_format(&entry.label).unwrap_or_default().to_string(),
				})
				.collect::<Vec<_>>()
		};
		let mut legend = entries(&self.node_palette);
		legend.extend(entries(&self.edge_palette));
		legend
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::graph::decode::tests::{edge_json, path_json, vertex_json};
	use crate::session::source::tests::record;
	use crate::view::CanvasAction;

	fn state() -> GraphVisState {
		let options = GraphOptions {
			scale_to_fit: false,
			..GraphOptions::default()
		};
		GraphVisState::new(&options, UserConfigs::default(), 800.0, 600.0, None)
	}

	fn settle(state: &mut GraphVisState) {
		while state.session.is_running() {
			state.frame();
		}
		state.frame();
	}

	fn trip() -> Value {
		path_json(vec![
			vertex_json("a", "city"),
			edge_json("a-b", "flight", "a", "b"),
			vertex_json("b", "city"),
		])
	}

	#[test]
	fn ingest_registers_palette_labels() {
		let mut state = state();
		state.ingest(&trip()).unwrap();
		assert!(state.palette(PaletteKind::Node).get("city").is_some());
		assert!(state.palette(PaletteKind::Edge).get("flight").is_some());
		assert!(state.ingest(&json!({"@type": "g:Edge", "@value": {"id": "x"}})).is_err());
		assert_eq!(state.session.node_count(), 2);
	}

	#[test]
	fn frame_draws_visible_edges_only() {
		let mut state = state();
		state.ingest(&trip()).unwrap();
		settle(&mut state);
		assert_eq!(state.drawn_edges(), &[0]);
		assert!(state.geometry().contains_key(&0));

		state.dispatch(UiAction::ToggleHidden {
			kind: PaletteKind::Edge,
			label: "flight".into(),
		});
		state.frame();
		assert!(state.drawn_edges().is_empty());
	}

	#[test]
	fn labels_use_session_then_stored_formats() {
		let mut state = state();
		state.ingest(&trip()).unwrap();
		state.session.records_mut().insert(
			"a".into(),
			record("a", "city", &[("name", json!("Athens"))]),
		);
		settle(&mut state);
		let text_of = |state: &GraphVisState| {
			state
				.labels()
				.iter()
				.find(|l| l.target == ElementRef::node("a"))
				.map(|l| l.text.clone())
		};
		assert_eq!(text_of(&state).as_deref(), Some("a"));

		let saved = state.dispatch(UiAction::SetFormat {
			label: "city".into(),
			format: "{name}".into(),
			remember: true,
		});
		assert_eq!(saved, vec![Outbound::SaveConfigs]);
		state.frame();
		assert_eq!(text_of(&state).as_deref(), Some("Athens"));

		state.dispatch(UiAction::SetFormat {
			label: "city".into(),
			format: "#{id}".into(),
			remember: false,
		});
		state.frame();
		assert_eq!(text_of(&state).as_deref(), Some("#a"));
		assert_eq!(state.configs.label_format("city"), Some("{name}"));
	}

	#[test]
	fn clicking_a_node_requests_its_details() {
		let mut state = state();
		state.ingest(&trip()).unwrap();
		settle(&mut state);
		let a = state.session.model().node("a").unwrap().pos();
		let screen = state.viewport.world_to_screen(a);

		state.pointer_down(screen, Button::Primary);
		let out = state.pointer_up(screen);
		let [Outbound::FetchDetails(ticket)] = out.as_slice() else {
			panic!("expected a details fetch, got {out:?}");
		};
		assert_eq!(ticket.element, ElementRef::node("a"));
		assert!(matches!(state.overlay().details, DetailsView::Loading { .. }));

		state.details.resolve(
			ticket.clone(),
			Ok(vec![record("a", "city", &[("name", json!("Athens"))])]),
			state.session.records_mut(),
		);
		let DetailsView::Ready { rows, .. } = state.overlay().details else {
			panic!("details should be ready");
		};
		assert!(rows.contains(&("name".to_string(), "Athens".to_string())));
	}

	#[test]
	fn removing_the_clicked_node_empties_the_panel() {
		let mut state = state();
		state.ingest(&trip()).unwrap();
		settle(&mut state);
		state.session.records_mut().insert("b".into(), record("b", "city", &[]));
		let b = state.viewport.world_to_screen(state.session.model().node("b").unwrap().pos());
		state.pointer_down(b, Button::Primary);
		assert!(state.pointer_up(b).is_empty());
		assert!(matches!(state.overlay().details, DetailsView::Ready { .. }));

		state.pointer_down(b, Button::Secondary);
		assert!(matches!(state.overlay().menu, Some(MenuView::Node { .. })));
		state.dispatch(UiAction::Node(crate::view::NodeAction::Remove));
		assert_eq!(state.overlay().details, DetailsView::Hidden);
		assert_eq!(state.details.details(), &Details::Empty);
		assert_eq!(state.session.node_count(), 1);
	}

	#[test]
	fn canvas_menu_toggles_flow_outward() {
		let mut state = state();
		assert_eq!(
			state.dispatch(UiAction::Canvas(CanvasAction::ExportImage)),
			vec![Outbound::ExportImage]
		);
		state.dispatch(UiAction::Canvas(CanvasAction::ToggleFullscreen));
		assert!(state.overlay().fullscreen);
		state.dispatch(UiAction::Canvas(CanvasAction::TogglePrefetch));
		assert!(state.prefetch.is_enabled());

		state.ingest(&trip()).unwrap();
		let batch = state.next_prefetch().unwrap();
		assert_eq!(batch.ids, vec!["a", "b"]);
		assert_eq!(state.overlay().status.prefetch, Some((0, 3)));
	}

	#[test]
	fn clear_discards_the_prefetch_in_flight() {
		let mut state = state();
		state.dispatch(UiAction::Canvas(CanvasAction::TogglePrefetch));
		state.ingest(&trip()).unwrap();
		let old = state.next_prefetch().unwrap();

		state.dispatch(UiAction::Clear);
		state
			.ingest(&path_json(vec![
				vertex_json("x", "city"),
				edge_json("x-y", "flight", "x", "y"),
				vertex_json("y", "city"),
			]))
			.unwrap();
		let current = state.next_prefetch().unwrap();
		assert_eq!(current.ids, vec!["x", "y"]);
		assert_eq!(state.next_prefetch(), None, "one request at a time");

		let stale = vec![record("a", "city", &[]), record("b", "city", &[])];
		assert_eq!(state.prefetch.complete(&old, Ok(stale), state.session.records_mut()), 0);
		assert!(state.session.record("a").is_none() && state.session.record("b").is_none());
		assert!(state.prefetch.is_pending());
		assert_eq!(state.next_prefetch(), None);
	}

	#[test]
	fn legend_strips_path_prefix() {
		let mut state = state();
		state
			.ingest(&path_json(vec![vertex_json("a", "city"), vertex_json("b", "port")]))
			.unwrap();
		let legend = state.overlay().legend;
		let path = legend.iter().find(|e| e.kind == PaletteKind::Edge).unwrap();
		assert_eq!(path.label, "_path_city_port");
		assert_eq!(path.display, "city_port");

		let saved = state.dispatch(UiAction::SetColor {
			kind: PaletteKind::Node,
			label: "port".into(),
			color: 2,
		});
		assert_eq!(saved, vec![Outbound::SaveConfigs]);
		assert_eq!(state.configs.color_index("port"), Some(2));
	}

	#[test]
	fn search_suggests_then_centres_single_match() {
		let mut state = state();
		state.ingest(&trip()).unwrap();
		settle(&mut state);
		state
			.session
			.records_mut()
			.insert("b".into(), record("b", "city", &[("name", json!("Bern"))]));
		state.dispatch(UiAction::SearchInput("name=B".into()));
		assert_eq!(state.overlay().suggestions, vec!["name=Bern"]);

		state.dispatch(UiAction::Search("name=Bern".into()));
		let b = state.viewport.world_to_screen(state.session.model().node("b").unwrap().pos());
		assert!((b.x - 400.0).abs() < 1e-6 && (b.y - 300.0).abs() < 1e-6);
		assert_eq!(state.overlay().search_matches, 1);
	}
}
