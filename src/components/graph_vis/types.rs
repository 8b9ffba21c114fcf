use crate::config::ExpandPreset;
use crate::graph::{ElementRef, Point};
use crate::layout::LayoutKind;
use crate::view::{CanvasAction, NodeAction, PaletteKind};

/// Overlay input routed back into the canvas state.
#[derive(Clone, Debug, PartialEq)]
pub enum UiAction {
	Canvas(CanvasAction),
	Node(NodeAction),
	CloseMenu,
	ToggleHidden { kind: PaletteKind, label: String },
	SetColor { kind: PaletteKind, label: String, color: usize },
	SetFormat { label: String, format: String, remember: bool },
	SearchInput(String),
	Search(String),
	Layout(LayoutKind),
	Clear,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MenuView {
	Node {
		position: Point,
		node_id: String,
		/// Stored expand preset for the node's label.
		preset: ExpandPreset,
		/// Edge labels present on the node's incident edges.
		edge_labels: Vec<String>,
	},
	Canvas {
		position: Point,
		show_labels: bool,
		show_grid: bool,
		fit: bool,
		prefetch: bool,
		fullscreen: bool,
	},
}

#[derive(Clone, Debug, PartialEq)]
pub struct LegendEntry {
	pub kind: PaletteKind,
	pub label: String,
	/// Label as shown, without the synthetic path prefix.
	pub display: String,
	pub color: usize,
	pub hex: &'static str,
	pub hidden: bool,
	pub format: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DetailsView {
	Hidden,
	Loading { element: ElementRef },
	Ready { element: ElementRef, rows: Vec<(String, String)> },
	Unavailable { element: ElementRef },
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatusView {
	pub nodes: usize,
	pub edges: usize,
	pub running: bool,
	pub layout: LayoutKind,
	/// Prefetch progress as `(done, total)` while prefetching.
	pub prefetch: Option<(usize, usize)>,
	pub prefetch_stalled: bool,
}

/// Everything the HTML overlays render, rebuilt after each state change.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayView {
	pub menu: Option<MenuView>,
	pub details: DetailsView,
	pub details_anchor: Point,
	pub legend: Vec<LegendEntry>,
	pub suggestions: Vec<String>,
	pub search_term: String,
	pub search_matches: usize,
	pub status: StatusView,
	pub cursor: &'static str,
	pub fullscreen: bool,
}

impl Default for OverlayView {
	fn default() -> Self {
		Self {
			menu: None,
			details: DetailsView::Hidden,
			details_anchor: Point::default(),
			legend: Vec::new(),
			suggestions: Vec::new(),
			search_term: String::new(),
			search_matches: 0,
			status: StatusView {
				nodes: 0,
				edges: 0,
				running: false,
				layout: LayoutKind::default(),
				prefetch: None,
				prefetch_stalled: false,
			},
			cursor: "default",
			fullscreen: false,
		}
	}
}
