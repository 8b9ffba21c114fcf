//! Per-label colours for nodes and edges, plus the legend's hide toggles.

use crate::config::UserConfigs;

/// One material colour family: its name and the two shades the canvas uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Swatch {
	/// Colour family name.
	pub name: &'static str,
	/// Shade 500, used for fills, strokes and the legend.
	pub strong: &'static str,
	/// Shade 300.
	pub light: &'static str,
}

const fn swatch(name: &'static str, strong: &'static str, light: &'static str) -> Swatch {
	Swatch {
		name,
		strong,
		light,
	}
}

/// Material palette shades 500 (`strong`) and 300 (`light`).
pub const SWATCHES: [Swatch; 18] = [
	swatch("red", "#f44336", "#e57373"),
	swatch("pink", "#e91e63", "#f06292"),
	swatch("purple", "#9c27b0", "#ba68c8"),
	swatch("deepPurple", "#673ab7", "#9575cd"),
	swatch("indigo", "#3f51b5", "#7986cb"),
	swatch("blue", "#2196f3", "#64b5f6"),
	swatch("lightBlue", "#03a9f4", "#4fc3f7"),
	swatch("cyan", "#00bcd4", "#4dd0e1"),
	swatch("teal", "#009688", "#4db6ac"),
	swatch("green", "#4caf50", "#81c784"),
	swatch("lightGreen", "#8bc34a", "#aed581"),
	swatch("lime", "#cddc39", "#dce775"),
	swatch("yellow", "#ffeb3b", "#fff176"),
	swatch("amber", "#ffc107", "#ffd54f"),
	swatch("orange", "#ff9800", "#ffb74d"),
	swatch("deepOrange", "#ff5722", "#ff8a65"),
	swatch("brown", "#795548", "#a1887f"),
	swatch("grey", "#9e9e9e", "#e0e0e0"),
];

/// Whether a palette colours nodes or edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaletteKind {
	/// Node labels.
	Node,
	/// Edge labels.
	Edge,
}

impl PaletteKind {
	fn offset(self) -> usize {
		match self {
			PaletteKind::Node => 0,
			PaletteKind::Edge => 4,
		}
	}
}

/// Colour and visibility of one label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaletteEntry {
	/// The element label.
	pub label: String,
	/// Index into [`SWATCHES`].
	pub color: usize,
	/// Elements with this label are not drawn.
	pub hidden: bool,
}

impl PaletteEntry {
	/// The entry's colour family.
	pub fn swatch(&self) -> Swatch {
		SWATCHES[self.color % SWATCHES.len()]
	}
}

/// Colours are handed out on first sight of a label, stepping five
/// swatches per new label. A stored `colorIndex.label.<label>` wins over
/// the stepped choice.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
	kind: PaletteKind,
	entries: Vec<PaletteEntry>,
}

impl Palette {
	/// Empty palette for `kind`.
	pub fn new(kind: PaletteKind) -> Self {
		Self {
			kind,
			entries: Vec::new(),
		}
	}

	/// Whether this palette colours nodes or edges.
	pub fn kind(&self) -> PaletteKind {
		self.kind
	}

	/// Entries in order of first sight.
	pub fn entries(&self) -> &[PaletteEntry] {
		&self.entries
	}

	/// Entry for `label`, if seen.
	pub fn get(&self, label: &str) -> Option<&PaletteEntry> {
		self.entries.iter().find(|e| e.label == label)
	}

	/// Entry for `label`, assigning a colour if the label is new.
	pub fn entry(&mut self, label: &str, configs: &UserConfigs) -> &PaletteEntry {
		let pos = match self.entries.iter().position(|e| e.label == label) {
			Some(pos) => pos,
			None => {
				let stepped = (self.entries.len() * 5 + self.kind.offset()) % SWATCHES.len();
				self.entries.push(PaletteEntry {
					label: label.to_string(),
					color: configs.color_index(label).unwrap_or(stepped) % SWATCHES.len(),
					hidden: false,
				});
				self.entries.len() - 1
			}
		};
		&self.entries[pos]
	}

	/// Registers every label, in order.
	pub fn observe<'a>(&mut self, labels: impl IntoIterator<Item = &'a str>, configs: &UserConfigs) {
		for label in labels {
			self.entry(label, configs);
		}
	}

	/// Whether elements labelled `label` are hidden.
	pub fn is_hidden(&self, label: &str) -> bool {
		self.get(label).is_some_and(|e| e.hidden)
	}

	/// Shows or hides elements labelled `label`.
	pub fn toggle_hidden(&mut self, label: &str) {
		if let Some(entry) = self.entries.iter_mut().find(|e| e.label == label) {
			entry.hidden = !entry.hidden;
		}
	}

	/// Picks a colour for `label` and remembers the choice.
	pub fn set_color(&mut self, label: &str, color: usize, configs: &mut UserConfigs) {
		let color = color % SWATCHES.len();
		configs.set_color_index(label, color);
		match self.entries.iter_mut().find(|e| e.label == label) {
			Some(entry) => entry.color = color,
			None => self.entries.push(PaletteEntry {
				label: label.to_string(),
				color,
				hidden: false,
			}),
		}
	}

	/// Forgets every label.
	pub fn clear(&mut self) {
		self.entries.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn colors_step_by_five() {
		let configs = UserConfigs::default();
		let mut nodes = Palette::new(PaletteKind::Node);
		let picked: Vec<usize> = ["a", "b", "c", "d"]
			.iter()
			.map(|l| nodes.entry(l, &configs).color)
			.collect();
		assert_eq!(picked, vec![0, 5, 10, 15]);

		let mut edges = Palette::new(PaletteKind::Edge);
		assert_eq!(edges.entry("x", &configs).color, 4);
		assert_eq!(edges.entry("y", &configs).color, 9);
		assert_eq!(edges.entry("x", &configs).color, 4);
	}

	#[test]
	fn stored_index_wins() {
		let mut configs = UserConfigs::default();
		configs.set_color_index("city", 21);
		let mut palette = Palette::new(PaletteKind::Node);
		assert_eq!(palette.entry("city", &configs).color, 3);
		assert_eq!(palette.entry("city", &configs).swatch().name, "deepPurple");
	}

	#[test]
	fn set_color_persists() {
		let mut configs = UserConfigs::default();
		let mut palette = Palette::new(PaletteKind::Edge);
		palette.entry("flight", &configs);
		palette.set_color("flight", 9, &mut configs);
		assert_eq!(palette.get("flight").unwrap().color, 9);
		assert_eq!(configs.color_index("flight"), Some(9));

		let mut fresh = Palette::new(PaletteKind::Edge);
		assert_eq!(fresh.entry("flight", &configs).color, 9);
	}

	#[test]
	fn hide_toggle() {
		let configs = UserConfigs::default();
		let mut palette = Palette::new(PaletteKind::Node);
		palette.observe(["city", "airline"], &configs);
		assert!(!palette.is_hidden("city"));
		palette.toggle_hidden("city");
		assert!(palette.is_hidden("city") && !palette.is_hidden("airline"));
		palette.toggle_hidden("city");
		assert!(!palette.is_hidden("city"));
		assert!(!palette.is_hidden("unknown"));
	}
}
