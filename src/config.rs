//! Canvas options and persisted user preferences.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::layout::LayoutKind;

/// Key under which [`UserConfigs`] are kept in local storage.
pub const STORAGE_KEY: &str = "puppyConfigs";

/// Failure to read stored preferences.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// The stored text is not JSON.
	#[error("stored preferences are not valid JSON: {0}")]
	Malformed(#[from] serde_json::Error),
	/// The stored JSON is not an object.
	#[error("stored preferences are not a JSON object")]
	NotAnObject,
}

/// Options the host page configures the canvas with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphOptions {
	/// Layout used for the first run.
	pub layout: LayoutKind,
	/// Overrides the layout's default spacing.
	pub gap: Option<f64>,
	/// Draw node and edge labels.
	pub show_labels: bool,
	/// Draw the background grid.
	pub show_grid: bool,
	/// Keep the whole graph in view while no gesture has moved the camera.
	pub scale_to_fit: bool,
	/// Text drawn in the bottom-right corner.
	pub watermark_text: Option<String>,
	/// Property records fetched per prefetch batch.
	pub prefetch_page_size: usize,
}

impl Default for GraphOptions {
	fn default() -> Self {
		Self {
			layout: LayoutKind::Force,
			gap: None,
			show_labels: true,
			show_grid: false,
			scale_to_fit: true,
			watermark_text: None,
			prefetch_page_size: 1000,
		}
	}
}

/// Which incident edges an expand follows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
	/// Edges pointing at the node.
	In,
	/// Edges leaving the node.
	#[default]
	Out,
	/// Edges in either direction.
	Both,
}

/// Comparison applied by an [`ExpandFilter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
	/// Equal.
	#[default]
	Eq,
	/// Not equal.
	Neq,
	/// Greater than.
	Gt,
	/// Greater than or equal.
	Gte,
	/// Less than.
	Lt,
	/// Less than or equal.
	Lte,
}

impl FilterOp {
	/// Every operator, in the order the expand form lists them.
	pub const ALL: [FilterOp; 6] = [
		FilterOp::Eq,
		FilterOp::Neq,
		FilterOp::Gt,
		FilterOp::Gte,
		FilterOp::Lt,
		FilterOp::Lte,
	];

	/// The operator as written in a query.
	pub fn symbol(self) -> &'static str {
		match self {
			FilterOp::Eq => "=",
			FilterOp::Neq => "!=",
			FilterOp::Gt => ">",
			FilterOp::Gte => ">=",
			FilterOp::Lt => "<",
			FilterOp::Lte => "<=",
		}
	}
}

/// One `prop op value` condition on the far vertex of an expand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpandFilter {
	/// Property name.
	pub prop: String,
	/// Comparison.
	pub op: FilterOp,
	/// Right-hand side, compared numerically when both sides parse as numbers.
	pub value: String,
}

/// Parameters of an expand, as stored under `expandPreset.label.<label>`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpandPreset {
	/// Edge direction to follow.
	pub direction: Direction,
	/// Only follow edges with this label.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub edge_label: Option<String>,
	/// Conditions every reached vertex must meet.
	pub filters: Vec<ExpandFilter>,
	/// Zero means no limit.
	pub limit: u32,
}

/// Outbound request to expand a node's neighbourhood.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandRequest {
	/// Vertex to expand from.
	pub node_id: String,
	/// Edge direction to follow.
	pub direction: Direction,
	/// Only follow edges with this label.
	pub edge_label: Option<String>,
	/// Conditions every reached vertex must meet.
	pub filters: Vec<ExpandFilter>,
	/// Maximum number of edges to return.
	pub limit: Option<u32>,
}

impl ExpandRequest {
	/// Expands `node_id` along every edge, unfiltered.
	pub fn all(node_id: impl Into<String>) -> Self {
		Self {
			node_id: node_id.into(),
			direction: Direction::Both,
			edge_label: None,
			filters: Vec::new(),
			limit: None,
		}
	}

	/// Request built from a stored preset. An empty label or zero limit means none.
	pub fn from_preset(node_id: impl Into<String>, preset: &ExpandPreset) -> Self {
		Self {
			node_id: node_id.into(),
			direction: preset.direction,
			edge_label: preset.edge_label.clone().filter(|l| !l.is_empty()),
			filters: preset.filters.clone(),
			limit: (preset.limit > 0).then_some(preset.limit),
		}
	}
}

/// Flat preference map shared with the rest of the application.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserConfigs(Map<String, Value>);

impl UserConfigs {
	/// Parses a stored preference object.
	pub fn parse(raw: &str) -> Result<Self, ConfigError> {
		match serde_json::from_str::<Value>(raw)? {
			Value::Object(map) => Ok(Self(map)),
			_ => Err(ConfigError::NotAnObject),
		}
	}

	/// Parses stored preferences, starting empty when they are missing or
	/// unreadable.
	pub fn load_or_default(raw: Option<&str>) -> Self {
		let Some(raw) = raw else {
			return Self::default();
		};
		Self::parse(raw).unwrap_or_else(|err| {
			log::warn!("ignoring stored preferences: {err}");
			Self::default()
		})
	}

	/// Serialises the map for storage.
	pub fn to_json(&self) -> String {
		Value::Object(self.0.clone()).to_string()
	}

	/// Raw value under `key`.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.0.get(key)
	}

	/// Sets `key`, replacing any earlier value.
	pub fn set(&mut self, key: impl Into<String>, value: Value) {
		self.0.insert(key.into(), value);
	}

	/// Persisted palette index for `label`.
	pub fn color_index(&self, label: &str) -> Option<usize> {
		self.0
			.get(&format!("colorIndex.label.{label}"))
			.and_then(Value::as_u64)
			.map(|i| i as usize)
	}

	/// Persists the palette index for `label`.
	pub fn set_color_index(&mut self, label: &str, index: usize) {
		self.set(format!("colorIndex.label.{label}"), Value::from(index));
	}

	/// Persisted label template for `label`, ignoring empty ones.
	pub fn label_format(&self, label: &str) -> Option<&str> {
		self.0
			.get(&format!("format.label.{label}"))
			.and_then(Value::as_str)
			.filter(|f| !f.is_empty())
	}

	/// Persists the label template for `label`.
	pub fn set_label_format(&mut self, label: &str, format: &str) {
		self.set(format!("format.label.{label}"), Value::from(format));
	}

	/// Last expand parameters used on nodes labelled `label`.
	pub fn expand_preset(&self, label: &str) -> Option<ExpandPreset> {
		let value = self.0.get(&format!("expandPreset.label.{label}"))?;
		serde_json::from_value(value.clone()).ok()
	}

	/// Remembers the expand parameters for nodes labelled `label`.
	pub fn set_expand_preset(&mut self, label: &str, preset: &ExpandPreset) {
		if let Ok(value) = serde_json::to_value(preset) {
			self.set(format!("expandPreset.label.{label}"), value);
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn options_fill_missing_fields() {
		let options: GraphOptions =
			serde_json::from_value(json!({"layout": "radial", "showGrid": true})).unwrap();
		assert_eq!(options.layout, LayoutKind::Radial);
		assert!(options.show_grid && options.show_labels);
		assert_eq!(options.prefetch_page_size, 1000);
	}

	#[test]
	fn corrupt_preferences_fall_back_to_empty() {
		assert_eq!(UserConfigs::load_or_default(Some("{not json")), UserConfigs::default());
		assert_eq!(UserConfigs::load_or_default(Some("[1,2]")), UserConfigs::default());
		assert_eq!(UserConfigs::load_or_default(None), UserConfigs::default());
		assert!(matches!(UserConfigs::parse("3"), Err(ConfigError::NotAnObject)));
	}

	#[test]
	fn typed_accessors_share_the_flat_map() {
		let mut configs = UserConfigs::default();
		configs.set_color_index("city", 7);
		configs.set_label_format("city", "{name}");
		let preset = ExpandPreset {
			direction: Direction::In,
			edge_label: Some("flight".into()),
			filters: vec![ExpandFilter {
				prop: "year".into(),
				op: FilterOp::Gte,
				value: "2020".into(),
			}],
			limit: 10,
		};
		configs.set_expand_preset("city", &preset);

		let reloaded = UserConfigs::load_or_default(Some(&configs.to_json()));
		assert_eq!(reloaded.color_index("city"), Some(7));
		assert_eq!(reloaded.label_format("city"), Some("{name}"));
		assert_eq!(reloaded.expand_preset("city"), Some(preset));
		assert_eq!(
			reloaded.get("expandPreset.label.city").unwrap()["direction"],
			json!("in")
		);
	}

	#[test]
	fn request_from_preset_drops_empty_limits() {
		let request = ExpandRequest::from_preset("n1", &ExpandPreset::default());
		assert_eq!(request.limit, None);
		assert_eq!(request.direction, Direction::Out);
		assert_eq!(ExpandRequest::all("n1").direction, Direction::Both);
	}
}
