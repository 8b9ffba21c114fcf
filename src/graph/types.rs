use serde_json::{Map, Value};

/// Prefix of connective edges synthesized between consecutive path vertices.
pub const PATH_EDGE_PREFIX: &str = "_path_";

/// A position in world or screen space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
	/// Horizontal coordinate.
	pub x: f64,
	/// Vertical coordinate.
	pub y: f64,
}

impl Point {
	/// Point at `(x, y)`.
	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	/// Squared distance to `other`.
	pub fn dist_sq(self, other: Point) -> f64 {
		let (dx, dy) = (self.x - other.x, self.y - other.y);
		dx * dx + dy * dy
	}
}

/// A vertex as delivered by the decoder.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeRecord {
	/// Vertex id.
	pub id: String,
	/// Vertex label.
	pub label: String,
}

/// An edge as delivered by the decoder, with enough endpoint data to stub missing vertices.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeRecord {
	/// Edge id.
	pub id: String,
	/// Edge label.
	pub label: String,
	/// Id of the vertex the edge leaves.
	pub source_id: String,
	/// Label of the vertex the edge leaves.
	pub source_label: String,
	/// Id of the vertex the edge points at.
	pub target_id: String,
	/// Label of the vertex the edge points at.
	pub target_label: String,
}

impl EdgeRecord {
	/// The vertex the edge leaves.
	pub fn source(&self) -> NodeRecord {
		NodeRecord {
			id: self.source_id.clone(),
			label: self.source_label.clone(),
		}
	}

	/// The vertex the edge points at.
	pub fn target(&self) -> NodeRecord {
		NodeRecord {
			id: self.target_id.clone(),
			label: self.target_label.clone(),
		}
	}

	/// Connective edge between two path vertices that had no real edge between them.
	pub fn connective(from: &NodeRecord, to: &NodeRecord) -> Self {
		Self {
			id: format!("{PATH_EDGE_PREFIX}{}_{}", from.id, to.id),
			label: format!("{PATH_EDGE_PREFIX}{}_{}", from.label, to.label),
			source_id: from.id.clone(),
			source_label: from.label.clone(),
			target_id: to.id.clone(),
			target_label: to.label.clone(),
		}
	}
}

/// One object of a decoded path, in traversal order.
#[derive(Clone, Debug, PartialEq)]
pub enum PathStep {
	/// A vertex.
	Node {
		/// Vertex id.
		id: String,
		/// Vertex label.
		label: String,
		/// Step labels the query attached.
		labels: Vec<String>,
	},
	/// An edge.
	Edge {
		/// Edge id.
		id: String,
		/// Edge label.
		label: String,
		/// Step labels the query attached.
		labels: Vec<String>,
	},
	/// Anything else the path carried.
	Value {
		/// The raw value.
		value: Value,
		/// Step labels the query attached.
		labels: Vec<String>,
	},
}

impl PathStep {
	/// Id of the vertex at this step, if it is one.
	pub fn node_id(&self) -> Option<&str> {
		match self {
			PathStep::Node { id, .. } => Some(id),
			_ => None,
		}
	}
}

/// The steps of one path.
pub type PathRecord = Vec<PathStep>;

/// Properties fetched for one vertex or edge.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyRecord {
	/// Element id.
	pub id: String,
	/// Element label.
	pub label: String,
	/// Property values by name, in the order the source returned them.
	pub properties: Map<String, Value>,
}

impl PropertyRecord {
	/// Property lookup that also answers `id` and `label`.
	pub fn get(&self, key: &str) -> Option<String> {
		match key {
			"id" => Some(self.id.clone()),
			"label" => Some(self.label.clone()),
			_ => self.properties.get(key).map(value_to_text),
		}
	}
}

/// One decoded batch of graph elements from a single response.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphFragment {
	/// Vertices found anywhere in the response.
	pub nodes: Vec<NodeRecord>,
	/// Edges found anywhere in the response.
	pub edges: Vec<EdgeRecord>,
	/// Decoded paths.
	pub paths: Vec<PathRecord>,
	/// Property maps the response carried alongside its elements.
	pub properties: Vec<PropertyRecord>,
	/// Scalars and unrecognised values.
	pub other: Vec<Value>,
}

impl GraphFragment {
	/// Whether the fragment adds anything to the graph.
	pub fn has_graph_elements(&self) -> bool {
		!self.nodes.is_empty() || !self.edges.is_empty() || !self.paths.is_empty()
	}
}

/// A vertex living in the model.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
	/// Vertex id.
	pub id: String,
	/// Vertex label.
	pub label: String,
	/// Current horizontal position.
	pub x: f64,
	/// Current vertical position.
	pub y: f64,
	/// Fixed horizontal position while pinned.
	pub fx: Option<f64>,
	/// Fixed vertical position while pinned.
	pub fy: Option<f64>,
	/// Deepest position the vertex has had in any path.
	pub path_index: Option<u32>,
	/// Slot in [`GraphModel::nodes`](super::GraphModel::nodes).
	pub index: usize,
}

impl Node {
	/// Current position.
	pub fn pos(&self) -> Point {
		Point::new(self.x, self.y)
	}

	/// Whether both coordinates are fixed.
	pub fn is_pinned(&self) -> bool {
		self.fx.is_some() && self.fy.is_some()
	}

	/// Fixes the node where it currently is.
	pub fn pin(&mut self) {
		self.fx = Some(self.x);
		self.fy = Some(self.y);
	}

	/// Releases the node to the layout.
	pub fn unpin(&mut self) {
		self.fx = None;
		self.fy = None;
	}
}

/// An edge living in the model, with its endpoints' slots.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
	/// Edge id.
	pub id: String,
	/// Edge label.
	pub label: String,
	/// Id of the source vertex.
	pub source_id: String,
	/// Id of the target vertex.
	pub target_id: String,
	/// Slot of the source vertex.
	pub source_index: usize,
	/// Slot of the target vertex.
	pub target_index: usize,
}

impl Edge {
	/// Whether the edge was synthesized between two path vertices.
	pub fn is_connective(&self) -> bool {
		self.id.starts_with(PATH_EDGE_PREFIX)
	}

	/// Whether `node_id` is either end.
	pub fn touches(&self, node_id: &str) -> bool {
		self.source_id == node_id || self.target_id == node_id
	}
}

/// Vertex or edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
	/// A vertex.
	Vertex,
	/// An edge.
	Edge,
}

impl ElementKind {
	/// One-letter code used by query APIs.
	pub fn code(self) -> &'static str {
		match self {
			ElementKind::Vertex => "V",
			ElementKind::Edge => "E",
		}
	}
}

/// Reference to one model element by kind and id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ElementRef {
	/// Vertex or edge.
	pub kind: ElementKind,
	/// Element id.
	pub id: String,
}

impl ElementRef {
	/// Reference to vertex `id`.
	pub fn node(id: impl Into<String>) -> Self {
		Self {
			kind: ElementKind::Vertex,
			id: id.into(),
		}
	}

	/// Reference to edge `id`.
	pub fn edge(id: impl Into<String>) -> Self {
		Self {
			kind: ElementKind::Edge,
			id: id.into(),
		}
	}
}

/// Plain text rendering of a property value, strings without quotes.
pub fn value_to_text(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		Value::Null => String::new(),
		other => other.to_string(),
	}
}
