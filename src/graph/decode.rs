//! Decoding of typed query responses into [`GraphFragment`]s.
//!
//! Responses use the GraphSON taxonomy: typed values are objects carrying an
//! `@type` discriminant and an `@value` payload. Dispatch is on the
//! discriminant only; anything unrecognised falls through to an
//! unstructured value.

use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{EdgeRecord, GraphFragment, NodeRecord, PathStep, PropertyRecord};

/// A response that cannot be turned into graph elements.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
	/// A vertex or edge without an id.
	#[error("{kind} without an id")]
	MissingId {
		/// `"vertex"` or `"edge"`.
		kind: &'static str,
	},
	/// An edge missing one of its endpoint ids.
	#[error("edge {id} has no {end} vertex")]
	MissingEndpoint {
		/// Edge id.
		id: String,
		/// `"out"` or `"in"`.
		end: &'static str,
	},
	/// A path whose objects are not a list.
	#[error("path without an object list")]
	MalformedPath,
}

enum Typed<'a> {
	Vertex(&'a Value),
	Edge(&'a Value),
	Path(&'a Value),
	List(&'a [Value]),
	Map(&'a [Value]),
	Scalar(&'a Value),
	Untyped(&'a Value),
}

fn classify(value: &Value) -> Typed<'_> {
	if let Value::Array(items) = value {
		return Typed::List(items);
	}
	let (Some(tag), Some(inner)) = (
		value.get("@type").and_then(Value::as_str),
		value.get("@value"),
	) else {
		return Typed::Untyped(value);
	};
	match (tag, inner) {
		("g:Vertex", _) => Typed::Vertex(inner),
		("g:Edge", _) => Typed::Edge(inner),
		("g:Path", _) => Typed::Path(inner),
		("g:List" | "g:Set", Value::Array(items)) => Typed::List(items),
		("g:Map", Value::Array(items)) => Typed::Map(items),
		_ => Typed::Scalar(inner),
	}
}

/// Decodes one response value. Nothing is produced if any vertex, edge or
/// path inside it is malformed.
pub fn decode(value: &Value) -> Result<GraphFragment, DecodeError> {
	let mut fragment = GraphFragment::default();
	decode_into(value, &mut fragment)?;
	Ok(fragment)
}

fn decode_into(value: &Value, out: &mut GraphFragment) -> Result<(), DecodeError> {
	match classify(value) {
		Typed::List(items) => {
			for item in items {
				decode_into(item, out)?;
			}
		}
		Typed::Vertex(inner) => out.nodes.push(vertex(inner)?),
		Typed::Edge(inner) => {
			let edge = edge(inner)?;
			let (source, target) = (edge.source(), edge.target());
			out.paths.push(vec![
				PathStep::Node {
					id: source.id.clone(),
					label: source.label.clone(),
					labels: Vec::new(),
				},
				PathStep::Edge {
					id: edge.id.clone(),
					label: edge.label.clone(),
					labels: Vec::new(),
				},
				PathStep::Node {
					id: target.id.clone(),
					label: target.label.clone(),
					labels: Vec::new(),
				},
			]);
			out.nodes.push(source);
			out.nodes.push(target);
			out.edges.push(edge);
		}
		Typed::Path(inner) => path(inner, out)?,
		Typed::Map(items) => map(items, out),
		Typed::Scalar(inner) => out.other.push(to_plain(inner)),
		Typed::Untyped(value) => out.other.push(to_plain(value)),
	}
	Ok(())
}

fn vertex(inner: &Value) -> Result<NodeRecord, DecodeError> {
	let id = required_id(inner, "vertex")?;
	Ok(NodeRecord {
		id,
		label: inner.get("label").map(to_text).unwrap_or_default(),
	})
}

fn edge(inner: &Value) -> Result<EdgeRecord, DecodeError> {
	let id = required_id(inner, "edge")?;
	let endpoint = |key: &str, end: &'static str| {
		inner
			.get(key)
			.filter(|v| !v.is_null())
			.map(id_text)
			.ok_or_else(|| DecodeError::MissingEndpoint { id: id.clone(), end })
	};
	let source_id = endpoint("outV", "out")?;
	let target_id = endpoint("inV", "in")?;
	let text_of = |key: &str| inner.get(key).map(to_text).unwrap_or_default();
	Ok(EdgeRecord {
		label: text_of("label"),
		source_label: text_of("outVLabel"),
		target_label: text_of("inVLabel"),
		id,
		source_id,
		target_id,
	})
}

fn path(inner: &Value, out: &mut GraphFragment) -> Result<(), DecodeError> {
	let objects = match inner.get("objects").map(classify) {
		Some(Typed::List(items)) => items,
		_ => return Err(DecodeError::MalformedPath),
	};
	let step_labels = match inner.get("labels").map(classify) {
		Some(Typed::List(items)) => items,
		_ => &[][..],
	};

	let mut steps: Vec<PathStep> = Vec::with_capacity(objects.len());
	let mut last_node: Option<NodeRecord> = None;
	for (i, object) in objects.iter().enumerate() {
		let labels = step_labels.get(i).map(label_set).unwrap_or_default();
		match classify(object) {
			Typed::Vertex(v) => {
				let node = vertex(v)?;
				if let Some(prev) = last_node.as_ref() {
					let link = EdgeRecord::connective(prev, &node);
					steps.push(PathStep::Edge {
						id: link.id.clone(),
						label: link.label.clone(),
						labels: Vec::new(),
					});
					out.edges.push(link);
				}
				steps.push(PathStep::Node {
					id: node.id.clone(),
					label: node.label.clone(),
					labels,
				});
				out.nodes.push(node.clone());
				last_node = Some(node);
			}
			Typed::Edge(e) => {
				let edge = edge(e)?;
				steps.push(PathStep::Edge {
					id: edge.id.clone(),
					label: edge.label.clone(),
					labels,
				});
				out.nodes.push(edge.source());
				out.nodes.push(edge.target());
				out.edges.push(edge);
				last_node = None;
			}
			_ => {
				steps.push(PathStep::Value {
					value: to_plain(object),
					labels,
				});
				last_node = None;
			}
		}
	}
	out.paths.push(steps);
	Ok(())
}

fn map(items: &[Value], out: &mut GraphFragment) {
	let mut properties = Map::new();
	let (mut id, mut label) = (None, None);
	for pair in items.chunks_exact(2) {
		let key = to_text(&pair[0]);
		let value = match key.as_str() {
			"id" => {
				let text = id_text(&pair[1]);
				id = Some(text.clone());
				Value::String(text)
			}
			"label" => {
				let text = to_text(&pair[1]);
				label = Some(text.clone());
				Value::String(text)
			}
			_ => to_plain(&pair[1]),
		};
		properties.insert(key, value);
	}
	match (id, label) {
		(Some(id), Some(label)) if !id.is_empty() && !label.is_empty() => {
			out.properties.push(PropertyRecord {
				id,
				label,
				properties,
			})
		}
		_ => out.other.push(Value::Object(properties)),
	}
}

fn required_id(inner: &Value, kind: &'static str) -> Result<String, DecodeError> {
	inner
		.get("id")
		.filter(|v| !v.is_null())
		.map(id_text)
		.filter(|id| !id.is_empty())
		.ok_or(DecodeError::MissingId { kind })
}

fn label_set(value: &Value) -> Vec<String> {
	match classify(value) {
		Typed::List(items) => items.iter().map(to_text).collect(),
		_ => Vec::new(),
	}
}

/// Identifier text, unwrapping typed numbers and relation ids.
fn id_text(value: &Value) -> String {
	if let Some(inner) = value.get("@value") {
		return id_text(inner);
	}
	if let Some(inner) = value.get("relationId") {
		return id_text(inner);
	}
	to_text(value)
}

fn to_text(value: &Value) -> String {
	match to_plain(value) {
		Value::String(s) => s,
		other => other.to_string(),
	}
}

/// Strips type wrappers, leaving plain JSON.
pub fn to_plain(value: &Value) -> Value {
	match classify(value) {
		Typed::List(items) => Value::Array(items.iter().map(to_plain).collect()),
		Typed::Vertex(inner) => {
			let mut obj = Map::new();
			obj.insert("id".into(), Value::String(inner.get("id").map(id_text).unwrap_or_default()));
			obj.insert("label".into(), Value::String(inner.get("label").map(to_text).unwrap_or_default()));
			Value::Object(obj)
		}
		Typed::Edge(inner) => {
			let mut obj = Map::new();
			for key in ["id", "outV", "inV"] {
				obj.insert(key.into(), Value::String(inner.get(key).map(id_text).unwrap_or_default()));
			}
			for key in ["label", "outVLabel", "inVLabel"] {
				obj.insert(key.into(), Value::String(inner.get(key).map(to_text).unwrap_or_default()));
			}
			Value::Object(obj)
		}
		Typed::Path(inner) => inner.get("objects").map(to_plain).unwrap_or(Value::Null),
		Typed::Map(items) => {
			let mut obj = Map::new();
			for pair in items.chunks_exact(2) {
				obj.insert(to_text(&pair[0]), to_plain(&pair[1]));
			}
			Value::Object(obj)
		}
		Typed::Scalar(inner) => to_plain(inner),
		Typed::Untyped(Value::Object(fields)) => Value::Object(
			fields
				.iter()
				.map(|(k, v)| (k.clone(), to_plain(v)))
				.collect(),
		),
		Typed::Untyped(other) => other.clone(),
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use serde_json::json;

	use super::*;

	pub(crate) fn vertex_json(id: &str, label: &str) -> Value {
		json!({"@type": "g:Vertex", "@value": {"id": id, "label": label}})
	}

	pub(crate) fn edge_json(id: &str, label: &str, out_v: &str, in_v: &str) -> Value {
		json!({"@type": "g:Edge", "@value": {
			"id": id, "label": label,
			"outV": out_v, "outVLabel": "city",
			"inV": in_v, "inVLabel": "city",
		}})
	}

	pub(crate) fn path_json(objects: Vec<Value>) -> Value {
		let labels: Vec<Value> = objects
			.iter()
			.map(|_| json!({"@type": "g:Set", "@value": []}))
			.collect();
		json!({"@type": "g:Path", "@value": {
			"labels": {"@type": "g:List", "@value": labels},
			"objects": {"@type": "g:List", "@value": objects},
		}})
	}

	#[test]
	fn vertex_with_typed_id() {
		let value = json!({"@type": "g:Vertex", "@value": {
			"id": {"@type": "g:Int64", "@value": 42},
			"label": "person",
		}});
		let fragment = decode(&value).unwrap();
		assert_eq!(
			fragment.nodes,
			vec![NodeRecord {
				id: "42".into(),
				label: "person".into()
			}]
		);
	}

	#[test]
	fn edge_produces_endpoint_stubs_and_path() {
		let fragment = decode(&edge_json("e1", "flight", "a", "b")).unwrap();
		assert_eq!(fragment.edges.len(), 1);
		let ids: Vec<_> = fragment.nodes.iter().map(|n| n.id.as_str()).collect();
		assert_eq!(ids, ["a", "b"]);
		assert_eq!(fragment.paths.len(), 1);
		assert_eq!(fragment.paths[0].len(), 3);
	}

	#[test]
	fn relation_id_is_unwrapped() {
		let value = json!({"@type": "g:Edge", "@value": {
			"id": {"@type": "janusgraph:RelationIdentifier", "@value": {"relationId": "4r-1-2"}},
			"label": "knows", "outV": "1", "inV": "2",
		}});
		let fragment = decode(&value).unwrap();
		assert_eq!(fragment.edges[0].id, "4r-1-2");
	}

	#[test]
	fn path_synthesizes_connective_edges() {
		let value = path_json(vec![vertex_json("a", "city"), vertex_json("b", "city")]);
		let fragment = decode(&value).unwrap();
		assert_eq!(fragment.edges.len(), 1);
		assert_eq!(fragment.edges[0].id, "_path_a_b");
		assert_eq!(fragment.paths[0].len(), 3);

		let again = decode(&value).unwrap();
		assert_eq!(again.edges[0].id, fragment.edges[0].id);
	}

	#[test]
	fn path_with_real_edge_has_no_connective() {
		let value = path_json(vec![
			vertex_json("a", "city"),
			edge_json("ab", "flight", "a", "b"),
			vertex_json("b", "city"),
		]);
		let fragment = decode(&value).unwrap();
		let edge_ids: Vec<_> = fragment.edges.iter().map(|e| e.id.as_str()).collect();
		assert_eq!(edge_ids, ["ab"]);
		assert_eq!(fragment.paths[0].len(), 3);
	}

	#[test]
	fn path_keeps_value_steps_and_labels() {
		let value = json!({"@type": "g:Path", "@value": {
			"labels": {"@type": "g:List", "@value": [
				{"@type": "g:Set", "@value": ["start"]},
				{"@type": "g:Set", "@value": []},
			]},
			"objects": {"@type": "g:List", "@value": [
				vertex_json("a", "city"),
				{"@type": "g:Int32", "@value": 7},
			]},
		}});
		let fragment = decode(&value).unwrap();
		let path = &fragment.paths[0];
		assert_eq!(
			path[0],
			PathStep::Node {
				id: "a".into(),
				label: "city".into(),
				labels: vec!["start".into()]
			}
		);
		assert_eq!(
			path[1],
			PathStep::Value {
				value: json!(7),
				labels: vec![]
			}
		);
	}

	#[test]
	fn element_map_becomes_property_record() {
		let value = json!({"@type": "g:Map", "@value": [
			{"@type": "g:T", "@value": "id"}, "v1",
			{"@type": "g:T", "@value": "label"}, "city",
			"name", "Oslo",
			"population", {"@type": "g:Int32", "@value": 700000},
		]});
		let fragment = decode(&value).unwrap();
		let record = &fragment.properties[0];
		assert_eq!(record.id, "v1");
		assert_eq!(record.get("name").as_deref(), Some("Oslo"));
		assert_eq!(record.properties["population"], json!(700000));
		let keys: Vec<_> = record.properties.keys().map(String::as_str).collect();
		assert_eq!(keys, ["id", "label", "name", "population"]);
	}

	#[test]
	fn map_without_identity_is_unstructured() {
		let value = json!({"@type": "g:Map", "@value": ["count", 3]});
		let fragment = decode(&value).unwrap();
		assert!(fragment.properties.is_empty());
		assert_eq!(fragment.other, vec![json!({"count": 3})]);
	}

	#[test]
	fn scalars_and_unknown_types_degrade() {
		let value = json!([
			"plain",
			{"@type": "g:Double", "@value": 1.5},
			{"@type": "x:Unknown", "@value": {"a": 1}},
			{"no": "type"},
		]);
		let fragment = decode(&value).unwrap();
		assert_eq!(
			fragment.other,
			vec![json!("plain"), json!(1.5), json!({"a": 1}), json!({"no": "type"})]
		);
	}

	#[test]
	fn malformed_elements_fail_whole_decode() {
		let value = json!([
			vertex_json("a", "city"),
			{"@type": "g:Vertex", "@value": {"label": "city"}},
		]);
		assert_eq!(decode(&value), Err(DecodeError::MissingId { kind: "vertex" }));

		let bad_path = json!({"@type": "g:Path", "@value": {"labels": []}});
		assert_eq!(decode(&bad_path), Err(DecodeError::MalformedPath));

		let bad_edge = json!({"@type": "g:Edge", "@value": {"id": "e", "outV": "a"}});
		assert!(matches!(
			decode(&bad_edge),
			Err(DecodeError::MissingEndpoint { end: "in", .. })
		));
	}
}
