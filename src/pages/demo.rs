//! In-memory sample graph standing in for a query backend on the demo page.

use std::cmp::Ordering;

use serde_json::{Map, Value, json};

use crate::config::{Direction, ExpandFilter, ExpandRequest, FilterOp};
use crate::graph::PropertyRecord;
use crate::session::StaticSource;

const CITIES: [(&str, &str, &str, u32); 8] = [
	("lim", "Lima", "pe", 10_000_000),
	("cuz", "Cusco", "pe", 430_000),
	("scl", "Santiago", "cl", 6_900_000),
	("bog", "Bogotá", "co", 7_900_000),
	("mde", "Medellín", "co", 2_500_000),
	("gru", "São Paulo", "br", 12_300_000),
	("gig", "Rio de Janeiro", "br", 6_700_000),
	("eze", "Buenos Aires", "ar", 3_100_000),
];

const COUNTRIES: [(&str, &str); 5] = [
	("pe", "Peru"),
	("cl", "Chile"),
	("co", "Colombia"),
	("br", "Brazil"),
	("ar", "Argentina"),
];

const FLIGHTS: [(&str, &str, &str, u32); 11] = [
	("lim", "cuz", "LATAM", 580),
	("cuz", "lim", "Sky", 580),
	("lim", "scl", "LATAM", 2460),
	("lim", "bog", "Avianca", 1880),
	("bog", "mde", "Avianca", 215),
	("lim", "gru", "LATAM", 3470),
	("gru", "gig", "Gol", 360),
	("gig", "gru", "Azul", 360),
	("gru", "eze", "Aerolíneas", 1680),
	("scl", "eze", "Sky", 1140),
	("eze", "scl", "LATAM", 1140),
];

struct DemoEdge {
	id: String,
	label: &'static str,
	out_v: (&'static str, &'static str),
	in_v: (&'static str, &'static str),
}

impl DemoEdge {
	fn to_value(&self) -> Value {
		json!({"@type": "g:Edge", "@value": {
			"id": self.id,
			"label": self.label,
			"outV": self.out_v.0, "outVLabel": self.out_v.1,
			"inV": self.in_v.0, "inVLabel": self.in_v.1,
		}})
	}
}

fn record(id: &str, label: &str, props: Value) -> PropertyRecord {
	let mut properties = Map::new();
	properties.insert("id".into(), Value::from(id));
	properties.insert("label".into(), Value::from(label));
	if let Value::Object(extra) = props {
		properties.extend(extra);
	}
	PropertyRecord {
		id: id.to_string(),
		label: label.to_string(),
		properties,
	}
}

fn compare(actual: &Value, wanted: &str) -> Option<Ordering> {
	match (actual.as_f64(), wanted.parse::<f64>()) {
		(Some(a), Ok(b)) => a.partial_cmp(&b),
		_ => Some(crate::graph::value_to_text(actual).as_str().cmp(wanted)),
	}
}

fn passes(record: Option<&PropertyRecord>, filter: &ExpandFilter) -> bool {
	let Some(actual) = record.and_then(|r| r.properties.get(&filter.prop)) else {
		return false;
	};
	let Some(order) = compare(actual, &filter.value) else {
		return false;
	};
	match filter.op {
		FilterOp::Eq => order.is_eq(),
		FilterOp::Neq => order.is_ne(),
		FilterOp::Gt => order.is_gt(),
		FilterOp::Gte => order.is_ge(),
		FilterOp::Lt => order.is_lt(),
		FilterOp::Lte => order.is_le(),
	}
}

pub struct DemoGraph {
	edges: Vec<DemoEdge>,
	records: Vec<PropertyRecord>,
}

impl DemoGraph {
	pub fn new() -> Self {
		let mut edges = Vec::new();
		let mut records = Vec::new();
		for (id, name, country, population) in CITIES {
			records.push(record(id, "city", json!({"name": name, "population": population})));
			edges.push(DemoEdge {
				id: format!("{id}-in-{country}"),
				label: "located_in",
				out_v: (id, "city"),
				in_v: (country, "country"),
			});
		}
		for (id, name) in COUNTRIES {
			records.push(record(id, "country", json!({"name": name})));
		}
		for (from, to, airline, km) in FLIGHTS {
			let id = format!("{from}-{to}");
			records.push(record(&id, "flight", json!({"airline": airline, "km": km})));
			edges.push(DemoEdge {
				id,
				label: "flight",
				out_v: (from, "city"),
				in_v: (to, "city"),
			});
		}
		Self { edges, records }
	}

	pub fn source(&self) -> StaticSource {
		StaticSource::new(self.records.clone())
	}

	fn record(&self, id: &str) -> Option<&PropertyRecord> {
		self.records.iter().find(|r| r.id == id)
	}

	/// Paths of every flight leaving Lima, as a path query would return them.
	pub fn initial_response(&self) -> Value {
		let vertex = |(id, label): (&str, &str)| json!({"@type": "g:Vertex", "@value": {"id": id, "label": label}});
		let paths: Vec<Value> = self
			.edges
			.iter()
			.filter(|e| e.label == "flight" && e.out_v.0 == "lim")
			.map(|e| {
				let objects = vec![vertex(e.out_v), e.to_value(), vertex(e.in_v)];
				let labels: Vec<Value> = objects.iter().map(|_| json!({"@type": "g:Set", "@value": []})).collect();
				json!({"@type": "g:Path", "@value": {
					"labels": {"@type": "g:List", "@value": labels},
					"objects": {"@type": "g:List", "@value": objects},
				}})
			})
			.collect();
		json!({"@type": "g:List", "@value": paths})
	}

	/// Edges around the requested node, filtered on the far vertex.
	pub fn expand(&self, request: &ExpandRequest) -> Value {
		let id = request.node_id.as_str();
		let found: Vec<Value> = self
			.edges
			.iter()
			.filter_map(|e| {
				let other = match request.direction {
					Direction::Out if e.out_v.0 == id => e.in_v.0,
					Direction::In if e.in_v.0 == id => e.out_v.0,
					Direction::Both if e.out_v.0 == id => e.in_v.0,
					Direction::Both if e.in_v.0 == id => e.out_v.0,
					_ => return None,
				};
				Some((e, other))
			})
			.filter(|(e, _)| request.edge_label.as_deref().is_none_or(|l| l == e.label))
			.filter(|(_, other)| request.filters.iter().all(|f| passes(self.record(other), f)))
			.map(|(e, _)| e.to_value())
			.take(request.limit.map_or(usize::MAX, |l| l as usize))
			.collect();
		json!({"@type": "g:List", "@value": found})
	}
}
