//! Property lookups for graph elements.

use std::collections::HashMap;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde_json::{Value, json};

use crate::graph::{DecodeError, ElementKind, PropertyRecord, decode};

/// Failure to fetch property records.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
	/// The request itself failed.
	#[error("property request failed: {0}")]
	Request(String),
	/// The response was not a valid typed value.
	#[error("property response could not be decoded: {0}")]
	Decode(#[from] DecodeError),
}

/// Answers property requests for vertices (`V`) or edges (`E`) by id. The
/// response is a typed value in the same taxonomy as query results.
pub trait ElementSource {
	/// Requests the properties of `ids`, all of `kind`.
	fn fetch(&self, kind: ElementKind, ids: Vec<String>) -> LocalBoxFuture<'_, Result<Value, SourceError>>;
}

/// Fetches `ids` and decodes the property records in the response.
pub async fn fetch_records(
	source: &dyn ElementSource,
	kind: ElementKind,
	ids: Vec<String>,
) -> Result<Vec<PropertyRecord>, SourceError> {
	let response = source.fetch(kind, ids).await?;
	Ok(decode(&response)?.properties)
}

/// Typed map form of a property record, as an element-map query returns it.
pub fn record_to_value(record: &PropertyRecord) -> Value {
	let mut items = vec![
		json!({"@type": "g:T", "@value": "id"}),
		Value::String(record.id.clone()),
		json!({"@type": "g:T", "@value": "label"}),
		Value::String(record.label.clone()),
	];
	for (key, value) in &record.properties {
		if key != "id" && key != "label" {
			items.push(Value::String(key.clone()));
			items.push(value.clone());
		}
	}
	json!({"@type": "g:Map", "@value": items})
}

/// Source answering from a fixed set of records.
#[derive(Clone, Debug, Default)]
pub struct StaticSource {
	records: HashMap<String, PropertyRecord>,
}

impl StaticSource {
	/// Source over `records`.
	pub fn new(records: impl IntoIterator<Item = PropertyRecord>) -> Self {
		Self {
			records: records.into_iter().map(|r| (r.id.clone(), r)).collect(),
		}
	}
}

impl ElementSource for StaticSource {
	fn fetch(&self, _kind: ElementKind, ids: Vec<String>) -> LocalBoxFuture<'_, Result<Value, SourceError>> {
		let found: Vec<Value> = ids
			.iter()
			.filter_map(|id| self.records.get(id))
			.map(record_to_value)
			.collect();
		futures::future::ready(Ok(json!({"@type": "g:List", "@value": found}))).boxed_local()
	}
}
