//! `property=value` search over fetched property records.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::Value;

use super::types::{PropertyRecord, value_to_text};

/// Most suggestions offered for one term.
pub const MAX_SUGGESTIONS: usize = 10;

fn split_term(term: &str) -> (&str, Option<&str>) {
	match term.split_once('=') {
		Some((prop, value)) => (prop, Some(value)),
		None => (term, None),
	}
}

fn searchable(record: &PropertyRecord) -> impl Iterator<Item = (&str, String)> {
	let primitives = record
		.properties
		.iter()
		.filter(|(_, v)| !matches!(v, Value::Object(_) | Value::Array(_)))
		.map(|(k, v)| (k.as_str(), value_to_text(v)));
	[("id", record.id.clone()), ("label", record.label.clone())]
		.into_iter()
		.chain(primitives)
}

fn rank(suggestion: &str) -> u8 {
	if suggestion.starts_with("id=") {
		0
	} else if suggestion.starts_with("label=") {
		1
	} else {
		2
	}
}

/// Completions for a partially typed term: property names until an `=` is
/// typed, then values of that property.
pub fn suggestions<'a>(
	term: &str,
	records: impl IntoIterator<Item = &'a PropertyRecord>,
) -> Vec<String> {
	let (property, value) = split_term(term);
	let mut out: Vec<String> = records
		.into_iter()
		.flat_map(|record| {
			searchable(record)
				.filter_map(|(prop, text)| match value {
					None if prop.starts_with(property) => Some(format!("{prop}=")),
					Some(prefix) if prop == property && text.starts_with(prefix) => {
						Some(format!("{prop}={text}"))
					}
					_ => None,
				})
				.collect::<Vec<_>>()
		})
		.collect();
	out.sort_by(|a, b| match rank(a).cmp(&rank(b)) {
		Ordering::Equal => a.cmp(b),
		other => other,
	});
	out.dedup();
	out.truncate(MAX_SUGGESTIONS);
	out
}

/// Ids of every record whose property equals the term's value exactly.
pub fn search(term: &str, records: &HashMap<String, PropertyRecord>) -> Vec<String> {
	let (property, Some(value)) = split_term(term) else {
		return Vec::new();
	};
	if value.is_empty() {
		return Vec::new();
	}
	let mut ids: Vec<String> = records
		.values()
		.filter(|record| record.get(property).as_deref() == Some(value))
		.map(|record| record.id.clone())
		.collect();
	ids.sort();
	ids
}
