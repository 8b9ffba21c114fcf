//! Background property prefetch and the clicked element's details.
//!
//! Both are plain state machines. The caller takes a request out, performs
//! the fetch through an [`ElementSource`](super::source::ElementSource), and
//! feeds the result back in; nothing here awaits.

use std::collections::{HashMap, HashSet};

use log::{debug, error, warn};

use super::source::SourceError;
use crate::graph::{ElementKind, ElementRef, GraphModel, PropertyRecord};

/// Consecutive failed batches after which prefetching gives up.
pub const MAX_FAILURES: u32 = 3;

/// Ids to fetch in one request, all of one kind. Completing a batch taken
/// before the last [`PropsPrefetcher::reset`] is a no-op.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
	generation: u64,
	/// Whether the ids name vertices or edges.
	pub kind: ElementKind,
	/// Element ids, at most one page of them.
	pub ids: Vec<String>,
}

/// How many elements have their properties settled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Progress {
	/// Elements with a record, or known to have none.
	pub done: usize,
	/// Elements that can have a record.
	pub total: usize,
}

/// Where prefetching stands for the current graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrefetchStatus {
	/// Prefetch is off.
	Disabled,
	/// Batches are still being fetched.
	Running(Progress),
	/// Nothing is left to fetch.
	Done(Progress),
	/// Too many consecutive batches failed.
	Stalled(Progress),
}

/// Fetches property records for every model element that has none yet,
/// vertices first, one batch at a time.
#[derive(Clone, Debug)]
pub struct PropsPrefetcher {
	enabled: bool,
	page_size: usize,
	failures: u32,
	pending: bool,
	generation: u64,
	// ids the source answered without a record; never asked for again
	unavailable: HashSet<String>,
}

impl PropsPrefetcher {
	/// Disabled prefetcher requesting `page_size` ids per batch.
	pub fn new(page_size: usize) -> Self {
		Self {
			enabled: false,
			page_size: page_size.max(1),
			failures: 0,
			pending: false,
			generation: 0,
			unavailable: HashSet::new(),
		}
	}

	/// Whether prefetch is on.
	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	/// Turning prefetch back on forgets earlier failures.
	pub fn set_enabled(&mut self, enabled: bool) {
		if enabled && !self.enabled {
			self.failures = 0;
		}
		self.enabled = enabled;
	}

	/// Switches prefetch on or off.
	pub fn toggle(&mut self) {
		self.set_enabled(!self.enabled);
	}

	/// Whether a batch is in flight.
	pub fn is_pending(&self) -> bool {
		self.pending
	}

	/// Whether prefetch gave up after [`MAX_FAILURES`] failed batches.
	pub fn is_stalled(&self) -> bool {
		self.failures >= MAX_FAILURES
	}

	fn missing<'a>(
		&'a self,
		ids: impl Iterator<Item = &'a String> + 'a,
		records: &'a HashMap<String, PropertyRecord>,
	) -> impl Iterator<Item = &'a String> + 'a {
		ids.filter(move |id| !records.contains_key(*id) && !self.unavailable.contains(*id))
	}

	/// Progress over the vertices and non-connective edges of `model`.
	pub fn progress(&self, model: &GraphModel, records: &HashMap<String, PropertyRecord>) -> Progress {
		let nodes = model.nodes().iter().map(|n| &n.id);
		let edges = model.edges().iter().filter(|e| !e.is_connective()).map(|e| &e.id);
		let total = nodes.len() + model.edges().iter().filter(|e| !e.is_connective()).count();
		let missing = self.missing(nodes, records).count() + self.missing(edges, records).count();
		Progress {
			done: total - missing,
			total,
		}
	}

	/// Current status for `model`.
	pub fn status(&self, model: &GraphModel, records: &HashMap<String, PropertyRecord>) -> PrefetchStatus {
		let progress = self.progress(model, records);
		if !self.enabled {
			PrefetchStatus::Disabled
		} else if progress.done == progress.total {
			PrefetchStatus::Done(progress)
		} else if self.is_stalled() {
			PrefetchStatus::Stalled(progress)
		} else {
			PrefetchStatus::Running(progress)
		}
	}

	/// The next batch to request, if prefetch is enabled, no request is in
	/// flight and something is still missing.
	pub fn next_batch(
		&mut self,
		model: &GraphModel,
		records: &HashMap<String, PropertyRecord>,
	) -> Option<Batch> {
		if !self.enabled || self.pending || self.is_stalled() {
			return None;
		}
		let nodes: Vec<String> = self
			.missing(model.nodes().iter().map(|n| &n.id), records)
			.take(self.page_size)
			.cloned()
			.collect();
		let batch = if !nodes.is_empty() {
			Batch {
				generation: self.generation,
				kind: ElementKind::Vertex,
				ids: nodes,
			}
		} else {
			let edges: Vec<String> = self
				.missing(
					model.edges().iter().filter(|e| !e.is_connective()).map(|e| &e.id),
					records,
				)
				.take(self.page_size)
				.cloned()
				.collect();
			if edges.is_empty() {
				return None;
			}
			Batch {
				generation: self.generation,
				kind: ElementKind::Edge,
				ids: edges,
			}
		};
		self.pending = true;
		Some(batch)
	}

	/// Stores the outcome of `batch`. Returns how many records arrived;
	/// a batch from before the last reset stores nothing.
	pub fn complete(
		&mut self,
		batch: &Batch,
		result: Result<Vec<PropertyRecord>, SourceError>,
		records: &mut HashMap<String, PropertyRecord>,
	) -> usize {
		if batch.generation != self.generation {
			debug!("dropping stale prefetch of {} {} records", batch.ids.len(), batch.kind.code());
			return 0;
		}
		self.pending = false;
		match result {
			Ok(fetched) => {
				self.failures = 0;
				let count = fetched.len();
				for record in fetched {
					records.insert(record.id.clone(), record);
				}
				for id in &batch.ids {
					if !records.contains_key(id) {
						self.unavailable.insert(id.clone());
					}
				}
				debug!("prefetched {count} of {} {} records", batch.ids.len(), batch.kind.code());
				count
			}
			Err(err) => {
				self.failures += 1;
				if self.is_stalled() {
					error!("property prefetch stopped after {} failures: {err}", self.failures);
				} else {
					warn!("property prefetch failed: {err}");
				}
				0
			}
		}
	}

	/// Forgets everything learned about the current graph, including the
	/// batch in flight.
	pub fn reset(&mut self) {
		self.generation += 1;
		self.failures = 0;
		self.pending = false;
		self.unavailable.clear();
	}
}

/// What the details panel shows.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Details {
	/// Nothing selected.
	#[default]
	Empty,
	/// Waiting for the element's record.
	Loading(ElementRef),
	/// The element's record.
	Ready(PropertyRecord),
	/// The fetch failed or returned no record for the element.
	Unavailable(ElementRef),
}

/// A details request in flight. Resolving a ticket from an older request
/// than the latest one is a no-op.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetailsTicket {
	generation: u64,
	/// Element being fetched.
	pub element: ElementRef,
}

/// Tracks the details panel and discards answers to superseded requests.
#[derive(Clone, Debug, Default)]
pub struct DetailsLoader {
	generation: u64,
	details: Details,
}

impl DetailsLoader {
	/// Empty loader.
	pub fn new() -> Self {
		Self::default()
	}

	/// What to show now.
	pub fn details(&self) -> &Details {
		&self.details
	}

	/// Shows `element`. Known records are shown at once; otherwise a ticket
	/// for a single, unretried fetch is returned.
	pub fn request(
		&mut self,
		element: ElementRef,
		records: &HashMap<String, PropertyRecord>,
	) -> Option<DetailsTicket> {
		self.generation += 1;
		if let Some(record) = records.get(&element.id) {
			self.details = Details::Ready(record.clone());
			return None;
		}
		if element.id.starts_with(crate::graph::PATH_EDGE_PREFIX) {
			self.details = Details::Empty;
			return None;
		}
		self.details = Details::Loading(element.clone());
		Some(DetailsTicket {
			generation: self.generation,
			element,
		})
	}

	/// Applies a fetch result. Returns false when the ticket is stale.
	pub fn resolve(
		&mut self,
		ticket: DetailsTicket,
		result: Result<Vec<PropertyRecord>, SourceError>,
		records: &mut HashMap<String, PropertyRecord>,
	) -> bool {
		if ticket.generation != self.generation {
			debug!("dropping stale details for {}", ticket.element.id);
			return false;
		}
		let found = match result {
			Ok(fetched) => {
				let mut found = None;
				for record in fetched {
					if record.id == ticket.element.id {
						found = Some(record.clone());
					}
					records.insert(record.id.clone(), record);
				}
				found
			}
			Err(err) => {
				warn!("details for {} unavailable: {err}", ticket.element.id);
				None
			}
		};
		self.details = match found {
			Some(record) => Details::Ready(record),
			None => Details::Unavailable(ticket.element),
		};
		true
	}

	/// Empties the panel and invalidates pending requests.
	pub fn clear(&mut self) {
		self.generation += 1;
		self.details = Details::Empty;
	}
}
