//! HTML overlays drawn on top of the canvas. They read an [`OverlayView`]
//! snapshot and answer with a [`UiAction`].

use leptos::prelude::*;
use web_sys::{Event, KeyboardEvent};

use super::types::{DetailsView, LegendEntry, MenuView, OverlayView, StatusView, UiAction};
use crate::config::{Direction, ExpandFilter, ExpandPreset, FilterOp};
use crate::graph::{ElementKind, ElementRef, Point};
use crate::view::palette::SWATCHES;
use crate::view::{CanvasAction, NodeAction, PaletteKind};

type Act = WriteSignal<Option<UiAction>>;

const DIRECTIONS: [(Direction, &str); 3] =
	[(Direction::Out, "out"), (Direction::In, "in"), (Direction::Both, "both")];

fn at(p: Point) -> String {
	format!("left: {}px; top: {}px;", p.x, p.y)
}

fn menu_item(label: String, act: Act, action: UiAction) -> impl IntoView {
	view! {
		<div class="graph-menu-item" on:click=move |_| act.set(Some(action.clone()))>
			{label}
		</div>
	}
}

fn checked(label: &str, on: bool) -> String {
	if on { format!("✓ {label}") } else { label.to_string() }
}

#[component]
pub fn ContextMenu(overlay: RwSignal<OverlayView>, act: Act) -> impl IntoView {
	let menu = Memo::new(move |_| overlay.with(|o| o.menu.clone()));
	move || {
		menu.get().map(|menu| match menu {
			MenuView::Node {
				position,
				node_id,
				preset,
				edge_labels,
			} => {
				let expanding = RwSignal::new(false);
				view! {
					<div class="graph-menu" style=at(position)>
						<div class="graph-menu-title">{node_id}</div>
						{menu_item("Center".into(), act, UiAction::Node(NodeAction::Center))}
						{menu_item(
							"Query & View Properties".into(),
							act,
							UiAction::Node(NodeAction::View),
						)}
						<div class="graph-menu-item" on:click=move |_| expanding.update(|e| *e = !*e)>
							"Expand"
						</div>
						<Show when=move || expanding.get()>
							<ExpandForm preset=preset.clone() edge_labels=edge_labels.clone() act />
						</Show>
						{menu_item("Expand All".into(), act, UiAction::Node(NodeAction::ExpandAll))}
						{menu_item("Remove Node".into(), act, UiAction::Node(NodeAction::Remove))}
					</div>
				}
				.into_any()
			}
			MenuView::Canvas {
				position,
				show_labels,
				show_grid,
				fit,
				prefetch,
				fullscreen,
			} => {
				let canvas = |label: String, action| menu_item(label, act, UiAction::Canvas(action));
				view! {
					<div class="graph-menu" style=at(position)>
						{canvas("Reset View".into(), CanvasAction::ResetView)}
						{canvas("Refresh Layout".into(), CanvasAction::RefreshLayout)}
						{canvas(
							if fullscreen { "Exit Full Screen" } else { "Full Screen" }.into(),
							CanvasAction::ToggleFullscreen,
						)}
						{canvas(checked("Prefetch Properties", prefetch), CanvasAction::TogglePrefetch)}
						{canvas(checked("Scale to Fit", fit), CanvasAction::ScaleToFit)}
						{canvas(checked("Show Labels", show_labels), CanvasAction::ToggleLabels)}
						{canvas(checked("Show Grid", show_grid), CanvasAction::ToggleGrid)}
						{canvas("Prune Unconnected Nodes".into(), CanvasAction::PruneUnconnected)}
						{canvas("Export Image".into(), CanvasAction::ExportImage)}
					</div>
				}
				.into_any()
			}
		})
	}
}

/// Edge label, direction, filters and limit for one expand. Starts from the
/// preset last used for the node's label.
#[component]
fn ExpandForm(preset: ExpandPreset, edge_labels: Vec<String>, act: Act) -> impl IntoView {
	let stored = preset.edge_label.clone().unwrap_or_default();
	let custom = RwSignal::new(!stored.is_empty() && !edge_labels.contains(&stored));
	let edge_label = RwSignal::new(stored);
	let direction = RwSignal::new(preset.direction);
	let limit = RwSignal::new(preset.limit);
	let filters = RwSignal::new(preset.filters);
	let (prop, op, value) = (
		RwSignal::new(String::new()),
		RwSignal::new(FilterOp::Eq),
		RwSignal::new(String::new()),
	);

	let on_label = move |ev: Event| {
		let selected = event_target_value(&ev);
		custom.set(selected == "custom");
		edge_label.set(if selected == "custom" { String::new() } else { selected });
	};
	let add_filter = move |_| {
		let (p, v) = (prop.get(), value.get());
		if p.is_empty() || v.is_empty() {
			return;
		}
		filters.update(|f| {
			f.push(ExpandFilter {
				prop: p,
				op: op.get(),
				value: v,
			})
		});
		prop.set(String::new());
		value.set(String::new());
	};
	let submit = move |_| {
		let label = edge_label.get();
		let preset = ExpandPreset {
			direction: direction.get(),
			edge_label: (!label.is_empty()).then_some(label),
			filters: filters.get(),
			limit: limit.get(),
		};
		act.set(Some(UiAction::Node(NodeAction::Expand(preset))));
	};

	view! {
		<div class="graph-expand">
			<div class="graph-expand-heading">"Edge label"</div>
			<select
				on:change=on_label
				prop:value=move || if custom.get() { "custom".to_string() } else { edge_label.get() }
			>
				<option value="">"all"</option>
				{edge_labels
					.into_iter()
					.map(|l| view! { <option value=l.clone()>{l.clone()}</option> })
					.collect_view()}
				<option value="custom">"Custom"</option>
			</select>
			<Show when=move || custom.get()>
				<input
					type="text"
					placeholder="Enter a custom value"
					prop:value=move || edge_label.get()
					on:input=move |ev| edge_label.set(event_target_value(&ev))
				/>
			</Show>

			<div class="graph-expand-heading">"Direction"</div>
			<select
				prop:value=move || {
					DIRECTIONS
						.iter()
						.find(|(d, _)| *d == direction.get())
						.map_or("out", |(_, name)| *name)
				}
				on:change=move |ev| {
					let name = event_target_value(&ev);
					if let Some((d, _)) = DIRECTIONS.iter().find(|(_, n)| *n == name) {
						direction.set(*d);
					}
				}
			>
				{DIRECTIONS
					.into_iter()
					.map(|(_, name)| view! { <option value=name>{name}</option> })
					.collect_view()}
			</select>

			<div class="graph-expand-heading">"Filters"</div>
			{move || {
				let current = filters.get();
				if current.is_empty() {
					return view! { <div>"No filters"</div> }.into_any();
				}
				current
					.into_iter()
					.enumerate()
					.map(|(i, f)| {
						view! {
							<div class="graph-expand-filter">
								<span>{format!("{} {} {}", f.prop, f.op.symbol(), f.value)}</span>
								<button on:click=move |_| filters.update(|all| {
									if i < all.len() {
										all.remove(i);
									}
								})>"×"</button>
							</div>
						}
					})
					.collect_view()
					.into_any()
			}}
			<div class="graph-expand-filter">
				<input
					type="text"
					placeholder="property"
					prop:value=move || prop.get()
					on:input=move |ev| prop.set(event_target_value(&ev))
				/>
				<select on:change=move |ev| {
					let index = event_target_value(&ev).parse::<usize>().unwrap_or(0);
					op.set(FilterOp::ALL.get(index).copied().unwrap_or_default());
				}>
					{FilterOp::ALL
						.iter()
						.enumerate()
						.map(|(i, o)| view! { <option value=i.to_string()>{o.symbol()}</option> })
						.collect_view()}
				</select>
				<input
					type="text"
					placeholder="value"
					prop:value=move || value.get()
					on:input=move |ev| value.set(event_target_value(&ev))
				/>
				<button on:click=add_filter>"+"</button>
			</div>

			<div class="graph-expand-heading">"Limit"</div>
			<input
				type="number"
				min="0"
				prop:value=move || limit.get().to_string()
				on:input=move |ev| limit.set(event_target_value(&ev).parse().unwrap_or(0))
			/>
			<button class="graph-expand-submit" on:click=submit>"Expand"</button>
		</div>
	}
}

fn element_title(element: &ElementRef) -> String {
	match element.kind {
		ElementKind::Vertex => format!("Vertex {}", element.id),
		ElementKind::Edge => format!("Edge {}", element.id),
	}
}

#[component]
pub fn DetailsPanel(overlay: RwSignal<OverlayView>) -> impl IntoView {
	let details = Memo::new(move |_| overlay.with(|o| (o.details.clone(), o.details_anchor)));
	move || {
		let (details, anchor) = details.get();
		let body = match details {
			DetailsView::Hidden => return None,
			DetailsView::Loading { element } => view! {
				<div class="graph-details-title">{element_title(&element)}</div>
				<div class="graph-details-note">"Loading..."</div>
			}
			.into_any(),
			DetailsView::Unavailable { element } => view! {
				<div class="graph-details-title">{element_title(&element)}</div>
				<div class="graph-details-note">"Properties unavailable"</div>
			}
			.into_any(),
			DetailsView::Ready { element, rows } => view! {
				<div class="graph-details-title">{element_title(&element)}</div>
				<div class="graph-details-rows">
					{rows
						.into_iter()
						.map(|(key, value)| {
							view! {
								<span class="graph-details-key">{key}</span>
								<span class="graph-details-value">{value}</span>
							}
						})
						.collect_view()}
				</div>
			}
			.into_any(),
		};
		Some(view! {
			<div class="graph-details" style=at(Point::new(anchor.x + 12.0, anchor.y + 12.0))>
				{body}
			</div>
		})
	}
}

#[component]
pub fn Legend(overlay: RwSignal<OverlayView>, act: Act) -> impl IntoView {
	let entries = Memo::new(move |_| overlay.with(|o| o.legend.clone()));
	// label whose colour and format are being edited
	let editing = RwSignal::new(None::<(PaletteKind, String)>);
	let remember = RwSignal::new(true);

	let row = move |entry: LegendEntry| {
		let (kind, label) = (entry.kind, entry.label.clone());
		let pick = {
			let label = label.clone();
			move |_| {
				editing.update(|e| {
					*e = match e {
						Some((k, l)) if *k == kind && *l == label => None,
						_ => Some((kind, label.clone())),
					}
				})
			}
		};
		let class = if entry.hidden {
			"graph-legend-label hidden"
		} else {
			"graph-legend-label"
		};
		view! {
			<div
				class="graph-legend-swatch"
				style=format!("background-color: {};", entry.hex)
				on:click=pick
			></div>
			<div
				class=class
				on:click=move |_| {
					act.set(Some(UiAction::ToggleHidden {
						kind,
						label: label.clone(),
					}))
				}
			>
				{entry.display}
			</div>
		}
	};

	let editor = move || {
		let (kind, label) = editing.get()?;
		let format = entries.with(|all| {
			all.iter()
				.find(|e| e.kind == kind && e.label == label)
				.map(|e| e.format.clone())
		})?;
		let swatches = SWATCHES
			.iter()
			.enumerate()
			.map(|(color, swatch)| {
				let label = label.clone();
				view! {
					<div
						class="graph-legend-choice"
						title=swatch.name
						style=format!("background-color: {};", swatch.strong)
						on:click=move |_| {
							act.set(Some(UiAction::SetColor {
								kind,
								label: label.clone(),
								color,
							}))
						}
					></div>
				}
			})
			.collect_view();
		let on_format = move |ev| {
			act.set(Some(UiAction::SetFormat {
				label: label.clone(),
				format: event_target_value(&ev),
				remember: remember.get(),
			}))
		};
		Some(view! {
			<div class="graph-legend-editor">
				<div class="graph-legend-choices">{swatches}</div>
				<input
					type="text"
					placeholder="label: e.g. {id}"
					prop:value=format
					on:input=on_format
					on:keydown=move |ev: KeyboardEvent| {
						if ev.key() == "Enter" {
							ev.prevent_default();
							editing.set(None);
						}
					}
				/>
				<label class="graph-legend-remember">
					<input
						type="checkbox"
						prop:checked=move || remember.get()
						on:change=move |ev| remember.set(event_target_checked(&ev))
					/>
					"Remember"
				</label>
			</div>
		})
	};

	move || {
		let all = entries.get();
		if all.is_empty() {
			return None;
		}
		let (nodes, edges): (Vec<_>, Vec<_>) = all.into_iter().partition(|e| e.kind == PaletteKind::Node);
		Some(view! {
			<div class="graph-legend">
				<div class="graph-legend-grid">
					{nodes.into_iter().map(row).collect_view()}
					<div class="graph-legend-separator"></div>
					{edges.into_iter().map(row).collect_view()}
				</div>
				{editor}
			</div>
		})
	}
}

#[component]
pub fn SearchBar(overlay: RwSignal<OverlayView>, act: Act) -> impl IntoView {
	let suggestions = Memo::new(move |_| overlay.with(|o| o.suggestions.clone()));
	let term = Memo::new(move |_| overlay.with(|o| o.search_term.clone()));
	// highlighted suggestion, moved with the arrow keys
	let cursor = RwSignal::new(None::<usize>);

	let on_keydown = move |ev: KeyboardEvent| {
		let count = suggestions.with(Vec::len);
		match ev.key().as_str() {
			"ArrowDown" if count > 0 => {
				ev.prevent_default();
				cursor.update(|c| *c = Some(c.map_or(0, |i| (i + 1) % count)));
			}
			"ArrowUp" if count > 0 => {
				ev.prevent_default();
				cursor.update(|c| *c = Some(c.map_or(count - 1, |i| (i + count - 1) % count)));
			}
			"Enter" => {
				ev.prevent_default();
				let chosen = cursor
					.get()
					.and_then(|i| suggestions.with(|s| s.get(i).cloned()))
					.unwrap_or_else(|| term.get());
				cursor.set(None);
				act.set(Some(UiAction::Search(chosen)));
			}
			"Escape" => cursor.set(None),
			_ => {}
		}
	};

	view! {
		<div class="graph-search">
			<input
				type="text"
				placeholder="Search: key=value"
				prop:value=move || term.get()
				on:input=move |ev| {
					cursor.set(None);
					act.set(Some(UiAction::SearchInput(event_target_value(&ev))));
				}
				on:keydown=on_keydown
			/>
			{move || {
				let all = suggestions.get();
				(!all.is_empty())
					.then(|| {
						view! {
							<div class="graph-search-suggestions">
								{all
									.into_iter()
									.enumerate()
									.map(|(i, s)| {
										let class = move || {
											if cursor.get() == Some(i) {
												"graph-search-suggestion active"
											} else {
												"graph-search-suggestion"
											}
										};
										let chosen = s.clone();
										view! {
											<div
												class=class
												on:click=move |_| act.set(Some(UiAction::Search(chosen.clone())))
											>
												{s}
											</div>
										}
									})
									.collect_view()}
							</div>
						}
					})
			}}
		</div>
	}
}

fn status_text(status: &StatusView) -> String {
	let mut text = format!("{} nodes, {} edges", status.nodes, status.edges);
	if status.running {
		text.push_str(&format!(" · {} layout running", status.layout));
	}
	if let Some((done, total)) = status.prefetch {
		let state = if status.prefetch_stalled { "stalled" } else { "prefetching" };
		text.push_str(&format!(" · {state} {done}/{total}"));
	}
	text
}

#[component]
pub fn StatusBar(overlay: RwSignal<OverlayView>) -> impl IntoView {
	let status = Memo::new(move |_| overlay.with(|o| (o.status.clone(), o.search_matches)));
	view! {
		<div class="graph-status">
			{move || {
				let (status, matches) = status.get();
				let mut text = status_text(&status);
				if matches > 0 {
					text.push_str(&format!(" · {matches} matches"));
				}
				text
			}}
		</div>
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::layout::LayoutKind;

	#[test]
	fn status_line_reports_progress() {
		let mut status = StatusView {
			nodes: 3,
			edges: 2,
			running: true,
			layout: LayoutKind::Radial,
			prefetch: Some((1, 5)),
			prefetch_stalled: false,
		};
		assert_eq!(
			status_text(&status),
			"3 nodes, 2 edges · radial layout running · prefetching 1/5"
		);
		status.running = false;
		status.prefetch_stalled = true;
		assert_eq!(status_text(&status), "3 nodes, 2 edges · stalled 1/5");
	}

	#[test]
	fn element_titles_name_the_kind() {
		assert_eq!(element_title(&ElementRef::edge("e1")), "Edge e1");
		assert_eq!(element_title(&ElementRef::node("v1")), "Vertex v1");
	}
}
