use std::rc::Rc;

use leptos::prelude::*;
use log::info;
use serde_json::Value;

use super::demo::DemoGraph;
use crate::components::graph_vis::{GraphVisCanvas, UiAction};
use crate::config::{ExpandRequest, GraphOptions};
use crate::layout::LayoutKind;
use crate::session::ElementSource;

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let demo = StoredValue::new_local(DemoGraph::new());
	let (response, set_response) = signal(demo.with_value(|d| Some(d.initial_response())));
	let (control, set_control) = signal(None::<UiAction>);
	let layout = RwSignal::new(LayoutKind::Force);

	// the demo answers expands synchronously; a real backend would query here
	let on_expand = Callback::new(move |request: ExpandRequest| {
		info!("expanding {} ({:?})", request.node_id, request.direction);
		let reply: Value = demo.with_value(|d| d.expand(&request));
		set_response.set(Some(reply));
	});
	let source = move || -> Rc<dyn ElementSource> { Rc::new(demo.with_value(DemoGraph::source)) };

	let options = GraphOptions {
		watermark_text: Some("graph-vis-canvas".into()),
		..GraphOptions::default()
	};

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-graph">
				<GraphVisCanvas
					response=response
					source=source()
					options=options
					on_expand=on_expand
					control=control
					fullscreen=true
				/>
				<div class="graph-toolbar">
					<select on:change=move |ev| {
						if let Ok(kind) = event_target_value(&ev).parse::<LayoutKind>() {
							layout.set(kind);
							set_control.set(Some(UiAction::Layout(kind)));
						}
					}>
						{LayoutKind::ALL
							.into_iter()
							.map(|kind| {
								view! {
									<option value=kind.as_str() selected=move || layout.get() == kind>
										{kind.as_str()}
									</option>
								}
							})
							.collect_view()}
					</select>
					<button on:click=move |_| set_control.set(Some(UiAction::Clear))>"Clear"</button>
					<button on:click=move |_| set_response.set(demo.with_value(|d| Some(d.initial_response())))>
						"Run query"
					</button>
				</div>
			</div>
		</ErrorBoundary>
	}
}
