use std::cell::RefCell;
use std::rc::Rc;

use leptos::html::Canvas;
use leptos::prelude::*;
use log::{error, info, warn};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{CanvasRenderingContext2d, HtmlAnchorElement, HtmlCanvasElement, MouseEvent, WheelEvent, Window};

use super::overlay::{ContextMenu, DetailsPanel, Legend, SearchBar, StatusBar};
use super::render;
use super::state::{GraphVisState, Outbound};
use super::types::{OverlayView, UiAction};
use crate::config::{ExpandRequest, GraphOptions, STORAGE_KEY, UserConfigs};
use crate::graph::Point;
use crate::session::prefetch::{Batch, DetailsTicket};
use crate::session::{ElementSource, fetch_records};
use crate::view::Button;

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

fn window_size(window: &Window) -> Option<(f64, f64)> {
	Some((
		window.inner_width().ok()?.as_f64()?,
		window.inner_height().ok()?.as_f64()?,
	))
}

fn stored_configs() -> UserConfigs {
	let raw = web_sys::window()
		.and_then(|w| w.local_storage().ok().flatten())
		.and_then(|storage| storage.get_item(STORAGE_KEY).ok().flatten());
	UserConfigs::load_or_default(raw.as_deref())
}

/// Everything the event handlers and the frame loop share.
#[derive(Clone)]
struct Host {
	state: Rc<RefCell<Option<GraphVisState>>>,
	source: Rc<dyn ElementSource>,
	on_expand: Option<Callback<ExpandRequest>>,
	canvas: NodeRef<Canvas>,
	overlay: RwSignal<OverlayView>,
	fullscreen: bool,
	width: Option<f64>,
	height: Option<f64>,
}

impl Host {
	fn with_state<R>(&self, f: impl FnOnce(&mut GraphVisState) -> R) -> Option<R> {
		self.state.borrow_mut().as_mut().map(f)
	}

	/// Pushes a fresh overlay snapshot when it differs from the shown one.
	fn publish(&self) {
		let Some(view) = self.state.borrow().as_ref().map(GraphVisState::overlay) else {
			return;
		};
		if self.overlay.with_untracked(|shown| *shown != view) {
			self.overlay.set(view);
		}
	}

	fn point(&self, ev: &MouseEvent) -> Option<Point> {
		let canvas = self.canvas.get_untracked()?;
		let rect = canvas.get_bounding_client_rect();
		Some(Point::new(
			ev.client_x() as f64 - rect.left(),
			ev.client_y() as f64 - rect.top(),
		))
	}

	fn canvas_size(&self, canvas: &HtmlCanvasElement) -> Option<(f64, f64)> {
		let window = web_sys::window()?;
		let fullscreen = self.fullscreen
			|| self.state.borrow().as_ref().is_some_and(|s| s.fullscreen);
		if fullscreen {
			return window_size(&window);
		}
		let parent = canvas.parent_element();
		Some((
			self.width
				.unwrap_or_else(|| parent.as_ref().map_or(800.0, |p| p.client_width() as f64)),
			self.height
				.unwrap_or_else(|| parent.as_ref().map_or(600.0, |p| p.client_height() as f64)),
		))
	}

	fn fit_canvas(&self) {
		let Some(canvas) = self.canvas.get_untracked() else {
			return;
		};
		let Some((w, h)) = self.canvas_size(&canvas) else {
			return;
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);
		self.with_state(|s| s.resize(w, h));
	}

	fn frame(&self, ctx: &CanvasRenderingContext2d) {
		let Some((changed, batch)) = self.with_state(|s| {
			let was_running = s.session.is_running();
			s.frame();
			render::render(s, ctx);
			(was_running || s.session.is_running(), s.next_prefetch())
		}) else {
			return;
		};
		let started = batch.is_some();
		if let Some(batch) = batch {
			self.prefetch(batch);
		}
		if changed || started {
			self.publish();
		}
	}

	fn ingest(&self, response: &Value) {
		match self.with_state(|s| s.ingest(response)) {
			Some(Err(err)) => error!("could not read query response: {err}"),
			Some(Ok(())) => self.publish(),
			None => {}
		}
	}

	fn run(&self, outbound: Vec<Outbound>) {
		for out in outbound {
			match out {
				Outbound::Expand(request) => match self.on_expand {
					Some(callback) => callback.run(request),
					None => info!("expand requested for {} with no handler", request.node_id),
				},
				Outbound::FetchDetails(ticket) => self.fetch_details(ticket),
				Outbound::ToggleFullscreen => self.fit_canvas(),
				Outbound::ExportImage => self.export_image(),
				Outbound::SaveConfigs => self.save_configs(),
			}
		}
	}

	fn fetch_details(&self, ticket: DetailsTicket) {
		let host = self.clone();
		spawn_local(async move {
			let element = &ticket.element;
			let result = fetch_records(&*host.source, element.kind, vec![element.id.clone()]).await;
			host.with_state(|s| s.details.resolve(ticket, result, s.session.records_mut()));
			host.publish();
		});
	}

	fn prefetch(&self, batch: Batch) {
		let host = self.clone();
		spawn_local(async move {
			let result = fetch_records(&*host.source, batch.kind, batch.ids.clone()).await;
			host.with_state(|s| s.prefetch.complete(&batch, result, s.session.records_mut()));
			host.publish();
		});
	}

	fn save_configs(&self) {
		let Some(json) = self.state.borrow().as_ref().map(|s| s.configs.to_json()) else {
			return;
		};
		let storage = web_sys::window().and_then(|w| w.local_storage().ok().flatten());
		match storage.map(|s| s.set_item(STORAGE_KEY, &json)) {
			Some(Ok(())) => {}
			_ => warn!("could not persist preferences"),
		}
	}

	fn export_image(&self) {
		let Some(canvas) = self.canvas.get_untracked() else {
			return;
		};
		let Ok(url) = canvas.to_data_url() else {
			warn!("canvas could not be exported");
			return;
		};
		let anchor = web_sys::window()
			.and_then(|w| w.document())
			.and_then(|d| d.create_element("a").ok())
			.and_then(|a| a.dyn_into::<HtmlAnchorElement>().ok());
		if let Some(anchor) = anchor {
			anchor.set_href(&url);
			anchor.set_download("canvas.png");
			anchor.click();
		}
	}
}

/// Canvas view of a graph query result, with its menus, legend, search and
/// details overlays.
///
/// Each new `response` value is merged into what is already shown. Property
/// records are requested from `source` on demand, and expand requests go to
/// `on_expand`, whose answer is expected back as a later `response`.
#[component]
pub fn GraphVisCanvas(
	#[prop(into)] response: Signal<Option<Value>>,
	source: Rc<dyn ElementSource>,
	#[prop(optional)] options: GraphOptions,
	#[prop(optional, into)] on_expand: Option<Callback<ExpandRequest>>,
	/// Layout and clear requests from the surrounding page.
	#[prop(optional, into)]
	control: Option<Signal<Option<UiAction>>>,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<Canvas>::new();
	let overlay = RwSignal::new(OverlayView::default());
	let (action, set_action) = signal(None::<UiAction>);
	let host = Host {
		state: Rc::new(RefCell::new(None)),
		source,
		on_expand,
		canvas: canvas_ref,
		overlay,
		fullscreen,
		width,
		height,
	};
	// responses that arrive before the canvas is mounted
	let pending: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));
	let animate: FrameCallback = Rc::new(RefCell::new(None));
	let resize_cb: FrameCallback = Rc::new(RefCell::new(None));

	let (host_init, pending_init) = (host.clone(), pending.clone());
	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let Some(window) = web_sys::window() else {
			return;
		};
		let Some(ctx) = canvas
			.get_context("2d")
			.ok()
			.flatten()
			.and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
		else {
			error!("canvas has no 2d context");
			return;
		};
		let (w, h) = host_init.canvas_size(&canvas).unwrap_or((800.0, 600.0));
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);
		*host_init.state.borrow_mut() = Some(GraphVisState::new(
			&options,
			stored_configs(),
			w,
			h,
			Some(js_sys::Date::now),
		));
		if let Some(value) = pending_init.borrow_mut().take() {
			host_init.ingest(&value);
		}

		let host_resize = host_init.clone();
		*resize_cb.borrow_mut() = Some(Closure::new(move || host_resize.fit_canvas()));
		if let Some(cb) = resize_cb.borrow().as_ref() {
			let _ = window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
		}

		let (host_anim, animate_inner) = (host_init.clone(), animate.clone());
		*animate.borrow_mut() = Some(Closure::new(move || {
			host_anim.frame(&ctx);
			if let (Some(cb), Some(window)) = (animate_inner.borrow().as_ref(), web_sys::window()) {
				let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}));
		if let Some(cb) = animate.borrow().as_ref() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	let host_response = host.clone();
	Effect::new(move |_| {
		let Some(value) = response.get() else {
			return;
		};
		if host_response.state.borrow().is_none() {
			*pending.borrow_mut() = Some(value);
			return;
		}
		host_response.ingest(&value);
	});

	let host_action = host.clone();
	Effect::new(move |_| {
		let Some(action) = action.get() else {
			return;
		};
		let outbound = host_action.with_state(|s| s.dispatch(action)).unwrap_or_default();
		host_action.run(outbound);
		host_action.publish();
	});

	if let Some(control) = control {
		Effect::new(move |_| {
			if let Some(action) = control.get() {
				set_action.set(Some(action));
			}
		});
	}

	let host_md = host.clone();
	let on_mousedown = move |ev: MouseEvent| {
		let Some(p) = host_md.point(&ev) else {
			return;
		};
		let button = if ev.button() == 2 {
			Button::Secondary
		} else {
			Button::Primary
		};
		let outbound = host_md.with_state(|s| s.pointer_down(p, button)).unwrap_or_default();
		host_md.run(outbound);
		host_md.publish();
	};

	let host_mm = host.clone();
	let on_mousemove = move |ev: MouseEvent| {
		let Some(p) = host_mm.point(&ev) else {
			return;
		};
		let outbound = host_mm.with_state(|s| s.pointer_move(p)).unwrap_or_default();
		host_mm.run(outbound);
		host_mm.publish();
	};

	let host_mu = host.clone();
	let on_mouseup = move |ev: MouseEvent| {
		let Some(p) = host_mu.point(&ev) else {
			return;
		};
		let outbound = host_mu.with_state(|s| s.pointer_up(p)).unwrap_or_default();
		host_mu.run(outbound);
		host_mu.publish();
	};

	let on_mouseleave = on_mouseup.clone();

	let host_wh = host.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let Some(p) = host_wh.point(&ev) else {
			return;
		};
		host_wh.with_state(|s| s.wheel(p, ev.delta_y()));
		host_wh.publish();
	};

	let class = move || {
		if fullscreen || overlay.with(|o| o.fullscreen) {
			"graph-vis fullscreen"
		} else {
			"graph-vis"
		}
	};
	let cursor = move || format!("display: block; cursor: {};", overlay.with(|o| o.cursor));

	view! {
		<div class=class>
			<canvas
				node_ref=canvas_ref
				class="graph-vis-canvas"
				on:mousedown=on_mousedown
				on:mousemove=on_mousemove
				on:mouseup=on_mouseup
				on:mouseleave=on_mouseleave
				on:wheel=on_wheel
				on:contextmenu=|ev: MouseEvent| ev.prevent_default()
				style=cursor
			/>
			<SearchBar overlay act=set_action />
			<Legend overlay act=set_action />
			<DetailsPanel overlay />
			<ContextMenu overlay act=set_action />
			<StatusBar overlay />
		</div>
	}
}
