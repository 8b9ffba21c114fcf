use std::collections::HashSet;
use std::f64::consts::PI;

use web_sys::CanvasRenderingContext2d;

use super::state::GraphVisState;
use crate::graph::geometry::{EdgeGeometry, EdgeShape};
use crate::graph::{Edge, Point};
use crate::view::labels::{CLICKED_COLOR, FOCUSED_COLOR};
use crate::view::{PlacedLabel, Viewport};

const BACKGROUND: &str = "#fafafa";
const GRID: &str = "#bbdefb";
const EDGE: &str = "#bdbdbd";
const SEARCH: &str = "#1565c0";
const WATERMARK: &str = "#37474f";
const ARROW_SIZE: f64 = 6.0;

pub fn render(state: &GraphVisState, ctx: &CanvasRenderingContext2d) {
	let viewport = &state.viewport;
	let (w, h) = (viewport.width(), viewport.height());
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, w, h);
	if state.interaction.show_grid {
		draw_grid(viewport, ctx);
	}

	let (scale, pivot) = (viewport.scale(), viewport.pivot());
	ctx.save();
	let _ = ctx.scale(scale, scale);
	let _ = ctx.translate(-pivot.x, -pivot.y);
	draw_edges(state, ctx);
	draw_nodes(state, ctx);
	ctx.restore();

	draw_labels(state.labels(), ctx);
	if let Some(text) = &state.watermark {
		draw_watermark(text, w, h, ctx);
	}
}

fn draw_grid(viewport: &Viewport, ctx: &CanvasRenderingContext2d) {
	let (xs, ys) = viewport.grid_lines();
	ctx.set_stroke_style_str(GRID);
	ctx.set_line_width(1.0);
	ctx.begin_path();
	for x in xs {
		ctx.move_to(x, 0.0);
		ctx.line_to(x, viewport.height());
	}
	for y in ys {
		ctx.move_to(0.0, y);
		ctx.line_to(viewport.width(), y);
	}
	ctx.stroke();
}

fn draw_edges(state: &GraphVisState, ctx: &CanvasRenderingContext2d) {
	let model = state.session.model();
	let selection = &state.interaction.selection;
	let scale = state.viewport.scale();
	let searched: HashSet<&str> = state.interaction.search_matches.iter().map(String::as_str).collect();
	let touches_selected = |edge: &Edge| {
		[&selection.hover_node, &selection.click_node]
			.into_iter()
			.flatten()
			.any(|id| edge.touches(id))
	};

	let mut emphasised = Vec::new();
	for &slot in state.drawn_edges() {
		let (Some(edge), Some(geometry)) = (model.edges().get(slot), state.geometry().get(&slot)) else {
			continue;
		};
		draw_edge(ctx, geometry, EDGE, 1.0, 0.5);
		if searched.contains(edge.id.as_str()) {
			emphasised.push((geometry, SEARCH));
		}
		if touches_selected(edge) {
			let color = state
				.edge_palette
				.get(&edge.label)
				.map_or(EDGE, |entry| entry.swatch().strong);
			emphasised.push((geometry, color));
		}
	}
	let width = 1.0 + 1.0 / scale;
	for (geometry, color) in emphasised {
		draw_edge(ctx, geometry, color, width, 1.0);
	}

	// focused and clicked edges go on top of everything else
	let slot_of = |id: &Option<String>| {
		let id = id.as_deref()?;
		let slot = model.edge_slot(id)?;
		state.geometry().get(&slot)
	};
	if let Some(geometry) = slot_of(&selection.hover_edge) {
		draw_edge(ctx, geometry, FOCUSED_COLOR, width, 1.0);
	}
	if let Some(geometry) = slot_of(&selection.click_edge) {
		draw_edge(ctx, geometry, CLICKED_COLOR, width, 1.0);
	}
}

fn draw_edge(ctx: &CanvasRenderingContext2d, geometry: &EdgeGeometry, color: &str, width: f64, alpha: f64) {
	let (s, t) = (geometry.source, geometry.target);
	ctx.set_global_alpha(alpha);
	ctx.set_stroke_style_str(color);
	ctx.set_line_width(width);
	ctx.begin_path();
	ctx.move_to(s.x, s.y);
	match geometry.shape {
		EdgeShape::SelfLoop { c1, c2 } => {
			ctx.bezier_curve_to(c1.x, c1.y, c2.x, c2.y, s.x, s.y);
		}
		EdgeShape::Line => ctx.line_to(t.x, t.y),
		EdgeShape::Curve(curve) => {
			ctx.quadratic_curve_to(curve.c1.x, curve.c1.y, curve.mid.x, curve.mid.y);
			ctx.quadratic_curve_to(curve.c2.x, curve.c2.y, t.x, t.y);
		}
	}
	ctx.stroke();
	ctx.set_global_alpha(1.0);
	if !geometry.is_self_loop() {
		draw_arrow(ctx, geometry.midpoint(), geometry.angle(), color);
	}
}

fn draw_arrow(ctx: &CanvasRenderingContext2d, tip: Point, angle: f64, color: &str) {
	let wing = |offset: f64| {
		Point::new(
			tip.x - (angle + offset).cos() * ARROW_SIZE,
			tip.y - (angle + offset).sin() * ARROW_SIZE,
		)
	};
	let (a, b) = (wing(PI / 10.0), wing(-PI / 10.0));
	ctx.set_fill_style_str(color);
	ctx.begin_path();
	ctx.move_to(tip.x, tip.y);
	ctx.line_to(a.x, a.y);
	ctx.line_to(b.x, b.y);
	ctx.close_path();
	ctx.fill();
}

fn draw_nodes(state: &GraphVisState, ctx: &CanvasRenderingContext2d) {
	let scale = state.viewport.scale();
	let selection = &state.interaction.selection;
	let searched: HashSet<&str> = state.interaction.search_matches.iter().map(String::as_str).collect();

	let mut highlighted = Vec::new();
	for node in state.session.model().nodes() {
		let Some(entry) = state.node_palette.get(&node.label) else {
			continue;
		};
		if entry.hidden || !state.viewport.is_node_on_screen(node.pos(), 15.0) {
			continue;
		}
		let fill = entry.swatch().strong;
		if searched.contains(node.id.as_str()) {
			highlighted.push((node.pos(), fill, SEARCH));
		} else if selection.is_highlighted_node(&node.id) {
			highlighted.push((node.pos(), fill, "#ffffff"));
		} else {
			let outline = if scale < 0.5 { 0.0 } else { 2.0 };
			draw_circle(ctx, node.pos(), 10.0 + 1.0 / scale, fill, "#ffffff", outline);
		}
	}
	for (pos, fill, ring) in highlighted {
		draw_circle(ctx, pos, 12.0 + 4.0 / scale, fill, ring, 2.0 + 3.0 / scale);
	}
}

fn draw_circle(ctx: &CanvasRenderingContext2d, c: Point, r: f64, fill: &str, stroke: &str, width: f64) {
	ctx.begin_path();
	let _ = ctx.arc(c.x, c.y, r, 0.0, 2.0 * PI);
	ctx.set_fill_style_str(fill);
	ctx.fill();
	if width > 0.0 {
		ctx.set_stroke_style_str(stroke);
		ctx.set_line_width(width);
		ctx.stroke();
	}
}

fn draw_labels(labels: &[PlacedLabel], ctx: &CanvasRenderingContext2d) {
	ctx.set_text_align("center");
	ctx.set_text_baseline("bottom");
	for label in labels {
		let weight = if label.highlight { "600" } else { "400" };
		ctx.set_font(&format!("{weight} 12px ui-sans-serif, system-ui, sans-serif"));
		ctx.save();
		let _ = ctx.translate(label.anchor.x, label.anchor.y);
		let _ = ctx.rotate(label.rect.rotation);
		ctx.set_line_width(3.0);
		ctx.set_stroke_style_str("#ffffff");
		let _ = ctx.stroke_text(&label.text, 0.0, 0.0);
		ctx.set_fill_style_str(label.color);
		let _ = ctx.fill_text(&label.text, 0.0, 0.0);
		ctx.restore();
	}
}

fn draw_watermark(text: &str, w: f64, h: f64, ctx: &CanvasRenderingContext2d) {
	ctx.set_font("600 18px ui-sans-serif, system-ui, sans-serif");
	ctx.set_text_align("right");
	ctx.set_text_baseline("bottom");
	ctx.set_line_width(2.0);
	ctx.set_stroke_style_str("#ffffff");
	let _ = ctx.stroke_text(text, w - 12.0, h - 12.0);
	ctx.set_fill_style_str(WATERMARK);
	let _ = ctx.fill_text(text, w - 12.0, h - 12.0);
}
