pub mod graph_vis;
