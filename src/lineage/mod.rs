pub mod dot;
pub mod emit;
pub mod graph;
pub mod render;
