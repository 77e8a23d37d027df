// lineage/dot.rs
// Graphviz DOT serialization of a lineage graph.

use super::graph::LineageGraph;
use std::fmt::Write as _;

fn escape_dot_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Serializes the graph. Nodes are emitted in key order and edges in
/// insertion order, so the same graph always yields the same text.
pub fn to_dot(graph: &LineageGraph) -> String {
    let mut dot = String::new();
    let name = escape_dot_string(graph.name());

    // Writing to a String cannot fail.
    let _ = writeln!(dot, "// Dependency lineage: {}", name);
    let _ = writeln!(dot, "digraph \"{}\" {{", name);
    dot.push_str("\tgraph [nodesep=0.5 overlap=false rankdir=LR ranksep=1.0 splines=true]\n");
    dot.push_str("\tnode [fontname=Helvetica shape=box style=filled]\n");
    dot.push_str("\tedge [arrowhead=open color=gray50]\n");

    for node in graph.nodes() {
        let style = node.style();
        let _ = writeln!(
            dot,
            "\t\"{}\" [label=\"{}\" fillcolor={} shape={}]",
            escape_dot_string(&node.key.to_string()),
            escape_dot_string(&node.label()),
            style.fill_color,
            style.shape,
        );
    }

    for edge in graph.edges() {
        let _ = writeln!(
            dot,
            "\t\"{}\" -> \"{}\"",
            escape_dot_string(&edge.from.to_string()),
            escape_dot_string(&edge.to.to_string()),
        );
    }

    dot.push_str("}\n");
    dot
}
