// lineage/graph.rs
// Lineage graph built from catalog dependency rows. Nodes are keyed by
// (schema, name); edges point from the depended-upon object to the dependent.

use crate::db::models::{DependencyRow, ObjectKind};
use std::collections::BTreeMap;
use std::fmt;

/// Stands in for a referenced schema the catalog could not resolve.
pub const UNRESOLVED_SCHEMA: &str = "?";

/// Node identity. Ordering is by schema, then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey {
    pub schema: String,
    pub name: String,
}

impl NodeKey {
    pub fn new(schema: Option<&str>, name: &str) -> Self {
        Self {
            schema: schema.unwrap_or(UNRESOLVED_SCHEMA).to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStyle {
    pub shape: &'static str,
    pub fill_color: &'static str,
}

impl ObjectKind {
    pub fn style(self) -> NodeStyle {
        match self {
            ObjectKind::Table => NodeStyle { shape: "box", fill_color: "lightblue" },
            ObjectKind::View => NodeStyle { shape: "ellipse", fill_color: "lightgoldenrodyellow" },
            ObjectKind::Procedure => NodeStyle { shape: "cds", fill_color: "lightcoral" },
            kind if kind.is_function() => NodeStyle { shape: "invhouse", fill_color: "lightgreen" },
            _ => NodeStyle { shape: "component", fill_color: "lightgrey" },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub key: NodeKey,
    /// Kind observed when the node was first referenced.
    pub kind: ObjectKind,
}

impl GraphNode {
    pub fn style(&self) -> NodeStyle {
        self.kind.style()
    }

    /// Two-line label: `schema.` over `name`.
    pub fn label(&self) -> String {
        format!("{}.\n{}", self.key.schema, self.key.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    /// The object being depended upon.
    pub from: NodeKey,
    /// The dependent object.
    pub to: NodeKey,
}

#[derive(Debug, Clone, Default)]
pub struct LineageGraph {
    name: String,
    nodes: BTreeMap<NodeKey, GraphNode>,
    edges: Vec<DependencyEdge>,
}

impl LineageGraph {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nodes in key order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Edges in the order they were added.
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn node(&self, key: &NodeKey) -> Option<&GraphNode> {
        self.nodes.get(key)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn ensure_node(&mut self, key: &NodeKey, kind: ObjectKind) {
        self.nodes
            .entry(key.clone())
            .or_insert_with(|| GraphNode { key: key.clone(), kind });
    }
}

/// Builds the lineage graph, one edge per dependency row.
pub fn build_graph(dependencies: &[DependencyRow], graph_name: &str) -> LineageGraph {
    let mut graph = LineageGraph {
        name: graph_name.to_string(),
        ..LineageGraph::default()
    };

    for dep in dependencies {
        let dependent = NodeKey::new(Some(&dep.referencing_schema), &dep.referencing_name);
        let depended_upon = NodeKey::new(dep.referenced_schema.as_deref(), &dep.referenced_name);

        graph.ensure_node(&depended_upon, dep.referenced_kind);
        graph.ensure_node(&dependent, dep.referencing_kind);
        graph.edges.push(DependencyEdge {
            from: depended_upon,
            to: dependent,
        });
    }

    graph
}
