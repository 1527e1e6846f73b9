// dot.rs — Graphviz DOT output for graphs and function libraries
//
// Renders a top-level graph, optionally followed by one cluster per library
// function, in a form suitable for `dot` and other Graphviz layout engines.
// Used to inspect a program before and after rearrangement.
//
// Preconditions: none.
// Postconditions: output is deterministic for a given graph and library;
//                 node IDs are unique across clusters.
// Failure modes: a library function whose nodes do not form a graph.
// Side effects: none.

use std::fmt::{self, Write};

use crate::error::Result;
use crate::graph::{Edge, Graph, NodeKind};
use crate::library::FunctionLibrary;

/// Emit a single graph as a DOT string.
pub fn emit_dot(graph: &Graph) -> String {
    let mut buf = String::new();
    let _ = write_document(&mut buf, |buf| write_cluster_contents(buf, "g", graph, "    "));
    buf
}

/// Emit the top-level graph plus every library function, each in its own
/// cluster.
pub fn emit_program_dot(graph: &Graph, library: &FunctionLibrary) -> Result<String> {
    let mut bodies = Vec::with_capacity(library.len());
    for fdef in library.functions() {
        bodies.push((fdef.name(), Graph::from_node_defs(&fdef.nodes)?));
    }

    let mut buf = String::new();
    let _ = write_document(&mut buf, |buf| {
        writeln!(buf, "    subgraph cluster_graph {{")?;
        writeln!(buf, "        label=\"graph\";")?;
        writeln!(buf, "        style=rounded;")?;
        writeln!(buf, "        color=gray50;")?;
        write_cluster_contents(buf, "g", graph, "        ")?;
        writeln!(buf, "    }}")?;
        for (i, (name, body)) in bodies.iter().enumerate() {
            let prefix = format!("f{}", i);
            writeln!(buf)?;
            writeln!(buf, "    subgraph cluster_{}_{} {{", prefix, sanitize(name))?;
            writeln!(buf, "        label=\"function: {}\";", escape(name))?;
            writeln!(buf, "        style=dashed;")?;
            writeln!(buf, "        color=gray70;")?;
            write_cluster_contents(buf, &prefix, body, "        ")?;
            writeln!(buf, "    }}")?;
        }
        Ok(())
    });
    Ok(buf)
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn write_document(
    buf: &mut String,
    body: impl FnOnce(&mut String) -> fmt::Result,
) -> fmt::Result {
    writeln!(buf, "digraph rfa {{")?;
    writeln!(buf, "    rankdir=TB;")?;
    writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];")?;
    writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];")?;
    writeln!(buf)?;
    body(buf)?;
    writeln!(buf, "}}")
}

/// Sanitize a name to valid DOT identifier characters.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

fn node_attrs(name: &str, kind: &NodeKind) -> String {
    let (shape, color) = match kind {
        NodeKind::Arg => ("invhouse", "lightblue"),
        NodeKind::Retval => ("house", "lightblue"),
        NodeKind::Identity => ("ellipse", "gray90"),
        NodeKind::While | NodeKind::If | NodeKind::Call => ("box3d", "lightsalmon"),
        NodeKind::Op(_) => ("box", "white"),
    };
    format!(
        "shape={shape}, style=filled, fillcolor={color}, label=\"{}\\n{}\"",
        escape(name),
        escape(kind.op())
    )
}

fn edge_attrs(edge: &Edge) -> String {
    if edge.control {
        "style=dashed, color=gray50".to_string()
    } else {
        format!("label=\"{}:{}\"", edge.src_output, edge.dst_input)
    }
}

fn write_cluster_contents(buf: &mut String, prefix: &str, graph: &Graph, indent: &str) -> fmt::Result {
    for node in graph.nodes() {
        let attrs = node_attrs(&node.name, &node.kind);
        writeln!(buf, "{indent}{prefix}_n{} [{attrs}];", node.id.0)?;
    }
    let mut edges: Vec<&Edge> = graph.edges().collect();
    edges.sort_by_key(|e| (e.dst.0, e.control, e.dst_input, e.src.0));
    if !edges.is_empty() {
        writeln!(buf)?;
    }
    for edge in edges {
        writeln!(
            buf,
            "{indent}{prefix}_n{} -> {prefix}_n{} [{}];",
            edge.src.0,
            edge.dst.0,
            edge_attrs(edge)
        )?;
    }
    Ok(())
}
