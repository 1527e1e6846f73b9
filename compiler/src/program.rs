// program.rs — Serialized programs: a top-level graph plus its library
//
// The on-disk form is a single JSON document:
//
//   { "graph": { "nodes": [NodeDef...] }, "library": [FunctionDef...] }
//
// Loading validates the graph and library by converting them into their
// live forms; saving serializes the live forms back.
//
// Preconditions: none.
// Postconditions: `Program::from_parts(&g, &l)` followed by `into_parts()`
//                 yields an equivalent graph and library.
// Failure modes: I/O errors, malformed JSON, invalid graph or library →
//                `ProgramError`.
// Side effects: `load`/`save` touch the filesystem.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attr::AttrValue;
use crate::error::RearrangeError;
use crate::function::FunctionDef;
use crate::graph::{Graph, NodeDef};
use crate::library::FunctionLibrary;

#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid program JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid program: {0}")]
    Ir(#[from] RearrangeError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDef {
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub graph: GraphDef,
    #[serde(default)]
    pub library: Vec<FunctionDef>,
}

impl Program {
    pub fn from_json(text: &str) -> Result<Program, ProgramError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ProgramError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Program, ProgramError> {
        let text = std::fs::read_to_string(path).map_err(|source| ProgramError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Program::from_json(&text)
    }

    pub fn save(&self, path: &Path) -> Result<(), ProgramError> {
        let mut text = self.to_json()?;
        text.push('\n');
        std::fs::write(path, text).map_err(|source| ProgramError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the live graph and library.
    pub fn into_parts(self) -> Result<(Graph, FunctionLibrary), ProgramError> {
        let graph = Graph::from_node_defs(&self.graph.nodes)?;
        let library = FunctionLibrary::from_defs(self.library)?;
        Ok((graph, library))
    }

    pub fn from_parts(graph: &Graph, library: &FunctionLibrary) -> Result<Program, ProgramError> {
        Ok(Program {
            graph: GraphDef {
                nodes: graph.to_node_defs()?,
            },
            library: library.to_defs(),
        })
    }
}

// ── Summary ─────────────────────────────────────────────────────────────────

/// Human-readable overview: graph nodes with their function references,
/// then every library signature in name order.
pub fn summary(graph: &Graph, library: &FunctionLibrary) -> String {
    let mut out = String::new();
    let _ = write_summary(&mut out, graph, library);
    out
}

fn write_summary(out: &mut String, graph: &Graph, library: &FunctionLibrary) -> std::fmt::Result {
    writeln!(out, "graph: {} nodes", graph.num_nodes())?;
    for node in graph.nodes() {
        write!(out, "  {} = {}", node.name, node.kind.op())?;
        for (key, value) in &node.attrs {
            if matches!(value, AttrValue::Func(_) | AttrValue::FuncList(_)) {
                write!(out, " {}={}", key, value)?;
            }
        }
        writeln!(out)?;
    }
    writeln!(out, "library: {} functions", library.len())?;
    for fdef in library.functions() {
        writeln!(out, "  {}", fdef.signature)?;
    }
    Ok(())
}
