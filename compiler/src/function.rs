// function.rs — Function definitions and instantiated function bodies
//
// A `FunctionDef` is the serializable snapshot stored in the library; a
// `FunctionBody` is the live graph the rewriters mutate. Argument and
// return placeholders are ordinary nodes whose `index` attribute gives
// their slot and whose `T` attribute gives their type.
//
// Preconditions: arg and retval indices of a body form exactly `0..n`.
// Postconditions: `graph_to_function_def` derives the signature from the
//                 placeholders, so a rewritten body always carries a
//                 signature consistent with its nodes.
// Failure modes: unbound placeholders, index gaps → malformed IR.
// Side effects: none.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attr::AttrMap;
use crate::error::{RearrangeError, Result};
use crate::graph::{Graph, NodeDef, NodeId};
use crate::types::{join_types, DataType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    #[serde(default)]
    pub input_types: Vec<DataType>,
    #[serde(default)]
    pub output_types: Vec<DataType>,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) -> ({})",
            self.name,
            join_types(&self.input_types),
            join_types(&self.output_types)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub signature: Signature,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
}

impl FunctionDef {
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    /// Build a definition from a node list, deriving the signature. Types
    /// given as placeholders are left out of the signature.
    pub fn from_nodes(name: impl Into<String>, nodes: Vec<NodeDef>) -> Result<FunctionDef> {
        let graph = Graph::from_node_defs(&nodes)?;
        let (args, rets) = placeholder_nodes(&graph)?;
        Ok(FunctionDef {
            signature: Signature {
                name: name.into(),
                input_types: signature_types(&graph, &args),
                output_types: signature_types(&graph, &rets),
            },
            nodes,
        })
    }
}

fn signature_types(graph: &Graph, ids: &[NodeId]) -> Vec<DataType> {
    ids.iter()
        .filter_map(|id| graph.node(*id).ok())
        .filter_map(|n| n.attr_type("T").ok())
        .collect()
}

/// A function instantiated into a mutable graph.
#[derive(Debug, Clone)]
pub struct FunctionBody {
    pub name: String,
    pub graph: Graph,
    /// Argument nodes ordered by their original `index`.
    pub arg_nodes: Vec<NodeId>,
    /// Return nodes ordered by their original `index`.
    pub ret_nodes: Vec<NodeId>,
}

impl FunctionBody {
    /// Instantiate `fdef`, resolving placeholder attributes against `bound`.
    /// Errors carry no function context; callers add it.
    pub fn instantiate(fdef: &FunctionDef, bound: &AttrMap) -> Result<FunctionBody> {
        let mut nodes = Vec::with_capacity(fdef.nodes.len());
        for def in &fdef.nodes {
            let mut resolved = def.clone();
            for value in resolved.attrs.values_mut() {
                *value = value.substitute(bound, &def.name)?;
            }
            nodes.push(resolved);
        }
        let graph = Graph::from_node_defs(&nodes)?;
        let (arg_nodes, ret_nodes) = placeholder_nodes(&graph)?;
        Ok(FunctionBody {
            name: fdef.name().to_string(),
            graph,
            arg_nodes,
            ret_nodes,
        })
    }

    pub fn to_function_def(&self, name: &str) -> Result<FunctionDef> {
        graph_to_function_def(&self.graph, name)
    }
}

/// Arg and retval nodes, each ordered by `index`. Indices must be `0..n`.
fn placeholder_nodes(graph: &Graph) -> Result<(Vec<NodeId>, Vec<NodeId>)> {
    let mut args = Vec::new();
    let mut rets = Vec::new();
    for node in graph.nodes() {
        if node.is_arg() {
            args.push((node.attr_index("index")?, node.id, node.name.clone()));
        } else if node.is_retval() {
            rets.push((node.attr_index("index")?, node.id, node.name.clone()));
        }
    }
    Ok((order_by_index(args, "argument")?, order_by_index(rets, "return")?))
}

fn order_by_index(mut nodes: Vec<(usize, NodeId, String)>, what: &str) -> Result<Vec<NodeId>> {
    nodes.sort_by_key(|(index, _, _)| *index);
    for (expected, (index, _, name)) in nodes.iter().enumerate() {
        if *index != expected {
            return Err(RearrangeError::malformed(
                name,
                format!("{} index {} found where {} was expected", what, index, expected),
            ));
        }
    }
    Ok(nodes.into_iter().map(|(_, id, _)| id).collect())
}

/// Serialize a function graph under `name`.
pub fn graph_to_function_def(graph: &Graph, name: &str) -> Result<FunctionDef> {
    let (args, rets) = placeholder_nodes(graph).map_err(|e| e.in_function(name))?;
    let mut input_types = Vec::with_capacity(args.len());
    for id in &args {
        input_types.push(graph.node(*id)?.attr_type("T")?);
    }
    let mut output_types = Vec::with_capacity(rets.len());
    for id in &rets {
        output_types.push(graph.node(*id)?.attr_type("T")?);
    }
    Ok(FunctionDef {
        signature: Signature {
            name: name.to_string(),
            input_types,
            output_types,
        },
        nodes: graph.to_node_defs().map_err(|e| e.in_function(name))?,
    })
}
