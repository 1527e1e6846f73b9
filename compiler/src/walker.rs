// walker.rs — Recursive rearrangement over the function library
//
// Rewrites a function and, depth first, every function it references.
// Nested functions are rewritten before the nodes that reference them, so a
// call-site rewriter always instantiates the callee's final shape.
//
// Preconditions: the call graph reachable from the entry function is acyclic.
// Postconditions: every rewritten function is in the library under a fresh
//                 name (or replaces the original when `new_func_name` equals
//                 `func_name`); `memo` records every visited instantiation.
// Failure modes: any rewriter error, wrapped with the chain of function
//                names it escaped from; a cyclic reference.
// Side effects: inserts functions into `library`, records into `memo`.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::attr::{canonicalize, AttrMap, AttrValue, NameAttrList};
use crate::error::{RearrangeError, Result};
use crate::graph::{Graph, Node, NodeId, NodeKind};
use crate::library::FunctionLibrary;
use crate::rewrite::{
    maybe_rewrite_call_node, maybe_rewrite_if_node, maybe_rewrite_while_node, renamed,
};

// ── Memo ────────────────────────────────────────────────────────────────────

/// Canonical function key → rewritten name, or `None` when the function was
/// visited and needed no change.
#[derive(Debug, Clone, Default)]
pub struct RewriteMemo {
    entries: BTreeMap<String, Option<String>>,
    /// Keys currently being rewritten further up the stack.
    active: BTreeSet<String>,
}

impl RewriteMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Option<String>> {
        self.entries.get(key)
    }

    pub fn record(&mut self, key: impl Into<String>, new_name: Option<String>) {
        self.entries.insert(key.into(), new_name);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of rearranging one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionOutcome {
    /// Name to reference from now on: the new name when modified, the
    /// original name otherwise.
    pub name: String,
    pub modified: bool,
}

// ── Associated functions ────────────────────────────────────────────────────

/// Where a node refers to a function.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    /// The node's op is itself a library function.
    Call,
    /// A function-valued attribute.
    Attr(String),
    /// One element of a function-list attribute.
    ListAttr(String, usize),
}

#[derive(Debug, Clone)]
struct Associated {
    slot: Slot,
    func: NameAttrList,
}

fn associated_functions(node: &Node, library: &FunctionLibrary) -> Vec<Associated> {
    if let NodeKind::Op(op) = &node.kind {
        if library.contains(op) {
            return vec![Associated {
                slot: Slot::Call,
                func: NameAttrList {
                    name: op.clone(),
                    attrs: node.attrs.clone(),
                },
            }];
        }
    }
    let mut found = Vec::new();
    for (key, value) in &node.attrs {
        match value {
            AttrValue::Func(func) => found.push(Associated {
                slot: Slot::Attr(key.clone()),
                func: func.clone(),
            }),
            AttrValue::FuncList(funcs) => {
                for (i, func) in funcs.iter().enumerate() {
                    found.push(Associated {
                        slot: Slot::ListAttr(key.clone(), i),
                        func: func.clone(),
                    });
                }
            }
            _ => {}
        }
    }
    found
}

fn rewrite_associated_function(
    graph: &mut Graph,
    n: NodeId,
    assoc: &Associated,
    new_name: &str,
) -> Result<()> {
    let node = graph.node_mut(n)?;
    match &assoc.slot {
        Slot::Call => node.kind = NodeKind::Op(new_name.to_string()),
        Slot::Attr(key) => node.set_attr(key.clone(), AttrValue::Func(renamed(&assoc.func, new_name))),
        Slot::ListAttr(key, i) => {
            let AttrValue::FuncList(mut funcs) = node.attr(key)?.clone() else {
                return Err(RearrangeError::AttrType {
                    node: node.name.clone(),
                    attr: key.clone(),
                    expected: "function list",
                    found: node.attr(key)?.kind_name(),
                });
            };
            let entry = funcs.get_mut(*i).ok_or_else(|| {
                RearrangeError::malformed(&node.name, format!("function list '{}' shrank", key))
            })?;
            *entry = renamed(&assoc.func, new_name);
            node.set_attr(key.clone(), AttrValue::FuncList(funcs));
        }
    }
    Ok(())
}

// ── Entry point ─────────────────────────────────────────────────────────────

/// Rearrange `func_name` instantiated with `attrs`, writing the result as
/// `new_func_name` if anything changed.
pub fn rearrange_function(
    func_name: &str,
    new_func_name: &str,
    attrs: &AttrMap,
    library: &mut FunctionLibrary,
    memo: &mut RewriteMemo,
) -> Result<FunctionOutcome> {
    let key = canonicalize(func_name, attrs);
    if !memo.active.insert(key.clone()) {
        return Err(RearrangeError::RecursiveFunction { key });
    }
    let result = rearrange_body(func_name, new_func_name, attrs, library, memo)
        .map_err(|e| e.in_function(func_name));
    memo.active.remove(&key);
    result
}

fn rearrange_body(
    func_name: &str,
    new_func_name: &str,
    attrs: &AttrMap,
    library: &mut FunctionLibrary,
    memo: &mut RewriteMemo,
) -> Result<FunctionOutcome> {
    let mut body = library.instantiate(func_name, attrs)?;
    let mut modified = false;

    // Collect first: rewriting may add and remove edges.
    let pending: Vec<(NodeId, Vec<Associated>)> = body
        .graph
        .nodes()
        .map(|n| (n.id, associated_functions(n, library)))
        .filter(|(_, assoc)| !assoc.is_empty())
        .collect();

    for (n, associated) in pending {
        for assoc in associated {
            let key = assoc.func.canonical_key();
            let new_name = match memo.get(&key) {
                Some(entry) => entry.clone(),
                None => {
                    let hint = library.unique_function_name(&format!("{}_rearrange_", assoc.func.name));
                    let outcome =
                        rearrange_function(&assoc.func.name, &hint, &assoc.func.attrs, library, memo)?;
                    let entry = outcome.modified.then_some(outcome.name);
                    memo.record(key, entry.clone());
                    entry
                }
            };
            if let Some(new_name) = new_name {
                modified = true;
                rewrite_associated_function(&mut body.graph, n, &assoc, &new_name)?;
            }
        }
    }

    for n in body.graph.node_ids() {
        let kind = body.graph.node(n)?.kind.clone();
        let rewritten = match kind {
            NodeKind::While => maybe_rewrite_while_node(&mut body.graph, n, library)?,
            NodeKind::If => maybe_rewrite_if_node(&mut body.graph, n, library)?,
            NodeKind::Call => maybe_rewrite_call_node(&mut body.graph, n, library)?,
            _ => false,
        };
        modified |= rewritten;
    }

    if !modified {
        debug!(function = %func_name, "function unchanged");
        return Ok(FunctionOutcome {
            name: func_name.to_string(),
            modified: false,
        });
    }

    let fdef = body.to_function_def(new_func_name)?;
    if func_name == new_func_name {
        debug!(function = %func_name, "replacing function");
        library.replace_function(new_func_name, fdef)?;
    } else {
        debug!(function = %func_name, new_function = %new_func_name, "adding function");
        library.add_function_def(fdef)?;
    }
    Ok(FunctionOutcome {
        name: new_func_name.to_string(),
        modified: true,
    })
}
