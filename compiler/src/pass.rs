// pass.rs — Rearrangement pass driver
//
// Finds the compilation entry ops of a top-level graph (ops that launch a
// function for compilation), rearranges each launched function through the
// walker, and points the entry op at the rewritten function. Unreachable
// library functions are pruned once at the end.
//
// Preconditions: every entry op carries its configured function attribute.
// Postconditions: each entry op that was rewritten references a function in
//                 `library` whose call sites keep resources trailing; when
//                 nothing changed, `library` is byte-for-byte unchanged.
// Failure modes: the first entry-op failure, unless `keep_going` is set, in
//                which case failures are collected into the report.
// Side effects: mutates entry-op attributes in `graph`; adds, replaces and
//               prunes functions in `library`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::attr::AttrValue;
use crate::error::{RearrangeError, Result};
use crate::graph::{Graph, NodeId};
use crate::library::FunctionLibrary;
use crate::walker::{rearrange_function, RewriteMemo};

// ── Options ─────────────────────────────────────────────────────────────────

/// Pass configuration. Every field has a default, so a partial JSON object
/// is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassOptions {
    /// Entry op type → name of its function-valued attribute.
    pub entry_ops: BTreeMap<String, String>,
    /// Restore the library when an entry op fails part-way.
    pub transactional: bool,
    /// Record entry-op failures and continue with the next entry op.
    pub keep_going: bool,
}

impl Default for PassOptions {
    fn default() -> Self {
        let entry_ops = [("TPUReplicate", "computation"), ("XlaLaunch", "function")]
            .into_iter()
            .map(|(op, attr)| (op.to_string(), attr.to_string()))
            .collect();
        PassOptions {
            entry_ops,
            transactional: true,
            keep_going: false,
        }
    }
}

// ── Report ──────────────────────────────────────────────────────────────────

/// An entry op now pointing at a rewritten function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRewrite {
    pub node: String,
    pub function: String,
    pub new_function: String,
}

/// An entry op left untouched because its function could not be rewritten.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryFailure {
    pub node: String,
    pub error: RearrangeError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    /// Entry ops visited, rewritten or not.
    pub entry_ops: usize,
    pub rewritten: Vec<EntryRewrite>,
    pub failures: Vec<EntryFailure>,
    /// Functions removed by the final pruning step, in name order.
    pub pruned: Vec<String>,
    pub library_modified: bool,
}

impl PassReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ── Driver ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct RearrangePass {
    options: PassOptions,
}

impl RearrangePass {
    pub fn new(options: PassOptions) -> Self {
        RearrangePass { options }
    }

    pub fn run(&self, graph: &mut Graph, library: &mut FunctionLibrary) -> Result<PassReport> {
        let mut report = PassReport::default();
        let mut memo = RewriteMemo::new();

        for n in graph.node_ids() {
            let node = graph.node(n)?;
            let Some(attr_name) = self.options.entry_ops.get(node.kind.op()) else {
                continue;
            };
            let node_name = node.name.clone();
            report.entry_ops += 1;

            let snapshot = self
                .options
                .transactional
                .then(|| (library.clone(), memo.clone()));
            match rewrite_entry(graph, n, attr_name, library, &mut memo) {
                Ok(Some(entry)) => {
                    info!(
                        node = %entry.node,
                        function = %entry.function,
                        new_function = %entry.new_function,
                        "rewrote entry function"
                    );
                    report.library_modified = true;
                    report.rewritten.push(entry);
                }
                Ok(None) => {
                    debug!(node = %node_name, "entry function unchanged");
                }
                Err(error) => {
                    if let Some((saved_library, saved_memo)) = snapshot {
                        *library = saved_library;
                        memo = saved_memo;
                    }
                    if !self.options.keep_going {
                        return Err(error);
                    }
                    warn!(node = %node_name, error = %error, "entry op left unchanged");
                    report.failures.push(EntryFailure {
                        node: node_name,
                        error,
                    });
                }
            }
        }

        if report.library_modified {
            report.pruned = library.prune_unreachable(graph);
            debug!(count = report.pruned.len(), "pruned unreachable functions");
        }
        Ok(report)
    }
}

/// Rearrange the function launched by entry op `n`. Returns `None` when the
/// function needed no change.
fn rewrite_entry(
    graph: &mut Graph,
    n: NodeId,
    attr_name: &str,
    library: &mut FunctionLibrary,
    memo: &mut RewriteMemo,
) -> Result<Option<EntryRewrite>> {
    let node = graph.node(n)?;
    let node_name = node.name.clone();
    let mut func = node.attr_func(attr_name)?;

    let key = func.canonical_key();
    let new_name = match memo.get(&key) {
        Some(entry) => entry.clone(),
        None => {
            let hint = library.unique_function_name(&format!("{}_rearrange_", func.name));
            let outcome = rearrange_function(&func.name, &hint, &func.attrs, library, memo)?;
            let entry = outcome.modified.then_some(outcome.name);
            memo.record(key, entry.clone());
            entry
        }
    };
    let Some(new_name) = new_name else {
        return Ok(None);
    };

    let function = std::mem::replace(&mut func.name, new_name.clone());
    graph.node_mut(n)?.set_attr(attr_name, AttrValue::Func(func));
    Ok(Some(EntryRewrite {
        node: node_name,
        function,
        new_function: new_name,
    }))
}
