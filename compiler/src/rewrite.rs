// rewrite.rs — Call-site rewriters for While, If, and call nodes
//
// Each rewriter plans the node's input types, rewires the node's edges,
// rewrites every attached function body to the rearranged signature, stores
// the rewritten bodies under fresh names, and points the node at them.
//
// Preconditions: functions attached to the node exist in `library` and have
//                as many arguments/returns as the node's type lists.
// Postconditions: resource inputs occupy the trailing slots of the node;
//                 resource outputs are gone and their consumers read from
//                 the matching input instead.
// Failure modes: missing attributes (malformed IR), resource returns that
//                do not come from the matching argument (unsupported),
//                library failures.
// Side effects: inserts rewritten functions into `library`.

use tracing::debug;

use crate::attr::{AttrValue, NameAttrList};
use crate::error::{RearrangeError, Result};
use crate::function::FunctionBody;
use crate::graph::{Graph, NodeId};
use crate::library::FunctionLibrary;
use crate::plan::{plan_inputs, shuffle_input_types, shuffle_output_types, RetvalPlan};
use crate::renumber::{
    calculate_retval_rearrange, rearrange_arg_nodes, rearrange_loop_retval_nodes,
    rearrange_retval_nodes,
};
use crate::rewire::{rearrange_output_edges, reorder_input_edges, reorder_output_edges};

/// Longest chain of `Identity` nodes followed when tracing a loop body's
/// resource return back to its argument.
pub const MAX_IDENTITY_HOPS: usize = 64;

const REARRANGE_SUFFIX: &str = "_rearrange_";

// ── While ───────────────────────────────────────────────────────────────────

pub fn maybe_rewrite_while_node(
    graph: &mut Graph,
    n: NodeId,
    library: &mut FunctionLibrary,
) -> Result<bool> {
    let node = graph.node(n)?;
    let node_name = node.name.clone();
    let types = node.attr_type_list("T")?;
    let plan = plan_inputs(&types);
    if !plan.needs_rewrite {
        return Ok(false);
    }

    let new_types = shuffle_input_types(&types, &plan.mapping)?;
    graph
        .node_mut(n)?
        .set_attr("T", AttrValue::TypeList(new_types));
    reorder_input_edges(graph, n, &plan.mapping, 0)?;
    reorder_output_edges(graph, n, plan.retained(), &plan.mapping)?;

    for attr_name in ["cond", "body"] {
        let mut func = graph.node(n)?.attr_func(attr_name)?;
        let mut body = library.instantiate(&func.name, &func.attrs)?;
        let is_body = attr_name == "body";
        check_arity(&node_name, &body, types.len(), is_body.then_some(types.len()))?;
        if is_body {
            // Must run before the arguments are renumbered.
            check_loop_resource_returns(&node_name, &body)?;
        }
        rearrange_arg_nodes(&mut body, &plan.mapping)?;
        if is_body {
            rearrange_loop_retval_nodes(&mut body, &plan.mapping, plan.retained())?;
        }
        func.name = save_rewritten(library, &body, &func.name)?;
        graph.node_mut(n)?.set_attr(attr_name, AttrValue::Func(func));
    }

    debug!(
        node = %node_name,
        resources = plan.resource_count,
        "rearranged while node"
    );
    Ok(true)
}

/// Every resource returned by a loop body must be the argument received at
/// the same position, possibly forwarded through identities. Anything else
/// would permute resources across iterations.
fn check_loop_resource_returns(node_name: &str, body: &FunctionBody) -> Result<()> {
    for (i, ret) in body.ret_nodes.iter().enumerate() {
        if !body.graph.node(*ret)?.attr_type("T")?.is_resource() {
            continue;
        }
        let mut current = body.graph.input_node(*ret, 0)?;
        let mut hops = 0;
        while body.graph.node(current)?.is_identity() {
            if hops == MAX_IDENTITY_HOPS {
                return Err(RearrangeError::LoopResourceUntraceable {
                    node: node_name.to_string(),
                    retval: i,
                    found: format!("identity chain longer than {}", MAX_IDENTITY_HOPS),
                });
            }
            current = body.graph.input_node(current, 0)?;
            hops += 1;
        }
        let src = body.graph.node(current)?;
        if !src.is_arg() {
            return Err(RearrangeError::LoopResourceUntraceable {
                node: node_name.to_string(),
                retval: i,
                found: src.name.clone(),
            });
        }
        let arg = src.attr_index("index")?;
        if arg != i {
            return Err(RearrangeError::LoopResourceMismatch {
                node: node_name.to_string(),
                retval: i,
                arg,
            });
        }
    }
    Ok(())
}

// ── Call ────────────────────────────────────────────────────────────────────

pub fn maybe_rewrite_call_node(
    graph: &mut Graph,
    n: NodeId,
    library: &mut FunctionLibrary,
) -> Result<bool> {
    let node = graph.node(n)?;
    let node_name = node.name.clone();
    let in_types = node.attr_type_list("Tin")?;
    let out_types = node.attr_type_list("Tout")?;
    let plan = plan_inputs(&in_types);
    let has_resource_output = out_types.iter().any(|t| t.is_resource());
    if !plan.needs_rewrite && !has_resource_output {
        return Ok(false);
    }

    let mut func = node.attr_func("f")?;
    let mut body = library.instantiate(&func.name, &func.attrs)?;
    check_arity(&node_name, &body, in_types.len(), Some(out_types.len()))?;

    if plan.needs_rewrite {
        reorder_input_edges(graph, n, &plan.mapping, 0)?;
        let new_in_types = shuffle_input_types(&in_types, &plan.mapping)?;
        graph
            .node_mut(n)?
            .set_attr("Tin", AttrValue::TypeList(new_in_types));
        rearrange_arg_nodes(&mut body, &plan.mapping)?;
    }

    if has_resource_output {
        // Arguments are already renumbered, so the recorded argument index
        // matches the node's reordered inputs.
        let retvals = calculate_retval_rearrange(&body)?;
        rearrange_output_edges(graph, n, &retvals, 0)?;
        let new_out_types = shuffle_output_types(&out_types, &retvals.retval_index_mapping)?;
        graph
            .node_mut(n)?
            .set_attr("Tout", AttrValue::TypeList(new_out_types));
        rearrange_retval_nodes(&mut body, &retvals.retval_index_mapping)?;
    }

    func.name = save_rewritten(library, &body, &func.name)?;
    graph.node_mut(n)?.set_attr("f", AttrValue::Func(func));
    debug!(
        node = %node_name,
        inputs = plan.needs_rewrite,
        outputs = has_resource_output,
        "rearranged call node"
    );
    Ok(true)
}

// ── If ──────────────────────────────────────────────────────────────────────

/// Input 0 of an `If` is the predicate; it is not part of `Tin`.
const PREDICATE_SLOTS: usize = 1;

pub fn maybe_rewrite_if_node(
    graph: &mut Graph,
    n: NodeId,
    library: &mut FunctionLibrary,
) -> Result<bool> {
    let node = graph.node(n)?;
    let node_name = node.name.clone();
    let in_types = node.attr_type_list("Tin")?;
    let out_types = node.attr_type_list("Tout")?;
    let plan = plan_inputs(&in_types);
    let has_resource_output = out_types.iter().any(|t| t.is_resource());
    if !plan.needs_rewrite && !has_resource_output {
        return Ok(false);
    }

    if plan.needs_rewrite {
        reorder_input_edges(graph, n, &plan.mapping, PREDICATE_SLOTS)?;
        let new_in_types = shuffle_input_types(&in_types, &plan.mapping)?;
        graph
            .node_mut(n)?
            .set_attr("Tin", AttrValue::TypeList(new_in_types));
    }

    let mut shared: Option<RetvalPlan> = None;
    for attr_name in ["then_branch", "else_branch"] {
        let mut func = graph.node(n)?.attr_func(attr_name)?;
        let mut body = library.instantiate(&func.name, &func.attrs)?;
        check_arity(&node_name, &body, in_types.len(), Some(out_types.len()))?;
        if plan.needs_rewrite {
            rearrange_arg_nodes(&mut body, &plan.mapping)?;
        }
        if has_resource_output {
            let retvals = calculate_retval_rearrange(&body)?;
            if let Some(prev) = &shared {
                if *prev != retvals {
                    return Err(RearrangeError::BranchDisagreement {
                        node: node_name,
                        retval: first_disagreement(prev, &retvals, out_types.len()),
                    });
                }
            } else {
                shared = Some(retvals.clone());
            }
            rearrange_retval_nodes(&mut body, &retvals.retval_index_mapping)?;
        }
        func.name = save_rewritten(library, &body, &func.name)?;
        graph.node_mut(n)?.set_attr(attr_name, AttrValue::Func(func));
    }

    if let Some(retvals) = shared {
        rearrange_output_edges(graph, n, &retvals, PREDICATE_SLOTS)?;
        let new_out_types = shuffle_output_types(&out_types, &retvals.retval_index_mapping)?;
        graph
            .node_mut(n)?
            .set_attr("Tout", AttrValue::TypeList(new_out_types));
    }
    debug!(
        node = %node_name,
        inputs = plan.needs_rewrite,
        outputs = has_resource_output,
        "rearranged if node"
    );
    Ok(true)
}

fn first_disagreement(a: &RetvalPlan, b: &RetvalPlan, outputs: usize) -> usize {
    (0..outputs)
        .find(|i| {
            a.retval_index_mapping.get(i) != b.retval_index_mapping.get(i)
                || a.resource_retval_to_arg.get(i) != b.resource_retval_to_arg.get(i)
        })
        .unwrap_or(0)
}

// ── Shared helpers ──────────────────────────────────────────────────────────

fn check_arity(
    node_name: &str,
    body: &FunctionBody,
    inputs: usize,
    outputs: Option<usize>,
) -> Result<()> {
    if body.arg_nodes.len() != inputs {
        return Err(RearrangeError::malformed(
            node_name,
            format!(
                "function '{}' takes {} arguments, node passes {}",
                body.name,
                body.arg_nodes.len(),
                inputs
            ),
        ));
    }
    if let Some(outputs) = outputs {
        if body.ret_nodes.len() != outputs {
            return Err(RearrangeError::malformed(
                node_name,
                format!(
                    "function '{}' returns {} values, node expects {}",
                    body.name,
                    body.ret_nodes.len(),
                    outputs
                ),
            ));
        }
    }
    Ok(())
}

/// Store `body` as a new function derived from `base` and return its name.
fn save_rewritten(library: &mut FunctionLibrary, body: &FunctionBody, base: &str) -> Result<String> {
    let new_name = library.unique_function_name(&format!("{}{}", base, REARRANGE_SUFFIX));
    let fdef = body.to_function_def(&new_name)?;
    library.add_function_def(fdef)?;
    debug!(from = %base, to = %new_name, "added rewritten function");
    Ok(new_name)
}

/// Point a function reference at `new_name`, keeping its bound attributes.
pub(crate) fn renamed(func: &NameAttrList, new_name: &str) -> NameAttrList {
    NameAttrList {
        name: new_name.to_string(),
        attrs: func.attrs.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::function::FunctionDef;
    use crate::graph::NodeDef;
    use crate::types::DataType::{self, Bool, Float, Resource};

    fn types(ts: &[DataType]) -> AttrValue {
        AttrValue::TypeList(ts.to_vec())
    }

    fn func(name: &str) -> AttrValue {
        AttrValue::Func(NameAttrList::new(name))
    }

    fn loop_cond() -> FunctionDef {
        FunctionDef::from_nodes(
            "cond",
            vec![
                NodeDef::arg("x", 0, Float),
                NodeDef::arg("v", 1, Resource),
                NodeDef::arg("y", 2, Float),
                NodeDef::new("less", "Less").with_input("x").with_input("y"),
                NodeDef::retval("r", 0, Bool, "less"),
            ],
        )
        .unwrap()
    }

    /// Loop body over (float, resource, float); `resource_from` picks the
    /// node the resource return reads from.
    fn loop_body(resource_from: &str) -> FunctionDef {
        FunctionDef::from_nodes(
            "body",
            vec![
                NodeDef::arg("x", 0, Float),
                NodeDef::arg("v", 1, Resource),
                NodeDef::arg("y", 2, Float),
                NodeDef::identity("v_id", Resource, "v"),
                NodeDef::identity("v_id2", Resource, "v_id"),
                NodeDef::new("read", "ReadVariableOp").with_input("v"),
                NodeDef::new("next", "AddV2").with_input("x").with_input("read"),
                NodeDef::retval("r0", 0, Float, "next"),
                NodeDef::retval("r1", 1, Resource, resource_from),
                NodeDef::retval("r2", 2, Float, "y"),
            ],
        )
        .unwrap()
    }

    fn while_graph() -> Graph {
        Graph::from_node_defs(&[
            NodeDef::new("x0", "Const"),
            NodeDef::new("var", "VarHandleOp"),
            NodeDef::new("y0", "Const"),
            NodeDef::new("loop", "While")
                .with_attr("T", types(&[Float, Resource, Float]))
                .with_attr("cond", func("cond"))
                .with_attr("body", func("body"))
                .with_input("x0")
                .with_input("var")
                .with_input("y0"),
            NodeDef::new("out_x", "Neg").with_input("loop:0"),
            NodeDef::new("out_v", "ReadVariableOp").with_input("loop:1"),
            NodeDef::new("out_y", "Neg").with_input("loop:2"),
        ])
        .unwrap()
    }

    fn src_name(g: &Graph, node: &str, slot: usize) -> String {
        let e = g.input_edge(g.find(node).unwrap(), slot).unwrap();
        format!("{}:{}", g.node(e.src).unwrap().name, e.src_output)
    }

    #[test]
    fn while_with_matching_resource_rewrites() {
        let mut lib = FunctionLibrary::from_defs([loop_cond(), loop_body("v_id2")]).unwrap();
        let mut g = while_graph();
        let n = g.find("loop").unwrap();
        assert!(maybe_rewrite_while_node(&mut g, n, &mut lib).unwrap());

        let node = g.node(n).unwrap();
        assert_eq!(node.attr_type_list("T").unwrap(), vec![Float, Float, Resource]);
        assert_eq!(node.attr_func("cond").unwrap().name, "cond_rearrange_0");
        assert_eq!(node.attr_func("body").unwrap().name, "body_rearrange_0");

        assert_eq!(src_name(&g, "loop", 1), "y0:0");
        assert_eq!(src_name(&g, "loop", 2), "var:0");
        assert_eq!(src_name(&g, "out_y", 0), "loop:1");
        assert_eq!(src_name(&g, "out_v", 0), "var:0");

        let body = lib.find("body_rearrange_0").unwrap();
        assert_eq!(body.signature.input_types, vec![Float, Float, Resource]);
        assert_eq!(body.signature.output_types, vec![Float, Float]);
        let cond = lib.find("cond_rearrange_0").unwrap();
        assert_eq!(cond.signature.input_types, vec![Float, Float, Resource]);
        assert_eq!(cond.signature.output_types, vec![Bool]);
    }

    #[test]
    fn while_with_permuted_resource_is_unsupported() {
        let mut lib = FunctionLibrary::from_defs([
            loop_cond(),
            FunctionDef::from_nodes(
                "body",
                vec![
                    NodeDef::arg("v", 0, Resource),
                    NodeDef::arg("x", 1, Float),
                    NodeDef::arg("w", 2, Resource),
                    NodeDef::retval("r0", 0, Resource, "w"),
                    NodeDef::retval("r1", 1, Float, "x"),
                    NodeDef::retval("r2", 2, Resource, "v"),
                ],
            )
            .unwrap(),
        ])
        .unwrap();
        let mut g = Graph::from_node_defs(&[
            NodeDef::new("v", "VarHandleOp"),
            NodeDef::new("x", "Const"),
            NodeDef::new("w", "VarHandleOp"),
            NodeDef::new("loop", "While")
                .with_attr("T", types(&[Resource, Float, Resource]))
                .with_attr("cond", func("cond"))
                .with_attr("body", func("body"))
                .with_input("v")
                .with_input("x")
                .with_input("w"),
        ])
        .unwrap();
        let n = g.find("loop").unwrap();
        let err = maybe_rewrite_while_node(&mut g, n, &mut lib).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPattern);
        assert_eq!(
            err,
            RearrangeError::LoopResourceMismatch {
                node: "loop".into(),
                retval: 0,
                arg: 2
            }
        );
    }

    #[test]
    fn while_resource_from_computation_is_unsupported() {
        let mut lib = FunctionLibrary::from_defs([loop_cond(), loop_body("read")]).unwrap();
        let mut g = while_graph();
        let n = g.find("loop").unwrap();
        let err = maybe_rewrite_while_node(&mut g, n, &mut lib).unwrap_err();
        assert!(matches!(
            err,
            RearrangeError::LoopResourceUntraceable { retval: 1, ref found, .. } if found == "read"
        ));
    }

    #[test]
    fn while_with_trailing_resources_untouched() {
        let mut lib = FunctionLibrary::new();
        let mut g = Graph::from_node_defs(&[NodeDef::new("loop", "While")
            .with_attr("T", types(&[Float, Resource]))
            .with_attr("cond", func("missing"))
            .with_attr("body", func("missing"))])
        .unwrap();
        let n = g.find("loop").unwrap();
        assert!(!maybe_rewrite_while_node(&mut g, n, &mut lib).unwrap());
        assert!(lib.is_empty());
    }

    #[test]
    fn while_missing_type_attr_is_malformed() {
        let mut lib = FunctionLibrary::new();
        let mut g = Graph::from_node_defs(&[NodeDef::new("loop", "While")]).unwrap();
        let n = g.find("loop").unwrap();
        let err = maybe_rewrite_while_node(&mut g, n, &mut lib).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedIr);
    }

    fn branch(name: &str, resource_ret_from: &str) -> FunctionDef {
        FunctionDef::from_nodes(
            name,
            vec![
                NodeDef::arg("v", 0, Resource),
                NodeDef::arg("x", 1, Float),
                NodeDef::arg("w", 2, Resource),
                NodeDef::new("neg", "Neg").with_input("x"),
                NodeDef::retval("r0", 0, Float, "neg"),
                NodeDef::retval("r1", 1, Resource, resource_ret_from),
            ],
        )
        .unwrap()
    }

    fn if_graph() -> Graph {
        Graph::from_node_defs(&[
            NodeDef::new("pred", "Const"),
            NodeDef::new("v", "VarHandleOp"),
            NodeDef::new("x", "Const"),
            NodeDef::new("w", "VarHandleOp"),
            NodeDef::new("cond", "If")
                .with_attr("Tin", types(&[Resource, Float, Resource]))
                .with_attr("Tout", types(&[Float, Resource]))
                .with_attr("then_branch", func("then"))
                .with_attr("else_branch", func("else"))
                .with_input("pred")
                .with_input("v")
                .with_input("x")
                .with_input("w"),
            NodeDef::new("use_val", "Neg").with_input("cond:0"),
            NodeDef::new("use_res", "ReadVariableOp").with_input("cond:1"),
        ])
        .unwrap()
    }

    #[test]
    fn if_keeps_predicate_and_forwards_resource() {
        let mut lib =
            FunctionLibrary::from_defs([branch("then", "w"), branch("else", "w")]).unwrap();
        let mut g = if_graph();
        let n = g.find("cond").unwrap();
        assert!(maybe_rewrite_if_node(&mut g, n, &mut lib).unwrap());

        assert_eq!(src_name(&g, "cond", 0), "pred:0");
        assert_eq!(src_name(&g, "cond", 1), "x:0");
        assert_eq!(src_name(&g, "cond", 2), "v:0");
        assert_eq!(src_name(&g, "cond", 3), "w:0");
        assert_eq!(src_name(&g, "use_val", 0), "cond:0");
        assert_eq!(src_name(&g, "use_res", 0), "w:0");

        let node = g.node(n).unwrap();
        assert_eq!(node.attr_type_list("Tin").unwrap(), vec![Float, Resource, Resource]);
        assert_eq!(node.attr_type_list("Tout").unwrap(), vec![Float]);
        for name in ["then_rearrange_0", "else_rearrange_0"] {
            let f = lib.find(name).unwrap();
            assert_eq!(f.signature.input_types, vec![Float, Resource, Resource]);
            assert_eq!(f.signature.output_types, vec![Float]);
        }
    }

    #[test]
    fn if_branches_disagreeing_is_unsupported() {
        let mut lib =
            FunctionLibrary::from_defs([branch("then", "w"), branch("else", "v")]).unwrap();
        let mut g = if_graph();
        let n = g.find("cond").unwrap();
        let err = maybe_rewrite_if_node(&mut g, n, &mut lib).unwrap_err();
        assert_eq!(
            err,
            RearrangeError::BranchDisagreement {
                node: "cond".into(),
                retval: 1
            }
        );
    }

    fn resource_echo() -> FunctionDef {
        FunctionDef::from_nodes(
            "echo",
            vec![
                NodeDef::arg("v", 0, Resource),
                NodeDef::retval("r", 0, Resource, "v"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn call_drops_resource_output() {
        let mut lib = FunctionLibrary::from_defs([resource_echo()]).unwrap();
        let mut g = Graph::from_node_defs(&[
            NodeDef::new("var", "VarHandleOp"),
            NodeDef::new("call", "StatefulPartitionedCall")
                .with_attr("Tin", types(&[Resource]))
                .with_attr("Tout", types(&[Resource]))
                .with_attr("f", func("echo"))
                .with_input("var"),
            NodeDef::new("read", "ReadVariableOp").with_input("call"),
        ])
        .unwrap();
        let n = g.find("call").unwrap();
        assert!(maybe_rewrite_call_node(&mut g, n, &mut lib).unwrap());
        let node = g.node(n).unwrap();
        assert!(node.attr_type_list("Tout").unwrap().is_empty());
        assert_eq!(node.attr_func("f").unwrap().name, "echo_rearrange_0");
        assert_eq!(src_name(&g, "read", 0), "var:0");
        assert!(g.out_edges(n).unwrap().is_empty());
        let f = lib.find("echo_rearrange_0").unwrap();
        assert!(f.signature.output_types.is_empty());
    }

    #[test]
    fn call_without_resources_untouched() {
        let mut lib = FunctionLibrary::new();
        let mut g = Graph::from_node_defs(&[NodeDef::new("call", "StatefulPartitionedCall")
            .with_attr("Tin", types(&[Float]))
            .with_attr("Tout", types(&[Float]))
            .with_attr("f", func("f"))])
        .unwrap();
        let n = g.find("call").unwrap();
        assert!(!maybe_rewrite_call_node(&mut g, n, &mut lib).unwrap());
    }

    #[test]
    fn call_arity_mismatch_is_malformed() {
        let mut lib = FunctionLibrary::from_defs([resource_echo()]).unwrap();
        let mut g = Graph::from_node_defs(&[
            NodeDef::new("var", "VarHandleOp"),
            NodeDef::new("x", "Const"),
            NodeDef::new("call", "StatefulPartitionedCall")
                .with_attr("Tin", types(&[Resource, Float]))
                .with_attr("Tout", types(&[]))
                .with_attr("f", func("echo"))
                .with_input("var")
                .with_input("x"),
        ])
        .unwrap();
        let n = g.find("call").unwrap();
        let err = maybe_rewrite_call_node(&mut g, n, &mut lib).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedIr);
    }

    #[test]
    fn renamed_keeps_bound_attrs() {
        let f = NameAttrList::new("f").with_attr("N", AttrValue::Int(2));
        let g = renamed(&f, "g");
        assert_eq!(g.name, "g");
        assert_eq!(g.attrs, f.attrs);
    }

    /// Loop over (resource, float) whose body forwards the resource through
    /// `hops` chained identities before returning it.
    fn identity_chain_loop(hops: usize) -> (Graph, FunctionLibrary) {
        let cond = FunctionDef::from_nodes(
            "cond",
            vec![
                NodeDef::arg("v", 0, Resource),
                NodeDef::arg("x", 1, Float),
                NodeDef::new("less", "Less").with_input("x").with_input("x"),
                NodeDef::retval("r", 0, Bool, "less"),
            ],
        )
        .unwrap();
        let mut nodes = vec![NodeDef::arg("v", 0, Resource), NodeDef::arg("x", 1, Float)];
        let mut last = "v".to_string();
        for i in 0..hops {
            let name = format!("id{}", i);
            nodes.push(NodeDef::identity(name.clone(), Resource, &last));
            last = name;
        }
        nodes.push(NodeDef::retval("r0", 0, Resource, &last));
        nodes.push(NodeDef::retval("r1", 1, Float, "x"));
        let body = FunctionDef::from_nodes("body", nodes).unwrap();
        let lib = FunctionLibrary::from_defs([cond, body]).unwrap();
        let g = Graph::from_node_defs(&[
            NodeDef::new("var", "VarHandleOp"),
            NodeDef::new("x0", "Const"),
            NodeDef::new("loop", "While")
                .with_attr("T", types(&[Resource, Float]))
                .with_attr("cond", func("cond"))
                .with_attr("body", func("body"))
                .with_input("var")
                .with_input("x0"),
        ])
        .unwrap();
        (g, lib)
    }

    #[test]
    fn while_identity_chain_at_hop_limit_rewrites() {
        let (mut g, mut lib) = identity_chain_loop(MAX_IDENTITY_HOPS);
        let n = g.find("loop").unwrap();
        assert!(maybe_rewrite_while_node(&mut g, n, &mut lib).unwrap());
        assert_eq!(g.node(n).unwrap().attr_type_list("T").unwrap(), vec![Float, Resource]);
        let body = lib.find("body_rearrange_0").unwrap();
        assert_eq!(body.signature.input_types, vec![Float, Resource]);
        assert_eq!(body.signature.output_types, vec![Float]);
    }

    #[test]
    fn while_identity_chain_past_hop_limit_is_unsupported() {
        let (mut g, mut lib) = identity_chain_loop(MAX_IDENTITY_HOPS + 1);
        let n = g.find("loop").unwrap();
        let err = maybe_rewrite_while_node(&mut g, n, &mut lib).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPattern);
        assert!(matches!(
            err,
            RearrangeError::LoopResourceUntraceable { retval: 0, ref found, .. }
                if found.contains("identity chain longer than 64")
        ));
    }
}
