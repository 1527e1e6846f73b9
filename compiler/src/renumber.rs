// renumber.rs — Argument and return placeholder renumbering
//
// Updates the `index` attribute of `_Arg`/`_Retval` nodes inside a function
// body to match a rearranged signature, and removes return nodes whose
// value is no longer returned explicitly.
//
// Preconditions: argument and return nodes carry dense `index` attributes
//                matching the body's signature.
// Postconditions: indices follow the rearranged signature; dropped return
//                 nodes are gone from the graph and from `ret_nodes`.
// Failure modes: resource returns not fed directly by an argument →
//                unsupported pattern; missing attributes → malformed IR.
// Side effects: mutates the body graph.

use std::collections::BTreeMap;

use crate::attr::AttrValue;
use crate::error::{RearrangeError, Result};
use crate::function::FunctionBody;
use crate::plan::{IndexMapping, RetvalPlan};

/// Set argument `i` (in original order) to index `mapping[i]`.
pub fn rearrange_arg_nodes(body: &mut FunctionBody, mapping: &IndexMapping) -> Result<()> {
    for (i, id) in body.arg_nodes.iter().enumerate() {
        let new_index = mapping.get(i)?;
        body.graph
            .node_mut(*id)?
            .set_attr("index", AttrValue::Int(new_index as i64));
    }
    Ok(())
}

/// Loop body returns share the input mapping. Returns mapped at or beyond
/// `retained` are resources and are removed.
pub fn rearrange_loop_retval_nodes(
    body: &mut FunctionBody,
    mapping: &IndexMapping,
    retained: usize,
) -> Result<()> {
    for (i, id) in body.ret_nodes.iter().enumerate() {
        let new_index = mapping.get(i)?;
        if new_index < retained {
            body.graph
                .node_mut(*id)?
                .set_attr("index", AttrValue::Int(new_index as i64));
        } else {
            body.graph.remove_node(*id);
        }
    }
    body.ret_nodes.retain(|id| body.graph.contains(*id));
    Ok(())
}

/// Build the return-side plan of `body`.
///
/// Non-resource returns are renumbered densely in order. A resource return
/// must read directly from an argument; its entry records that argument's
/// current `index`, so call this after argument renumbering.
pub fn calculate_retval_rearrange(body: &FunctionBody) -> Result<RetvalPlan> {
    let mut plan = RetvalPlan::default();
    for (i, id) in body.ret_nodes.iter().enumerate() {
        let node = body.graph.node(*id)?;
        if !node.attr_type("T")?.is_resource() {
            let new_index = plan.retval_index_mapping.len();
            plan.retval_index_mapping.insert(i, new_index);
            continue;
        }
        let src = body.graph.node(body.graph.input_node(*id, 0)?)?;
        if !src.is_arg() {
            return Err(RearrangeError::ResourceRetvalNotFromArg {
                function: body.name.clone(),
                retval: i,
                source_node: src.name.clone(),
            });
        }
        plan.resource_retval_to_arg.insert(i, src.attr_index("index")?);
    }
    Ok(plan)
}

/// Renumber surviving returns and remove the rest.
pub fn rearrange_retval_nodes(
    body: &mut FunctionBody,
    retval_index_mapping: &BTreeMap<usize, usize>,
) -> Result<()> {
    for (i, id) in body.ret_nodes.iter().enumerate() {
        match retval_index_mapping.get(&i) {
            Some(&new_index) => body
                .graph
                .node_mut(*id)?
                .set_attr("index", AttrValue::Int(new_index as i64)),
            None => body.graph.remove_node(*id),
        }
    }
    body.ret_nodes.retain(|id| body.graph.contains(*id));
    Ok(())
}
