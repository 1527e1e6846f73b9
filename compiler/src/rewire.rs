// rewire.rs — Edge rewiring for rearranged call sites
//
// Moves a node's data edges to their rearranged slots. When a node stops
// producing its resource outputs, consumers of those outputs are rewired to
// whatever fed the matching input: the resource passes through unchanged.
// Control edges carry no slot and are never touched.
//
// Every routine snapshots the edge list before detaching anything.
//
// Preconditions: `node` exists and its data inputs occupy distinct slots.
// Postconditions: each data edge sits at its planned slot; consumers of a
//                 dropped resource output read from the matching input.
// Failure modes: a dropped output whose input has no edge →
//                `MissingInputEdge`; a slot past the mapping →
//                `MappingOutOfRange`.
// Side effects: mutates the edges of `graph`.

use tracing::trace;

use crate::error::{RearrangeError, Result};
use crate::graph::{Graph, NodeId};
use crate::plan::{IndexMapping, RetvalPlan};

/// Move each data input of `node` at slot `offset + i` to
/// `offset + mapping[i]`. Inputs below `offset` stay where they are.
pub fn reorder_input_edges(
    graph: &mut Graph,
    node: NodeId,
    mapping: &IndexMapping,
    offset: usize,
) -> Result<()> {
    let edges: Vec<_> = graph
        .in_edges(node)?
        .into_iter()
        .filter(|e| !e.control && e.dst_input >= offset)
        .collect();
    for e in edges {
        let new_dst_input = mapping.get(e.dst_input - offset)? + offset;
        graph.remove_edge(e.id);
        graph.add_edge(e.src, e.src_output, node, new_dst_input)?;
        trace!(
            node = node.0,
            from = e.dst_input,
            to = new_dst_input,
            "moved input edge"
        );
    }
    Ok(())
}

/// Rewire the outputs of a loop node after its inputs were reordered.
///
/// Output `k` moves to `mapping[k]`. Mapped slots at or beyond `retained`
/// are resource outputs that no longer exist; their consumers read from the
/// source of the node's (already reordered) input at that slot.
pub fn reorder_output_edges(
    graph: &mut Graph,
    node: NodeId,
    retained: usize,
    mapping: &IndexMapping,
) -> Result<()> {
    let edges: Vec<_> = graph
        .out_edges(node)?
        .into_iter()
        .filter(|e| !e.control)
        .collect();
    for e in edges {
        let new_src_output = mapping.get(e.src_output)?;
        graph.remove_edge(e.id);
        if new_src_output < retained {
            graph.add_edge(node, new_src_output, e.dst, e.dst_input)?;
        } else {
            let input = graph.input_edge(node, new_src_output)?;
            graph.add_edge(input.src, input.src_output, e.dst, e.dst_input)?;
        }
    }
    Ok(())
}

/// Rewire the outputs of a call-like node according to `plan`.
///
/// Surviving outputs are renumbered. A dropped resource output is replaced
/// by the source of input `arg + input_offset`, where `arg` is the argument
/// the callee returned unchanged.
pub fn rearrange_output_edges(
    graph: &mut Graph,
    node: NodeId,
    plan: &RetvalPlan,
    input_offset: usize,
) -> Result<()> {
    let edges: Vec<_> = graph
        .out_edges(node)?
        .into_iter()
        .filter(|e| !e.control)
        .collect();
    for e in edges {
        if let Some(&new_src_output) = plan.retval_index_mapping.get(&e.src_output) {
            graph.remove_edge(e.id);
            graph.add_edge(node, new_src_output, e.dst, e.dst_input)?;
            continue;
        }
        let arg = plan
            .resource_retval_to_arg
            .get(&e.src_output)
            .copied()
            .ok_or_else(|| {
                RearrangeError::malformed(
                    graph
                        .node(node)
                        .map(|n| n.name.clone())
                        .unwrap_or_default(),
                    format!("output {} has no matching return", e.src_output),
                )
            })?;
        graph.remove_edge(e.id);
        let input = graph.input_edge(node, arg + input_offset)?;
        graph.add_edge(input.src, input.src_output, e.dst, e.dst_input)?;
    }
    Ok(())
}
