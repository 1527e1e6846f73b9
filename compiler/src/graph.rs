// graph.rs — Mutable dataflow graph for function bodies and top-level programs
//
// Arena of nodes and edges addressed by stable ids. Nodes never own edges:
// they keep id lists into the graph's edge arena, so detaching and
// reattaching an edge is two arena operations and never invalidates other
// ids. Removed slots stay `None` so ids are never reused.
//
// Preconditions: node names are unique within one graph.
// Postconditions: `to_node_defs` emits nodes in insertion order with data
//                 inputs ordered by slot, so serialization is deterministic.
// Failure modes: duplicate names, dangling input references, gaps in input
//                slots, wrongly-typed attributes → `RearrangeError`.
// Side effects: none.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attr::{AttrMap, AttrValue, NameAttrList};
use crate::error::{RearrangeError, Result};
use crate::types::DataType;

// ── Identifiers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub u32);

// ── Node kinds ──────────────────────────────────────────────────────────────

pub const ARG_OP: &str = "_Arg";
pub const RETVAL_OP: &str = "_Retval";
pub const IDENTITY_OP: &str = "Identity";
pub const WHILE_OP: &str = "While";
pub const IF_OP: &str = "If";
pub const CALL_OP: &str = "StatefulPartitionedCall";

/// Operation kind of a node. Kinds the pass treats specially get their own
/// variant; everything else is an `Op` carrying its op string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Function argument placeholder; `index` attribute is its slot.
    Arg,
    /// Function return placeholder; `index` attribute is its slot.
    Retval,
    /// Forwards input 0 unchanged.
    Identity,
    /// Loop with `cond`/`body` functions and loop-carried types `T`.
    While,
    /// Conditional with `then_branch`/`else_branch`, predicate at input 0.
    If,
    /// Indirect call of function `f` with `Tin`/`Tout`.
    Call,
    Op(String),
}

impl NodeKind {
    pub fn from_op(op: &str) -> NodeKind {
        match op {
            ARG_OP => NodeKind::Arg,
            RETVAL_OP => NodeKind::Retval,
            IDENTITY_OP => NodeKind::Identity,
            WHILE_OP => NodeKind::While,
            IF_OP => NodeKind::If,
            CALL_OP => NodeKind::Call,
            other => NodeKind::Op(other.to_string()),
        }
    }

    pub fn op(&self) -> &str {
        match self {
            NodeKind::Arg => ARG_OP,
            NodeKind::Retval => RETVAL_OP,
            NodeKind::Identity => IDENTITY_OP,
            NodeKind::While => WHILE_OP,
            NodeKind::If => IF_OP,
            NodeKind::Call => CALL_OP,
            NodeKind::Op(op) => op,
        }
    }
}

// ── Nodes and edges ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub attrs: AttrMap,
    in_edges: Vec<EdgeId>,
    out_edges: Vec<EdgeId>,
}

impl Node {
    pub fn is_arg(&self) -> bool {
        self.kind == NodeKind::Arg
    }

    pub fn is_retval(&self) -> bool {
        self.kind == NodeKind::Retval
    }

    pub fn is_identity(&self) -> bool {
        self.kind == NodeKind::Identity
    }

    pub fn attr(&self, key: &str) -> Result<&AttrValue> {
        self.attrs
            .get(key)
            .ok_or_else(|| RearrangeError::MissingAttr {
                node: self.name.clone(),
                attr: key.to_string(),
            })
    }

    fn wrong_type(&self, key: &str, expected: &'static str, found: &AttrValue) -> RearrangeError {
        RearrangeError::AttrType {
            node: self.name.clone(),
            attr: key.to_string(),
            expected,
            found: found.kind_name(),
        }
    }

    pub fn attr_int(&self, key: &str) -> Result<i64> {
        match self.attr(key)? {
            AttrValue::Int(v) => Ok(*v),
            other => Err(self.wrong_type(key, "int", other)),
        }
    }

    /// Non-negative integer attribute, such as an arg/retval `index`.
    pub fn attr_index(&self, key: &str) -> Result<usize> {
        let v = self.attr_int(key)?;
        usize::try_from(v).map_err(|_| {
            RearrangeError::malformed(&self.name, format!("attribute '{}' is negative ({})", key, v))
        })
    }

    pub fn attr_type(&self, key: &str) -> Result<DataType> {
        match self.attr(key)? {
            AttrValue::Type(t) => Ok(*t),
            other => Err(self.wrong_type(key, "type", other)),
        }
    }

    pub fn attr_type_list(&self, key: &str) -> Result<Vec<DataType>> {
        match self.attr(key)? {
            AttrValue::TypeList(ts) => Ok(ts.clone()),
            other => Err(self.wrong_type(key, "type list", other)),
        }
    }

    pub fn attr_func(&self, key: &str) -> Result<NameAttrList> {
        match self.attr(key)? {
            AttrValue::Func(f) => Ok(f.clone()),
            other => Err(self.wrong_type(key, "function", other)),
        }
    }

    /// Replace (or add) an attribute.
    pub fn set_attr(&mut self, key: impl Into<String>, value: AttrValue) {
        self.attrs.insert(key.into(), value);
    }

    pub fn in_edge_ids(&self) -> &[EdgeId] {
        &self.in_edges
    }

    pub fn out_edge_ids(&self) -> &[EdgeId] {
        &self.out_edges
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub src: NodeId,
    pub src_output: usize,
    pub dst: NodeId,
    pub dst_input: usize,
    /// Ordering-only edge; slots are meaningless.
    pub control: bool,
}

// ── Serialized form ─────────────────────────────────────────────────────────

/// Serialized node. Inputs are written `"src"` (slot 0), `"src:k"`, or
/// `"^src"` for a control dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDef {
    pub name: String,
    pub op: String,
    #[serde(default, skip_serializing_if = "AttrMap::is_empty")]
    pub attrs: AttrMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
}

impl NodeDef {
    pub fn new(name: impl Into<String>, op: impl Into<String>) -> Self {
        NodeDef {
            name: name.into(),
            op: op.into(),
            attrs: AttrMap::new(),
            inputs: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: AttrValue) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.inputs.push(input.into());
        self
    }

    pub fn arg(name: impl Into<String>, index: usize, ty: DataType) -> Self {
        NodeDef::new(name, ARG_OP)
            .with_attr("index", AttrValue::Int(index as i64))
            .with_attr("T", AttrValue::Type(ty))
    }

    pub fn retval(name: impl Into<String>, index: usize, ty: DataType, input: &str) -> Self {
        NodeDef::new(name, RETVAL_OP)
            .with_attr("index", AttrValue::Int(index as i64))
            .with_attr("T", AttrValue::Type(ty))
            .with_input(input)
    }

    pub fn identity(name: impl Into<String>, ty: DataType, input: &str) -> Self {
        NodeDef::new(name, IDENTITY_OP)
            .with_attr("T", AttrValue::Type(ty))
            .with_input(input)
    }
}

enum InputRef<'a> {
    Data(&'a str, usize),
    Control(&'a str),
}

fn parse_input(input: &str) -> InputRef<'_> {
    if let Some(name) = input.strip_prefix('^') {
        return InputRef::Control(name);
    }
    match input.rsplit_once(':') {
        Some((name, slot)) => match slot.parse::<usize>() {
            Ok(slot) => InputRef::Data(name, slot),
            Err(_) => InputRef::Data(input, 0),
        },
        None => InputRef::Data(input, 0),
    }
}

// ── Graph ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
    edges: Vec<Option<Edge>>,
    names: HashMap<String, NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        kind: NodeKind,
        attrs: AttrMap,
    ) -> Result<NodeId> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(RearrangeError::malformed(&name, "duplicate node name"));
        }
        let id = NodeId(self.nodes.len() as u32);
        self.names.insert(name.clone(), id);
        self.nodes.push(Some(Node {
            id,
            name,
            kind,
            attrs,
            in_edges: Vec::new(),
            out_edges: Vec::new(),
        }));
        Ok(id)
    }

    /// Remove a node together with every edge touching it.
    pub fn remove_node(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id.0 as usize).and_then(Option::take) else {
            return;
        };
        self.names.remove(&node.name);
        for e in node.in_edges.iter().chain(node.out_edges.iter()) {
            self.remove_edge(*e);
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.0 as usize)
            .is_some_and(|slot| slot.is_some())
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| RearrangeError::malformed(format!("node#{}", id.0), "no such node"))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| RearrangeError::malformed(format!("node#{}", id.0), "no such node"))
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Live nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter_map(Option::as_ref)
    }

    /// Snapshot of live node ids; safe to hold across mutation.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes().map(|n| n.id).collect()
    }

    pub fn num_nodes(&self) -> usize {
        self.names.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.iter().filter(|e| e.is_some()).count()
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Live edges in creation order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter_map(Option::as_ref)
    }

    pub fn add_edge(
        &mut self,
        src: NodeId,
        src_output: usize,
        dst: NodeId,
        dst_input: usize,
    ) -> Result<EdgeId> {
        self.push_edge(src, src_output, dst, dst_input, false)
    }

    pub fn add_control_edge(&mut self, src: NodeId, dst: NodeId) -> Result<EdgeId> {
        self.push_edge(src, 0, dst, 0, true)
    }

    fn push_edge(
        &mut self,
        src: NodeId,
        src_output: usize,
        dst: NodeId,
        dst_input: usize,
        control: bool,
    ) -> Result<EdgeId> {
        let id = EdgeId(self.edges.len() as u32);
        self.node_mut(src)?.out_edges.push(id);
        self.node_mut(dst)?.in_edges.push(id);
        self.edges.push(Some(Edge {
            id,
            src,
            src_output,
            dst,
            dst_input,
            control,
        }));
        Ok(id)
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let edge = self.edges.get_mut(id.0 as usize).and_then(Option::take)?;
        if let Some(Some(src)) = self.nodes.get_mut(edge.src.0 as usize) {
            src.out_edges.retain(|e| *e != id);
        }
        if let Some(Some(dst)) = self.nodes.get_mut(edge.dst.0 as usize) {
            dst.in_edges.retain(|e| *e != id);
        }
        Some(edge)
    }

    /// Snapshot of a node's incoming edges (data and control).
    pub fn in_edges(&self, id: NodeId) -> Result<Vec<Edge>> {
        Ok(self
            .node(id)?
            .in_edges
            .iter()
            .filter_map(|e| self.edge(*e).copied())
            .collect())
    }

    /// Snapshot of a node's outgoing edges (data and control).
    pub fn out_edges(&self, id: NodeId) -> Result<Vec<Edge>> {
        Ok(self
            .node(id)?
            .out_edges
            .iter()
            .filter_map(|e| self.edge(*e).copied())
            .collect())
    }

    /// The data edge feeding `slot` of node `id`.
    pub fn input_edge(&self, id: NodeId, slot: usize) -> Result<Edge> {
        self.in_edges(id)?
            .into_iter()
            .find(|e| !e.control && e.dst_input == slot)
            .ok_or_else(|| RearrangeError::MissingInputEdge {
                node: self.node(id).map(|n| n.name.clone()).unwrap_or_default(),
                slot,
            })
    }

    /// The node feeding `slot` of node `id`.
    pub fn input_node(&self, id: NodeId, slot: usize) -> Result<NodeId> {
        Ok(self.input_edge(id, slot)?.src)
    }

    // ── Serialization ───────────────────────────────────────────────────

    pub fn from_node_defs(defs: &[NodeDef]) -> Result<Graph> {
        let mut graph = Graph::new();
        for def in defs {
            graph.add_node(def.name.clone(), NodeKind::from_op(&def.op), def.attrs.clone())?;
        }
        for def in defs {
            let dst = graph
                .find(&def.name)
                .ok_or_else(|| RearrangeError::malformed(&def.name, "node vanished"))?;
            let mut data_slot = 0;
            for input in &def.inputs {
                match parse_input(input) {
                    InputRef::Data(src_name, src_output) => {
                        let src = graph.find(src_name).ok_or_else(|| {
                            RearrangeError::malformed(
                                &def.name,
                                format!("input '{}' names an unknown node", input),
                            )
                        })?;
                        graph.add_edge(src, src_output, dst, data_slot)?;
                        data_slot += 1;
                    }
                    InputRef::Control(src_name) => {
                        let src = graph.find(src_name).ok_or_else(|| {
                            RearrangeError::malformed(
                                &def.name,
                                format!("control input '{}' names an unknown node", input),
                            )
                        })?;
                        graph.add_control_edge(src, dst)?;
                    }
                }
            }
        }
        Ok(graph)
    }

    pub fn to_node_defs(&self) -> Result<Vec<NodeDef>> {
        let mut defs = Vec::with_capacity(self.num_nodes());
        for node in self.nodes() {
            let in_edges = self.in_edges(node.id)?;
            let mut data: Vec<&Edge> = in_edges.iter().filter(|e| !e.control).collect();
            data.sort_by_key(|e| e.dst_input);
            let mut inputs = Vec::with_capacity(in_edges.len());
            for (expected, e) in data.iter().enumerate() {
                if e.dst_input != expected {
                    return Err(RearrangeError::malformed(
                        &node.name,
                        format!("input slot {} is missing or duplicated", expected),
                    ));
                }
                let src = &self.node(e.src)?.name;
                if e.src_output == 0 {
                    inputs.push(src.clone());
                } else {
                    inputs.push(format!("{}:{}", src, e.src_output));
                }
            }
            for e in in_edges.iter().filter(|e| e.control) {
                inputs.push(format!("^{}", self.node(e.src)?.name));
            }
            defs.push(NodeDef {
                name: node.name.clone(),
                op: node.kind.op().to_string(),
                attrs: node.attrs.clone(),
                inputs,
            });
        }
        Ok(defs)
    }
}
