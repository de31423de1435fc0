// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
The node graph: a qualifier-addressed arena of symbolic computation nodes.

Every node is addressed by a [`NodeKey`]: a scope prefix, a name, positional
qualifiers and (canonicalized) keyword qualifiers. Within a graph a key maps
to at most one node; creation is idempotent at the entity layer because
accessors always look a key up before building, and re-defining an existing
key is an error rather than a silent overwrite.

Graph construction is single-threaded and synchronous, so the arena lives
behind `Rc<RefCell<_>>`; [`NodeGraph`] handles are cheap clones of the same
underlying arena. Nodes are never mutated once defined.
 */

mod error;
mod scope;
#[cfg(test)]
mod tests;

pub use error::GraphError;
pub use scope::{NodeEntry, NodeFamily, NodeKey, NodeScope, Qualifier};

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::c64;
use crate::coord::XyzPosition;

/// A handle to a node in a [`NodeGraph`]. Handles are only meaningful for the
/// graph that issued them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A solvable leaf-parameter definition: a starting value plus tags for
/// solver discovery.
#[derive(Clone, Debug, PartialEq)]
pub struct ParmSpec {
    pub value: f64,
    pub tags: Vec<String>,
    pub solvable: bool,
}

impl ParmSpec {
    pub fn new(value: f64) -> ParmSpec {
        ParmSpec {
            value,
            tags: vec![],
            solvable: true,
        }
    }

    /// Add a discovery tag.
    pub fn tag(mut self, tag: &str) -> ParmSpec {
        if !self.tags.iter().any(|t| t == tag) {
            self.tags.push(tag.to_string());
        }
        self
    }

    /// Mark the parameter as fixed; it keeps its tags but is skipped by
    /// solvable-parameter discovery.
    pub fn fixed(mut self) -> ParmSpec {
        self.solvable = false;
        self
    }
}

/// The operator vocabulary. A node is an operator applied to child nodes;
/// leaves are constants and parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeOp {
    /// A constant tensor of scalars (a 1-element tensor is a plain scalar, a
    /// 4-element tensor a 2x2 matrix, row-major).
    Constant(Vec<c64>),
    /// A named, possibly-solvable leaf parameter.
    Parm(ParmSpec),
    /// The frequency coordinate of the evaluation cells.
    Freq,
    /// The time coordinate of the evaluation cells (interpreted as local
    /// sidereal time, in radians, by [`crate::eval`]).
    Time,

    // Element-wise arithmetic. n-ary ops fold over their children.
    Add,
    Subtract,
    Multiply,
    Divide,
    Negate,
    Sqrt,
    Sqr,
    Pow,
    Cos,
    Sin,
    Asin,
    Conj,
    /// Combine two real children into a complex result.
    ToComplex,
    /// `Polar(amplitude, phase)` = amplitude * exp(i * phase).
    Polar,
    Identity,

    // Tensor plumbing.
    /// Concatenate children into one tensor.
    Composer,
    /// Select tensor elements by index.
    Selector(Vec<usize>),
    /// Replace one tensor element of the first child with the second child.
    Paster(usize),

    // 2x2 matrix algebra.
    /// Compose four scalar children into a 2x2 matrix (row-major).
    Matrix22,
    /// Fold a matrix product over the children; scalar children act as
    /// scalar factors.
    MatrixMultiply,
    ConjTranspose,

    // Interferometry.
    /// `Lmn(radec0, radec)`: direction cosines of `radec` relative to
    /// `radec0`.
    Lmn,
    /// `LmRaDec(radec0, lm)`: absolute (ra,dec) of an (l,m) offset.
    LmRaDec,
    /// Station (u,v,w) towards a phase centre; the child is the phase-centre
    /// radec node, the payload the station position.
    Uvw(XyzPosition),
    /// `VisPhaseShift(lmn_minus1, uvw)`: the K-Jones phase factor
    /// exp(-2 pi i (u l + v m + w (n-1)) freq / c).
    VisPhaseShift,

    // Solving.
    /// The difference of two trees that a solver drives to zero.
    Condeq,
    /// A solver over condeq children, adjusting the listed parameter nodes.
    /// Built for export; not supported by the reference evaluator.
    Solver(Vec<NodeId>),
    /// Evaluate children in sequence, returning the result of the indexed
    /// child.
    ReqSeq(usize),
}

struct Node {
    key: NodeKey,
    op: NodeOp,
    children: Vec<NodeId>,
}

#[derive(Default)]
struct GraphInner {
    nodes: Vec<Node>,
    index: IndexMap<NodeKey, NodeId>,
    next_entity: u64,
}

/// A shared, single-threaded node arena. Cloning is cheap and yields a handle
/// to the same graph.
#[derive(Clone, Default)]
pub struct NodeGraph {
    inner: Rc<RefCell<GraphInner>>,
}

impl NodeGraph {
    pub fn new() -> NodeGraph {
        NodeGraph::default()
    }

    /// The root scope of this graph.
    pub fn scope(&self) -> NodeScope {
        NodeScope::root(self.clone())
    }

    /// Look a key up. `None` means the node has not been built.
    pub fn lookup(&self, key: &NodeKey) -> Option<NodeId> {
        self.inner.borrow().index.get(key).copied()
    }

    /// Define a new node. Fails if the key is already taken; nodes are never
    /// redefined.
    pub fn define(
        &self,
        key: NodeKey,
        op: NodeOp,
        children: Vec<NodeId>,
    ) -> Result<NodeId, GraphError> {
        let mut inner = self.inner.borrow_mut();
        if inner.index.contains_key(&key) {
            return Err(GraphError::AlreadyDefined(key.to_string()));
        }
        let id = NodeId(inner.nodes.len() as u32);
        inner.index.insert(key.clone(), id);
        inner.nodes.push(Node { key, op, children });
        Ok(id)
    }

    /// The number of nodes defined so far.
    pub fn num_nodes(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    /// The operator of a node.
    pub fn op(&self, id: NodeId) -> NodeOp {
        self.inner.borrow().nodes[id.index()].op.clone()
    }

    /// The children of a node.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.inner.borrow().nodes[id.index()].children.clone()
    }

    /// The full key of a node.
    pub fn key(&self, id: NodeId) -> NodeKey {
        self.inner.borrow().nodes[id.index()].key.clone()
    }

    /// All solvable parameter nodes carrying the given tag, in definition
    /// order. This is how solvers discover what to adjust.
    pub fn parms_tagged(&self, tag: &str) -> Vec<NodeId> {
        let inner = self.inner.borrow();
        inner
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(i, node)| match &node.op {
                NodeOp::Parm(spec) if spec.solvable && spec.tags.iter().any(|t| t == tag) => {
                    Some(NodeId(i as u32))
                }
                _ => None,
            })
            .collect()
    }

    /// A fresh identity token for a domain entity. Entities compare these to
    /// decide whether two handles refer to the same logical object (e.g. "is
    /// this direction the phase centre itself?").
    pub fn fresh_entity_id(&self) -> u64 {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_entity;
        inner.next_entity += 1;
        id
    }
}
