// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Families of 2x2 Jones and coherency matrices.

A [`Matrix22`] is a labelled set of per-index (usually per-station) 2x2
matrix nodes, with element extraction, element-wise operators, and solver
plumbing. Operators return a *new* labelled matrix set; the operands are
never touched.
 */


use log::debug;
use vec1::Vec1;

use crate::error::ModelError;
use crate::graph::{NodeFamily, NodeId, NodeOp, NodeScope, Qualifier};

/// One element of a 2x2 matrix, in row-major order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatrixElement {
    M11,
    M12,
    M21,
    M22,
}

impl MatrixElement {
    /// The element's index in a flattened row-major matrix.
    pub fn flat_index(self) -> usize {
        match self {
            MatrixElement::M11 => 0,
            MatrixElement::M12 => 1,
            MatrixElement::M21 => 2,
            MatrixElement::M22 => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MatrixElement::M11 => "m11",
            MatrixElement::M12 => "m12",
            MatrixElement::M21 => "m21",
            MatrixElement::M22 => "m22",
        }
    }
}

/// A labelled family of per-index 2x2 matrix nodes.
pub struct Matrix22 {
    scope: NodeScope,
    label: String,
    quals: Vec<Qualifier>,
    indices: Vec1<usize>,
    matrix: Option<NodeFamily>,
}

impl Matrix22 {
    pub fn new(
        ns: &NodeScope,
        label: &str,
        quals: Vec<Qualifier>,
        indices: Vec1<usize>,
    ) -> Matrix22 {
        Matrix22 {
            scope: ns.clone(),
            label: label.to_string(),
            quals,
            indices,
            matrix: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// The family this matrix set writes its member nodes into.
    pub fn family(&self) -> NodeFamily {
        self.scope.family(&self.label).qmerge(&self.quals)
    }

    /// Adopt already-built member nodes.
    pub fn set_matrix(&mut self, family: NodeFamily) {
        self.matrix = Some(family);
    }

    /// Build the member nodes from a per-index definition.
    pub fn define(
        &mut self,
        mut element: impl FnMut(usize) -> Result<(NodeOp, Vec<NodeId>), ModelError>,
    ) -> Result<(), ModelError> {
        let family = self.family();
        for &i in self.indices.iter() {
            let entry = family.index(i);
            if entry.get().is_none() {
                let (op, children) = element(i)?;
                entry.insert(op, children)?;
            }
        }
        self.matrix = Some(family);
        Ok(())
    }

    fn matrix(&self) -> Result<&NodeFamily, ModelError> {
        self.matrix
            .as_ref()
            .ok_or_else(|| ModelError::NoMatrix(self.label.clone()))
    }

    /// The member node for one index.
    pub fn node(&self, index: usize) -> Result<NodeId, ModelError> {
        Ok(self.matrix()?.node(index)?)
    }

    /// A memoized per-index family of one matrix element.
    pub fn matrix_element(&self, element: MatrixElement) -> Result<NodeFamily, ModelError> {
        let matrix = self.matrix()?;
        let family = matrix.sibling(&format!("{}_{}", self.label, element.name()));
        for &i in self.indices.iter() {
            let entry = family.index(i);
            if entry.get().is_none() {
                entry.insert(
                    NodeOp::Selector(vec![element.flat_index()]),
                    vec![matrix.node(i)?],
                )?;
            }
        }
        Ok(family)
    }

    /// A new matrix set whose members apply `op` to the paired members of
    /// `self` and `other`. The two operands must cover the same indices.
    pub fn binop(&self, op: NodeOp, other: &Matrix22, label: &str) -> Result<Matrix22, ModelError> {
        if self.indices != other.indices {
            return Err(ModelError::IndexMismatch(
                self.label.clone(),
                other.label.clone(),
            ));
        }
        let mut result = Matrix22::new(&self.scope, label, self.quals.clone(), self.indices.clone());
        let lhs = self.matrix()?;
        let rhs = other.matrix()?;
        result.define(|i| Ok((op.clone(), vec![lhs.node(i)?, rhs.node(i)?])))?;
        Ok(result)
    }

    /// A new matrix set whose members apply `op` to the members of `self`.
    pub fn unop(&self, op: NodeOp, label: &str) -> Result<Matrix22, ModelError> {
        let mut result = Matrix22::new(&self.scope, label, self.quals.clone(), self.indices.clone());
        let operand = self.matrix()?;
        result.define(|i| Ok((op.clone(), vec![operand.node(i)?])))?;
        Ok(result)
    }

    /// Reduce the family to a single node with an n-ary `op`, memoized under
    /// `name`.
    pub fn bundle(&self, op: NodeOp, name: &str) -> Result<NodeId, ModelError> {
        let entry = self.scope.entry(name).qmerge(&self.quals);
        if let Some(id) = entry.get() {
            return Ok(id);
        }
        let matrix = self.matrix()?;
        let children = self
            .indices
            .iter()
            .map(|&i| matrix.node(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entry.insert(op, children)?)
    }

    /// Per-index condition equations driving `self` towards `other`,
    /// optionally restricted to a subset of matrix elements.
    pub fn condeqs(
        &self,
        other: &Matrix22,
        elements: Option<&[MatrixElement]>,
    ) -> Result<NodeFamily, ModelError> {
        if self.indices != other.indices {
            return Err(ModelError::IndexMismatch(
                self.label.clone(),
                other.label.clone(),
            ));
        }
        if let Some(&[]) = elements {
            return Err(ModelError::NoMatrixElements);
        }
        let lhs = self.matrix()?;
        let rhs = other.matrix()?;
        // The element subset is part of every key: condeqs over different
        // subsets (or against different matrices) must be distinct nodes.
        let suffix = element_suffix(elements);
        let condeqs = lhs.sibling(&format!(
            "condeq_{}_{}{suffix}",
            self.label, other.label
        ));
        let selection: Option<Vec<usize>> =
            elements.map(|els| els.iter().map(|e| e.flat_index()).collect());
        for &i in self.indices.iter() {
            let entry = condeqs.index(i);
            if entry.get().is_some() {
                continue;
            }
            let (a, b) = match &selection {
                None => (lhs.node(i)?, rhs.node(i)?),
                Some(sel) => {
                    let sel_a = condeqs
                        .sibling(&format!("{}_sel{suffix}", self.label))
                        .index(i)
                        .get_or_insert(NodeOp::Selector(sel.clone()), vec![lhs.node(i)?])?;
                    let sel_b = condeqs
                        .sibling(&format!("{}_sel{suffix}", other.label))
                        .index(i)
                        .get_or_insert(NodeOp::Selector(sel.clone()), vec![rhs.node(i)?])?;
                    (sel_a, sel_b)
                }
            };
            entry.insert(NodeOp::Condeq, vec![a, b])?;
        }
        Ok(condeqs)
    }

    /// A solver node over the condeqs against `other`, adjusting every
    /// solvable parameter tagged `tag`, sequenced so the solved matrix set
    /// is returned after the solve.
    pub fn solver(
        &self,
        other: &Matrix22,
        tag: &str,
        elements: Option<&[MatrixElement]>,
    ) -> Result<NodeId, ModelError> {
        // Memoize on the node actually returned (the sequence), so a second
        // identical call yields the same node.
        let suffix = element_suffix(elements);
        let entry = self
            .scope
            .entry(format!("reqseq_{}_{}{suffix}", self.label, other.label).as_str())
            .qmerge(&self.quals);
        if let Some(id) = entry.get() {
            return Ok(id);
        }
        let parms = self.scope.graph().parms_tagged(tag);
        if parms.is_empty() {
            return Err(ModelError::NoSolvableParms {
                tag: tag.to_string(),
            });
        }
        debug!(
            "solver over {} condeqs, {} solvable parms tagged '{tag}'",
            self.indices.len(),
            parms.len()
        );
        let condeqs = self.condeqs(other, elements)?;
        let children = self
            .indices
            .iter()
            .map(|&i| condeqs.node(i))
            .collect::<Result<Vec<_>, _>>()?;
        let solver = self
            .scope
            .entry(format!("solver_{}_{}{suffix}", self.label, other.label).as_str())
            .qmerge(&self.quals)
            .insert(NodeOp::Solver(parms), children)?;
        let bundled = self.bundle(NodeOp::Composer, &format!("{}_bundle", self.label))?;
        Ok(entry.insert(NodeOp::ReqSeq(1), vec![solver, bundled])?)
    }
}

/// A key fragment naming an element subset; empty for whole matrices.
fn element_suffix(elements: Option<&[MatrixElement]>) -> String {
    match elements {
        None => String::new(),
        Some(els) => {
            let mut suffix = String::from("_el");
            for e in els {
                suffix.push_str(&e.flat_index().to_string());
            }
            suffix
        }
    }
}

/// Corrupt per-baseline visibilities with a per-station Jones family:
/// `vis(p,q) = J(p) · vis0(p,q) · J(q)^H`. Conjugate-transpose nodes are
/// shared across baselines through a sibling family.
pub fn apply_corruption(
    vis: &NodeFamily,
    vis0: impl Fn(usize, usize) -> NodeId,
    jones: &NodeFamily,
    ifrs: &[(usize, usize)],
) -> Result<(), ModelError> {
    let conj = jones.sibling(&format!("{}_conj", jones.name()));
    for &(p, q) in ifrs {
        let entry = vis.index_pair(p, q);
        if entry.get().is_some() {
            continue;
        }
        let jq_conj = conj
            .index(q)
            .get_or_insert(NodeOp::ConjTranspose, vec![jones.node(q)?])?;
        entry.insert(
            NodeOp::MatrixMultiply,
            vec![jones.node(p)?, vis0(p, q), jq_conj],
        )?;
    }
    Ok(())
}
