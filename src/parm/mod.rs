// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
The base of every parameterized entity.

A [`Parameterization`] wraps an entity's subscope and an ordered table of
parameter definitions. Parameter *nodes* are built lazily by [`parm`]: the
first call materializes a constant, a solvable parameter leaf or an alias to
an externally-supplied node; later calls return the same node.

[`parm`]: Parameterization::parm
 */

#[cfg(test)]
mod tests;

use indexmap::IndexMap;

use crate::error::ModelError;
use crate::graph::{NodeId, NodeOp, NodeScope, Qualifier};
pub use crate::graph::ParmSpec;

/// A parameter definition: a compile-time constant, a solvable leaf, or a
/// node built elsewhere.
#[derive(Clone, Debug)]
pub enum ParmValue {
    Const(f64),
    Spec(ParmSpec),
    ExternalNode(NodeId),
}

impl From<f64> for ParmValue {
    fn from(v: f64) -> ParmValue {
        ParmValue::Const(v)
    }
}

impl From<ParmSpec> for ParmValue {
    fn from(spec: ParmSpec) -> ParmValue {
        ParmValue::Spec(spec)
    }
}

impl From<NodeId> for ParmValue {
    fn from(id: NodeId) -> ParmValue {
        ParmValue::ExternalNode(id)
    }
}

/// An entity's subscope plus its parameter table. Domain entities (directions,
/// sources, ionospheric models) embed one of these.
pub struct Parameterization {
    scope: NodeScope,
    name: Option<String>,
    quals: Vec<Qualifier>,
    entity_id: u64,
    parms: IndexMap<String, ParmValue>,
}

impl Parameterization {
    /// Create a parameterization under `ns`. A named entity gets a disjoint
    /// subscope; an anonymous one (e.g. a phase centre) builds its nodes
    /// directly in `ns`, unqualified.
    pub fn new(ns: &NodeScope, name: Option<&str>) -> Parameterization {
        Self::with_quals(ns, name, vec![])
    }

    /// As [`Parameterization::new`], with extra entity qualifiers.
    pub fn with_quals(
        ns: &NodeScope,
        name: Option<&str>,
        quals: Vec<Qualifier>,
    ) -> Parameterization {
        let scope = match name {
            Some(name) => ns.subscope_q(name, quals.iter().cloned()),
            None if quals.is_empty() => ns.clone(),
            None => ns.subscope_q("", quals.iter().cloned()),
        };
        let entity_quals = match name {
            Some(name) => std::iter::once(Qualifier::from(name))
                .chain(quals)
                .collect(),
            None => quals,
        };
        Parameterization {
            entity_id: scope.graph().fresh_entity_id(),
            scope,
            name: name.map(|n| n.to_string()),
            quals: entity_quals,
            parms: IndexMap::new(),
        }
    }

    pub fn scope(&self) -> &NodeScope {
        &self.scope
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The qualifiers other entities use when deriving nodes relative to this
    /// one (e.g. `lmn` qualified by a reference direction).
    pub fn qualifiers(&self) -> &[Qualifier] {
        &self.quals
    }

    /// True if `other` is the same logical entity (not merely an equal one).
    pub fn same_entity(&self, other: &Parameterization) -> bool {
        self.entity_id == other.entity_id
    }

    /// Record a parameter definition. Tags are added to solvable definitions
    /// for solver discovery; constants have nothing to discover.
    pub fn add_parm(&mut self, name: &str, value: impl Into<ParmValue>, tags: &[&str]) {
        let value = match value.into() {
            ParmValue::Spec(mut spec) => {
                for tag in tags {
                    spec = spec.tag(tag);
                }
                ParmValue::Spec(spec)
            }
            other => other,
        };
        self.parms.insert(name.to_string(), value);
    }

    /// The node for a parameter, built on first call.
    pub fn parm(&self, name: &str) -> Result<NodeId, ModelError> {
        let value = self.parms.get(name).ok_or_else(|| ModelError::UnknownParm {
            entity: self.describe(),
            name: name.to_string(),
        })?;
        let entry = self.scope.entry(name);
        if let Some(id) = entry.get() {
            return Ok(id);
        }
        let id = match value {
            ParmValue::Const(v) => entry.insert(
                NodeOp::Constant(vec![crate::c64::new(*v, 0.0)]),
                vec![],
            )?,
            ParmValue::Spec(spec) => entry.insert(NodeOp::Parm(spec.clone()), vec![])?,
            // Alias the external node under this entity's namespace so the
            // parameter is addressable like any other.
            ParmValue::ExternalNode(ext) => entry.insert(NodeOp::Identity, vec![*ext])?,
        };
        Ok(id)
    }

    /// True if the parameter is a compile-time constant.
    pub fn is_constant(&self, name: &str) -> bool {
        matches!(self.parms.get(name), Some(ParmValue::Const(_)))
    }

    /// The constant value of a parameter, if it is one.
    pub fn constant_value(&self, name: &str) -> Option<f64> {
        match self.parms.get(name) {
            Some(ParmValue::Const(v)) => Some(*v),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        self.name.clone().unwrap_or_else(|| "<anonymous>".to_string())
    }
}
