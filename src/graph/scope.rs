// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Scopes, qualifiers and node keys.

use std::fmt;

use super::{GraphError, NodeGraph, NodeId, NodeOp};

/// A positional or keyword tag disambiguating otherwise-same-named nodes
/// (e.g. a station index, a source name).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Qualifier {
    Int(i64),
    Str(String),
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Qualifier::Int(i) => write!(f, "{i}"),
            Qualifier::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Qualifier {
    fn from(i: i64) -> Qualifier {
        Qualifier::Int(i)
    }
}

impl From<i32> for Qualifier {
    fn from(i: i32) -> Qualifier {
        Qualifier::Int(i as i64)
    }
}

impl From<usize> for Qualifier {
    fn from(i: usize) -> Qualifier {
        Qualifier::Int(i as i64)
    }
}

impl From<&str> for Qualifier {
    fn from(s: &str) -> Qualifier {
        Qualifier::Str(s.to_string())
    }
}

impl From<String> for Qualifier {
    fn from(s: String) -> Qualifier {
        Qualifier::Str(s)
    }
}

/// The full address of a node: scope prefix, name, positional qualifiers and
/// keyword qualifiers. Keyword qualifiers are kept sorted by key, so two
/// addresses that differ only in keyword order are the same key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub prefix: Vec<Qualifier>,
    pub name: String,
    pub quals: Vec<Qualifier>,
    pub kwquals: Vec<(String, Qualifier)>,
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for p in &self.prefix {
            write!(f, "{p}:")?;
        }
        write!(f, "{}", self.name)?;
        for q in &self.quals {
            write!(f, ":{q}")?;
        }
        for (k, v) in &self.kwquals {
            write!(f, ":{k}={v}")?;
        }
        Ok(())
    }
}

/// A prefix view into a [`NodeGraph`]. Entities get disjoint subscopes so
/// their node names can never collide.
#[derive(Clone)]
pub struct NodeScope {
    graph: NodeGraph,
    prefix: Vec<Qualifier>,
}

impl NodeScope {
    pub(super) fn root(graph: NodeGraph) -> NodeScope {
        NodeScope {
            graph,
            prefix: vec![],
        }
    }

    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    pub fn prefix(&self) -> &[Qualifier] {
        &self.prefix
    }

    /// Derive a subscope named `name`.
    pub fn subscope(&self, name: &str) -> NodeScope {
        let mut prefix = self.prefix.clone();
        prefix.push(Qualifier::from(name));
        NodeScope {
            graph: self.graph.clone(),
            prefix,
        }
    }

    /// Derive a subscope named `name` with extra qualifiers.
    pub fn subscope_q(
        &self,
        name: &str,
        quals: impl IntoIterator<Item = Qualifier>,
    ) -> NodeScope {
        let mut prefix = self.prefix.clone();
        prefix.push(Qualifier::from(name));
        prefix.extend(quals);
        NodeScope {
            graph: self.graph.clone(),
            prefix,
        }
    }

    /// Start building the address of a node in this scope.
    pub fn entry(&self, name: &str) -> NodeEntry {
        NodeEntry {
            scope: self.clone(),
            name: name.to_string(),
            quals: vec![],
            kwquals: vec![],
        }
    }

    /// An under-qualified node set in this scope; index it to address
    /// individual members.
    pub fn family(&self, name: &str) -> NodeFamily {
        NodeFamily {
            scope: self.clone(),
            name: name.to_string(),
            quals: vec![],
        }
    }

    /// A named constant shared within this scope, built on first use.
    pub fn constant(&self, name: &str, values: &[f64]) -> Result<NodeId, GraphError> {
        self.entry(name).get_or_insert(
            NodeOp::Constant(values.iter().map(|&v| crate::c64::new(v, 0.0)).collect()),
            vec![],
        )
    }
}

/// A node address under construction: name plus qualifiers, against a scope.
/// Finish with [`NodeEntry::get`] or [`NodeEntry::insert`] — the explicit
/// lookup-or-insert contract that replaces duck-typed "initialized?" checks.
#[derive(Clone)]
pub struct NodeEntry {
    scope: NodeScope,
    name: String,
    quals: Vec<Qualifier>,
    kwquals: Vec<(String, Qualifier)>,
}

impl NodeEntry {
    /// Append a positional qualifier.
    pub fn q(mut self, q: impl Into<Qualifier>) -> NodeEntry {
        self.quals.push(q.into());
        self
    }

    /// Merge in qualifiers from another entity, skipping any already
    /// present.
    pub fn qmerge(mut self, quals: &[Qualifier]) -> NodeEntry {
        for q in quals {
            if !self.quals.contains(q) {
                self.quals.push(q.clone());
            }
        }
        self
    }

    /// Add a keyword qualifier. Keyword order does not affect the key.
    pub fn kw(mut self, key: &str, q: impl Into<Qualifier>) -> NodeEntry {
        let pair = (key.to_string(), q.into());
        let pos = self
            .kwquals
            .binary_search_by(|(k, _)| k.as_str().cmp(&pair.0))
            .unwrap_or_else(|p| p);
        self.kwquals.insert(pos, pair);
        self
    }

    /// The full key this entry addresses.
    pub fn key(&self) -> NodeKey {
        NodeKey {
            prefix: self.scope.prefix.clone(),
            name: self.name.clone(),
            quals: self.quals.clone(),
            kwquals: self.kwquals.clone(),
        }
    }

    /// Look the addressed node up.
    pub fn get(&self) -> Option<NodeId> {
        self.scope.graph.lookup(&self.key())
    }

    /// Build the addressed node. Fails if it already exists.
    pub fn insert(&self, op: NodeOp, children: Vec<NodeId>) -> Result<NodeId, GraphError> {
        self.scope.graph.define(self.key(), op, children)
    }

    /// Return the addressed node, building it if absent. Only appropriate
    /// when rebuilding would produce the same definition (constants, shared
    /// leaves); everything else should `get` first and build children only
    /// on a miss.
    pub fn get_or_insert(&self, op: NodeOp, children: Vec<NodeId>) -> Result<NodeId, GraphError> {
        match self.get() {
            Some(id) => Ok(id),
            None => self.insert(op, children),
        }
    }
}

/// An under-qualified node set, e.g. per-station Jones matrices `K(p)`.
/// Indexing yields a [`NodeEntry`] for one member.
#[derive(Clone)]
pub struct NodeFamily {
    scope: NodeScope,
    name: String,
    quals: Vec<Qualifier>,
}

impl NodeFamily {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a positional qualifier common to every member.
    pub fn q(mut self, q: impl Into<Qualifier>) -> NodeFamily {
        self.quals.push(q.into());
        self
    }

    /// Merge in qualifiers from another entity, skipping duplicates.
    pub fn qmerge(mut self, quals: &[Qualifier]) -> NodeFamily {
        for q in quals {
            if !self.quals.contains(q) {
                self.quals.push(q.clone());
            }
        }
        self
    }

    /// A sibling family (same scope and qualifiers, different name).
    pub fn sibling(&self, name: &str) -> NodeFamily {
        NodeFamily {
            scope: self.scope.clone(),
            name: name.to_string(),
            quals: self.quals.clone(),
        }
    }

    /// The entry for one member of the family.
    pub fn index(&self, q: impl Into<Qualifier>) -> NodeEntry {
        NodeEntry {
            scope: self.scope.clone(),
            name: self.name.clone(),
            quals: self.quals.iter().cloned().chain([q.into()]).collect(),
            kwquals: vec![],
        }
    }

    /// The entry for one member addressed by an index pair (e.g. a
    /// baseline).
    pub fn index_pair(&self, a: impl Into<Qualifier>, b: impl Into<Qualifier>) -> NodeEntry {
        NodeEntry {
            scope: self.scope.clone(),
            name: self.name.clone(),
            quals: self
                .quals
                .iter()
                .cloned()
                .chain([a.into(), b.into()])
                .collect(),
            kwquals: vec![],
        }
    }

    /// The member node for an index, failing if it has not been built.
    pub fn node(&self, q: impl Into<Qualifier>) -> Result<NodeId, GraphError> {
        let entry = self.index(q);
        entry
            .get()
            .ok_or_else(|| GraphError::Undefined(entry.key().to_string()))
    }
}
