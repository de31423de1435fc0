// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::*;
use crate::c64;

fn constant(v: f64) -> NodeOp {
    NodeOp::Constant(vec![c64::new(v, 0.0)])
}

#[test]
fn lookup_then_insert_is_idempotent() {
    let graph = NodeGraph::new();
    let ns = graph.scope();
    let entry = ns.entry("lmn").q("3c123");
    assert!(entry.get().is_none());
    let id = entry.insert(constant(1.0), vec![]).unwrap();
    assert_eq!(entry.get(), Some(id));
    assert_eq!(graph.num_nodes(), 1);
}

#[test]
fn redefinition_is_an_error() {
    let graph = NodeGraph::new();
    let entry = graph.scope().entry("radec");
    entry.insert(constant(0.0), vec![]).unwrap();
    let result = entry.insert(constant(1.0), vec![]);
    assert!(matches!(result, Err(GraphError::AlreadyDefined(_))));
    // The original node is untouched.
    assert_eq!(graph.num_nodes(), 1);
    assert_eq!(graph.op(entry.get().unwrap()), constant(0.0));
}

#[test]
fn different_qualifiers_are_distinct_nodes() {
    let graph = NodeGraph::new();
    let ns = graph.scope();
    let a = ns.entry("K").q(0_i64).insert(constant(1.0), vec![]).unwrap();
    let b = ns.entry("K").q(1_i64).insert(constant(1.0), vec![]).unwrap();
    assert_ne!(a, b);
    // Same name, different qualifier kind.
    let c = ns.entry("K").q("0").insert(constant(1.0), vec![]).unwrap();
    assert_ne!(a, c);
}

#[test]
fn keyword_qualifiers_are_order_independent() {
    let graph = NodeGraph::new();
    let ns = graph.scope();
    let id = ns
        .entry("coh")
        .kw("b", 1_i64)
        .kw("a", 2_i64)
        .insert(constant(0.5), vec![])
        .unwrap();
    let other = ns.entry("coh").kw("a", 2_i64).kw("b", 1_i64);
    assert_eq!(other.get(), Some(id));
}

#[test]
fn subscopes_are_disjoint() {
    let graph = NodeGraph::new();
    let a = graph.scope().subscope("src1");
    let b = graph.scope().subscope("src2");
    let na = a.entry("lmn").insert(constant(0.0), vec![]).unwrap();
    let nb = b.entry("lmn").insert(constant(0.0), vec![]).unwrap();
    assert_ne!(na, nb);
    assert!(graph.scope().entry("lmn").get().is_none());
}

#[test]
fn qmerge_skips_duplicates() {
    let graph = NodeGraph::new();
    let ns = graph.scope();
    let quals = [Qualifier::from("pc"), Qualifier::from("x")];
    let entry = ns.entry("lmn").q("pc").qmerge(&quals);
    assert_eq!(
        entry.key().quals,
        vec![Qualifier::from("pc"), Qualifier::from("x")]
    );
}

#[test]
fn parms_tagged_finds_solvable_parms_only() {
    let graph = NodeGraph::new();
    let ns = graph.scope();
    let ra = ns
        .entry("ra")
        .insert(
            NodeOp::Parm(ParmSpec::new(0.1).tag("direction")),
            vec![],
        )
        .unwrap();
    ns.entry("dec")
        .insert(
            NodeOp::Parm(ParmSpec::new(0.2).tag("direction").fixed()),
            vec![],
        )
        .unwrap();
    ns.entry("flux")
        .insert(NodeOp::Parm(ParmSpec::new(1.0).tag("flux")), vec![])
        .unwrap();
    assert_eq!(graph.parms_tagged("direction"), vec![ra]);
    assert!(graph.parms_tagged("mim").is_empty());
}

#[test]
fn shared_constants_build_once() {
    let graph = NodeGraph::new();
    let ns = graph.scope();
    let a = ns.constant("one_half", &[0.5]).unwrap();
    let b = ns.constant("one_half", &[0.5]).unwrap();
    assert_eq!(a, b);
    assert_eq!(graph.num_nodes(), 1);
}

#[test]
fn key_display_is_fully_qualified() {
    let graph = NodeGraph::new();
    let ns = graph.scope().subscope("src1");
    let key = ns.entry("lmn").q("pc").kw("band", 3_i64).key();
    assert_eq!(key.to_string(), "src1:lmn:pc:band=3");
}
