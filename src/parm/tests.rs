// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::*;
use crate::graph::NodeGraph;

fn entity(graph: &NodeGraph, name: &str) -> Parameterization {
    Parameterization::new(&graph.scope(), Some(name))
}

#[test]
fn parm_nodes_are_memoized() {
    let graph = NodeGraph::new();
    let mut p = entity(&graph, "src1");
    p.add_parm("ra", 0.1, &["direction"]);
    let first = p.parm("ra").unwrap();
    let before = graph.num_nodes();
    let second = p.parm("ra").unwrap();
    assert_eq!(first, second);
    // A cache hit must not grow the graph.
    assert_eq!(graph.num_nodes(), before);
}

#[test]
fn unknown_parms_are_an_error() {
    let graph = NodeGraph::new();
    let p = entity(&graph, "src1");
    assert!(matches!(
        p.parm("flux"),
        Err(ModelError::UnknownParm { .. })
    ));
}

#[test]
fn constants_and_specs_are_distinguished() {
    let graph = NodeGraph::new();
    let mut p = entity(&graph, "src1");
    p.add_parm("ra", 0.1, &[]);
    p.add_parm("dec", ParmSpec::new(-0.5), &["direction"]);
    assert!(p.is_constant("ra"));
    assert!(!p.is_constant("dec"));
    assert_eq!(p.constant_value("ra"), Some(0.1));
    assert_eq!(p.constant_value("dec"), None);
}

#[test]
fn base_tags_are_applied_to_specs() {
    let graph = NodeGraph::new();
    let mut p = entity(&graph, "src1");
    p.add_parm("dec", ParmSpec::new(-0.5).tag("solvable"), &["direction"]);
    let id = p.parm("dec").unwrap();
    match graph.op(id) {
        NodeOp::Parm(spec) => {
            assert!(spec.tags.iter().any(|t| t == "solvable"));
            assert!(spec.tags.iter().any(|t| t == "direction"));
        }
        other => panic!("expected a Parm node, got {other:?}"),
    }
}

#[test]
fn external_nodes_are_aliased_into_the_entity_scope() {
    let graph = NodeGraph::new();
    let shared = graph.scope().constant("ref_freq", &[1.5e8]).unwrap();
    let mut p = entity(&graph, "src1");
    p.add_parm("spi_fq0", shared, &[]);
    let id = p.parm("spi_fq0").unwrap();
    assert_ne!(id, shared);
    assert_eq!(graph.op(id), NodeOp::Identity);
    assert_eq!(graph.children(id), vec![shared]);
}

#[test]
fn entity_identity_is_not_structural() {
    let graph = NodeGraph::new();
    let a = entity(&graph, "pc_a");
    let b = entity(&graph, "pc_b");
    assert!(a.same_entity(&a));
    assert!(!a.same_entity(&b));
}
