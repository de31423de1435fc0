// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use vec1::vec1;

use super::*;
use crate::context::Station;
use crate::coord::{Enh, RADec};
use crate::eval::{evaluate, Cells};
use crate::graph::{NodeGraph, NodeOp};

const RA0: f64 = 1.0;
const DEC0: f64 = -0.45;

fn phase_centre(graph: &NodeGraph) -> Direction {
    Direction::new(&graph.scope(), Some("pc"), RA0, DEC0, true)
}

fn two_stations(graph: &NodeGraph) -> Array {
    let stations = vec1![
        Station::new(
            0,
            "s0",
            Enh {
                e: 0.0,
                n: 0.0,
                h: 0.0
            }
        ),
        Station::new(
            1,
            "s1",
            Enh {
                e: 1000.0,
                n: -400.0,
                h: 0.0
            }
        ),
    ];
    Array::new(&graph.scope(), DEC0, stations)
}

fn cells() -> Cells {
    Cells::single(0.0, 1.5e8)
}

#[test]
fn empty_polynomials_are_rejected() {
    let graph = NodeGraph::new();
    assert!(matches!(
        PolyMim::with_coefficients(&graph.scope(), &[]),
        Err(ModelError::EmptyPolynomial(_))
    ));
}

#[test]
fn vertical_tec_at_zenith_is_the_background() {
    let graph = NodeGraph::new();
    let dir0 = phase_centre(&graph);
    let array = two_stations(&graph);
    let mim = PolyMim::new(&graph.scope(), 1);
    // Towards the phase centre itself: n = 1, so the slant is 1, and the
    // higher-order terms start at zero.
    let tec = mim.tec(&array, &dir0, &dir0).unwrap();
    for p in 0..2 {
        let v = evaluate(&graph, tec.node(p).unwrap(), &cells()).unwrap();
        assert_abs_diff_eq!(v.at(0, 0, 0).re, DEFAULT_TEC0, epsilon = 1e-9);
    }
}

#[test]
fn tec_family_is_memoized() {
    let graph = NodeGraph::new();
    let dir0 = phase_centre(&graph);
    let array = two_stations(&graph);
    let mim = PolyMim::new(&graph.scope(), 2);
    let first = mim.tec(&array, &dir0, &dir0).unwrap();
    let before = graph.num_nodes();
    let second = mim.tec(&array, &dir0, &dir0).unwrap();
    assert_eq!(graph.num_nodes(), before);
    assert_eq!(first.node(1).unwrap(), second.node(1).unwrap());
}

#[test]
fn mim_coefficients_are_discoverable_by_tag() {
    let graph = NodeGraph::new();
    let dir0 = phase_centre(&graph);
    let array = two_stations(&graph);
    let mim = PolyMim::new(&graph.scope(), 1);
    mim.tec(&array, &dir0, &dir0).unwrap();
    // c01 and c10 are solvable; the background c00 is a plain constant.
    assert_eq!(graph.parms_tagged("mim").len(), 2);
}

#[test]
fn slanted_tec_follows_the_obliquity() {
    let graph = NodeGraph::new();
    let dir0 = phase_centre(&graph);
    let dir = Direction::new(&graph.scope(), Some("src1"), RA0 + 0.05, DEC0 + 0.03, true);
    let array = two_stations(&graph);
    let mim = PolyMim::new(&graph.scope(), 1);
    let tec = mim.tec(&array, &dir, &dir0).unwrap();

    let lmn = RADec::new(RA0 + 0.05, DEC0 + 0.03).to_lmn(RADec::new(RA0, DEC0));
    let sin_z = (1.0 - lmn.n * lmn.n).sqrt();
    let shrink = EARTH_RADIUS_KM / (EARTH_RADIUS_KM + DEFAULT_EFFECTIVE_ALTITUDE_KM);
    let slant = 1.0 / (shrink * sin_z).asin().cos();
    // The polynomial starts flat, so every station sees TEC0 * S(z).
    let v = evaluate(&graph, tec.node(1).unwrap(), &cells()).unwrap();
    assert_abs_diff_eq!(v.at(0, 0, 0).re, DEFAULT_TEC0 * slant, epsilon = 1e-9);
}

#[test]
fn flat_earth_slant_is_the_secant() {
    let graph = NodeGraph::new();
    let dir0 = phase_centre(&graph);
    let dir = Direction::new(&graph.scope(), Some("src1"), RA0 + 0.05, DEC0 + 0.03, true);
    let array = two_stations(&graph);
    let mim = PolyMim::new(&graph.scope(), 1).with_flat_earth();
    let tec = mim.tec(&array, &dir, &dir0).unwrap();
    let lmn = RADec::new(RA0 + 0.05, DEC0 + 0.03).to_lmn(RADec::new(RA0, DEC0));
    let v = evaluate(&graph, tec.node(0).unwrap(), &cells()).unwrap();
    assert_abs_diff_eq!(v.at(0, 0, 0).re, DEFAULT_TEC0 / lmn.n, epsilon = 1e-9);
}

#[test]
fn solvable_coefficients_move_the_pierce_points() {
    let graph = NodeGraph::new();
    let dir0 = phase_centre(&graph);
    let array = two_stations(&graph);
    // An east-west gradient of 1 TEC unit per normalized pierce unit.
    let mim = PolyMim::with_coefficients(&graph.scope(), &[(0, 0, 10.0), (1, 0, 2.0)]).unwrap();
    let tec = mim.tec(&array, &dir0, &dir0).unwrap();
    let v0 = evaluate(&graph, tec.node(0).unwrap(), &cells()).unwrap();
    let v1 = evaluate(&graph, tec.node(1).unwrap(), &cells()).unwrap();
    // Station 0 sits at the origin; station 1 is 1 km east, i.e. at a
    // normalized pierce coordinate of 1e3 * 1e-6.
    assert_abs_diff_eq!(v0.at(0, 0, 0).re, 10.0, epsilon = 1e-12);
    assert_abs_diff_eq!(v1.at(0, 0, 0).re, 10.0 + 2.0 * 1.0e3 * PIERCE_NORM, epsilon = 1e-12);
}

#[test]
fn z_jones_applies_the_ionospheric_phase() {
    let graph = NodeGraph::new();
    let dir0 = phase_centre(&graph);
    let array = two_stations(&graph);
    let mim = PolyMim::new(&graph.scope(), 1);
    let zj = mim.z_jones(&array, &dir0, &dir0).unwrap();
    let before = graph.num_nodes();
    mim.z_jones(&array, &dir0, &dir0).unwrap();
    assert_eq!(graph.num_nodes(), before);

    let nu = 1.5e8;
    let expected = (crate::c64::i() * (-TEC_PHASE_CONV * DEFAULT_TEC0 / nu)).exp();
    let v = evaluate(&graph, zj.node(0).unwrap(), &Cells::single(0.0, nu)).unwrap();
    assert_abs_diff_eq!(v.at(0, 0, 0).norm(), 1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(v.at(0, 0, 0).re, expected.re, epsilon = 1e-6);
    assert_abs_diff_eq!(v.at(0, 0, 0).im, expected.im, epsilon = 1e-6);
}

#[test]
fn polynomial_powers_reuse_nodes() {
    let graph = NodeGraph::new();
    let dir0 = phase_centre(&graph);
    let array = two_stations(&graph);
    let mim = PolyMim::new(&graph.scope(), 2);
    mim.tec(&array, &dir0, &dir0).unwrap();
    // Degree 2 in two variables: 6 coefficients, 5 of them solvable.
    assert_eq!(graph.parms_tagged("mim").len(), 5);
    // The squared-pierce nodes exist once per station.
    let op = graph.op(
        graph
            .scope()
            .subscope("mim")
            .family("npx_pow2")
            .qmerge(dir0.qualifiers())
            .node(0)
            .unwrap(),
    );
    assert_eq!(op, NodeOp::Pow);
}
