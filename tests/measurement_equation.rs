// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! End-to-end tree construction: an array, a phase centre, sources and an
//! ionosphere, composed into per-baseline visibility trees.

use approx::assert_abs_diff_eq;
use vec1::vec1;

use skytree::eval::{evaluate, Cells};
use skytree::jones::apply_corruption;
use skytree::{
    c64, Array, Direction, Enh, FluxModel, IonosphereModel, NodeFamily, NodeGraph, Observation,
    PointSource, PolyMim, RADec, Station, UVW, VEL_C,
};

const LATITUDE: f64 = -0.47;
const RA0: f64 = 1.1;
const DEC0: f64 = -0.5;
const FREQ_HZ: f64 = 1.5e8;
const LST: f64 = RA0 + 0.25;

fn array(graph: &NodeGraph) -> Array {
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
                e: 480.0,
                n: -120.0,
                h: 2.0
            }
        ),
        Station::new(
            2,
            "s2",
            Enh {
                e: -260.0,
                n: 340.0,
                h: -1.5
            }
        ),
    ];
    Array::new(&graph.scope(), LATITUDE, stations)
}

fn observation(graph: &NodeGraph) -> Observation {
    Observation::new(Direction::new(&graph.scope(), Some("pc"), RA0, DEC0, true))
}

fn offset_source(graph: &NodeGraph) -> PointSource {
    let dir = Direction::new(&graph.scope(), Some("src1"), RA0 + 0.03, DEC0 - 0.02, true);
    PointSource::new(&graph.scope(), "src1", dir, FluxModel::new(2.0))
}

fn build_visibilities(
    graph: &NodeGraph,
    array: &Array,
    obs: &Observation,
    src: &PointSource,
) -> NodeFamily {
    let vis = graph.scope().family("vis").q(src.name().to_string());
    src.visibilities(&vis, array, obs).unwrap();
    vis
}

#[test]
fn rebuilding_the_model_adds_no_nodes() {
    let graph = NodeGraph::new();
    let array = array(&graph);
    let obs = observation(&graph);
    let src = offset_source(&graph);
    let vis = build_visibilities(&graph, &array, &obs, &src);
    let before = graph.num_nodes();
    let again = build_visibilities(&graph, &array, &obs, &src);
    assert_eq!(graph.num_nodes(), before);
    for (p, q) in array.ifrs() {
        assert_eq!(
            vis.index_pair(p, q).get().unwrap(),
            again.index_pair(p, q).get().unwrap()
        );
    }
}

#[test]
fn predicted_visibilities_match_the_direct_formula() {
    let graph = NodeGraph::new();
    let array = array(&graph);
    let obs = observation(&graph);
    let src = offset_source(&graph);
    let vis = build_visibilities(&graph, &array, &obs, &src);

    let lmn = RADec::new(RA0 + 0.03, DEC0 - 0.02).to_lmn(RADec::new(RA0, DEC0));
    let cells = Cells::single(LST, FREQ_HZ);
    for (p, q) in array.ifrs() {
        let up = UVW::from_xyz(array.stations()[p].enh.to_xyz(LATITUDE), LST - RA0, DEC0);
        let uq = UVW::from_xyz(array.stations()[q].enh.to_xyz(LATITUDE), LST - RA0, DEC0);
        let phase = -std::f64::consts::TAU * FREQ_HZ / VEL_C
            * ((up.u - uq.u) * lmn.l + (up.v - uq.v) * lmn.m + (up.w - uq.w) * (lmn.n - 1.0));
        // Unpolarized I = 2, so the coherency is the scalar 1.
        let expected = (c64::i() * phase).exp();
        let v = evaluate(&graph, vis.index_pair(p, q).get().unwrap(), &cells).unwrap();
        assert_abs_diff_eq!(v.at(0, 0, 0).re, expected.re, epsilon = 1e-9);
        assert_abs_diff_eq!(v.at(0, 0, 0).im, expected.im, epsilon = 1e-9);
    }
}

#[test]
fn a_flat_ionosphere_cancels_on_baselines() {
    let graph = NodeGraph::new();
    let array = array(&graph);
    let obs = observation(&graph);
    let src = offset_source(&graph);
    let vis = build_visibilities(&graph, &array, &obs, &src);

    // A screen with no gradient gives every station the same TEC towards
    // the source, so the per-station phases cancel pairwise.
    let mim = PolyMim::new(&graph.scope(), 1);
    let zj = mim
        .z_jones(&array, src.direction(), obs.phase_centre())
        .unwrap();
    let corrupted = graph.scope().family("corrupted_vis").q("src1");
    apply_corruption(
        &corrupted,
        |p, q| vis.index_pair(p, q).get().unwrap(),
        &zj,
        &array.ifrs(),
    )
    .unwrap();

    let cells = Cells::single(LST, FREQ_HZ);
    for (p, q) in array.ifrs() {
        let plain = evaluate(&graph, vis.index_pair(p, q).get().unwrap(), &cells).unwrap();
        let with_iono =
            evaluate(&graph, corrupted.index_pair(p, q).get().unwrap(), &cells).unwrap();
        assert_abs_diff_eq!(
            with_iono.at(0, 0, 0).re,
            plain.at(0, 0, 0).re,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            with_iono.at(0, 0, 0).im,
            plain.at(0, 0, 0).im,
            epsilon = 1e-9
        );
    }
}
