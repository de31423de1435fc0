// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;

use super::*;

#[test]
fn to_lmn() {
    let radec = RADec::new(62.0_f64.to_radians(), (-27.5_f64).to_radians());
    let pc = RADec::new(60.0_f64.to_radians(), (-27.0_f64).to_radians());
    let lmn = radec.to_lmn(pc);
    assert_abs_diff_eq!(lmn.l, 0.03095623164758603, epsilon = 1e-10);
    assert_abs_diff_eq!(lmn.m, -0.008971846102111436, epsilon = 1e-10);
    assert_abs_diff_eq!(lmn.n, 0.9994804738961642, epsilon = 1e-10);
}

#[test]
fn to_lmn_of_phase_centre_is_origin() {
    let pc = RADec::new(1.0, -0.5);
    let lmn = pc.to_lmn(pc);
    assert_abs_diff_eq!(lmn.l, 0.0, epsilon = 1e-15);
    assert_abs_diff_eq!(lmn.m, 0.0, epsilon = 1e-15);
    assert_abs_diff_eq!(lmn.n, 1.0, epsilon = 1e-15);
}

#[test]
fn from_lm_round_trips() {
    let pc = RADec::new(0.3, -0.4);
    let radec = RADec::new(0.32, -0.37);
    let lmn = radec.to_lmn(pc);
    let back = RADec::from_lm(lmn.l, lmn.m, pc);
    assert_abs_diff_eq!(back.ra, radec.ra, epsilon = 1e-12);
    assert_abs_diff_eq!(back.dec, radec.dec, epsilon = 1e-12);
}

#[test]
fn enh_to_xyz() {
    let enh = Enh {
        n: -101.530,
        e: -585.675,
        h: 375.212,
    };
    // MWA latitude.
    let xyz = enh.to_xyz(-0.46606083776035967);
    assert_abs_diff_eq!(xyz.x, 289.5692867016053, epsilon = 1e-9);
    assert_abs_diff_eq!(xyz.y, -585.675, epsilon = 1e-9);
    assert_abs_diff_eq!(xyz.z, -259.3106516191025, epsilon = 1e-9);
}

#[test]
fn uvw_at_zero_hour_angle_and_pole() {
    // With ha = 0 and dec = pi/2, (u,v,w) is a simple permutation of XYZ.
    let xyz = XyzPosition {
        x: 100.0,
        y: -50.0,
        z: 25.0,
    };
    let uvw = UVW::from_xyz(xyz, 0.0, std::f64::consts::FRAC_PI_2);
    assert_abs_diff_eq!(uvw.u, -50.0, epsilon = 1e-9);
    assert_abs_diff_eq!(uvw.v, -100.0, epsilon = 1e-9);
    assert_abs_diff_eq!(uvw.w, 25.0, epsilon = 1e-9);
}
