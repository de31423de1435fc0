// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision; tree construction folds static
values eagerly, and any loss of precision there is baked into the graph.
 */

pub use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Speed of light \[metres/second\]
pub const VEL_C: f64 = 299_792_458.0;

/// Mean Earth radius \[km\]
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Ionospheric phase conversion: phase = -[`TEC_PHASE_CONV`] * TEC / freq,
/// with TEC in TEC units (10^16 electrons m^-2) and freq in Hz.
pub const TEC_PHASE_CONV: f64 = 8.44797245e9;

/// Default zero-order vertical TEC \[TECU\] for ionospheric models.
pub const DEFAULT_TEC0: f64 = 10.0;

/// Default "effective altitude" of a thin-screen ionosphere \[km\]. This is a
/// coupling parameter, not a physical altitude.
pub const DEFAULT_EFFECTIVE_ALTITUDE_KM: f64 = 300.0;

/// When a source has a spectral index but no reference frequency, this value
/// is used \[Hz\].
pub const DEFAULT_SPECTRUM_REF_FREQ_HZ: f64 = 150e6;

/// Pierce-point coordinates are normalized by 1000 km before being fed to
/// polynomial ionospheric models, so that coefficients are O(1).
pub const PIERCE_NORM: f64 = 1e-6;
