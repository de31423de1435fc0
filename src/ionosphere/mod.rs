// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Thin-screen ionospheric models.

The ionosphere is modelled as a phase screen at a fixed effective altitude.
For every station and direction a *pierce point* is computed where the line
of sight crosses the screen; a model supplies the vertical TEC at that
point, which is slanted by the obliquity of the crossing and converted into
a per-station phase (Z-Jones) family.

[`IonosphereModel`] carries the shared geometry (pierce points, slant
factor, TEC and Z-Jones families); implementors only provide the vertical
TEC at a normalized pierce position. [`PolyMim`] is the standard polynomial
model with solvable coefficients.
 */

#[cfg(test)]
mod tests;

use log::debug;

use crate::constants::{
    DEFAULT_EFFECTIVE_ALTITUDE_KM, DEFAULT_TEC0, EARTH_RADIUS_KM, PIERCE_NORM, TEC_PHASE_CONV,
};
use crate::context::Array;
use crate::direction::Direction;
use crate::error::ModelError;
use crate::graph::{NodeFamily, NodeId, NodeOp, NodeScope, ParmSpec, Qualifier};
use crate::parm::Parameterization;

/// A thin-screen ionospheric model.
pub trait IonosphereModel {
    fn parms(&self) -> &Parameterization;

    /// Height of the phase screen above the array.
    fn effective_altitude_km(&self) -> f64 {
        DEFAULT_EFFECTIVE_ALTITUDE_KM
    }

    /// Use `sec z` instead of the spherical slant function.
    fn flat_earth(&self) -> bool {
        false
    }

    /// Build the vertical-TEC node for one station's pierce point at
    /// `at.index(station)`. `npx`/`npy` are the normalized east/north pierce
    /// coordinates.
    fn vertical_tec(
        &self,
        at: &NodeFamily,
        station: usize,
        npx: NodeId,
        npy: NodeId,
    ) -> Result<NodeId, ModelError>;

    /// The slant factor `S(z) = 1/cos(asin(R/(R+h) * sin z))`, or `sec z`
    /// for a flat Earth. Memoized per qualifier set; `za_cos` is the cosine
    /// of the zenith angle.
    fn slant_factor(
        &self,
        ns: &NodeScope,
        quals: &[Qualifier],
        za_cos: NodeId,
    ) -> Result<NodeId, ModelError> {
        let entry = ns.entry("slant").qmerge(quals);
        if let Some(id) = entry.get() {
            return Ok(id);
        }
        let one = ns.constant("one", &[1.0])?;
        if self.flat_earth() {
            return Ok(entry.insert(NodeOp::Divide, vec![one, za_cos])?);
        }
        let h_km = self.effective_altitude_km();
        let shrink = ns.constant(
            "slant_shrink",
            &[EARTH_RADIUS_KM / (EARTH_RADIUS_KM + h_km)],
        )?;
        let za_cos_sq = ns
            .entry("za_cos_sq")
            .qmerge(quals)
            .insert(NodeOp::Sqr, vec![za_cos])?;
        let za_sin_sq = ns
            .entry("za_sin_sq")
            .qmerge(quals)
            .insert(NodeOp::Subtract, vec![one, za_cos_sq])?;
        let za_sin = ns
            .entry("za_sin")
            .qmerge(quals)
            .insert(NodeOp::Sqrt, vec![za_sin_sq])?;
        let screen_sin = ns
            .entry("screen_sin")
            .qmerge(quals)
            .insert(NodeOp::Multiply, vec![shrink, za_sin])?;
        let screen_z = ns
            .entry("screen_z")
            .qmerge(quals)
            .insert(NodeOp::Asin, vec![screen_sin])?;
        let screen_cos = ns
            .entry("screen_cos")
            .qmerge(quals)
            .insert(NodeOp::Cos, vec![screen_z])?;
        Ok(entry.insert(NodeOp::Divide, vec![one, screen_cos])?)
    }

    /// The per-station slanted TEC family towards `direction`, built from
    /// thin-screen pierce points. Memoized.
    fn tec(
        &self,
        array: &Array,
        direction: &Direction,
        dir0: &Direction,
    ) -> Result<NodeFamily, ModelError> {
        let ns = self.parms().scope();
        let tec = ns
            .family("tec")
            .qmerge(direction.qualifiers())
            .qmerge(dir0.qualifiers());
        let first = array.stations()[0].index;
        if tec.index(first).get().is_some() {
            return Ok(tec);
        }
        debug!(
            "building TEC nodes for {} stations at altitude {} km",
            array.num_stations(),
            self.effective_altitude_km()
        );

        let mut quals: Vec<Qualifier> = direction.qualifiers().to_vec();
        for q in dir0.qualifiers() {
            if !quals.contains(q) {
                quals.push(q.clone());
            }
        }

        // Direction-common geometry: the pierce-point displacement
        // h * (l/n, m/n) and the zenith-angle cosine (the n component).
        let l = direction.l(dir0)?;
        let m = direction.m(dir0)?;
        let n = direction.n(dir0)?;
        let height = ns.constant("screen_height", &[self.effective_altitude_km() * 1e3])?;
        let dx = pierce_offset(ns, "pp_dx", &quals, height, l, n)?;
        let dy = pierce_offset(ns, "pp_dy", &quals, height, m, n)?;
        let slant = self.slant_factor(ns, &quals, n)?;
        let norm = ns.constant("pierce_norm", &[PIERCE_NORM])?;

        let vtec = tec.sibling("vtec");
        let npx_family = tec.sibling("npx");
        let npy_family = tec.sibling("npy");
        for station in array.stations() {
            let p = station.index;
            let east = ns
                .entry("station_east")
                .q(p)
                .get_or_insert(constant_op(station.enh.e), vec![])?;
            let north = ns
                .entry("station_north")
                .q(p)
                .get_or_insert(constant_op(station.enh.n), vec![])?;
            let px = tec
                .sibling("px")
                .index(p)
                .insert(NodeOp::Add, vec![east, dx])?;
            let py = tec
                .sibling("py")
                .index(p)
                .insert(NodeOp::Add, vec![north, dy])?;
            let npx = npx_family
                .index(p)
                .insert(NodeOp::Multiply, vec![px, norm])?;
            let npy = npy_family
                .index(p)
                .insert(NodeOp::Multiply, vec![py, norm])?;
            let v = self.vertical_tec(&vtec, p, npx, npy)?;
            tec.index(p).insert(NodeOp::Multiply, vec![v, slant])?;
        }
        Ok(tec)
    }

    /// The per-station ionospheric phase family
    /// `Z(p) = exp(-i * kappa * TEC(p) / nu)`. Memoized.
    fn z_jones(
        &self,
        array: &Array,
        direction: &Direction,
        dir0: &Direction,
    ) -> Result<NodeFamily, ModelError> {
        let ns = self.parms().scope();
        let zj = ns
            .family("Z")
            .qmerge(direction.qualifiers())
            .qmerge(dir0.qualifiers());
        let first = array.stations()[0].index;
        if zj.index(first).get().is_some() {
            return Ok(zj);
        }
        let tec = self.tec(array, direction, dir0)?;
        let root = ns.graph().scope();
        let freq = root.entry("freq").get_or_insert(NodeOp::Freq, vec![])?;
        let kappa = ns.constant("tec_phase_conv", &[TEC_PHASE_CONV])?;
        let one = ns.constant("one", &[1.0])?;
        let phase = zj.sibling("z_phase");
        for station in array.stations() {
            let p = station.index;
            let scaled = phase
                .sibling("z_phase_scaled")
                .index(p)
                .insert(NodeOp::Multiply, vec![kappa, tec.node(p)?])?;
            let over_freq = phase
                .sibling("z_phase_over_freq")
                .index(p)
                .insert(NodeOp::Divide, vec![scaled, freq])?;
            let ph = phase.index(p).insert(NodeOp::Negate, vec![over_freq])?;
            zj.index(p).insert(NodeOp::Polar, vec![one, ph])?;
        }
        Ok(zj)
    }
}

/// A polynomial MIM (minimum ionospheric model): vertical TEC is a 2-D
/// polynomial in the normalized pierce coordinates. The zero-order
/// coefficient is the constant background TEC; higher orders are solvable
/// parameters tagged `mim`.
pub struct PolyMim {
    parms: Parameterization,
    exponents: Vec<(usize, usize)>,
    effective_altitude_km: f64,
    flat_earth: bool,
}

impl PolyMim {
    /// A full polynomial of the given total degree, with the default
    /// background TEC and screen altitude.
    pub fn new(ns: &NodeScope, degree: usize) -> PolyMim {
        let mut parms = Parameterization::new(ns, Some("mim"));
        let mut exponents = vec![];
        for dx in 0..=degree {
            for dy in 0..=(degree - dx) {
                if dx == 0 && dy == 0 {
                    parms.add_parm("c00", DEFAULT_TEC0, &[]);
                } else {
                    parms.add_parm(&coeff_name(dx, dy), ParmSpec::new(0.0), &["mim"]);
                }
                exponents.push((dx, dy));
            }
        }
        PolyMim {
            parms,
            exponents,
            effective_altitude_km: DEFAULT_EFFECTIVE_ALTITUDE_KM,
            flat_earth: false,
        }
    }

    /// A polynomial with explicit `(dx, dy, starting value)` terms; every
    /// term is solvable.
    pub fn with_coefficients(
        ns: &NodeScope,
        coefficients: &[(usize, usize, f64)],
    ) -> Result<PolyMim, ModelError> {
        if coefficients.is_empty() {
            return Err(ModelError::EmptyPolynomial("mim".to_string()));
        }
        let mut parms = Parameterization::new(ns, Some("mim"));
        let mut exponents = vec![];
        for &(dx, dy, value) in coefficients {
            parms.add_parm(&coeff_name(dx, dy), ParmSpec::new(value), &["mim"]);
            exponents.push((dx, dy));
        }
        Ok(PolyMim {
            parms,
            exponents,
            effective_altitude_km: DEFAULT_EFFECTIVE_ALTITUDE_KM,
            flat_earth: false,
        })
    }

    pub fn with_altitude_km(mut self, km: f64) -> PolyMim {
        self.effective_altitude_km = km;
        self
    }

    pub fn with_flat_earth(mut self) -> PolyMim {
        self.flat_earth = true;
        self
    }

    fn power(
        &self,
        at: &NodeFamily,
        name: &str,
        station: usize,
        base: NodeId,
        exponent: usize,
    ) -> Result<NodeId, ModelError> {
        if exponent == 1 {
            return Ok(base);
        }
        let exp = self
            .parms
            .scope()
            .constant(&format!("exp_{exponent}"), &[exponent as f64])?;
        Ok(at
            .sibling(&format!("{name}{exponent}"))
            .index(station)
            .get_or_insert(NodeOp::Pow, vec![base, exp])?)
    }
}

impl IonosphereModel for PolyMim {
    fn parms(&self) -> &Parameterization {
        &self.parms
    }

    fn effective_altitude_km(&self) -> f64 {
        self.effective_altitude_km
    }

    fn flat_earth(&self) -> bool {
        self.flat_earth
    }

    fn vertical_tec(
        &self,
        at: &NodeFamily,
        station: usize,
        npx: NodeId,
        npy: NodeId,
    ) -> Result<NodeId, ModelError> {
        let entry = at.index(station);
        if let Some(id) = entry.get() {
            return Ok(id);
        }
        let mut terms = vec![];
        for &(dx, dy) in &self.exponents {
            let coeff = self.parms.parm(&coeff_name(dx, dy))?;
            let mut factors = vec![coeff];
            if dx > 0 {
                factors.push(self.power(at, "npx_pow", station, npx, dx)?);
            }
            if dy > 0 {
                factors.push(self.power(at, "npy_pow", station, npy, dy)?);
            }
            let term = if factors.len() == 1 {
                coeff
            } else {
                at.sibling(&format!("vtec_term_{dx}{dy}"))
                    .index(station)
                    .get_or_insert(NodeOp::Multiply, factors)?
            };
            terms.push(term);
        }
        Ok(entry.insert(NodeOp::Add, terms)?)
    }
}

fn coeff_name(dx: usize, dy: usize) -> String {
    format!("c{dx}{dy}")
}

fn constant_op(v: f64) -> NodeOp {
    NodeOp::Constant(vec![crate::c64::new(v, 0.0)])
}

/// `height * component / n`, the east or north displacement of the pierce
/// point, common to all stations.
fn pierce_offset(
    ns: &NodeScope,
    name: &str,
    quals: &[Qualifier],
    height: NodeId,
    component: NodeId,
    n: NodeId,
) -> Result<NodeId, ModelError> {
    let entry = ns.entry(name).qmerge(quals);
    if let Some(id) = entry.get() {
        return Ok(id);
    }
    let ratio = ns
        .entry(&format!("{name}_over_n"))
        .qmerge(quals)
        .insert(NodeOp::Divide, vec![component, n])?;
    Ok(entry.insert(NodeOp::Multiply, vec![height, ratio])?)
}
