// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Point sources and their coherencies.

A [`PointSource`] couples a [`Direction`] with a [`FluxModel`] (Stokes
fluxes, optional power-law spectrum, optional rotation measure) and derives
the 2x2 coherency matrix, its Cholesky ("sqrt") factor, and phase-shifted
per-baseline visibilities.

Every derived node is memoized. When the flux is fully constant the
coherency and its factor fold to constant nodes; dynamic and folded forms
are numerically identical.
 */


use std::f64::consts::FRAC_1_SQRT_2;

use log::trace;
use strum_macros::{Display, EnumIter, EnumString};

use crate::c64;
use crate::constants::{DEFAULT_SPECTRUM_REF_FREQ_HZ, VEL_C};
use crate::context::{Array, Observation, PolarizationBasis};
use crate::direction::Direction;
use crate::error::ModelError;
use crate::graph::{NodeFamily, NodeId, NodeOp, NodeScope};
use crate::parm::{Parameterization, ParmValue};

/// A Stokes parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
pub enum Stokes {
    I,
    Q,
    U,
    V,
}

/// The flux description of a source: Stokes parameters, an optional
/// power-law spectral index with its reference frequency, and an optional
/// rotation measure.
pub struct FluxModel {
    pub i: ParmValue,
    pub q: ParmValue,
    pub u: ParmValue,
    pub v: ParmValue,
    pub spi: Option<ParmValue>,
    pub freq0_hz: Option<f64>,
    pub rm: Option<ParmValue>,
}

impl FluxModel {
    /// An unpolarized, flat-spectrum flux of Stokes I.
    pub fn new(i: impl Into<ParmValue>) -> FluxModel {
        FluxModel {
            i: i.into(),
            q: ParmValue::Const(0.0),
            u: ParmValue::Const(0.0),
            v: ParmValue::Const(0.0),
            spi: None,
            freq0_hz: None,
            rm: None,
        }
    }

    pub fn q(mut self, q: impl Into<ParmValue>) -> FluxModel {
        self.q = q.into();
        self
    }

    pub fn u(mut self, u: impl Into<ParmValue>) -> FluxModel {
        self.u = u.into();
        self
    }

    pub fn v(mut self, v: impl Into<ParmValue>) -> FluxModel {
        self.v = v.into();
        self
    }

    /// A power-law spectrum `(nu/nu0)^spi`. Without a reference frequency
    /// [`crate::constants::DEFAULT_SPECTRUM_REF_FREQ_HZ`] is used.
    pub fn spectral_index(mut self, spi: impl Into<ParmValue>, freq0_hz: Option<f64>) -> FluxModel {
        self.spi = Some(spi.into());
        self.freq0_hz = freq0_hz;
        self
    }

    /// Faraday rotation of the linear polarization by `rm * lambda^2`.
    pub fn rotation_measure(mut self, rm: impl Into<ParmValue>) -> FluxModel {
        self.rm = Some(rm.into());
        self
    }
}

/// A Stokes flux as seen through the graph: a plain number when the flux is
/// constant and frequency-independent, otherwise a node.
#[derive(Clone, Copy, Debug)]
pub enum FluxTerm {
    Constant(f64),
    Node(NodeId),
}

/// The four coherency-matrix elements, row-major, before scaling and
/// assembly. Folding is all-or-nothing: a fully-constant, unrotated flux
/// folds every element, anything else folds none.
#[derive(Clone, Copy, Debug)]
pub enum CoherencyElements {
    Constant([c64; 4]),
    Nodes([NodeId; 4]),
}

/// A point source: a direction plus a flux model.
pub struct PointSource {
    parms: Parameterization,
    direction: Direction,
    polarized: bool,
    has_spectrum: bool,
    has_rm: bool,
    constant_flux: bool,
}

impl PointSource {
    pub fn new(ns: &NodeScope, name: &str, direction: Direction, flux: FluxModel) -> PointSource {
        let polarized = !(is_const_zero(&flux.q) && is_const_zero(&flux.u) && is_const_zero(&flux.v))
            || flux.rm.is_some();
        let has_spectrum = flux.spi.is_some();
        let has_rm = flux.rm.is_some();
        let constant_flux = matches!(flux.i, ParmValue::Const(_))
            && matches!(flux.q, ParmValue::Const(_))
            && matches!(flux.u, ParmValue::Const(_))
            && matches!(flux.v, ParmValue::Const(_));

        let mut parms = Parameterization::new(ns, Some(name));
        parms.add_parm("I", flux.i, &["flux"]);
        parms.add_parm("Q", flux.q, &["flux"]);
        parms.add_parm("U", flux.u, &["flux"]);
        parms.add_parm("V", flux.v, &["flux"]);
        if let Some(spi) = flux.spi {
            parms.add_parm("spi", spi, &["spectrum"]);
            parms.add_parm(
                "spi_fq0",
                flux.freq0_hz.unwrap_or(DEFAULT_SPECTRUM_REF_FREQ_HZ),
                &[],
            );
        }
        if let Some(rm) = flux.rm {
            parms.add_parm("RM", rm, &["pol"]);
        }
        PointSource {
            parms,
            direction,
            polarized,
            has_spectrum,
            has_rm,
            constant_flux,
        }
    }

    pub fn name(&self) -> &str {
        // A point source is always named.
        self.parms.name().unwrap_or_default()
    }

    pub fn direction(&self) -> &Direction {
        &self.direction
    }

    pub fn is_polarized(&self) -> bool {
        self.polarized
    }

    fn scope(&self) -> &NodeScope {
        self.parms.scope()
    }

    /// A Stokes flux. Constant, frequency-independent fluxes stay plain
    /// numbers; Q and U of a rotated source become nodes applying the
    /// Faraday angle `RM * lambda^2`.
    pub fn stokes(&self, st: Stokes) -> Result<FluxTerm, ModelError> {
        if self.has_rm && matches!(st, Stokes::Q | Stokes::U) {
            return Ok(FluxTerm::Node(self.rotated_qu(st)?));
        }
        let name = st.to_string();
        match self.parms.constant_value(&name) {
            Some(v) => Ok(FluxTerm::Constant(v)),
            None => Ok(FluxTerm::Node(self.parms.parm(&name)?)),
        }
    }

    /// Faraday-rotated Q or U: `Qr = Q cos(farot) - U sin(farot)`,
    /// `Ur = Q sin(farot) + U cos(farot)`.
    fn rotated_qu(&self, st: Stokes) -> Result<NodeId, ModelError> {
        let name = match st {
            Stokes::Q => "Qr",
            _ => "Ur",
        };
        let entry = self.scope().entry(name);
        if let Some(id) = entry.get() {
            return Ok(id);
        }
        let farot = self.faraday_angle()?;
        let cos = self
            .scope()
            .entry("farot_cos")
            .get_or_insert(NodeOp::Cos, vec![farot])?;
        let sin = self
            .scope()
            .entry("farot_sin")
            .get_or_insert(NodeOp::Sin, vec![farot])?;
        let q = self.parms.parm("Q")?;
        let u = self.parms.parm("U")?;
        let id = match st {
            Stokes::Q => {
                let qc = self
                    .scope()
                    .entry("q_cos")
                    .insert(NodeOp::Multiply, vec![q, cos])?;
                let us = self
                    .scope()
                    .entry("u_sin")
                    .insert(NodeOp::Multiply, vec![u, sin])?;
                entry.insert(NodeOp::Subtract, vec![qc, us])?
            }
            _ => {
                let qs = self
                    .scope()
                    .entry("q_sin")
                    .insert(NodeOp::Multiply, vec![q, sin])?;
                let uc = self
                    .scope()
                    .entry("u_cos")
                    .insert(NodeOp::Multiply, vec![u, cos])?;
                entry.insert(NodeOp::Add, vec![qs, uc])?
            }
        };
        Ok(id)
    }

    /// The Faraday rotation angle `RM * lambda^2`. The `lambda^2` node is
    /// shared at graph root, the angle lives in the source's scope.
    fn faraday_angle(&self) -> Result<NodeId, ModelError> {
        let entry = self.scope().entry("farot");
        if let Some(id) = entry.get() {
            return Ok(id);
        }
        let root = self.scope().graph().scope();
        let freq = root.entry("freq").get_or_insert(NodeOp::Freq, vec![])?;
        let c = root.constant("c", &[VEL_C])?;
        let lambda = root
            .entry("lambda")
            .get_or_insert(NodeOp::Divide, vec![c, freq])?;
        let lambda_sq = root
            .entry("lambda_sq")
            .get_or_insert(NodeOp::Sqr, vec![lambda])?;
        let rm = self.parms.parm("RM")?;
        Ok(entry.insert(NodeOp::Multiply, vec![rm, lambda_sq])?)
    }

    /// The power-law spectrum `(nu/nu0)^spi`, normalized to 1 at the
    /// reference frequency. `None` for flat-spectrum sources.
    pub fn norm_spectrum(&self) -> Result<Option<NodeId>, ModelError> {
        if !self.has_spectrum {
            return Ok(None);
        }
        let entry = self.scope().entry("spectrum");
        if let Some(id) = entry.get() {
            return Ok(Some(id));
        }
        let root = self.scope().graph().scope();
        let freq = root.entry("freq").get_or_insert(NodeOp::Freq, vec![])?;
        let fq0 = self.parms.parm("spi_fq0")?;
        let ratio = self
            .scope()
            .entry("freq_ratio")
            .insert(NodeOp::Divide, vec![freq, fq0])?;
        let spi = self.parms.parm("spi")?;
        Ok(Some(entry.insert(NodeOp::Pow, vec![ratio, spi])?))
    }

    /// The four coherency-matrix elements (without the global factor 1/2),
    /// in the observation's polarization basis. Fully-constant fluxes fold
    /// to complex constants.
    pub fn coherency_elements(
        &self,
        obs: &Observation,
    ) -> Result<CoherencyElements, ModelError> {
        // In the circular basis V plays Q's role, Q plays U's and U plays
        // V's; the matrix has the same shape.
        let (a, b, c) = match obs.basis() {
            PolarizationBasis::Linear => (Stokes::Q, Stokes::U, Stokes::V),
            PolarizationBasis::Circular => (Stokes::V, Stokes::Q, Stokes::U),
        };
        if self.constant_flux && !self.has_rm {
            let i = self.constant_stokes(Stokes::I);
            let (q, u, v) = (
                self.constant_stokes(a),
                self.constant_stokes(b),
                self.constant_stokes(c),
            );
            return Ok(CoherencyElements::Constant([
                c64::new(i + q, 0.0),
                c64::new(u, v),
                c64::new(u, -v),
                c64::new(i - q, 0.0),
            ]));
        }
        let i = self.stokes_node(Stokes::I)?;
        let q = self.stokes_node(a)?;
        let u = self.stokes_node(b)?;
        let v = self.stokes_node(c)?;
        let e11 = self
            .scope()
            .entry("coh_e11")
            .get_or_insert(NodeOp::Add, vec![i, q])?;
        let e12 = self
            .scope()
            .entry("coh_e12")
            .get_or_insert(NodeOp::ToComplex, vec![u, v])?;
        let e21 = self
            .scope()
            .entry("coh_e21")
            .get_or_insert(NodeOp::Conj, vec![e12])?;
        let e22 = self
            .scope()
            .entry("coh_e22")
            .get_or_insert(NodeOp::Subtract, vec![i, q])?;
        Ok(CoherencyElements::Nodes([e11, e12, e21, e22]))
    }

    /// The source coherency: `0.5 * [[I+Q, U+iV], [U-iV, I-Q]]` (linear
    /// basis), times the spectrum if there is one. Unpolarized sources
    /// collapse to the scalar `I/2`. Memoized.
    pub fn coherency(&self, obs: &Observation) -> Result<NodeId, ModelError> {
        let entry = self.scope().entry("coherency");
        if let Some(id) = entry.get() {
            return Ok(id);
        }
        trace!("building coherency for '{}'", self.name());
        let spectrum = self.norm_spectrum()?;

        if !self.polarized {
            // Scalar I/2.
            if let (Some(i), None) = (self.parms.constant_value("I"), spectrum) {
                return Ok(entry.insert(constant_scalar(i * 0.5), vec![])?);
            }
            let i = self.parms.parm("I")?;
            let half = self.scope().constant("half", &[0.5])?;
            let mut children = vec![i, half];
            children.extend(spectrum);
            return Ok(entry.insert(NodeOp::Multiply, children)?);
        }

        match self.coherency_elements(obs)? {
            CoherencyElements::Constant(elements) => {
                let folded = elements.iter().map(|&e| e * 0.5).collect();
                if let Some(spectrum) = spectrum {
                    let base = self
                        .scope()
                        .entry("coherency_flat")
                        .insert(NodeOp::Constant(folded), vec![])?;
                    return Ok(entry.insert(NodeOp::Multiply, vec![base, spectrum])?);
                }
                Ok(entry.insert(NodeOp::Constant(folded), vec![])?)
            }
            CoherencyElements::Nodes(elements) => {
                let matrix = self
                    .scope()
                    .entry("coherency_unscaled")
                    .insert(NodeOp::Matrix22, elements.to_vec())?;
                let half = self.scope().constant("half", &[0.5])?;
                let mut children = vec![matrix, half];
                children.extend(spectrum);
                Ok(entry.insert(NodeOp::Multiply, children)?)
            }
        }
    }

    /// The lower-triangular Cholesky factor `L` of the coherency, so that
    /// `L L^H` is the coherency matrix. Zero-flux sources fold to a zero
    /// factor. Memoized.
    pub fn sqrt_coherency(&self, obs: &Observation) -> Result<NodeId, ModelError> {
        let entry = self.scope().entry("sqrt_coh");
        if let Some(id) = entry.get() {
            return Ok(id);
        }
        let sqrt_spectrum = match self.norm_spectrum()? {
            Some(spectrum) => Some(
                self.scope()
                    .entry("sqrt_spectrum")
                    .get_or_insert(NodeOp::Sqrt, vec![spectrum])?,
            ),
            None => None,
        };

        if !self.polarized {
            if let (Some(i), None) = (self.parms.constant_value("I"), sqrt_spectrum) {
                return Ok(entry.insert(constant_scalar((i * 0.5).sqrt()), vec![])?);
            }
            let i = self.parms.parm("I")?;
            let half = self.scope().constant("half", &[0.5])?;
            let i_half = self
                .scope()
                .entry("i_half")
                .insert(NodeOp::Multiply, vec![i, half])?;
            let sqrt = self
                .scope()
                .entry("sqrt_i_half")
                .insert(NodeOp::Sqrt, vec![i_half])?;
            let mut children = vec![sqrt];
            children.extend(sqrt_spectrum);
            return Ok(entry.insert(NodeOp::Multiply, children)?);
        }

        let elements = match self.coherency_elements(obs)? {
            CoherencyElements::Constant([e11, e12, _, e22]) => {
                let folded = cholesky_static(e11.re, e12, e22.re);
                if let Some(sqrt_spectrum) = sqrt_spectrum {
                    let base = self
                        .scope()
                        .entry("sqrt_coh_flat")
                        .insert(NodeOp::Constant(folded), vec![])?;
                    return Ok(entry.insert(NodeOp::Multiply, vec![base, sqrt_spectrum])?);
                }
                return Ok(entry.insert(NodeOp::Constant(folded), vec![])?);
            }
            CoherencyElements::Nodes(elements) => elements,
        };

        // Dynamic Cholesky: l11 = sqrt(e11), l21 = e21/l11,
        // l22 = sqrt(e22 - |e12|^2/e11), all scaled by 1/sqrt(2).
        let [e11, e12, e21, e22] = elements;
        let ns = self.scope();
        let l11 = ns.entry("sqc_l11").insert(NodeOp::Sqrt, vec![e11])?;
        let l21 = ns.entry("sqc_l21").insert(NodeOp::Divide, vec![e21, l11])?;
        let b_sq = ns
            .entry("sqc_bsq")
            .insert(NodeOp::Multiply, vec![e12, e21])?;
        let defect = ns
            .entry("sqc_defect")
            .insert(NodeOp::Divide, vec![b_sq, e11])?;
        let l22_sq = ns
            .entry("sqc_l22_sq")
            .insert(NodeOp::Subtract, vec![e22, defect])?;
        let l22 = ns.entry("sqc_l22").insert(NodeOp::Sqrt, vec![l22_sq])?;
        let zero = ns.constant("zero", &[0.0])?;
        let matrix = ns
            .entry("sqrt_coh_unscaled")
            .insert(NodeOp::Matrix22, vec![l11, zero, l21, l22])?;
        let scale = ns.constant("inv_sqrt2", &[FRAC_1_SQRT_2])?;
        let mut children = vec![matrix, scale];
        children.extend(sqrt_spectrum);
        Ok(entry.insert(NodeOp::Multiply, children)?)
    }

    /// Build per-baseline visibilities `vis(p,q)`: the coherency phase-
    /// shifted from the phase centre to this source's direction.
    pub fn visibilities(
        &self,
        vis: &NodeFamily,
        array: &Array,
        obs: &Observation,
    ) -> Result<(), ModelError> {
        let coherency = self.coherency(obs)?;
        self.direction
            .make_phase_shift(vis, |_, _| coherency, array, obs.phase_centre())
    }

    /// The station-decomposed visibilities: `sv(p) = K(p) · L`, so that
    /// `sv(p) · sv(q)^H` is the baseline visibility. Memoized.
    pub fn sqrt_visibilities(
        &self,
        array: &Array,
        obs: &Observation,
    ) -> Result<NodeFamily, ModelError> {
        let dir0 = obs.phase_centre();
        let sv = self.scope().family("sqrt_vis").qmerge(dir0.qualifiers());
        let first = array.stations()[0].index;
        if sv.index(first).get().is_none() {
            let sqrt_coh = self.sqrt_coherency(obs)?;
            let kj = self.direction.k_jones(array, dir0)?;
            for station in array.stations() {
                sv.index(station.index).insert(
                    NodeOp::MatrixMultiply,
                    vec![kj.node(station.index)?, sqrt_coh],
                )?;
            }
        }
        Ok(sv)
    }

    fn constant_stokes(&self, st: Stokes) -> f64 {
        self.parms.constant_value(&st.to_string()).unwrap_or(0.0)
    }

    fn stokes_node(&self, st: Stokes) -> Result<NodeId, ModelError> {
        match self.stokes(st)? {
            FluxTerm::Node(id) => Ok(id),
            FluxTerm::Constant(_) => Ok(self.parms.parm(&st.to_string())?),
        }
    }

}

fn is_const_zero(v: &ParmValue) -> bool {
    matches!(v, ParmValue::Const(c) if *c == 0.0)
}

fn constant_scalar(v: f64) -> NodeOp {
    NodeOp::Constant(vec![c64::new(v, 0.0)])
}

/// The Cholesky factor of `0.5 * [[a, b], [conj(b), d]]`, with a guard for
/// sources whose leading flux vanishes.
fn cholesky_static(a: f64, b: c64, d: f64) -> Vec<c64> {
    let zero = c64::new(0.0, 0.0);
    if a <= 0.0 {
        // A positive-semidefinite coherency with a zero leading element has
        // a zero first column.
        let l22 = c64::new((d.max(0.0) * 0.5).sqrt(), 0.0);
        return vec![zero, zero, zero, l22];
    }
    let l11 = a.sqrt();
    let l21 = b.conj() / l11;
    let l22 = (d - b.norm_sqr() / a).max(0.0).sqrt();
    vec![
        c64::new(l11 * FRAC_1_SQRT_2, 0.0),
        zero,
        l21 * FRAC_1_SQRT_2,
        c64::new(l22 * FRAC_1_SQRT_2, 0.0),
    ]
}
