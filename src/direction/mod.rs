// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Sky directions.

A [`Direction`] is an absolute (ra,dec) position; a [`LmDirection`] is given
as (l,m) offsets from a reference direction. Every derived quantity (the
radec two-pack, LMN three-packs, per-station phase-shift operators) is a
memoized node: accessors key their nodes by the reference direction's
qualifiers, so the same question always returns the identical node and
different reference directions get distinct nodes.

A direction whose coordinates are compile-time constants is *static*: derived
quantities fold to constant nodes computed with the formulas in
[`crate::coord`]. This is purely a numeric optimization; the dynamic node
formula gives the same values.
 */


use std::cell::RefCell;
use std::collections::HashMap;

use log::trace;

use crate::context::Array;
use crate::coord::{Lmn, RADec};
use crate::error::ModelError;
use crate::graph::{NodeFamily, NodeId, NodeOp, NodeScope, Qualifier};
use crate::parm::{Parameterization, ParmValue};

/// An absolute direction on the sky, in (ra,dec) radians. An anonymous
/// direction (`name == None`) usually identifies the phase centre.
pub struct Direction {
    parms: Parameterization,
    static_radec: Option<RADec>,
    static_lmn: RefCell<HashMap<(u64, u64), Lmn>>,
}

impl Direction {
    /// Create a direction. With `assume_static`, constant `ra` and `dec`
    /// mark the direction as known at graph-construction time, enabling
    /// constant folding of derived quantities.
    pub fn new(
        ns: &NodeScope,
        name: Option<&str>,
        ra: impl Into<ParmValue>,
        dec: impl Into<ParmValue>,
        assume_static: bool,
    ) -> Direction {
        let mut parms = Parameterization::new(ns, name);
        parms.add_parm("ra", ra, &["direction", "solvable"]);
        parms.add_parm("dec", dec, &["direction", "solvable"]);
        let static_radec = if assume_static
            && parms.is_constant("ra")
            && parms.is_constant("dec")
        {
            match (parms.constant_value("ra"), parms.constant_value("dec")) {
                (Some(ra), Some(dec)) => Some(RADec::new(ra, dec)),
                _ => None,
            }
        } else {
            None
        };
        Direction {
            parms,
            static_radec,
            static_lmn: RefCell::new(HashMap::new()),
        }
    }

    pub fn scope(&self) -> &NodeScope {
        self.parms.scope()
    }

    /// The qualifiers added to nodes derived relative to this direction.
    pub fn qualifiers(&self) -> &[Qualifier] {
        self.parms.qualifiers()
    }

    /// True if `other` is this same direction object (e.g. a source sitting
    /// exactly at the phase centre).
    pub fn same_as(&self, other: &Direction) -> bool {
        self.parms.same_entity(&other.parms)
    }

    /// The (ra,dec) tuple, if this direction is static.
    pub fn radec_static(&self) -> Option<RADec> {
        self.static_radec
    }

    /// The ra-dec two-pack node for this direction.
    pub fn radec(&self) -> Result<NodeId, ModelError> {
        let entry = self.scope().entry("radec");
        if let Some(id) = entry.get() {
            return Ok(id);
        }
        let ra = self.parms.parm("ra")?;
        let dec = self.parms.parm("dec")?;
        Ok(entry.insert(NodeOp::Composer, vec![ra, dec])?)
    }

    /// The static LMN triple relative to `dir0`. Both directions must be
    /// static; results are cached per reference position.
    pub fn lmn_static(&self, dir0: &Direction) -> Option<Lmn> {
        let radec = self.static_radec?;
        let radec0 = dir0.static_radec?;
        let key = (radec0.ra.to_bits(), radec0.dec.to_bits());
        if let Some(lmn) = self.static_lmn.borrow().get(&key) {
            return Some(*lmn);
        }
        let lmn = radec.to_lmn(radec0);
        self.static_lmn.borrow_mut().insert(key, lmn);
        Some(lmn)
    }

    /// The LMN three-pack node for this direction relative to `dir0`.
    /// Qualifiers from `dir0` are merged in, so distinct reference
    /// directions yield distinct nodes. All other lmn-related accessors call
    /// this one.
    pub fn lmn(&self, dir0: &Direction) -> Result<NodeId, ModelError> {
        let entry = self.scope().entry("lmn").qmerge(dir0.qualifiers());
        if let Some(id) = entry.get() {
            return Ok(id);
        }
        let id = if self.same_as(dir0) {
            entry.insert(constant_op(&[0.0, 0.0, 1.0]), vec![])?
        } else if let Some(lmn) = self.lmn_static(dir0) {
            entry.insert(constant_op(&[lmn.l, lmn.m, lmn.n]), vec![])?
        } else {
            let radec0 = dir0.radec()?;
            let radec = self.radec()?;
            entry.insert(NodeOp::Lmn, vec![radec0, radec])?
        };
        Ok(id)
    }

    /// An LM two-pack node; arguments as per [`Direction::lmn`].
    pub fn lm(&self, dir0: &Direction) -> Result<NodeId, ModelError> {
        if let Some(lmn) = self.lmn_static(dir0) {
            let entry = self.scope().entry("lm").qmerge(dir0.qualifiers());
            return Ok(entry.get_or_insert(constant_op(&[lmn.l, lmn.m]), vec![])?);
        }
        self.lmn_component("lm", dir0, vec![0, 1])
    }

    /// An L node; arguments as per [`Direction::lmn`].
    pub fn l(&self, dir0: &Direction) -> Result<NodeId, ModelError> {
        self.lmn_component("l", dir0, vec![0])
    }

    /// An M node; arguments as per [`Direction::lmn`].
    pub fn m(&self, dir0: &Direction) -> Result<NodeId, ModelError> {
        self.lmn_component("m", dir0, vec![1])
    }

    /// An N node; arguments as per [`Direction::lmn`].
    pub fn n(&self, dir0: &Direction) -> Result<NodeId, ModelError> {
        self.lmn_component("n", dir0, vec![2])
    }

    /// An (l, m, n-1) three-pack node, the form needed by phase shifts.
    pub fn lmn_1(&self, dir0: &Direction) -> Result<NodeId, ModelError> {
        let entry = self.scope().entry("lmn_minus1").qmerge(dir0.qualifiers());
        if let Some(id) = entry.get() {
            return Ok(id);
        }
        let id = if let Some(lmn) = self.lmn_static(dir0) {
            entry.insert(constant_op(&[lmn.l, lmn.m, lmn.n - 1.0]), vec![])?
        } else {
            let lmn = self.lmn(dir0)?;
            let n = self.n(dir0)?;
            let one = self.scope().constant("one", &[1.0])?;
            let n_1 = self
                .scope()
                .entry("n_minus1")
                .qmerge(dir0.qualifiers())
                .insert(NodeOp::Subtract, vec![n, one])?;
            entry.insert(NodeOp::Paster(2), vec![lmn, n_1])?
        };
        Ok(id)
    }

    /// The K-Jones (phase shift) family for this direction: one node per
    /// station, relative to the reference direction `dir0`. When this
    /// direction *is* the reference, K is unity for every station.
    pub fn k_jones(&self, array: &Array, dir0: &Direction) -> Result<NodeFamily, ModelError> {
        let kj = self.scope().family("K").qmerge(dir0.qualifiers());
        if self.same_as(dir0) {
            for station in array.stations() {
                kj.index(station.index)
                    .get_or_insert(constant_op(&[1.0]), vec![])?;
            }
            return Ok(kj);
        }
        let first = array.stations()[0].index;
        if kj.index(first).get().is_none() {
            trace!(
                "building K-Jones for {:?} towards {:?}",
                self.parms.name(),
                dir0.parms.name()
            );
            let lmn_1 = self.lmn_1(dir0)?;
            let uvw = array.uvw(dir0)?;
            for station in array.stations() {
                kj.index(station.index)
                    .insert(NodeOp::VisPhaseShift, vec![lmn_1, uvw.node(station.index)?])?;
            }
        }
        Ok(kj)
    }

    /// Phase-shift per-baseline visibilities `vis0(p,q)` from `dir0` to this
    /// direction, creating `vis(p,q)`. An identity transform when the
    /// direction is the reference itself.
    pub fn make_phase_shift(
        &self,
        vis: &NodeFamily,
        vis0: impl Fn(usize, usize) -> NodeId,
        array: &Array,
        dir0: &Direction,
    ) -> Result<(), ModelError> {
        if self.same_as(dir0) {
            for (p, q) in array.ifrs() {
                vis.index_pair(p, q)
                    .get_or_insert(NodeOp::Identity, vec![vis0(p, q)])?;
            }
            return Ok(());
        }
        let kj = self.k_jones(array, dir0)?;
        crate::jones::apply_corruption(vis, vis0, &kj, &array.ifrs())
    }
}

/// A direction specified as (l,m) offsets from a reference direction `dir0`.
pub struct LmDirection {
    inner: Direction,
    static_lm: Option<(f64, f64)>,
}

impl LmDirection {
    pub fn new(
        ns: &NodeScope,
        name: Option<&str>,
        l: impl Into<ParmValue>,
        m: impl Into<ParmValue>,
        assume_static: bool,
    ) -> LmDirection {
        let mut parms = Parameterization::new(ns, name);
        parms.add_parm("l", l, &["direction"]);
        parms.add_parm("m", m, &["direction"]);
        let static_lm = if assume_static && parms.is_constant("l") && parms.is_constant("m") {
            match (parms.constant_value("l"), parms.constant_value("m")) {
                (Some(l), Some(m)) => Some((l, m)),
                _ => None,
            }
        } else {
            None
        };
        LmDirection {
            inner: Direction {
                parms,
                static_radec: None,
                static_lmn: RefCell::new(HashMap::new()),
            },
            static_lm,
        }
    }

    pub fn scope(&self) -> &NodeScope {
        self.inner.scope()
    }

    pub fn qualifiers(&self) -> &[Qualifier] {
        self.inner.qualifiers()
    }

    /// The static (l, m, n) triple, if the offsets are constants.
    pub fn lmn_static(&self) -> Option<Lmn> {
        let (l, m) = self.static_lm?;
        Some(Lmn {
            l,
            m,
            n: (1.0 - l * l - m * m).sqrt(),
        })
    }

    /// The absolute ra-dec two-pack, derived from the reference direction.
    pub fn radec(&self, dir0: &Direction) -> Result<NodeId, ModelError> {
        let entry = self.scope().entry("radec").qmerge(dir0.qualifiers());
        if let Some(id) = entry.get() {
            return Ok(id);
        }
        let radec0 = dir0.radec()?;
        let lm = self.lm()?;
        Ok(entry.insert(NodeOp::LmRaDec, vec![radec0, lm])?)
    }

    /// The LM two-pack of this direction (relative to its own reference).
    pub fn lm(&self) -> Result<NodeId, ModelError> {
        let entry = self.scope().entry("lm");
        if let Some(id) = entry.get() {
            return Ok(id);
        }
        let l = self.inner.parms.parm("l")?;
        let m = self.inner.parms.parm("m")?;
        Ok(entry.insert(NodeOp::Composer, vec![l, m])?)
    }

    /// The LMN three-pack. Folds to a constant when the offsets are static;
    /// otherwise n is derived as sqrt(1 - l^2 - m^2).
    pub fn lmn(&self) -> Result<NodeId, ModelError> {
        let entry = self.scope().entry("lmn");
        if let Some(id) = entry.get() {
            return Ok(id);
        }
        let id = if let Some(lmn) = self.lmn_static() {
            entry.insert(constant_op(&[lmn.l, lmn.m, lmn.n]), vec![])?
        } else {
            let l = self.inner.parms.parm("l")?;
            let m = self.inner.parms.parm("m")?;
            let one = self.scope().constant("one", &[1.0])?;
            let l2 = self.scope().entry("l_sqr").insert(NodeOp::Sqr, vec![l])?;
            let m2 = self.scope().entry("m_sqr").insert(NodeOp::Sqr, vec![m])?;
            let diff = self
                .scope()
                .entry("one_minus_lm_sqr")
                .insert(NodeOp::Subtract, vec![one, l2, m2])?;
            let n = self.scope().entry("n").insert(NodeOp::Sqrt, vec![diff])?;
            entry.insert(NodeOp::Composer, vec![l, m, n])?
        };
        Ok(id)
    }
}

fn constant_op(values: &[f64]) -> NodeOp {
    NodeOp::Constant(values.iter().map(|&v| crate::c64::new(v, 0.0)).collect())
}

impl Direction {
    fn lmn_component(
        &self,
        name: &str,
        dir0: &Direction,
        indices: Vec<usize>,
    ) -> Result<NodeId, ModelError> {
        // All distinguishing qualifiers are already in the lmn node's key;
        // the component reuses them.
        let entry = self.scope().entry(name).qmerge(dir0.qualifiers());
        if let Some(id) = entry.get() {
            return Ok(id);
        }
        let lmn = self.lmn(dir0)?;
        Ok(entry.insert(NodeOp::Selector(indices), vec![lmn])?)
    }
}
