// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
The observational context: the station array and global observation settings.

An [`Array`] owns the station layout and builds the per-station UVW node
families that phase shifts hang off. An [`Observation`] bundles the phase
centre with the polarization convention of the instrument.
 */


use itertools::Itertools;
use log::debug;
use vec1::Vec1;

use crate::coord::Enh;
use crate::direction::Direction;
use crate::error::ModelError;
use crate::graph::{NodeFamily, NodeOp, NodeScope};

/// A single station (antenna) of the array.
#[derive(Clone, Debug)]
pub struct Station {
    /// The station's index, used as a node qualifier.
    pub index: usize,
    pub name: String,
    /// Local east-north-height position relative to the array centre.
    pub enh: Enh,
}

impl Station {
    pub fn new(index: usize, name: impl Into<String>, enh: Enh) -> Station {
        Station {
            index,
            name: name.into(),
            enh,
        }
    }
}

/// The interferometer array: stations plus the latitude needed to rotate
/// local positions into the equatorial frame.
pub struct Array {
    scope: NodeScope,
    latitude_rad: f64,
    stations: Vec1<Station>,
}

impl Array {
    pub fn new(ns: &NodeScope, latitude_rad: f64, stations: Vec1<Station>) -> Array {
        Array {
            scope: ns.clone(),
            latitude_rad,
            stations,
        }
    }

    pub fn latitude_rad(&self) -> f64 {
        self.latitude_rad
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn num_stations(&self) -> usize {
        self.stations.len()
    }

    /// All interferometer pairs (p,q) with p < q, in station order.
    pub fn ifrs(&self) -> Vec<(usize, usize)> {
        self.stations
            .iter()
            .map(|s| s.index)
            .tuple_combinations()
            .collect()
    }

    /// The per-station UVW node family towards the phase centre `dir0`,
    /// built on first call.
    pub fn uvw(&self, dir0: &Direction) -> Result<NodeFamily, ModelError> {
        let uvw = self.scope.family("uvw").qmerge(dir0.qualifiers());
        let first = self.stations.first().index;
        if uvw.index(first).get().is_none() {
            debug!("building UVW nodes for {} stations", self.stations.len());
            let radec0 = dir0.radec()?;
            for station in &self.stations {
                let xyz = station.enh.to_xyz(self.latitude_rad);
                uvw.index(station.index)
                    .insert(NodeOp::Uvw(xyz), vec![radec0])?;
            }
        }
        Ok(uvw)
    }
}

/// The polarization convention the coherency matrices are expressed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolarizationBasis {
    /// Linear feeds: XX, XY, YX, YY.
    Linear,
    /// Circular feeds: RR, RL, LR, LL.
    Circular,
}

/// Global observation settings: the phase centre and the polarization basis.
pub struct Observation {
    phase_centre: Direction,
    basis: PolarizationBasis,
}

impl Observation {
    /// An observation with a linear polarization basis.
    pub fn new(phase_centre: Direction) -> Observation {
        Observation {
            phase_centre,
            basis: PolarizationBasis::Linear,
        }
    }

    /// Switch to a circular polarization basis.
    pub fn circular(mut self) -> Observation {
        self.basis = PolarizationBasis::Circular;
        self
    }

    pub fn phase_centre(&self) -> &Direction {
        &self.phase_centre
    }

    pub fn basis(&self) -> PolarizationBasis {
        self.basis
    }
}
