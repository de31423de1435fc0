// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Plain-number coordinate types.

These are the "static" counterparts of the symbolic nodes built elsewhere in
this crate: when every input to a derived quantity is a compile-time constant,
entity accessors fold the node down to a constant computed with the direct
formulas here. The reference evaluator uses the same formulas, so the folded
and dynamic paths agree by construction.
 */

#[cfg(test)]
mod tests;

/// A Right Ascension and Declination. All units are in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RADec {
    /// Right ascension \[radians\]
    pub ra: f64,
    /// Declination \[radians\]
    pub dec: f64,
}

impl RADec {
    pub fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }

    /// Get the (l,m,n) direction cosines of these coordinates relative to a
    /// phase centre.
    ///
    /// Derived using "Coordinate transformations" on page 388 of Synthesis
    /// Imaging in Radio Astronomy II.
    pub fn to_lmn(&self, phase_centre: RADec) -> Lmn {
        let d_ra = self.ra - phase_centre.ra;
        let (s_d_ra, c_d_ra) = d_ra.sin_cos();
        let (s_dec, c_dec) = self.dec.sin_cos();
        let (s_dec0, c_dec0) = phase_centre.dec.sin_cos();
        Lmn {
            l: c_dec * s_d_ra,
            m: s_dec * c_dec0 - c_dec * s_dec0 * c_d_ra,
            n: s_dec * s_dec0 + c_dec * c_dec0 * c_d_ra,
        }
    }

    /// The inverse of [`RADec::to_lmn`]: recover absolute coordinates from
    /// (l,m) offsets relative to a phase centre.
    pub fn from_lm(l: f64, m: f64, phase_centre: RADec) -> RADec {
        let n = (1.0 - l * l - m * m).sqrt();
        let (s_dec0, c_dec0) = phase_centre.dec.sin_cos();
        let dec = (m * c_dec0 + n * s_dec0).asin();
        let ra = phase_centre.ra + l.atan2(n * c_dec0 - m * s_dec0);
        RADec { ra, dec }
    }
}

/// The (l,m,n) direction-cosine coordinates of a point, relative to some
/// reference direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lmn {
    pub l: f64,
    pub m: f64,
    pub n: f64,
}

/// East, North and Height coordinates of a station, relative to the array
/// centre. All units are in metres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Enh {
    /// East \[metres\]
    pub e: f64,
    /// North \[metres\]
    pub n: f64,
    /// Height \[metres\]
    pub h: f64,
}

impl Enh {
    /// Convert ENH coordinates to local XYZ, given the array latitude.
    ///
    /// Taken from the third edition of Interferometry and Synthesis in Radio
    /// Astronomy, chapter 4: Geometrical Relationships, Polarimetry, and the
    /// Measurement Equation.
    pub fn to_xyz(&self, latitude_rad: f64) -> XyzPosition {
        let (s_lat, c_lat) = latitude_rad.sin_cos();
        XyzPosition {
            x: -self.n * s_lat + self.h * c_lat,
            y: self.e,
            z: self.n * c_lat + self.h * s_lat,
        }
    }
}

/// The local (x,y,z) coordinates of a station. Z points to the north
/// celestial pole, X through the local meridian at the equator, Y east. All
/// units are in metres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct XyzPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// The (u,v,w) coordinates of a station or baseline \[metres\].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UVW {
    pub u: f64,
    pub v: f64,
    pub w: f64,
}

impl UVW {
    /// Project local XYZ onto (u,v,w) for an hour angle and declination.
    ///
    /// This is Equation 4.1 of: Interferometry and Synthesis in Radio
    /// Astronomy, Third Edition, Section 4: Geometrical Relationships,
    /// Polarimetry, and the Measurement Equation.
    pub fn from_xyz(xyz: XyzPosition, ha: f64, dec: f64) -> UVW {
        let (s_ha, c_ha) = ha.sin_cos();
        let (s_dec, c_dec) = dec.sin_cos();
        UVW {
            u: s_ha * xyz.x + c_ha * xyz.y,
            v: -s_dec * c_ha * xyz.x + s_dec * s_ha * xyz.y + c_dec * xyz.z,
            w: c_dec * c_ha * xyz.x - c_dec * s_ha * xyz.y + s_dec * xyz.z,
        }
    }
}
