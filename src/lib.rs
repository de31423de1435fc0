// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Lazily-built symbolic measurement-equation trees for radio interferometry.

Sky directions, point sources, Jones matrices and ionospheric models are
"parameterized entities": each one owns a qualifier sub-namespace of a shared
node graph, and each accessor either returns the node previously built for its
exact qualifier key, or builds it once and records it. Repeated calls with
equal qualifiers always return the identical [`graph::NodeId`], so composed
trees never contain duplicate subgraphs.

A small reference evaluator ([`eval`]) can evaluate constructed trees over a
(time, frequency) cell grid; it exists to make numeric properties of the
builders testable and is deliberately scalar and unoptimized.
 */

pub mod constants;
pub mod context;
pub mod coord;
pub mod direction;
pub mod error;
pub mod eval;
pub mod graph;
pub mod ionosphere;
pub mod jones;
pub mod parm;
pub mod source;

// Re-exports.
pub use constants::*;
pub use context::{Array, Observation, PolarizationBasis, Station};
pub use coord::{Enh, Lmn, RADec, XyzPosition, UVW};
pub use direction::{Direction, LmDirection};
pub use error::ModelError;
pub use graph::{NodeFamily, NodeGraph, NodeId, NodeOp, NodeScope, Qualifier};
pub use ionosphere::{IonosphereModel, PolyMim};
pub use jones::Matrix22;
pub use parm::{Parameterization, ParmValue};
pub use source::{FluxModel, PointSource, Stokes};

use num_complex::Complex;

/// A double-precision complex number.
#[allow(non_camel_case_types)]
pub type c64 = Complex<f64>;
