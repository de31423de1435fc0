// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors that can occur while building model trees.

use thiserror::Error;

use crate::graph::GraphError;

/// Errors from the domain-entity layer (directions, sources, Jones matrices,
/// ionospheric models). Graph-level problems are wrapped transparently.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Entity '{entity}' has no parameter named '{name}'")]
    UnknownParm { entity: String, name: String },

    #[error("Matrix family '{0}' has no matrices defined")]
    NoMatrix(String),

    #[error("Matrix families '{0}' and '{1}' have different index sets")]
    IndexMismatch(String, String),

    #[error("Tag '{tag}' matched no solvable parameters")]
    NoSolvableParms { tag: String },

    #[error("No matrix elements were selected")]
    NoMatrixElements,

    #[error("Polynomial ionospheric model '{0}' has no coefficients")]
    EmptyPolynomial(String),
}
