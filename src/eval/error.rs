// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with the reference evaluator.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("The reference evaluator does not support '{0}' nodes")]
    Unsupported(String),

    #[error("'{op}' expected {expected} children, got {got}")]
    ChildMismatch {
        op: String,
        expected: usize,
        got: usize,
    },

    #[error("'{op}' expected a {expected}-plane operand, got {got} planes")]
    PlaneMismatch {
        op: String,
        expected: usize,
        got: usize,
    },

    #[error("Index {index} is out of range for a {num_planes}-element result")]
    SelectorOutOfRange { index: usize, num_planes: usize },

    #[error("'{0}' requires at least one child")]
    NoChildren(String),
}
