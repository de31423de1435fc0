// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with node-graph bookkeeping.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Node '{0}' is already defined; nodes are never redefined")]
    AlreadyDefined(String),

    #[error("Node '{0}' has not been built yet")]
    Undefined(String),
}
