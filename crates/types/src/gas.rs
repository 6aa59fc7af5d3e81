// This file is part of Opgas.
//
// Opgas is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Opgas is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Opgas.
// If not, see https://www.gnu.org/licenses/.

use alloy_primitives::U256;
#[cfg(feature = "test-utils")]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::UserOperation;

/// Gas limits estimated for a user operation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    /// Verification gas limit
    pub verification_gas_limit: u64,
    /// Call gas limit
    pub call_gas_limit: u64,
    /// Pre-verification gas of the operation carrying the estimated limits
    pub pre_verification_gas: U256,
}

/// Static gas overhead model of a chain.
///
/// Estimation treats it as read-only.
#[cfg_attr(feature = "test-utils", automock)]
pub trait GasOverhead: Send + Sync {
    /// Pre-verification gas required by `op`
    fn calc_pre_verification_gas(&self, op: &UserOperation) -> anyhow::Result<U256>;

    /// Minimum call gas limit for an operation whose call transfers value
    fn non_zero_value_call(&self) -> U256;
}
