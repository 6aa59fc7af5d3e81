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

use alloy_primitives::{Bytes, U256};
use opgas_contracts::v0_6::IEntryPoint::{
    ExecutionResult as ExecutionResultV0_6, ValidationResult as ValidationResultV0_6,
    ValidationResultWithAggregation as ValidationResultWithAggregationV0_6,
};
use opgas_contracts::v0_6::ReturnInfo as ReturnInfoV0_6;

/// Successful outcome of `simulateHandleOp`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Gas used before the call phase, including pre-verification gas
    pub pre_op_gas: U256,
    /// Total amount paid for the operation
    pub paid: U256,
    /// Start of the validity window
    pub valid_after: u64,
    /// End of the validity window
    pub valid_until: u64,
    /// Whether the target call succeeded
    pub target_success: bool,
    /// Return data of the target call
    pub target_result: Bytes,
}

impl From<ExecutionResultV0_6> for ExecutionResult {
    fn from(value: ExecutionResultV0_6) -> Self {
        Self {
            pre_op_gas: value.preOpGas,
            paid: value.paid,
            valid_after: value.validAfter.to::<u64>(),
            valid_until: value.validUntil.to::<u64>(),
            target_success: value.targetSuccess,
            target_result: value.targetResult,
        }
    }
}

/// Successful outcome of `simulateValidation`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationOutput {
    /// Gas used by validation, including pre-verification gas
    pub pre_op_gas: U256,
    /// Prefund required by the operation
    pub prefund: U256,
    /// Whether the signature check failed
    pub sig_failed: bool,
    /// Start of the validity window
    pub valid_after: u64,
    /// End of the validity window
    pub valid_until: u64,
}

impl From<ReturnInfoV0_6> for ValidationOutput {
    fn from(value: ReturnInfoV0_6) -> Self {
        Self {
            pre_op_gas: value.preOpGas,
            prefund: value.prefund,
            sig_failed: value.sigFailed,
            valid_after: value.validAfter.to::<u64>(),
            valid_until: value.validUntil.to::<u64>(),
        }
    }
}

impl From<ValidationResultV0_6> for ValidationOutput {
    fn from(value: ValidationResultV0_6) -> Self {
        value.returnInfo.into()
    }
}

impl From<ValidationResultWithAggregationV0_6> for ValidationOutput {
    fn from(value: ValidationResultWithAggregationV0_6) -> Self {
        value.returnInfo.into()
    }
}
