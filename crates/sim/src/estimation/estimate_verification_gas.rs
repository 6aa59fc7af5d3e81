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

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use anyhow::Context;
use opgas_types::UserOperation;
use opgas_utils::math;
use tracing::instrument;

use super::{gas_to_u64, GasEstimationError};
use crate::simulation::{ErrorCategory, HandleOpSimulator, SimulationError};

/// Binary search for the verification gas limit over traced simulations.
///
/// The call gas limit is pinned to zero, so a simulation that fails with
/// `execution OOG` has completed validation and reports its exact cost.
#[derive(Debug)]
pub struct VerificationGasEstimatorImpl<S> {
    simulator: Arc<S>,
}

impl<S> VerificationGasEstimatorImpl<S>
where
    S: HandleOpSimulator,
{
    /// Create a new instance
    pub fn new(simulator: Arc<S>) -> Self {
        Self { simulator }
    }

    /// Returns the verification gas limit of `op`, searching up to
    /// `max_gas_limit`
    #[instrument(skip_all)]
    pub async fn estimate_verification_gas(
        &self,
        op: &UserOperation,
        max_gas_limit: u64,
    ) -> Result<u64, GasEstimationError> {
        let timer = std::time::Instant::now();
        let mut low = 0_u64;
        let mut high = max_gas_limit;
        let mut num_rounds = 0_u32;
        let mut last_error: Option<SimulationError> = None;

        while low <= high {
            let mid = math::midpoint(low, high);
            num_rounds += 1;

            // Both fees at the max fee so the prefund check runs at the real price.
            let attempt = UserOperation {
                verification_gas_limit: U256::from(mid),
                call_gas_limit: U256::ZERO,
                max_priority_fee_per_gas: op.max_fee_per_gas,
                ..op.clone()
            };
            let execution = match self
                .simulator
                .trace_simulate_handle_op(attempt, Address::ZERO, Bytes::new())
                .await
            {
                Ok(execution) => execution,
                Err(error) => match error.category() {
                    ErrorCategory::PrefundNotPaid => {
                        last_error = Some(error);
                        let Some(next) = mid.checked_sub(1) else {
                            break;
                        };
                        high = next;
                        continue;
                    }
                    ErrorCategory::ValidationOutOfGas => {
                        last_error = Some(error);
                        let Some(next) = mid.checked_add(1) else {
                            break;
                        };
                        low = next;
                        continue;
                    }
                    ErrorCategory::ExecutionOutOfGas => error
                        .into_traced_execution()
                        .context("execution OOG should carry the traced simulation")?,
                    _ => return Err(error.into()),
                },
            };

            tracing::debug!(
                "verification gas estimation took {} ms with {} rounds",
                timer.elapsed().as_millis(),
                num_rounds
            );
            let verification_gas = execution
                .result
                .pre_op_gas
                .checked_sub(op.pre_verification_gas)
                .context("preOpGas should not be lower than preVerificationGas")?;
            return gas_to_u64(verification_gas);
        }

        tracing::debug!(
            "verification gas estimation failed after {} ms with {} rounds",
            timer.elapsed().as_millis(),
            num_rounds
        );
        Err(GasEstimationError::VerificationGasLimitTooHigh {
            max: max_gas_limit,
            reason: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}
