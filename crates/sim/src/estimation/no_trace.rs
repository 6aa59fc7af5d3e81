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
use opgas_types::UserOperation;
use opgas_utils::math;
use tracing::instrument;

use super::{gas_to_u64, GasEstimationError, Settings};
use crate::simulation::{ErrorCategory, HandleOpSimulator};

/// Gas limits found by the no-trace path
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoTraceEstimate {
    /// Verification gas limit
    pub verification_gas_limit: u64,
    /// Call gas limit
    pub call_gas_limit: u64,
}

/// Estimates gas limits for nodes that cannot trace calls.
///
/// Every simulation pins both fees to 1, which denominates `paid` in gas.
#[derive(Debug)]
pub struct NoTraceGasEstimatorImpl<S> {
    simulator: Arc<S>,
    settings: Settings,
}

#[derive(Clone, Copy, Debug)]
enum Step {
    HandleOp,
    Validation,
}

impl<S> NoTraceGasEstimatorImpl<S>
where
    S: HandleOpSimulator,
{
    /// Create a new instance
    pub fn new(simulator: Arc<S>, settings: Settings) -> Self {
        Self {
            simulator,
            settings,
        }
    }

    /// Returns the verification and call gas limits of `op`
    #[instrument(skip_all)]
    pub async fn estimate(
        &self,
        op: &UserOperation,
        max_gas_limit: u64,
        max_verification_gas: u64,
        min_call_gas: U256,
    ) -> Result<NoTraceEstimate, GasEstimationError> {
        let deployment_gas = self.simulator.estimate_creation_gas(op).await?;
        let start = self
            .settings
            .no_trace_base_verification_gas
            .saturating_add(deployment_gas);

        let verification_gas_limit = self
            .step_verification_gas(
                op,
                start,
                max_gas_limit,
                max_verification_gas,
                Step::HandleOp,
            )
            .await?;
        // simulateValidation can need more than simulateHandleOp, never less
        let verification_gas_limit = self
            .step_verification_gas(
                op,
                verification_gas_limit,
                max_gas_limit,
                max_verification_gas,
                Step::Validation,
            )
            .await?;

        let result = self
            .simulator
            .simulate_handle_op(
                Self::attempt(op, verification_gas_limit, max_gas_limit),
                Address::ZERO,
                Bytes::new(),
            )
            .await?;
        let call_gas = result
            .paid
            .saturating_sub(op.pre_verification_gas)
            .saturating_sub(U256::from(verification_gas_limit))
            .max(min_call_gas);
        let call_gas_limit = math::increase_by_percent(
            gas_to_u64(call_gas)?,
            self.settings.no_trace_call_gas_buffer_percent,
        );

        let verification_gas_limit = if op.paymaster_and_data.is_empty() {
            verification_gas_limit
        } else {
            verification_gas_limit
                .saturating_sub(deployment_gas)
                .saturating_mul(self.settings.paymaster_verification_gas_multiplier)
                .saturating_add(deployment_gas)
        };

        Ok(NoTraceEstimate {
            verification_gas_limit,
            call_gas_limit,
        })
    }

    async fn step_verification_gas(
        &self,
        op: &UserOperation,
        start: u64,
        max_gas_limit: u64,
        max_verification_gas: u64,
        step: Step,
    ) -> Result<u64, GasEstimationError> {
        let timer = std::time::Instant::now();
        let mut verification_gas_limit = start;
        let mut num_rounds = 0_u32;

        loop {
            num_rounds += 1;
            let attempt = Self::attempt(op, verification_gas_limit, max_gas_limit);
            let result = match step {
                Step::HandleOp => self
                    .simulator
                    .simulate_handle_op(attempt, Address::ZERO, Bytes::new())
                    .await
                    .map(|_| ()),
                Step::Validation => self.simulator.simulate_validation(attempt).await.map(|_| ()),
            };

            match result {
                Ok(()) => break,
                Err(error) if error.category() == ErrorCategory::ValidationOutOfGas => {
                    if verification_gas_limit >= max_verification_gas {
                        return Err(GasEstimationError::VerificationGasLimitTooHigh {
                            max: max_verification_gas,
                            reason: error.to_string(),
                        });
                    }
                    verification_gas_limit = verification_gas_limit
                        .saturating_add(self.settings.no_trace_verification_gas_step);
                }
                Err(error) => return Err(error.into()),
            }
        }

        tracing::debug!(
            "{:?} verification gas steps took {} ms with {} rounds",
            step,
            timer.elapsed().as_millis(),
            num_rounds
        );
        Ok(verification_gas_limit)
    }

    fn attempt(
        op: &UserOperation,
        verification_gas_limit: u64,
        max_gas_limit: u64,
    ) -> UserOperation {
        UserOperation {
            verification_gas_limit: U256::from(verification_gas_limit),
            call_gas_limit: U256::from(max_gas_limit),
            max_fee_per_gas: U256::from(1),
            max_priority_fee_per_gas: U256::from(1),
            ..op.clone()
        }
    }
}
