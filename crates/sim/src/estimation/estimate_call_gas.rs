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
use metrics::Counter;
use metrics_derive::Metrics;
use opgas_types::UserOperation;
use opgas_utils::math;
use tracing::instrument;

use super::{gas_to_u64, GasEstimationError};
use crate::simulation::{ErrorCategory, HandleOpSimulator, SimulationError};

/// Derives the call gas limit from the execution tracer and falls back to a
/// coarse binary search when the derived limit does not hold at real fees.
pub struct CallGasEstimatorImpl<S> {
    simulator: Arc<S>,
    fallback_cutoff: u64,
    metrics: CallGasMetrics,
}

impl<S> std::fmt::Debug for CallGasEstimatorImpl<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallGasEstimatorImpl")
            .field("fallback_cutoff", &self.fallback_cutoff)
            .finish_non_exhaustive()
    }
}

#[derive(Metrics, Clone)]
#[metrics(scope = "gas_estimator")]
struct CallGasMetrics {
    #[metric(describe = "the number of call gas fallback searches started.")]
    cgl_fallback_searches: Counter,
}

impl<S> CallGasEstimatorImpl<S>
where
    S: HandleOpSimulator,
{
    /// Create a new instance. The fallback search stops once its range is
    /// narrower than `fallback_cutoff`.
    pub fn new(simulator: Arc<S>, fallback_cutoff: u64) -> Self {
        Self {
            simulator,
            fallback_cutoff,
            metrics: CallGasMetrics::default(),
        }
    }

    /// Returns the call gas limit of `op` given its verification gas limit
    #[instrument(skip_all)]
    pub async fn estimate_call_gas(
        &self,
        op: &UserOperation,
        verification_gas_limit: u64,
        max_gas_limit: u64,
        min_call_gas: U256,
    ) -> Result<u64, GasEstimationError> {
        // Zero fees skip the prefund check, so the call gets the whole limit.
        let measure = UserOperation {
            verification_gas_limit: U256::from(verification_gas_limit),
            call_gas_limit: U256::from(max_gas_limit),
            max_fee_per_gas: U256::ZERO,
            max_priority_fee_per_gas: U256::ZERO,
            ..op.clone()
        };
        let measured = self
            .simulator
            .trace_simulate_handle_op(measure, Address::ZERO, Bytes::new())
            .await?;
        let call_gas_limit = gas_to_u64(
            U256::from(measured.trace.execution_gas_limit).max(min_call_gas),
        )?;

        let check = UserOperation {
            verification_gas_limit: U256::from(verification_gas_limit),
            call_gas_limit: U256::from(call_gas_limit),
            max_priority_fee_per_gas: op.max_fee_per_gas,
            ..op.clone()
        };
        let error = match self
            .simulator
            .trace_simulate_handle_op(check.clone(), Address::ZERO, Bytes::new())
            .await
        {
            Ok(_) => return Ok(call_gas_limit),
            Err(error) => error,
        };

        match error.category() {
            ErrorCategory::ExecutionOutOfGas | ErrorCategory::ExecutionReverted => {
                tracing::warn!(
                    "call gas limit {} from the tracer failed with \"{}\", falling back to binary search",
                    call_gas_limit,
                    error
                );
                self.metrics.cgl_fallback_searches.increment(1);
                self.fallback_search(&check, call_gas_limit, max_gas_limit, error)
                    .await
            }
            _ => Err(error.into()),
        }
    }

    async fn fallback_search(
        &self,
        op: &UserOperation,
        call_gas_limit: u64,
        max_gas_limit: u64,
        error: SimulationError,
    ) -> Result<u64, GasEstimationError> {
        let timer = std::time::Instant::now();
        let mut low = call_gas_limit;
        let mut high = max_gas_limit;
        let mut num_rounds = 0_u32;
        let mut best = None;
        let mut last_error = error;

        while low <= high && high - low >= self.fallback_cutoff {
            let mid = math::midpoint(low, high);
            num_rounds += 1;

            let attempt = UserOperation {
                call_gas_limit: U256::from(mid),
                ..op.clone()
            };
            match self
                .simulator
                .trace_simulate_handle_op(attempt, Address::ZERO, Bytes::new())
                .await
            {
                Ok(_) => {
                    best = Some(mid);
                    let Some(next) = mid.checked_sub(1) else {
                        break;
                    };
                    high = next;
                }
                Err(error) => match error.category() {
                    ErrorCategory::ExecutionOutOfGas | ErrorCategory::ExecutionReverted => {
                        last_error = error;
                        let Some(next) = mid.checked_add(1) else {
                            break;
                        };
                        low = next;
                    }
                    ErrorCategory::PrefundNotPaid => {
                        last_error = error;
                        let Some(next) = mid.checked_sub(1) else {
                            break;
                        };
                        high = next;
                    }
                    _ => return Err(error.into()),
                },
            }
        }

        tracing::debug!(
            "call gas fallback search took {} ms with {} rounds",
            timer.elapsed().as_millis(),
            num_rounds
        );
        best.ok_or_else(|| last_error.into())
    }
}
