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

use alloy_primitives::{Address, U256};
use opgas_types::{GasEstimate, GasOverhead, UserOperation};
use opgas_utils::guard_timer::CustomTimerGuard;
use tracing::instrument;

use super::{
    CallGasEstimatorImpl, EstimateInput, EstimationMode, GasEstimationError, GasEstimator,
    Metrics, NoTraceGasEstimatorImpl, Settings, VerificationGasEstimatorImpl,
};
use crate::simulation::HandleOpSimulator;

/// Gas estimator for v0.6 user operations
pub struct GasEstimatorImpl<S, O> {
    chain_id: u64,
    entry_point: Address,
    overhead: O,
    settings: Settings,
    metrics: Metrics,
    verification_gas_estimator: VerificationGasEstimatorImpl<S>,
    call_gas_estimator: CallGasEstimatorImpl<S>,
    no_trace_estimator: NoTraceGasEstimatorImpl<S>,
}

#[async_trait::async_trait]
impl<S, O> GasEstimator for GasEstimatorImpl<S, O>
where
    S: HandleOpSimulator,
    O: GasOverhead,
{
    #[instrument(skip_all, fields(
        op_hash = %input.op.hash(self.entry_point, self.chain_id),
        sender = %input.op.sender,
        mode = %self.settings.mode,
    ))]
    async fn estimate_op_gas(
        &self,
        input: EstimateInput,
    ) -> Result<GasEstimate, GasEstimationError> {
        let EstimateInput {
            op,
            max_gas_limit,
            max_verification_gas,
        } = input;

        if op.max_fee_per_gas.is_zero() {
            return Err(GasEstimationError::InvalidFields(
                "maxFeePerGas must be more than 0".to_string(),
            ));
        }

        let timer = CustomTimerGuard::new(self.metrics.total_gas_estimate_ms.clone());
        let min_call_gas = self.overhead.non_zero_value_call();

        let (verification_gas_limit, call_gas_limit) = match self.settings.mode {
            EstimationMode::Trace => {
                let verification_gas_limit = {
                    let _timer = CustomTimerGuard::new(self.metrics.vgl_estimate_ms.clone());
                    self.verification_gas_estimator
                        .estimate_verification_gas(&op, max_gas_limit)
                        .await?
                };
                let call_gas_limit = {
                    let _timer = CustomTimerGuard::new(self.metrics.cgl_estimate_ms.clone());
                    self.call_gas_estimator
                        .estimate_call_gas(&op, verification_gas_limit, max_gas_limit, min_call_gas)
                        .await?
                };
                (verification_gas_limit, call_gas_limit)
            }
            EstimationMode::NoTrace => {
                let estimate = self
                    .no_trace_estimator
                    .estimate(&op, max_gas_limit, max_verification_gas, min_call_gas)
                    .await?;
                (estimate.verification_gas_limit, estimate.call_gas_limit)
            }
        };

        let estimated = UserOperation {
            verification_gas_limit: U256::from(verification_gas_limit),
            call_gas_limit: U256::from(call_gas_limit),
            ..op
        };
        let pre_verification_gas = self.overhead.calc_pre_verification_gas(&estimated)?;

        tracing::debug!(
            "gas estimation took {} ms: verification {}, call {}, pre-verification {}",
            timer.elapsed().as_millis(),
            verification_gas_limit,
            call_gas_limit,
            pre_verification_gas
        );

        Ok(GasEstimate {
            verification_gas_limit,
            call_gas_limit,
            pre_verification_gas,
        })
    }
}

impl<S, O> GasEstimatorImpl<S, O>
where
    S: HandleOpSimulator,
    O: GasOverhead,
{
    /// Create a new gas estimator
    pub fn new(
        chain_id: u64,
        entry_point: Address,
        simulator: Arc<S>,
        overhead: O,
        settings: Settings,
    ) -> Self {
        Self {
            chain_id,
            entry_point,
            overhead,
            settings,
            metrics: Metrics::default(),
            verification_gas_estimator: VerificationGasEstimatorImpl::new(simulator.clone()),
            call_gas_estimator: CallGasEstimatorImpl::new(
                simulator.clone(),
                settings.call_gas_fallback_cutoff,
            ),
            no_trace_estimator: NoTraceGasEstimatorImpl::new(simulator, settings),
        }
    }
}
