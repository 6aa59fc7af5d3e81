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

use alloy_primitives::{Address, Bytes};
use alloy_rpc_types_eth::{BlockId, TransactionRequest};
use alloy_sol_types::SolCall;
use anyhow::anyhow;
use opgas_contracts::v0_6::IEntryPoint::{simulateHandleOpCall, simulateValidationCall};
use opgas_provider::EvmProvider;
use opgas_types::{ExecutionResult, UserOperation, ValidationOutput};
use opgas_utils::eth;
use tracing::instrument;

use super::{
    decode::{self, decode_handle_op_revert, decode_validation_revert},
    tracer, ExecutionTrace, HandleOpSimulator, Settings, SimulationError, TracedExecution,
};

/// Simulator running the v0.6 entry point's simulation methods through a node
#[derive(Debug)]
pub struct EntryPointSimulator<P> {
    provider: P,
    settings: Settings,
}

impl<P> EntryPointSimulator<P> {
    /// Create a new simulator
    pub fn new(provider: P, settings: Settings) -> Self {
        Self { provider, settings }
    }

    fn entry_point_tx(&self, data: Vec<u8>) -> TransactionRequest {
        TransactionRequest::default()
            .from(self.settings.sender)
            .to(self.settings.entry_point)
            .input(Bytes::from(data).into())
    }

    fn simulate_handle_op_tx(
        &self,
        op: UserOperation,
        target: Address,
        target_call_data: Bytes,
    ) -> TransactionRequest {
        self.entry_point_tx(
            simulateHandleOpCall {
                op: op.into(),
                target,
                targetCallData: target_call_data,
            }
            .abi_encode(),
        )
    }
}

#[async_trait::async_trait]
impl<P> HandleOpSimulator for EntryPointSimulator<P>
where
    P: EvmProvider,
{
    async fn simulate_handle_op(
        &self,
        op: UserOperation,
        target: Address,
        target_call_data: Bytes,
    ) -> Result<ExecutionResult, SimulationError> {
        let tx = self.simulate_handle_op_tx(op, target, target_call_data);
        match self.provider.estimate_gas(&tx, Some(BlockId::latest())).await {
            Ok(_) => Err(anyhow!("simulateHandleOp succeeded, but should always revert").into()),
            Err(error) => decode_handle_op_revert(error),
        }
    }

    #[instrument(skip_all)]
    async fn trace_simulate_handle_op(
        &self,
        op: UserOperation,
        target: Address,
        target_call_data: Bytes,
    ) -> Result<TracedExecution, SimulationError> {
        let tx = self.simulate_handle_op_tx(op, target, target_call_data);
        let trace = self
            .provider
            .debug_trace_call(
                tx,
                Some(BlockId::latest()),
                tracer::tracing_options(self.settings.tracer_timeout.clone()),
            )
            .await?;

        traced_outcome(ExecutionTrace::try_from(trace)?)
    }

    async fn simulate_validation(
        &self,
        op: UserOperation,
    ) -> Result<ValidationOutput, SimulationError> {
        let tx = self.entry_point_tx(simulateValidationCall { userOp: op.into() }.abi_encode());
        match self.provider.call(&tx, Some(BlockId::latest())).await {
            Ok(_) => Err(anyhow!("simulateValidation succeeded, but should always revert").into()),
            Err(error) => decode_validation_revert(error),
        }
    }

    async fn estimate_creation_gas(&self, op: &UserOperation) -> Result<u64, SimulationError> {
        if op.init_code.is_empty() {
            return Ok(0);
        }
        let Some((factory, factory_call_data)) = eth::split_address_prefixed(&op.init_code)
        else {
            return Err(SimulationError::InvalidInput(format!(
                "initCode must start with a factory address, got {} bytes",
                op.init_code.len()
            )));
        };

        let tx = TransactionRequest::default()
            .from(self.settings.sender)
            .to(factory)
            .input(factory_call_data.into());
        Ok(self
            .provider
            .estimate_gas(&tx, Some(BlockId::latest()))
            .await?)
    }
}

fn traced_outcome(trace: ExecutionTrace) -> Result<TracedExecution, SimulationError> {
    if trace.validation_oog {
        return Err(SimulationError::ValidationOutOfGas);
    }

    let result = decode::decode_handle_op_output(&trace.output)?;
    let Some(revert) = trace.reverts.last().cloned() else {
        return Ok(TracedExecution { result, trace });
    };

    let execution = Box::new(TracedExecution { result, trace });
    if revert.is_empty() {
        if execution.trace.execution_oog {
            return Err(SimulationError::ExecutionOutOfGas(execution));
        }
        return Err(SimulationError::CallReverted {
            reason: "execution reverted".to_string(),
            execution,
        });
    }

    let reason = eth::parse_revert_message(&revert)
        .unwrap_or_else(|| format!("user operation's call reverted: {revert}"));
    Err(SimulationError::CallReverted { reason, execution })
}
