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

use alloy_primitives::{Address, Bytes, U256};
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;
use opgas_provider::ProviderError;
use opgas_types::{ExecutionResult, UserOperation, ValidationOutput};
use serde::Deserialize;

mod classify;
pub use classify::ErrorCategory;

mod decode;
pub use decode::{decode_handle_op_revert, decode_validation_revert};

mod simulator;
pub use simulator::EntryPointSimulator;

mod tracer;
pub use tracer::ExecutionTrace;

/// Result of a traced `simulateHandleOp`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TracedExecution {
    /// Decoded entry point result
    pub result: ExecutionResult,
    /// Output of the execution tracer
    pub trace: ExecutionTrace,
}

/// Kind of a structured entry point revert
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RevertKind {
    /// `FailedOp(uint256,string)`
    FailedOp {
        /// Index of the failing operation in the batch
        op_index: U256,
    },
    /// `Error(string)`
    FailedStr,
}

/// Structured revert returned by the entry point
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct SimulationRevert {
    /// Shape of the revert
    pub kind: RevertKind,
    /// Revert reason
    pub reason: String,
}

/// Error returned by a simulation
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The entry point reverted with a known error
    #[error(transparent)]
    Revert(#[from] SimulationRevert),
    /// The tracer saw validation run out of gas
    #[error("validation OOG")]
    ValidationOutOfGas,
    /// The tracer saw the call phase run out of gas
    #[error("execution OOG")]
    ExecutionOutOfGas(Box<TracedExecution>),
    /// The call phase reverted
    #[error("{reason}")]
    CallReverted {
        /// Revert reason of the call
        reason: String,
        /// The traced simulation
        execution: Box<TracedExecution>,
    },
    /// The revert data matched none of the known errors
    #[error("{}", .attempts.join(", "))]
    UndecodableRevert {
        /// Revert data returned by the node
        data: Bytes,
        /// Failure message of every decode attempt, in order
        attempts: Vec<String>,
    },
    /// The operation cannot be simulated as given
    #[error("{0}")]
    InvalidInput(String),
    /// Error from provider
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SimulationError {
    /// Category of the error, used to steer the gas searches
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::classify(&self.to_string())
    }

    /// The traced simulation behind an execution phase failure
    pub fn into_traced_execution(self) -> Option<TracedExecution> {
        match self {
            Self::ExecutionOutOfGas(execution) | Self::CallReverted { execution, .. } => {
                Some(*execution)
            }
            _ => None,
        }
    }
}

/// Simulation settings
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Address of the v0.6 entry point
    pub entry_point: Address,
    /// Account used as the sender of simulation calls
    pub sender: Address,
    /// Timeout passed to the node's tracer, e.g. `"10s"`
    #[serde(default)]
    pub tracer_timeout: Option<String>,
}

impl Settings {
    /// Check if the settings are valid
    pub fn validate(&self) -> Option<String> {
        if self.entry_point == Address::ZERO {
            return Some("entry_point cannot be the zero address".to_string());
        }
        None
    }
}

/// Simulates user operations against the entry point
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait::async_trait]
pub trait HandleOpSimulator: Send + Sync {
    /// Runs `simulateHandleOp` without tracing
    async fn simulate_handle_op(
        &self,
        op: UserOperation,
        target: Address,
        target_call_data: Bytes,
    ) -> Result<ExecutionResult, SimulationError>;

    /// Runs `simulateHandleOp` under the execution tracer
    async fn trace_simulate_handle_op(
        &self,
        op: UserOperation,
        target: Address,
        target_call_data: Bytes,
    ) -> Result<TracedExecution, SimulationError>;

    /// Runs `simulateValidation`
    async fn simulate_validation(
        &self,
        op: UserOperation,
    ) -> Result<ValidationOutput, SimulationError>;

    /// Estimates the gas used by the factory to deploy the sender, zero if the
    /// operation has no init code
    async fn estimate_creation_gas(&self, op: &UserOperation) -> Result<u64, SimulationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traced() -> Box<TracedExecution> {
        Box::new(TracedExecution {
            result: ExecutionResult {
                pre_op_gas: U256::from(50_000),
                ..Default::default()
            },
            trace: ExecutionTrace::default(),
        })
    }

    #[test]
    fn test_error_categories() {
        let revert = SimulationError::Revert(SimulationRevert {
            kind: RevertKind::FailedOp {
                op_index: U256::ZERO,
            },
            reason: "AA21 didn't pay prefund".to_string(),
        });
        assert_eq!(revert.to_string(), "AA21 didn't pay prefund");
        assert_eq!(revert.category(), ErrorCategory::PrefundNotPaid);

        assert_eq!(
            SimulationError::ValidationOutOfGas.category(),
            ErrorCategory::ValidationOutOfGas
        );
        assert_eq!(
            SimulationError::ExecutionOutOfGas(traced()).category(),
            ErrorCategory::ExecutionOutOfGas
        );
        assert_eq!(
            SimulationError::CallReverted {
                reason: "execution reverted".to_string(),
                execution: traced(),
            }
            .category(),
            ErrorCategory::ExecutionReverted
        );
        assert_eq!(
            SimulationError::CallReverted {
                reason: "TransferHelper: TRANSFER_FAILED".to_string(),
                execution: traced(),
            }
            .category(),
            ErrorCategory::Unclassified
        );
        assert_eq!(
            SimulationError::Other(anyhow::anyhow!("boom")).category(),
            ErrorCategory::Unclassified
        );
    }

    #[test]
    fn test_undecodable_revert_display() {
        let err = SimulationError::UndecodableRevert {
            data: Bytes::from_static(&[0xde, 0xad]),
            attempts: vec![
                "executionResult: bad".to_string(),
                "failedOp: bad".to_string(),
                "failedStr: bad".to_string(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "executionResult: bad, failedOp: bad, failedStr: bad"
        );
    }

    #[test]
    fn test_into_traced_execution() {
        let execution = SimulationError::ExecutionOutOfGas(traced())
            .into_traced_execution()
            .unwrap();
        assert_eq!(execution.result.pre_op_gas, U256::from(50_000));
        assert!(SimulationError::ValidationOutOfGas
            .into_traced_execution()
            .is_none());
    }

    #[test]
    fn test_settings_validate() {
        let mut settings = Settings {
            entry_point: Address::ZERO,
            sender: Address::ZERO,
            tracer_timeout: None,
        };
        assert!(settings.validate().is_some());
        settings.entry_point = Address::repeat_byte(1);
        assert!(settings.validate().is_none());
    }
}
