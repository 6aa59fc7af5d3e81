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
use metrics::Histogram;
use metrics_derive::Metrics;
#[cfg(feature = "test-utils")]
use mockall::automock;
use opgas_types::{GasEstimate, UserOperation};
use serde::Deserialize;

use crate::simulation::SimulationError;

mod estimate_verification_gas;
pub use estimate_verification_gas::VerificationGasEstimatorImpl;
mod estimate_call_gas;
pub use estimate_call_gas::CallGasEstimatorImpl;
mod no_trace;
pub use no_trace::{NoTraceEstimate, NoTraceGasEstimatorImpl};

/// Gas estimation for entry point v0.6
mod v0_6;
pub use v0_6::GasEstimatorImpl;

/// JSON-RPC error codes surfaced by estimation errors
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[repr(i32)]
pub enum ErrorCode {
    /// Invalid user operation fields
    InvalidFields = -32602,
    /// Rejected by the entry point or the account
    RejectedByEpOrAccount = -32500,
    /// The user operation's call reverted
    ExecutionReverted = -32521,
    /// Internal error
    Internal = -32603,
}

/// Error type for gas estimation
#[derive(Debug, thiserror::Error)]
pub enum GasEstimationError {
    /// Invalid user operation fields
    #[error("{0}")]
    InvalidFields(String),
    /// No verification gas limit up to the maximum let validation succeed
    #[error("verificationGasLimit is too high, max is {max}, err: {reason}")]
    VerificationGasLimitTooHigh {
        /// Largest verification gas limit tried
        max: u64,
        /// Reason of the last failed simulation
        reason: String,
    },
    /// Simulation failed
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    /// Gas used does not fit in a u64
    #[error("gas_used cannot be larger than a u64 integer")]
    GasUsedTooLarge,
    /// Other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GasEstimationError {
    /// JSON-RPC error code of the error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidFields(_) | Self::VerificationGasLimitTooHigh { .. } => {
                ErrorCode::InvalidFields
            }
            Self::Simulation(err) => match err {
                SimulationError::InvalidInput(_) => ErrorCode::InvalidFields,
                SimulationError::Revert(_) | SimulationError::ValidationOutOfGas => {
                    ErrorCode::RejectedByEpOrAccount
                }
                SimulationError::ExecutionOutOfGas(_) | SimulationError::CallReverted { .. } => {
                    ErrorCode::ExecutionReverted
                }
                SimulationError::UndecodableRevert { .. }
                | SimulationError::Provider(_)
                | SimulationError::Other(_) => ErrorCode::Internal,
            },
            Self::GasUsedTooLarge | Self::Other(_) => ErrorCode::Internal,
        }
    }
}

/// Input of a gas estimation
#[derive(Clone, Debug)]
pub struct EstimateInput {
    /// Operation to estimate, its gas limits are ignored
    pub op: UserOperation,
    /// Upper bound of the searches, usually the bundle gas limit
    pub max_gas_limit: u64,
    /// Ceiling of the verification gas limit on the no-trace path
    pub max_verification_gas: u64,
}

/// Gas estimator trait
#[cfg_attr(feature = "test-utils", automock)]
#[async_trait::async_trait]
pub trait GasEstimator: Send + Sync {
    /// Returns a gas estimate or a classified error
    async fn estimate_op_gas(&self, input: EstimateInput)
        -> Result<GasEstimate, GasEstimationError>;
}

/// Selects the estimation algorithm
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "snake_case")]
pub enum EstimationMode {
    /// Binary searches driven by the execution tracer
    #[default]
    Trace,
    /// Stepped search for nodes without `debug_traceCall`
    NoTrace,
}

/// Settings for gas estimation
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Estimation algorithm
    pub mode: EstimationMode,
    /// Width below which the call gas fallback search stops refining
    pub call_gas_fallback_cutoff: u64,
    /// Initial verification gas limit of the no-trace search, on top of the
    /// deployment gas
    pub no_trace_base_verification_gas: u64,
    /// Increment of the no-trace verification gas search
    pub no_trace_verification_gas_step: u64,
    /// Factor applied to the validation gas of sponsored operations on the
    /// no-trace path
    pub paymaster_verification_gas_multiplier: u64,
    /// Percentage added to the no-trace call gas limit
    pub no_trace_call_gas_buffer_percent: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: EstimationMode::Trace,
            call_gas_fallback_cutoff: 30_000,
            no_trace_base_verification_gas: 80_000,
            no_trace_verification_gas_step: 10_000,
            paymaster_verification_gas_multiplier: 3,
            no_trace_call_gas_buffer_percent: 5,
        }
    }
}

impl Settings {
    /// Check if the settings are valid
    pub fn validate(&self) -> Option<String> {
        if self.call_gas_fallback_cutoff == 0 {
            return Some("call_gas_fallback_cutoff field cannot be zero".to_string());
        }
        if self.no_trace_verification_gas_step == 0 {
            return Some("no_trace_verification_gas_step field cannot be zero".to_string());
        }
        if self.paymaster_verification_gas_multiplier == 0 {
            return Some(
                "paymaster_verification_gas_multiplier field cannot be lower than 1".to_string(),
            );
        }
        None
    }
}

#[derive(Metrics, Clone)]
#[metrics(scope = "gas_estimator")]
struct Metrics {
    #[metric(describe = "the distribution of total gas estimate time.")]
    total_gas_estimate_ms: Histogram,
    #[metric(describe = "the distribution of vgl estimate time.")]
    vgl_estimate_ms: Histogram,
    #[metric(describe = "the distribution of cgl estimate time.")]
    cgl_estimate_ms: Histogram,
}

/// Converts a gas amount reported by the entry point to a limit
fn gas_to_u64(gas: U256) -> Result<u64, GasEstimationError> {
    gas.try_into().map_err(|_| GasEstimationError::GasUsedTooLarge)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Bytes;
    use opgas_provider::ProviderError;
    use opgas_types::ExecutionResult;
    use serde_json::json;

    use super::*;
    use crate::simulation::{RevertKind, SimulationRevert, TracedExecution};

    fn revert(reason: &str) -> GasEstimationError {
        SimulationError::Revert(SimulationRevert {
            kind: RevertKind::FailedOp {
                op_index: U256::ZERO,
            },
            reason: reason.to_string(),
        })
        .into()
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            GasEstimationError::InvalidFields("maxFeePerGas must be more than 0".to_string())
                .code(),
            ErrorCode::InvalidFields
        );
        assert_eq!(
            GasEstimationError::VerificationGasLimitTooHigh {
                max: 1_000_000,
                reason: "AA23 reverted".to_string(),
            }
            .code(),
            ErrorCode::InvalidFields
        );
        assert_eq!(
            revert("AA24 signature error").code(),
            ErrorCode::RejectedByEpOrAccount
        );
        assert_eq!(
            GasEstimationError::from(SimulationError::ValidationOutOfGas).code(),
            ErrorCode::RejectedByEpOrAccount
        );
        assert_eq!(
            GasEstimationError::from(SimulationError::CallReverted {
                reason: "TRANSFER_FAILED".to_string(),
                execution: Box::new(TracedExecution {
                    result: ExecutionResult::default(),
                    trace: Default::default(),
                }),
            })
            .code(),
            ErrorCode::ExecutionReverted
        );
        assert_eq!(
            GasEstimationError::from(SimulationError::UndecodableRevert {
                data: Bytes::new(),
                attempts: vec![],
            })
            .code(),
            ErrorCode::Internal
        );
        assert_eq!(
            GasEstimationError::from(SimulationError::Provider(ProviderError::Other(
                anyhow::anyhow!("timeout")
            )))
            .code(),
            ErrorCode::Internal
        );
        assert_eq!(GasEstimationError::GasUsedTooLarge.code(), ErrorCode::Internal);
        assert_eq!(ErrorCode::ExecutionReverted as i32, -32521);
    }

    #[test]
    fn test_too_high_message() {
        let err = GasEstimationError::VerificationGasLimitTooHigh {
            max: 1_000_000,
            reason: "AA23 reverted".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "verificationGasLimit is too high, max is 1000000, err: AA23 reverted"
        );
    }

    #[test]
    fn test_simulation_errors_keep_their_reason() {
        assert_eq!(revert("AA24 signature error").to_string(), "AA24 signature error");
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.mode, EstimationMode::Trace);
        assert_eq!(settings.call_gas_fallback_cutoff, 30_000);
        assert_eq!(settings.no_trace_base_verification_gas, 80_000);
        assert_eq!(settings.no_trace_verification_gas_step, 10_000);
        assert_eq!(settings.paymaster_verification_gas_multiplier, 3);
        assert_eq!(settings.no_trace_call_gas_buffer_percent, 5);
        assert!(settings.validate().is_none());
    }

    #[test]
    fn test_settings_deserialize() {
        let settings: Settings = serde_json::from_value(json!({
            "mode": "noTrace",
            "callGasFallbackCutoff": 10000,
        }))
        .unwrap();
        assert_eq!(settings.mode, EstimationMode::NoTrace);
        assert_eq!(settings.call_gas_fallback_cutoff, 10_000);
        assert_eq!(settings.no_trace_verification_gas_step, 10_000);
        assert_eq!(settings.mode.to_string(), "no_trace");
    }

    #[test]
    fn test_settings_validate() {
        let settings = Settings {
            call_gas_fallback_cutoff: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_some());

        let settings = Settings {
            no_trace_verification_gas_step: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_some());

        let settings = Settings {
            paymaster_verification_gas_multiplier: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_some());
    }

    #[test]
    fn test_gas_to_u64() {
        assert_eq!(gas_to_u64(U256::from(21_000)).unwrap(), 21_000);
        assert!(matches!(
            gas_to_u64(U256::from(u64::MAX) + U256::from(1)),
            Err(GasEstimationError::GasUsedTooLarge)
        ));
    }
}
