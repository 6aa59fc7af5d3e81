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

//! Decoding of the reverts returned by the entry point's simulation methods.

use alloy_primitives::Bytes;
use alloy_sol_types::{Revert, SolError};
use opgas_contracts::v0_6::IEntryPoint::{
    ExecutionResult as ExecutionResultV0_6, FailedOp as FailedOpV0_6,
    ValidationResult as ValidationResultV0_6,
    ValidationResultWithAggregation as ValidationResultWithAggregationV0_6,
};
use opgas_provider::ProviderError;
use opgas_types::{ExecutionResult, ValidationOutput};

use super::{RevertKind, SimulationError, SimulationRevert};

/// A decode attempt yields the success value, a structured revert, or the
/// reason the data did not match its shape.
type DecodeAttempt<T> = fn(&[u8]) -> Result<Result<T, SimulationRevert>, String>;

const HANDLE_OP_ATTEMPTS: &[DecodeAttempt<ExecutionResult>] = &[
    decode_execution_result,
    decode_failed_op::<ExecutionResult>,
    decode_failed_str::<ExecutionResult>,
];

const VALIDATION_ATTEMPTS: &[DecodeAttempt<ValidationOutput>] = &[
    decode_validation_result,
    decode_validation_result_with_aggregation,
    decode_failed_op::<ValidationOutput>,
    decode_failed_str::<ValidationOutput>,
];

/// Decodes the error of a `simulateHandleOp` call.
///
/// Errors without revert data are returned unchanged.
pub fn decode_handle_op_revert(error: ProviderError) -> Result<ExecutionResult, SimulationError> {
    match error.as_revert_data() {
        Some(data) => decode_handle_op_output(&data),
        None => Err(error.into()),
    }
}

/// Decodes the error of a `simulateValidation` call.
///
/// Errors without revert data are returned unchanged.
pub fn decode_validation_revert(
    error: ProviderError,
) -> Result<ValidationOutput, SimulationError> {
    match error.as_revert_data() {
        Some(data) => decode_with(&data, VALIDATION_ATTEMPTS),
        None => Err(error.into()),
    }
}

pub(crate) fn decode_handle_op_output(data: &Bytes) -> Result<ExecutionResult, SimulationError> {
    decode_with(data, HANDLE_OP_ATTEMPTS)
}

fn decode_with<T>(data: &Bytes, attempts: &[DecodeAttempt<T>]) -> Result<T, SimulationError> {
    let mut failures = Vec::with_capacity(attempts.len());
    for attempt in attempts {
        match attempt(data) {
            Ok(decoded) => return decoded.map_err(SimulationError::Revert),
            Err(failure) => failures.push(failure),
        }
    }
    Err(SimulationError::UndecodableRevert {
        data: data.clone(),
        attempts: failures,
    })
}

fn decode_execution_result(
    data: &[u8],
) -> Result<Result<ExecutionResult, SimulationRevert>, String> {
    ExecutionResultV0_6::abi_decode(data, true)
        .map(|result| Ok(result.into()))
        .map_err(|e| format!("executionResult: {e}"))
}

fn decode_validation_result(
    data: &[u8],
) -> Result<Result<ValidationOutput, SimulationRevert>, String> {
    ValidationResultV0_6::abi_decode(data, true)
        .map(|result| Ok(result.into()))
        .map_err(|e| format!("validationResult: {e}"))
}

fn decode_validation_result_with_aggregation(
    data: &[u8],
) -> Result<Result<ValidationOutput, SimulationRevert>, String> {
    ValidationResultWithAggregationV0_6::abi_decode(data, true)
        .map(|result| Ok(result.into()))
        .map_err(|e| format!("validationResultWithAggregation: {e}"))
}

fn decode_failed_op<T>(data: &[u8]) -> Result<Result<T, SimulationRevert>, String> {
    FailedOpV0_6::abi_decode(data, true)
        .map(|failed_op| {
            Err(SimulationRevert {
                kind: RevertKind::FailedOp {
                    op_index: failed_op.opIndex,
                },
                reason: failed_op.reason,
            })
        })
        .map_err(|e| format!("failedOp: {e}"))
}

fn decode_failed_str<T>(data: &[u8]) -> Result<Result<T, SimulationRevert>, String> {
    Revert::abi_decode(data, true)
        .map(|revert| {
            Err(SimulationRevert {
                kind: RevertKind::FailedStr,
                reason: revert.reason,
            })
        })
        .map_err(|e| format!("failedStr: {e}"))
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{aliases::U48, bytes, U256};
    use opgas_contracts::v0_6::{ReturnInfo, StakeInfo};

    use super::*;

    fn execution_result_payload() -> Vec<u8> {
        ExecutionResultV0_6 {
            preOpGas: U256::from(61_000),
            paid: U256::from(120_000),
            validAfter: U48::from(0),
            validUntil: U48::from(0),
            targetSuccess: true,
            targetResult: Bytes::new(),
        }
        .abi_encode()
    }

    fn failed_op_payload() -> Vec<u8> {
        FailedOpV0_6 {
            opIndex: U256::ZERO,
            reason: "AA23 reverted".to_string(),
        }
        .abi_encode()
    }

    fn failed_str_payload() -> Vec<u8> {
        Revert::from("balance too low").abi_encode()
    }

    fn rpc_error(data: Option<Bytes>) -> ProviderError {
        ProviderError::Rpc {
            code: 3,
            message: "execution reverted".to_string(),
            data,
        }
    }

    #[test]
    fn test_each_shape_matches_only_its_attempt() {
        let execution_result = execution_result_payload();
        let failed_op = failed_op_payload();
        let failed_str = failed_str_payload();

        assert!(matches!(decode_execution_result(&execution_result), Ok(Ok(_))));
        assert!(decode_failed_op::<ExecutionResult>(&execution_result).is_err());
        assert!(decode_failed_str::<ExecutionResult>(&execution_result).is_err());

        assert!(decode_execution_result(&failed_op).is_err());
        assert!(matches!(
            decode_failed_op::<ExecutionResult>(&failed_op),
            Ok(Err(_))
        ));
        assert!(decode_failed_str::<ExecutionResult>(&failed_op).is_err());

        assert!(decode_execution_result(&failed_str).is_err());
        assert!(decode_failed_op::<ExecutionResult>(&failed_str).is_err());
        assert!(matches!(
            decode_failed_str::<ExecutionResult>(&failed_str),
            Ok(Err(_))
        ));
    }

    #[test]
    fn test_decode_execution_result() {
        let result =
            decode_handle_op_revert(rpc_error(Some(execution_result_payload().into()))).unwrap();

        assert_eq!(result.pre_op_gas, U256::from(61_000));
        assert_eq!(result.paid, U256::from(120_000));
        assert!(result.target_success);
    }

    #[test]
    fn test_decode_failed_op() {
        let err =
            decode_handle_op_revert(rpc_error(Some(failed_op_payload().into()))).unwrap_err();

        let SimulationError::Revert(revert) = err else {
            panic!("expected a structured revert, got {err:?}");
        };
        assert_eq!(
            revert.kind,
            RevertKind::FailedOp {
                op_index: U256::ZERO
            }
        );
        assert_eq!(revert.reason, "AA23 reverted");
    }

    #[test]
    fn test_decode_failed_str() {
        let err =
            decode_handle_op_revert(rpc_error(Some(failed_str_payload().into()))).unwrap_err();

        let SimulationError::Revert(revert) = err else {
            panic!("expected a structured revert, got {err:?}");
        };
        assert_eq!(revert.kind, RevertKind::FailedStr);
        assert_eq!(revert.reason, "balance too low");
    }

    #[test]
    fn test_undecodable_lists_every_attempt() {
        let data = bytes!("deadbeef");
        let err = decode_handle_op_revert(rpc_error(Some(data.clone()))).unwrap_err();

        let SimulationError::UndecodableRevert {
            data: revert_data,
            attempts,
        } = &err
        else {
            panic!("expected an undecodable revert, got {err:?}");
        };
        assert_eq!(revert_data, &data);
        assert_eq!(attempts.len(), 3);
        assert!(attempts[0].starts_with("executionResult: "));
        assert!(attempts[1].starts_with("failedOp: "));
        assert!(attempts[2].starts_with("failedStr: "));
        assert_eq!(err.to_string(), attempts.join(", "));
    }

    #[test]
    fn test_no_revert_data_returns_provider_error() {
        let err = decode_handle_op_revert(ProviderError::Rpc {
            code: -32000,
            message: "header not found".to_string(),
            data: None,
        })
        .unwrap_err();

        let SimulationError::Provider(ProviderError::Rpc { code, message, .. }) = err else {
            panic!("expected the provider error, got {err:?}");
        };
        assert_eq!(code, -32000);
        assert_eq!(message, "header not found");
    }

    #[test]
    fn test_decode_validation_result() {
        let return_info = ReturnInfo {
            preOpGas: U256::from(45_000),
            prefund: U256::from(90_000),
            sigFailed: false,
            validAfter: U48::from(0),
            validUntil: U48::from(0),
            paymasterContext: Bytes::new(),
        };
        let payload = ValidationResultV0_6 {
            returnInfo: return_info.clone(),
            senderInfo: StakeInfo::default(),
            factoryInfo: StakeInfo::default(),
            paymasterInfo: StakeInfo::default(),
        }
        .abi_encode();
        let output = decode_validation_revert(rpc_error(Some(payload.into()))).unwrap();
        assert_eq!(output.pre_op_gas, U256::from(45_000));
        assert_eq!(output.prefund, U256::from(90_000));

        let payload = ValidationResultWithAggregationV0_6 {
            returnInfo: return_info,
            ..Default::default()
        }
        .abi_encode();
        let output = decode_validation_revert(rpc_error(Some(payload.into()))).unwrap();
        assert_eq!(output.pre_op_gas, U256::from(45_000));
    }

    #[test]
    fn test_decode_validation_failures() {
        let err =
            decode_validation_revert(rpc_error(Some(failed_op_payload().into()))).unwrap_err();
        assert_eq!(err.to_string(), "AA23 reverted");

        let err = decode_validation_revert(rpc_error(Some(execution_result_payload().into())))
            .unwrap_err();
        let SimulationError::UndecodableRevert { attempts, .. } = err else {
            panic!("expected an undecodable revert");
        };
        assert_eq!(attempts.len(), 4);
    }
}
