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

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::SolValue;
use opgas_contracts::v0_6::{
    UserOperation as ContractUserOperation, UserOperationPackedForHash,
};
use opgas_utils::eth;
use serde::{Deserialize, Serialize};

use crate::GasEstimate;

/// An entry point v0.6 user operation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    /// Account sending the operation
    pub sender: Address,
    /// Anti-replay nonce
    pub nonce: U256,
    /// Factory address followed by its call data, empty if the account exists
    pub init_code: Bytes,
    /// Call data passed to the account during execution
    pub call_data: Bytes,
    /// Gas limit of the execution phase
    pub call_gas_limit: U256,
    /// Gas limit of the validation phase
    pub verification_gas_limit: U256,
    /// Gas paid for the overhead not tracked on chain
    pub pre_verification_gas: U256,
    /// EIP-1559 max fee per gas
    pub max_fee_per_gas: U256,
    /// EIP-1559 max priority fee per gas
    pub max_priority_fee_per_gas: U256,
    /// Paymaster address followed by its data, empty if the sender pays
    pub paymaster_and_data: Bytes,
    /// Signature checked by the account
    pub signature: Bytes,
}

impl UserOperation {
    /// Factory address, if the operation deploys its account
    pub fn factory(&self) -> Option<Address> {
        eth::split_address_prefixed(&self.init_code).map(|(address, _)| address)
    }

    /// Call data sent to the factory, if the operation deploys its account
    pub fn factory_call_data(&self) -> Option<Bytes> {
        eth::split_address_prefixed(&self.init_code).map(|(_, data)| data)
    }

    /// Paymaster address, if the operation is sponsored
    pub fn paymaster(&self) -> Option<Address> {
        eth::split_address_prefixed(&self.paymaster_and_data).map(|(address, _)| address)
    }

    /// Hash of the operation as computed by the entry point's `getUserOpHash`
    pub fn hash(&self, entry_point: Address, chain_id: u64) -> B256 {
        let packed = UserOperationPackedForHash {
            sender: self.sender,
            nonce: self.nonce,
            initCodeHash: keccak256(&self.init_code),
            callDataHash: keccak256(&self.call_data),
            callGasLimit: self.call_gas_limit,
            verificationGasLimit: self.verification_gas_limit,
            preVerificationGas: self.pre_verification_gas,
            maxFeePerGas: self.max_fee_per_gas,
            maxPriorityFeePerGas: self.max_priority_fee_per_gas,
            paymasterAndDataHash: keccak256(&self.paymaster_and_data),
        };
        let packed_hash = keccak256(packed.abi_encode());
        keccak256((packed_hash, entry_point, U256::from(chain_id)).abi_encode())
    }

    /// Writes an estimate into the operation's gas fields
    pub fn with_gas_estimate(self, estimate: &GasEstimate) -> Self {
        Self {
            verification_gas_limit: U256::from(estimate.verification_gas_limit),
            call_gas_limit: U256::from(estimate.call_gas_limit),
            pre_verification_gas: estimate.pre_verification_gas,
            ..self
        }
    }
}

impl From<UserOperation> for ContractUserOperation {
    fn from(op: UserOperation) -> Self {
        Self {
            sender: op.sender,
            nonce: op.nonce,
            initCode: op.init_code,
            callData: op.call_data,
            callGasLimit: op.call_gas_limit,
            verificationGasLimit: op.verification_gas_limit,
            preVerificationGas: op.pre_verification_gas,
            maxFeePerGas: op.max_fee_per_gas,
            maxPriorityFeePerGas: op.max_priority_fee_per_gas,
            paymasterAndData: op.paymaster_and_data,
            signature: op.signature,
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, b256, bytes};

    use super::*;

    #[test]
    fn test_hash_zeroed() {
        let entry_point = address!("66a15edcc3b50a663e72f1457ffd49b9ae284ddc");
        let op = UserOperation::default();

        assert_eq!(
            op.hash(entry_point, 1337),
            b256!("dca97c3b49558ab360659f6ead939773be8bf26631e61bb17045bb70dc983b2d")
        );
    }

    #[test]
    fn test_hash() {
        let entry_point = address!("66a15edcc3b50a663e72f1457ffd49b9ae284ddc");
        let op = UserOperation {
            sender: address!("1306b01bc3e4ad202612d3843387e94737673f53"),
            nonce: U256::from(8942),
            init_code: bytes!("6942069420694206942069420694206942069420"),
            call_data: bytes!("0000000000000000000000000000000000000000080085"),
            call_gas_limit: U256::from(10_000),
            verification_gas_limit: U256::from(100_000),
            pre_verification_gas: U256::from(100),
            max_fee_per_gas: U256::from(99_999),
            max_priority_fee_per_gas: U256::from(9_999_999),
            paymaster_and_data: bytes!(
                "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef"
            ),
            signature: bytes!("da0929f527cded8d0a1eaf2e8861d7f7e2d8160b7b13942f99dd367df4473a"),
        };

        assert_eq!(
            op.hash(entry_point, 1337),
            b256!("484add9e4d8c3172d11b5feb6a3cc712280e176d278027cfa02ee396eb28afa1")
        );
    }

    #[test]
    fn test_factory_and_paymaster() {
        let op = UserOperation {
            init_code: bytes!("6942069420694206942069420694206942069420deadbeef"),
            paymaster_and_data: bytes!("0123456789abcdef0123456789abcdef01234567"),
            ..Default::default()
        };

        assert_eq!(
            op.factory(),
            Some(address!("6942069420694206942069420694206942069420"))
        );
        assert_eq!(op.factory_call_data(), Some(bytes!("deadbeef")));
        assert_eq!(
            op.paymaster(),
            Some(address!("0123456789abcdef0123456789abcdef01234567"))
        );
        assert_eq!(UserOperation::default().factory(), None);
        assert_eq!(UserOperation::default().paymaster(), None);
    }

    #[test]
    fn test_with_gas_estimate() {
        let op = UserOperation {
            nonce: U256::from(3),
            max_fee_per_gas: U256::from(1000),
            ..Default::default()
        };
        let op = op.with_gas_estimate(&GasEstimate {
            verification_gas_limit: 70_000,
            call_gas_limit: 42_000,
            pre_verification_gas: U256::from(45_000),
        });

        assert_eq!(op.verification_gas_limit, U256::from(70_000));
        assert_eq!(op.call_gas_limit, U256::from(42_000));
        assert_eq!(op.pre_verification_gas, U256::from(45_000));
        assert_eq!(op.nonce, U256::from(3));
        assert_eq!(op.max_fee_per_gas, U256::from(1000));
    }

    #[test]
    fn test_into_contract_struct() {
        let op = UserOperation {
            call_data: bytes!("b61d27f6"),
            call_gas_limit: U256::from(21_000),
            ..Default::default()
        };
        let contract_op: ContractUserOperation = op.into();

        assert_eq!(contract_op.callData, bytes!("b61d27f6"));
        assert_eq!(contract_op.callGasLimit, U256::from(21_000));
    }
}
