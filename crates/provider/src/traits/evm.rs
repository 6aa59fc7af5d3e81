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

//! Trait for the node endpoints used by simulations.

use alloy_primitives::Bytes;
use alloy_rpc_types_eth::{BlockId, TransactionRequest};
use alloy_rpc_types_trace::geth::{GethDebugTracingCallOptions, GethTrace};
#[cfg(feature = "test-utils")]
use mockall::automock;

use super::error::ProviderResult;

/// Trait for interacting with a node's call and tracing endpoints.
#[cfg_attr(feature = "test-utils", automock)]
#[async_trait::async_trait]
pub trait EvmProvider: Send + Sync {
    /// Simulate a transaction via an eth_call
    async fn call(&self, tx: &TransactionRequest, block: Option<BlockId>)
        -> ProviderResult<Bytes>;

    /// Estimate the gas of a transaction via eth_estimateGas
    async fn estimate_gas(
        &self,
        tx: &TransactionRequest,
        block: Option<BlockId>,
    ) -> ProviderResult<u64>;

    /// Debug trace a call
    async fn debug_trace_call(
        &self,
        tx: TransactionRequest,
        block_id: Option<BlockId>,
        trace_options: GethDebugTracingCallOptions,
    ) -> ProviderResult<GethTrace>;
}
