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

use alloy_primitives::Bytes;

/// Result of a provider method call
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Error enumeration for the provider traits
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// JSON-RPC error response returned by the node
    #[error("{message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message
        message: String,
        /// Error data, the revert payload when the call reverted
        data: Option<Bytes>,
    },
    /// Internal errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProviderError {
    /// Revert data carried by the error response, if any
    pub fn as_revert_data(&self) -> Option<Bytes> {
        match self {
            Self::Rpc { data, .. } => data.clone(),
            Self::Other(_) => None,
        }
    }
}
