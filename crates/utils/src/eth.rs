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

//! Utilities for working with revert data returned by an Ethereum-like chain.

use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{Revert, SolError};

/// Parses the revert message from the revert data, if the contract used
/// `revert("message")` or `require(cond, "message")`
pub fn parse_revert_message(revert_data: &[u8]) -> Option<String> {
    Revert::abi_decode(revert_data, false)
        .ok()
        .map(|err| err.reason)
}

/// Splits a field of the form `address ++ data` (init code, paymaster and data)
/// into its address and trailing data. Returns `None` if the field is shorter
/// than an address.
pub fn split_address_prefixed(field: &Bytes) -> Option<(Address, Bytes)> {
    if field.len() < Address::len_bytes() {
        return None;
    }
    let address = Address::from_slice(&field[..Address::len_bytes()]);
    Some((address, field.slice(Address::len_bytes()..)))
}
