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

//! Math utilities

/// Increases a gas amount by a percentage, saturating at `u64::MAX`
pub fn increase_by_percent(n: u64, percent: u32) -> u64 {
    let increased = u128::from(n) * (100 + u128::from(percent)) / 100;
    u64::try_from(increased).unwrap_or(u64::MAX)
}

/// Midpoint of an inclusive range without overflowing
pub fn midpoint(low: u64, high: u64) -> u64 {
    low + (high - low) / 2
}
