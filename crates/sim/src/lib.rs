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

#![warn(missing_docs, unreachable_pub)]
#![deny(unused_must_use, rust_2018_idioms)]
#![doc(test(
    no_crate_inject,
    attr(deny(warnings, rust_2018_idioms), allow(dead_code, unused_variables))
))]
//! Gas limit estimation for ERC-4337 v0.6 user operations.
//!
//! Includes implementations for:
//!
//! - Entry point simulation, with and without the execution tracer
//! - Revert decoding and error classification
//! - Verification and call gas limit searches
//! - A stepped estimation path for nodes that cannot trace calls
//!
//! ## Feature Flags
//!
//! - `test-utils`: Export mocks and utilities for testing.

mod estimation;
#[cfg(feature = "test-utils")]
pub use estimation::MockGasEstimator;
pub use estimation::{
    CallGasEstimatorImpl, ErrorCode, EstimateInput, EstimationMode, GasEstimationError,
    GasEstimator, GasEstimatorImpl, NoTraceEstimate, NoTraceGasEstimatorImpl,
    Settings as EstimationSettings, VerificationGasEstimatorImpl,
};

mod simulation;
#[cfg(feature = "test-utils")]
pub use simulation::MockHandleOpSimulator;
pub use simulation::{
    decode_handle_op_revert, decode_validation_revert, EntryPointSimulator, ErrorCategory,
    ExecutionTrace, HandleOpSimulator, RevertKind, SimulationError, SimulationRevert,
    Settings as SimulatorSettings, TracedExecution,
};
