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
use alloy_rpc_types_trace::geth::{
    GethDebugTracerType, GethDebugTracingCallOptions, GethDebugTracingOptions, GethTrace,
};
use anyhow::{bail, Context};
use serde::Deserialize;

/// Output of the execution tracer over a `simulateHandleOp` call
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTrace {
    /// Revert data of every frame that failed during the call phase
    #[serde(default)]
    pub reverts: Vec<Bytes>,
    /// Whether an opcode ran out of gas during validation
    #[serde(rename = "validationOOG", default)]
    pub validation_oog: bool,
    /// Whether an opcode ran out of gas during the call phase
    #[serde(rename = "executionOOG", default)]
    pub execution_oog: bool,
    /// Gas limit needed by the call phase, including the 63/64 reserve of
    /// nested calls
    #[serde(default)]
    pub execution_gas_limit: u64,
    /// Return or revert data of the top level call
    pub output: Bytes,
}

impl TryFrom<GethTrace> for ExecutionTrace {
    type Error = anyhow::Error;

    fn try_from(trace: GethTrace) -> Result<Self, Self::Error> {
        match trace {
            GethTrace::JS(value) => {
                serde_json::from_value(value).context("should deserialize execution trace")
            }
            _ => bail!("execution tracer returned an unexpected trace type"),
        }
    }
}

pub(crate) fn tracing_options(timeout: Option<String>) -> GethDebugTracingCallOptions {
    GethDebugTracingCallOptions {
        tracing_options: GethDebugTracingOptions {
            tracer: Some(GethDebugTracerType::JsTracer(
                execution_tracer_js().to_string(),
            )),
            timeout,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn execution_tracer_js() -> &'static str {
    include_str!("../../tracer/executionTracer.js").trim_end()
}
