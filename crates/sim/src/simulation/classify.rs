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

/// Semantic category of a failed simulation, used to steer the gas searches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum ErrorCategory {
    /// The sender or paymaster cannot pay the prefund, the gas limit is too high
    PrefundNotPaid,
    /// Validation ran out of gas, the verification gas limit is too low
    ValidationOutOfGas,
    /// The call phase ran out of gas
    ExecutionOutOfGas,
    /// The call phase reverted
    ExecutionReverted,
    /// Anything else, never recoverable by a search
    Unclassified,
}

#[derive(Clone, Copy, Debug)]
enum Pattern {
    Prefix(&'static str),
    Contains(&'static str),
}

impl Pattern {
    fn matches(self, message: &str) -> bool {
        match self {
            Pattern::Prefix(prefix) => message.starts_with(prefix),
            Pattern::Contains(needle) => message.contains(needle),
        }
    }
}

// First match wins.
const RULES: &[(Pattern, ErrorCategory)] = &[
    (Pattern::Prefix("AA21"), ErrorCategory::PrefundNotPaid),
    (Pattern::Prefix("AA31"), ErrorCategory::PrefundNotPaid),
    (
        Pattern::Contains("balance too low"),
        ErrorCategory::PrefundNotPaid,
    ),
    (Pattern::Prefix("AA13"), ErrorCategory::ValidationOutOfGas),
    (
        Pattern::Contains("validation OOG"),
        ErrorCategory::ValidationOutOfGas,
    ),
    (Pattern::Prefix("AA23"), ErrorCategory::ValidationOutOfGas),
    (
        Pattern::Contains("AA33 reverted (or OOG)"),
        ErrorCategory::ValidationOutOfGas,
    ),
    (Pattern::Prefix("AA40"), ErrorCategory::ValidationOutOfGas),
    (Pattern::Prefix("AA41"), ErrorCategory::ValidationOutOfGas),
    (
        Pattern::Contains("execution OOG"),
        ErrorCategory::ExecutionOutOfGas,
    ),
    (
        Pattern::Contains("execution reverted"),
        ErrorCategory::ExecutionReverted,
    ),
];

impl ErrorCategory {
    /// Classifies a failure by its message
    pub fn classify(message: &str) -> Self {
        RULES
            .iter()
            .find(|(pattern, _)| pattern.matches(message))
            .map(|(_, category)| *category)
            .unwrap_or(ErrorCategory::Unclassified)
    }
}
