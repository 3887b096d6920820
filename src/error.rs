// COVENANT: Ledger-backed lifecycle engine for smart, Ricardian and marketplace contracts
//
// SPDX-License-Identifier: Apache-2.0
//
// Copyright (C) 2024-2025 COVENANT contributors.
// All rights under the above copyrights are reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except
// in compliance with the License. You may obtain a copy of the License at
//
//        http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express
// or implied. See the License for the specific language governing permissions and limitations under
// the License.

/// Kind of an error returned by any of the engine managers.
///
/// Front-ends use the kind to decide how to report a failure, for instance to pick an HTTP status
/// code, without matching on each concrete error type.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub enum ErrorKind {
    #[display("not found")]
    NotFound,

    #[display("duplicate identifier")]
    DuplicateId,

    #[display("validation failure")]
    Validation,

    #[display("missing signatures")]
    NotFullySigned,

    #[display("gas exceeded")]
    GasExceeded,

    #[display("invalid state")]
    InvalidState,

    #[display("persistence failure")]
    PersistenceFailure,
}

impl ErrorKind {
    /// Whether the error is caused by the request rather than by the engine or its ledger.
    pub fn is_client_error(self) -> bool { self != ErrorKind::PersistenceFailure }
}

/// Malformed input rejected before any state is touched.
#[derive(Clone, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum ValidationError {
    /// {0} must not be empty.
    Empty(&'static str),

    /// {0} must be a positive finite number, while {1} was given.
    NotPositive(&'static str, f64),

    /// gas limit {0} exceeds the maximal allowed limit of {1}.
    GasLimit(u64, u64),

    /// purchase amount {0} is below the template price {1}.
    InsufficientAmount(f64, f64),

    /// buyer '{0}' is the creator of the template and can't purchase it.
    SelfPurchase(String),
}

pub(crate) fn non_empty(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty(field));
    }
    Ok(())
}

pub(crate) fn positive(value: f64, field: &'static str) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::NotPositive(field, value));
    }
    Ok(())
}
