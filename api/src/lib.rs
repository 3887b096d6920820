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

#![deny(
    unsafe_code,
    dead_code,
    unused_variables,
    unused_mut,
    unused_imports,
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case
)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Data model shared by the COVENANT contract engine, its persistence backends and front-ends.
//!
//! The crate defines identifiers, the dynamic [`Value`] payload type, and the records kept by each
//! of the engine managers: [`SmartContract`] with its [`ContractExecution`] log,
//! [`RicardianContract`], [`MigratedContract`], marketplace [`Template`]s and [`Escrow`]s.
//!
//! Records are plain data. All invariants are maintained by the managers in the `covenant` crate,
//! which hand out snapshot clones of these records and never expose their internal storage.

extern crate alloc;

#[macro_use]
extern crate amplify;

#[cfg(feature = "serde")]
#[macro_use]
extern crate serde;

mod ids;
mod value;
mod contract;
mod market;

pub use contract::{Code, ContractExecution, MigratedContract, RicardianContract, SmartContract};
pub use ids::{ContractId, EscrowId, ExecutionId, IdError, MigrationId, TemplateId, CONTRACT_ID_MAX_LEN};
pub use market::{Escrow, EscrowStatus, Template};
pub use value::{Blob, StateMap, Value};

/// Wall-clock timestamps used across all records.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
