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
    // TODO: Complete documentation
    // missing_docs,
    unused_variables,
    unused_mut,
    unused_imports,
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case
)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Ledger-backed contract lifecycle engine.
//!
//! The crate provides four independent managers, each owning a lock-guarded store and exposing its
//! operations through `&self`, so they can be shared across threads with [`std::sync::Arc`]:
//!
//! - [`ContractRegistry`] deploys smart contracts and executes their methods through an
//!   [`Executor`], persisting each committed change via a [`Ledger`];
//! - [`RicardianManager`] keeps contracts pairing legal prose with machine rules, which may execute
//!   only once every declared party has signed;
//! - [`MigrationManager`] records proposed code replacements for registry contracts;
//! - [`TemplateMarketplace`] sells contract templates through escrows.

extern crate alloc;

#[macro_use]
extern crate amplify;
#[macro_use]
extern crate log;

#[cfg(feature = "serde")]
#[macro_use]
extern crate serde;

pub use covenantapi::*;

mod error;
mod config;
mod ledger;
mod vm;
mod registry;
mod ricardian;
mod migration;
mod market;

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use config::{EngineConfig, GasSchedule};
pub use error::{ErrorKind, ValidationError};
pub use ledger::{Ledger, MemLedger, MemLedgerError};
pub use market::{EscrowFilter, MarketError, TemplateMarketplace, TemplateParams, TemplateUpdate};
pub use migration::{MigrationError, MigrationManager};
pub use registry::{
    CallParams, ContractRegistry, ContractUpdate, DeployError, DeployParams, ExecError, OpenError, UpdateError,
    STATE_EXECUTION_COUNT, STATE_LAST_EXECUTION_ID,
};
pub use ricardian::{Parties, RicardianError, RicardianManager};
pub use vm::{CallContext, CallError, EmbeddedMethod, EmbeddedProc, Executor, GasMeter, STATE_BALANCES};

// A panic inside one operation must not render the whole manager unusable; all mutations are
// applied to the guarded data only after they can no longer fail.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> { mutex.lock().unwrap_or_else(PoisonError::into_inner) }

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> { lock.read().unwrap_or_else(PoisonError::into_inner) }

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
