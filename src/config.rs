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

/// Gas prices charged by the built-in executor.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct GasSchedule {
    /// Base price of every call.
    pub call: u64,
    /// Price of reading a single state entry.
    pub read: u64,
    /// Price of writing or removing a single state entry.
    pub write: u64,
}

impl Default for GasSchedule {
    fn default() -> Self { GasSchedule { call: 100, read: 10, write: 40 } }
}

/// Engine-wide configuration shared by all managers.
///
/// Missing fields take their default values when deserialized, so a configuration file may list
/// only the options it overrides.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct EngineConfig {
    /// Gas limit used when a caller doesn't provide one, and for Ricardian contract executions.
    pub default_gas_limit: u64,
    /// Upper bound for any caller-provided gas limit.
    pub max_gas_limit: u64,
    /// Reject signatures from parties not declared by a Ricardian contract. When disabled such
    /// signatures are kept, but never count towards the quorum.
    pub reject_unknown_signers: bool,
    pub gas: GasSchedule,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_gas_limit: 10_000,
            max_gas_limit: 1_000_000,
            reject_unknown_signers: true,
            gas: default!(),
        }
    }
}
