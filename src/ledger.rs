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

use std::sync::Mutex;

use covenantapi::{ContractId, SmartContract};
use indexmap::IndexMap;

use crate::lock;

/// Durable storage for deployed smart contracts.
///
/// The engine calls into the ledger each time a contract record changes, and treats a mutation as
/// committed only once the ledger has accepted it. Implementations are expected to be
/// crash-consistent; the engine itself doesn't retry failed calls.
///
/// All methods take `&self` since a single ledger is shared by concurrent callers; each
/// implementation is responsible for its own synchronization.
pub trait Ledger: Send + Sync {
    type Error: core::error::Error + Send + Sync + 'static;

    /// Persists a newly deployed contract.
    ///
    /// # Blocking I/O
    ///
    /// This call MAY perform any I/O operations.
    fn deploy_contract(&self, contract: &SmartContract) -> Result<(), Self::Error>;

    /// Replaces a previously persisted contract record with a new version.
    ///
    /// # Blocking I/O
    ///
    /// This call MAY perform any I/O operations.
    fn update_contract(&self, contract: &SmartContract) -> Result<(), Self::Error>;

    /// Detects whether a contract with a given id is already persisted.
    ///
    /// # Blocking I/O
    ///
    /// This call MAY BE blocking.
    fn contract_exists(&self, id: &ContractId) -> bool;

    /// Reads all persisted contracts, in the order of their deployment when the backend keeps
    /// track of it.
    ///
    /// # Blocking I/O
    ///
    /// This call MAY perform any I/O operations.
    fn contracts(&self) -> Result<Vec<SmartContract>, Self::Error>;
}

/// Volatile in-memory ledger, useful for tests and for embedding the engine without persistence.
#[derive(Debug, Default)]
pub struct MemLedger {
    records: Mutex<IndexMap<ContractId, SmartContract>>,
}

impl MemLedger {
    pub fn new() -> Self { Self::default() }

    /// Returns the persisted version of a contract.
    pub fn record(&self, id: &ContractId) -> Option<SmartContract> { lock(&self.records).get(id).cloned() }

    pub fn len(&self) -> usize { lock(&self.records).len() }

    pub fn is_empty(&self) -> bool { lock(&self.records).is_empty() }
}

impl Ledger for MemLedger {
    type Error = MemLedgerError;

    fn deploy_contract(&self, contract: &SmartContract) -> Result<(), Self::Error> {
        let mut records = lock(&self.records);
        if records.contains_key(&contract.id) {
            return Err(MemLedgerError::AlreadyDeployed(contract.id.clone()));
        }
        records.insert(contract.id.clone(), contract.clone());
        Ok(())
    }

    fn update_contract(&self, contract: &SmartContract) -> Result<(), Self::Error> {
        let mut records = lock(&self.records);
        let Some(record) = records.get_mut(&contract.id) else {
            return Err(MemLedgerError::Unknown(contract.id.clone()));
        };
        *record = contract.clone();
        Ok(())
    }

    fn contract_exists(&self, id: &ContractId) -> bool { lock(&self.records).contains_key(id) }

    fn contracts(&self) -> Result<Vec<SmartContract>, Self::Error> {
        Ok(lock(&self.records).values().cloned().collect())
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum MemLedgerError {
    /// contract '{0}' is already present in the ledger.
    AlreadyDeployed(ContractId),

    /// contract '{0}' is not known to the ledger.
    Unknown(ContractId),
}
