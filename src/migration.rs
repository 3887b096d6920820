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

use std::sync::{Arc, Mutex};

use chrono::Utc;
use covenantapi::{Code, ContractId, MigratedContract, MigrationId, StateMap};
use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::{lock, ContractRegistry, EmbeddedProc, ErrorKind, Executor, Ledger, ValidationError};

/// Journal of contract migrations.
///
/// A migration only records the intent to replace a registry contract with new code: neither the
/// migrated contract is touched, nor the destination contract is deployed. The destination may be
/// deployed later with [`ContractRegistry::deploy_migrated`].
#[derive(Debug)]
pub struct MigrationManager<L: Ledger, E: Executor = EmbeddedProc> {
    registry: Arc<ContractRegistry<L, E>>,
    migrations: Mutex<IndexMap<MigrationId, MigratedContract>>,
}

impl<L: Ledger, E: Executor> MigrationManager<L, E> {
    pub fn new(registry: Arc<ContractRegistry<L, E>>) -> Self { Self { registry, migrations: none!() } }

    pub fn registry(&self) -> &Arc<ContractRegistry<L, E>> { &self.registry }

    /// Records a migration of a registry contract to new code and parameters, minting an id for
    /// the destination contract.
    pub fn migrate(
        &self,
        old_id: &ContractId,
        new_code: impl Into<Code>,
        new_params: StateMap,
    ) -> Result<(MigrationId, ContractId), MigrationError> {
        let new_code = new_code.into();
        if new_code.is_empty() {
            return Err(ValidationError::Empty("contract code").into());
        }
        let old = self
            .registry
            .contract(old_id)
            .ok_or_else(|| MigrationError::NotFound(old_id.clone()))?;

        let new_id = ContractId::generate(&old.name, &old.owner);
        let migration = MigratedContract {
            old_contract_id: old.id,
            new_contract_id: new_id.clone(),
            owner: old.owner,
            new_code,
            new_params,
            migrated_at: Utc::now(),
        };
        let id = self.record(MigrationId::new(), migration)?;
        Ok((id, new_id))
    }

    fn record(&self, id: MigrationId, migration: MigratedContract) -> Result<MigrationId, MigrationError> {
        let new_id = &migration.new_contract_id;
        let mut migrations = lock(&self.migrations);
        if new_id == &migration.old_contract_id
            || self.registry.contains(new_id)
            || self.registry.ledger().contract_exists(new_id)
            || migrations
                .values()
                .any(|other| &other.new_contract_id == new_id)
        {
            warn!("Rejected migration of contract {}: destination id {new_id} is already taken", migration.old_contract_id);
            return Err(MigrationError::Duplicate(new_id.clone()));
        }
        match migrations.entry(id) {
            Entry::Occupied(_) => {
                warn!("Rejected migration {id}: the id is already taken");
                Err(MigrationError::DuplicateMigration(id))
            }
            Entry::Vacant(entry) => {
                info!("Migration {id} of contract {} to {new_id} recorded", migration.old_contract_id);
                entry.insert(migration);
                Ok(id)
            }
        }
    }

    pub fn migration(&self, id: MigrationId) -> Option<MigratedContract> { lock(&self.migrations).get(&id).cloned() }

    /// Lists all migrations in the order they were recorded.
    pub fn list(&self) -> Vec<(MigrationId, MigratedContract)> {
        lock(&self.migrations)
            .iter()
            .map(|(id, migration)| (*id, migration.clone()))
            .collect()
    }

    /// Lists migrations of a specific contract in the order they were recorded.
    pub fn migrations_of(&self, old_id: &ContractId) -> Vec<(MigrationId, MigratedContract)> {
        lock(&self.migrations)
            .iter()
            .filter(|(_, migration)| &migration.old_contract_id == old_id)
            .map(|(id, migration)| (*id, migration.clone()))
            .collect()
    }

    pub fn len(&self) -> usize { lock(&self.migrations).len() }

    pub fn is_empty(&self) -> bool { lock(&self.migrations).is_empty() }
}

#[derive(Clone, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum MigrationError {
    #[from]
    #[display(inner)]
    Validation(ValidationError),

    /// contract '{0}' is not found.
    NotFound(ContractId),

    /// destination contract id '{0}' is already taken.
    Duplicate(ContractId),

    /// migration id {0} is already taken.
    DuplicateMigration(MigrationId),
}

impl MigrationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MigrationError::Validation(_) => ErrorKind::Validation,
            MigrationError::NotFound(_) => ErrorKind::NotFound,
            MigrationError::Duplicate(_) | MigrationError::DuplicateMigration(_) => ErrorKind::DuplicateId,
        }
    }
}

#[cfg(test)]
mod test {
    use covenantapi::SmartContract;

    use super::*;
    use crate::{DeployParams, MemLedger};

    fn setup() -> (MigrationManager<MemLedger>, ContractId) {
        let registry = Arc::new(ContractRegistry::new(MemLedger::new(), default!()));
        let id = registry
            .deploy(DeployParams::new("token", "v1", "alice"))
            .unwrap();
        (MigrationManager::new(registry), id)
    }

    fn migration(old: &ContractId, new: ContractId) -> MigratedContract {
        MigratedContract {
            old_contract_id: old.clone(),
            new_contract_id: new,
            owner: s!("alice"),
            new_code: "v2".into(),
            new_params: none!(),
            migrated_at: Utc::now(),
        }
    }

    #[test]
    fn destination_in_ledger_only() {
        let (manager, old) = setup();
        let taken = ContractId::generate("token", "alice");
        let stray = SmartContract::new(taken.clone(), "token", "v0".into(), "alice", none!());
        manager.registry().ledger().deploy_contract(&stray).unwrap();

        let err = manager
            .record(MigrationId::new(), migration(&old, taken.clone()))
            .unwrap_err();
        assert_eq!(err, MigrationError::Duplicate(taken));
        assert!(manager.is_empty());
    }

    #[test]
    fn destination_already_pending() {
        let (manager, old) = setup();
        let new_id = ContractId::generate("token", "alice");
        manager
            .record(MigrationId::new(), migration(&old, new_id.clone()))
            .unwrap();
        let err = manager
            .record(MigrationId::new(), migration(&old, new_id.clone()))
            .unwrap_err();
        assert_eq!(err, MigrationError::Duplicate(new_id));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn migration_id_collision() {
        let (manager, old) = setup();
        let id = manager
            .record(MigrationId::new(), migration(&old, ContractId::generate("token", "alice")))
            .unwrap();
        let first = manager.migration(id).unwrap();

        let err = manager
            .record(id, migration(&old, ContractId::generate("token", "alice")))
            .unwrap_err();
        assert_eq!(err, MigrationError::DuplicateMigration(id));
        assert_eq!(err.kind(), ErrorKind::DuplicateId);
        assert_eq!(manager.migration(id), Some(first));
    }
}
