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

use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use covenantapi::{ContractExecution, ContractId, RicardianContract, StateMap};
use indexmap::map::Entry;
use indexmap::{IndexMap, IndexSet};

use crate::error::non_empty;
use crate::registry::run;
use crate::{lock, read, write, CallContext, CallError, EmbeddedProc, EngineConfig, ErrorKind, Executor, ValidationError};

/// Registry of Ricardian contracts, which may execute only after every declared party has signed.
///
/// Ricardian contracts are kept in memory only.
#[derive(Debug)]
pub struct RicardianManager<E: Executor = EmbeddedProc> {
    executor: E,
    config: EngineConfig,
    contracts: RwLock<IndexMap<ContractId, Arc<Mutex<RicardianContract>>>>,
}

impl RicardianManager {
    pub fn new(config: EngineConfig) -> Self {
        let executor = EmbeddedProc::new(config.gas);
        Self::with_executor(executor, config)
    }
}

impl<E: Executor> RicardianManager<E> {
    pub fn with_executor(executor: E, config: EngineConfig) -> Self { Self { executor, config, contracts: none!() } }

    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn len(&self) -> usize { read(&self.contracts).len() }

    pub fn is_empty(&self) -> bool { read(&self.contracts).is_empty() }

    pub fn contract(&self, id: &ContractId) -> Option<RicardianContract> {
        self.record(id).map(|record| lock(&record).clone())
    }

    /// Lists contracts in the order of their deployment.
    pub fn list(&self) -> Vec<RicardianContract> {
        let records = read(&self.contracts).values().cloned().collect::<Vec<_>>();
        records.iter().map(|record| lock(record).clone()).collect()
    }

    pub fn is_fully_signed(&self, id: &ContractId) -> Option<bool> {
        self.record(id).map(|record| lock(&record).is_fully_signed())
    }

    /// Lists declared parties which haven't signed the contract yet, in their declaration order.
    pub fn missing_signatures(&self, id: &ContractId) -> Option<Vec<String>> {
        self.record(id)
            .map(|record| lock(&record).missing_signatures())
    }

    /// Deploys a new contract with no signatures. Repeated parties are counted once.
    pub fn deploy(
        &self,
        human_text: impl Into<String>,
        machine_text: impl Into<String>,
        parties: impl IntoIterator<Item = impl Into<String>>,
        owner: impl Into<String>,
    ) -> Result<ContractId, RicardianError> {
        let human_text = human_text.into();
        let machine_text = machine_text.into();
        let owner = owner.into();
        non_empty(&human_text, "human-readable text")?;
        non_empty(&machine_text, "machine-readable text")?;
        non_empty(&owner, "contract owner")?;
        let parties = parties.into_iter().map(Into::into).collect::<IndexSet<String>>();
        if parties.is_empty() {
            return Err(ValidationError::Empty("list of parties").into());
        }
        for party in &parties {
            non_empty(party, "party name")?;
        }

        let id = ContractId::generate("ricardian", &owner);
        let contract = RicardianContract {
            id: id.clone(),
            human_text,
            machine_text,
            parties,
            signatures: none!(),
            state: none!(),
            executions: none!(),
            owner,
            deployed_at: Utc::now(),
        };
        self.register(contract)
    }

    fn register(&self, contract: RicardianContract) -> Result<ContractId, RicardianError> {
        let id = contract.id.clone();
        match write(&self.contracts).entry(id.clone()) {
            Entry::Occupied(_) => {
                warn!("Rejected deployment of Ricardian contract {id}: the id is already taken");
                Err(RicardianError::Duplicate(id))
            }
            Entry::Vacant(entry) => {
                info!("Ricardian contract {id} deployed by {} with {} parties", contract.owner, contract.parties.len());
                entry.insert(Arc::new(Mutex::new(contract)));
                Ok(id)
            }
        }
    }

    /// Records a party signature, replacing any earlier signature of the same party.
    pub fn sign(&self, id: &ContractId, party: &str, signature: impl Into<String>) -> Result<(), RicardianError> {
        let signature = signature.into();
        non_empty(party, "party name")?;
        non_empty(&signature, "signature")?;

        let record = self
            .record(id)
            .ok_or_else(|| RicardianError::NotFound(id.clone()))?;
        let mut contract = lock(&record);
        if !contract.has_party(party) {
            if self.config.reject_unknown_signers {
                warn!("Rejected signature of '{party}', who is not a party of contract {id}");
                return Err(RicardianError::UnknownParty { contract: id.clone(), party: party.to_owned() });
            }
            warn!("Recording signature of '{party}', who is not a party of contract {id}; it doesn't count to quorum");
        }
        if contract
            .signatures
            .insert(party.to_owned(), signature)
            .is_some()
        {
            info!("Contract {id} signature by {party} replaced");
        } else {
            info!("Contract {id} signed by {party}");
        }
        Ok(())
    }

    /// Executes the contract machine text once every party has signed, using the configured
    /// default gas limit.
    ///
    /// The contract state and execution log are updated only if the execution succeeds.
    pub fn execute(
        &self,
        id: &ContractId,
        method: &str,
        params: StateMap,
        executor: &str,
    ) -> Result<ContractExecution, RicardianError> {
        non_empty(method, "method name")?;
        non_empty(executor, "executor")?;

        let record = self
            .record(id)
            .ok_or_else(|| RicardianError::NotFound(id.clone()))?;
        let mut contract = lock(&record);
        let missing = contract.missing_signatures();
        if !missing.is_empty() {
            warn!("Rejected call of '{method}' on contract {id}: {} signature(s) missing", missing.len());
            return Err(RicardianError::NotFullySigned(id.clone(), Parties(missing)));
        }

        let ctx = CallContext {
            contract_id: id,
            code: contract.machine_text.as_bytes(),
            method,
            params: &params,
            caller: executor,
        };
        let (state, execution) =
            run(&self.executor, ctx, &contract.state, contract.executions.len(), self.config.default_gas_limit)
                .map_err(|err| {
                    warn!("Call of '{method}' on contract {id} failed: {err}");
                    RicardianError::Call(err)
                })?;

        contract.state = state;
        contract.executions.push(execution.clone());
        info!("Ricardian contract {id} executed '{method}' for {executor}");
        Ok(execution)
    }

    fn record(&self, id: &ContractId) -> Option<Arc<Mutex<RicardianContract>>> { read(&self.contracts).get(id).cloned() }
}

/// List of contract parties.
#[derive(Wrapper, Clone, Eq, PartialEq, Hash, Debug, Default, From)]
#[wrapper(Deref)]
pub struct Parties(Vec<String>);

impl Display for Parties {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { f.write_str(&self.0.join(", ")) }
}

#[derive(Clone, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum RicardianError {
    #[from]
    #[display(inner)]
    Validation(ValidationError),

    /// Ricardian contract '{0}' is not found.
    NotFound(ContractId),

    /// Ricardian contract id '{0}' is already taken.
    Duplicate(ContractId),

    /// '{party}' is not a party of the contract '{contract}'.
    UnknownParty { contract: ContractId, party: String },

    /// contract '{0}' is not signed by {1}.
    NotFullySigned(ContractId, Parties),

    #[from]
    #[display(inner)]
    Call(CallError),
}

impl RicardianError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RicardianError::Validation(_) | RicardianError::UnknownParty { .. } => ErrorKind::Validation,
            RicardianError::NotFound(_) => ErrorKind::NotFound,
            RicardianError::Duplicate(_) => ErrorKind::DuplicateId,
            RicardianError::NotFullySigned(..) => ErrorKind::NotFullySigned,
            RicardianError::Call(err) => err.kind(),
        }
    }
}
