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

use std::mem;
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use covenantapi::{
    Code, ContractExecution, ContractId, ExecutionId, MigratedContract, SmartContract, StateMap, Value,
};
use indexmap::IndexMap;

use crate::error::non_empty;
use crate::{
    lock, read, write, CallContext, CallError, EmbeddedProc, EngineConfig, ErrorKind, Executor, GasMeter, Ledger,
    ValidationError,
};

/// State key holding the id of the most recent execution of a contract.
pub const STATE_LAST_EXECUTION_ID: &str = "last_execution_id";
/// State key holding the number of executions of a contract.
pub const STATE_EXECUTION_COUNT: &str = "execution_count";

#[derive(Clone, PartialEq, Debug)]
pub struct DeployParams {
    /// Explicit contract id; when absent, a fresh one is generated.
    pub id: Option<ContractId>,
    pub name: String,
    pub code: Code,
    pub owner: String,
    /// Constructor arguments, which become the initial contract state.
    pub args: StateMap,
}

impl DeployParams {
    pub fn new(name: impl Into<String>, code: impl Into<Code>, owner: impl Into<String>) -> Self {
        DeployParams { id: None, name: name.into(), code: code.into(), owner: owner.into(), args: none!() }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct CallParams {
    pub method: String,
    pub params: StateMap,
    pub caller: String,
    /// Gas limit for the call; when absent, [`EngineConfig::default_gas_limit`] is used.
    pub gas_limit: Option<u64>,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct ContractUpdate {
    pub code: Option<Code>,
    pub is_active: Option<bool>,
}

/// Registry of deployed smart contracts.
///
/// Each contract lives behind its own mutex, so executions of different contracts never block each
/// other; the registry-wide lock is held only for lookups and during deployment.
#[derive(Debug)]
pub struct ContractRegistry<L: Ledger, E: Executor = EmbeddedProc> {
    ledger: L,
    executor: E,
    config: EngineConfig,
    contracts: RwLock<IndexMap<ContractId, Arc<Mutex<SmartContract>>>>,
}

impl<L: Ledger> ContractRegistry<L> {
    /// Constructs an empty registry executing contracts with the built-in [`EmbeddedProc`].
    pub fn new(ledger: L, config: EngineConfig) -> Self {
        let executor = EmbeddedProc::new(config.gas);
        Self::with_executor(ledger, executor, config)
    }

    /// Constructs a registry with all contracts already present in the ledger.
    ///
    /// # Blocking I/O
    ///
    /// Reads all contracts from the ledger.
    pub fn open(ledger: L, config: EngineConfig) -> Result<Self, OpenError> {
        let executor = EmbeddedProc::new(config.gas);
        Self::open_with_executor(ledger, executor, config)
    }
}

impl<L: Ledger, E: Executor> ContractRegistry<L, E> {
    pub fn with_executor(ledger: L, executor: E, config: EngineConfig) -> Self {
        Self { ledger, executor, config, contracts: none!() }
    }

    /// Constructs a registry with all contracts already present in the ledger, using a custom
    /// executor.
    ///
    /// # Blocking I/O
    ///
    /// Reads all contracts from the ledger.
    pub fn open_with_executor(ledger: L, executor: E, config: EngineConfig) -> Result<Self, OpenError> {
        let records = ledger
            .contracts()
            .map_err(|err| OpenError::Persistence(err.to_string()))?;
        let mut contracts = IndexMap::with_capacity(records.len());
        for contract in records {
            let id = contract.id.clone();
            if contracts
                .insert(id.clone(), Arc::new(Mutex::new(contract)))
                .is_some()
            {
                return Err(OpenError::Duplicate(id));
            }
        }
        info!("Opened contract registry with {} contract(s)", contracts.len());
        Ok(Self { ledger, executor, config, contracts: RwLock::new(contracts) })
    }

    pub fn ledger(&self) -> &L { &self.ledger }

    pub fn executor(&self) -> &E { &self.executor }

    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn len(&self) -> usize { read(&self.contracts).len() }

    pub fn is_empty(&self) -> bool { read(&self.contracts).is_empty() }

    pub fn contains(&self, id: &ContractId) -> bool { read(&self.contracts).contains_key(id) }

    /// Returns a snapshot of the contract record.
    pub fn contract(&self, id: &ContractId) -> Option<SmartContract> {
        self.record(id).map(|record| lock(&record).clone())
    }

    /// Lists contracts in the order of their deployment.
    pub fn list(&self, owner: Option<&str>, active_only: bool) -> Vec<SmartContract> {
        let records = read(&self.contracts).values().cloned().collect::<Vec<_>>();
        records
            .iter()
            .map(|record| lock(record).clone())
            .filter(|contract| owner.is_none_or(|owner| contract.owner == owner))
            .filter(|contract| !active_only || contract.is_active)
            .collect()
    }

    /// Returns the execution log of a contract, oldest first.
    pub fn executions(&self, id: &ContractId) -> Option<Vec<ContractExecution>> {
        self.record(id)
            .map(|record| lock(&record).executions.clone())
    }

    pub fn execution(&self, id: &ContractId, execution_id: ExecutionId) -> Option<ContractExecution> {
        let record = self.record(id)?;
        let contract = lock(&record);
        contract.execution(execution_id).cloned()
    }

    /// Deploys a new contract, returning its id.
    ///
    /// # Blocking I/O
    ///
    /// Writes the contract into the ledger; the registry remains locked for deployments for the
    /// duration of the write.
    pub fn deploy(&self, params: DeployParams) -> Result<ContractId, DeployError> {
        non_empty(&params.name, "contract name")?;
        non_empty(&params.owner, "contract owner")?;
        if params.code.is_empty() {
            return Err(ValidationError::Empty("contract code").into());
        }
        let id = match params.id {
            Some(id) => id,
            None => ContractId::generate(&params.name, &params.owner),
        };
        self.register(SmartContract::new(id, params.name, params.code, params.owner, params.args))
    }

    /// Deploys the destination of a recorded migration under the migrated id, code and
    /// parameters, owned by the migration owner.
    ///
    /// # Blocking I/O
    ///
    /// Writes the contract into the ledger.
    pub fn deploy_migrated(&self, migration: &MigratedContract, name: impl Into<String>) -> Result<ContractId, DeployError> {
        let name = name.into();
        non_empty(&name, "contract name")?;
        if migration.new_code.is_empty() {
            return Err(ValidationError::Empty("contract code").into());
        }
        let contract = SmartContract::new(
            migration.new_contract_id.clone(),
            name,
            migration.new_code.clone(),
            migration.owner.clone(),
            migration.new_params.clone(),
        );
        let id = self.register(contract)?;
        info!("Contract {id} deployed as a migration of {}", migration.old_contract_id);
        Ok(id)
    }

    fn register(&self, contract: SmartContract) -> Result<ContractId, DeployError> {
        let mut contracts = write(&self.contracts);
        let id = contract.id.clone();
        if contracts.contains_key(&id) || self.ledger.contract_exists(&id) {
            warn!("Rejected deployment of contract {id}: the id is already taken");
            return Err(DeployError::Duplicate(id));
        }
        self.ledger.deploy_contract(&contract).map_err(|err| {
            warn!("Unable to persist contract {id}: {err}");
            DeployError::Persistence(err.to_string())
        })?;
        info!("Contract {id} '{}' deployed by {}", contract.name, contract.owner);
        contracts.insert(id.clone(), Arc::new(Mutex::new(contract)));
        Ok(id)
    }

    /// Executes a contract method on behalf of `caller`, using gas limit from `params` or the
    /// configured default.
    ///
    /// # Blocking I/O
    ///
    /// Writes the updated contract into the ledger.
    pub fn call(&self, id: &ContractId, params: CallParams) -> Result<ContractExecution, ExecError> {
        let gas_limit = params.gas_limit.unwrap_or(self.config.default_gas_limit);
        self.execute(id, &params.method, params.params, &params.caller, gas_limit)
    }

    /// Executes a contract method on behalf of `caller`.
    ///
    /// The method runs against a working copy of the contract state, which replaces the contract
    /// state only if both the execution and the ledger update succeed. On any failure the contract,
    /// including its execution log, remains unchanged.
    ///
    /// # Blocking I/O
    ///
    /// Writes the updated contract into the ledger while holding the lock on this contract only.
    pub fn execute(
        &self,
        id: &ContractId,
        method: &str,
        params: StateMap,
        caller: &str,
        gas_limit: u64,
    ) -> Result<ContractExecution, ExecError> {
        check_gas_limit(gas_limit, &self.config)?;
        non_empty(method, "method name")?;
        non_empty(caller, "caller")?;

        let record = self
            .record(id)
            .ok_or_else(|| ExecError::NotFound(id.clone()))?;
        let mut contract = lock(&record);
        if !contract.is_active {
            warn!("Rejected call of '{method}' on inactive contract {id}");
            return Err(ExecError::Inactive(id.clone()));
        }

        let ctx = CallContext { contract_id: id, code: contract.code.as_slice(), method, params: &params, caller };
        let (state, execution) = run(&self.executor, ctx, &contract.state, contract.executions.len(), gas_limit)
            .map_err(|err| {
                warn!("Call of '{method}' on contract {id} failed: {err}");
                ExecError::Call(err)
            })?;

        let prev_state = mem::replace(&mut contract.state, state);
        contract.executions.push(execution.clone());
        if let Err(err) = self.ledger.update_contract(&contract) {
            contract.executions.pop();
            contract.state = prev_state;
            warn!("Unable to persist execution {} of contract {id}: {err}", execution.id);
            return Err(ExecError::Persistence(err.to_string()));
        }

        info!("Contract {id} executed '{method}' for {caller} using {} gas", execution.gas_used);
        Ok(execution)
    }

    /// Updates contract code or activity flag. Deactivation is irreversible.
    ///
    /// # Blocking I/O
    ///
    /// Writes the updated contract into the ledger, unless the update is a no-op.
    pub fn update(&self, id: &ContractId, update: ContractUpdate) -> Result<SmartContract, UpdateError> {
        if update.code.as_ref().is_some_and(Code::is_empty) {
            return Err(ValidationError::Empty("contract code").into());
        }

        let record = self
            .record(id)
            .ok_or_else(|| UpdateError::NotFound(id.clone()))?;
        let mut contract = lock(&record);
        if update.is_active == Some(true) && !contract.is_active {
            warn!("Rejected reactivation of contract {id}");
            return Err(UpdateError::Reactivation(id.clone()));
        }

        let mut candidate = contract.clone();
        if let Some(code) = update.code {
            candidate.code = code;
        }
        if let Some(is_active) = update.is_active {
            candidate.is_active = is_active;
        }
        if candidate == *contract {
            debug!("Update of contract {id} changes nothing");
            return Ok(candidate);
        }

        self.ledger.update_contract(&candidate).map_err(|err| {
            warn!("Unable to persist update of contract {id}: {err}");
            UpdateError::Persistence(err.to_string())
        })?;
        *contract = candidate.clone();
        if contract.is_active {
            info!("Contract {id} updated");
        } else {
            info!("Contract {id} is deactivated");
        }
        Ok(candidate)
    }

    /// Deactivates a contract, preventing any further executions. Deactivating an inactive
    /// contract does nothing.
    ///
    /// # Blocking I/O
    ///
    /// Writes the updated contract into the ledger.
    pub fn deactivate(&self, id: &ContractId) -> Result<(), UpdateError> {
        self.update(id, ContractUpdate { code: None, is_active: Some(false) })
            .map(|_| ())
    }

    fn record(&self, id: &ContractId) -> Option<Arc<Mutex<SmartContract>>> { read(&self.contracts).get(id).cloned() }
}

pub(crate) fn check_gas_limit(gas_limit: u64, config: &EngineConfig) -> Result<(), ValidationError> {
    if gas_limit > config.max_gas_limit {
        return Err(ValidationError::GasLimit(gas_limit, config.max_gas_limit));
    }
    Ok(())
}

/// Runs a call against a copy of `state`, returning the new state together with the execution
/// record. `prior` is the number of executions preceding this one.
pub(crate) fn run(
    executor: &impl Executor,
    ctx: CallContext<'_>,
    state: &StateMap,
    prior: usize,
    gas_limit: u64,
) -> Result<(StateMap, ContractExecution), CallError> {
    let mut state = state.clone();
    let mut meter = GasMeter::new(gas_limit);
    let result = executor.call(ctx, &mut state, &mut meter)?;

    let execution = ContractExecution {
        id: ExecutionId::new(),
        contract_id: ctx.contract_id.clone(),
        method: ctx.method.to_owned(),
        params: ctx.params.clone(),
        result,
        gas_used: meter.used(),
        executor: ctx.caller.to_owned(),
        timestamp: Utc::now(),
    };
    let count = i64::try_from(prior).unwrap_or(i64::MAX).saturating_add(1);
    state.insert(STATE_LAST_EXECUTION_ID.to_owned(), Value::Str(execution.id.to_string()));
    state.insert(STATE_EXECUTION_COUNT.to_owned(), Value::Int(count));
    Ok((state, execution))
}

#[derive(Clone, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum DeployError {
    #[from]
    #[display(inner)]
    Validation(ValidationError),

    /// contract with id '{0}' already exists.
    Duplicate(ContractId),

    /// unable to persist the contract - {0}
    Persistence(String),
}

impl DeployError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeployError::Validation(_) => ErrorKind::Validation,
            DeployError::Duplicate(_) => ErrorKind::DuplicateId,
            DeployError::Persistence(_) => ErrorKind::PersistenceFailure,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum ExecError {
    #[from]
    #[display(inner)]
    Validation(ValidationError),

    /// contract '{0}' is not found.
    NotFound(ContractId),

    /// contract '{0}' is deactivated.
    Inactive(ContractId),

    #[from]
    #[display(inner)]
    Call(CallError),

    /// unable to persist the execution - {0}
    Persistence(String),
}

impl ExecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecError::Validation(_) => ErrorKind::Validation,
            ExecError::NotFound(_) | ExecError::Inactive(_) => ErrorKind::NotFound,
            ExecError::Call(err) => err.kind(),
            ExecError::Persistence(_) => ErrorKind::PersistenceFailure,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum UpdateError {
    #[from]
    #[display(inner)]
    Validation(ValidationError),

    /// contract '{0}' is not found.
    NotFound(ContractId),

    /// contract '{0}' is deactivated and can't be activated again.
    Reactivation(ContractId),

    /// unable to persist the contract update - {0}
    Persistence(String),
}

impl UpdateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UpdateError::Validation(_) => ErrorKind::Validation,
            UpdateError::NotFound(_) => ErrorKind::NotFound,
            UpdateError::Reactivation(_) => ErrorKind::InvalidState,
            UpdateError::Persistence(_) => ErrorKind::PersistenceFailure,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum OpenError {
    /// unable to read contracts from the ledger - {0}
    Persistence(String),

    /// ledger contains contract '{0}' more than once.
    Duplicate(ContractId),
}

impl OpenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OpenError::Persistence(_) => ErrorKind::PersistenceFailure,
            OpenError::Duplicate(_) => ErrorKind::DuplicateId,
        }
    }
}
