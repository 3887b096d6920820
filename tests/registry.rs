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

#[macro_use]
extern crate amplify;

use std::io;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use covenant::{
    CallError, CallParams, Code, ContractId, ContractRegistry, ContractUpdate, DeployError, DeployParams, ErrorKind,
    ExecError, Ledger, MemLedger, SmartContract, StateMap, UpdateError, ValidationError, Value, STATE_BALANCES,
    STATE_EXECUTION_COUNT, STATE_LAST_EXECUTION_ID,
};

/// Ledger which fails all writes while `broken` is set.
#[derive(Default)]
struct FlakyLedger {
    inner: MemLedger,
    broken: AtomicBool,
}

impl FlakyLedger {
    fn set_broken(&self, broken: bool) { self.broken.store(broken, Ordering::SeqCst) }

    fn check(&self) -> io::Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(io::Error::other("disk is full"));
        }
        Ok(())
    }
}

impl Ledger for FlakyLedger {
    type Error = io::Error;

    fn deploy_contract(&self, contract: &SmartContract) -> Result<(), Self::Error> {
        self.check()?;
        self.inner.deploy_contract(contract).map_err(io::Error::other)
    }

    fn update_contract(&self, contract: &SmartContract) -> Result<(), Self::Error> {
        self.check()?;
        self.inner.update_contract(contract).map_err(io::Error::other)
    }

    fn contract_exists(&self, id: &ContractId) -> bool { self.inner.contract_exists(id) }

    fn contracts(&self) -> Result<Vec<SmartContract>, Self::Error> { self.inner.contracts().map_err(io::Error::other) }
}

fn balances(entries: &[(&str, i64)]) -> StateMap {
    let balances = entries
        .iter()
        .map(|(account, amount)| (account.to_string(), Value::Int(*amount)))
        .collect::<StateMap>();
    bmap! { STATE_BALANCES.to_owned() => Value::Map(balances) }
}

fn transfer(from: &str, to: &str, amount: i64) -> StateMap {
    bmap! {
        s!("from") => Value::from(from),
        s!("to") => Value::from(to),
        s!("amount") => Value::Int(amount),
    }
}

fn token<L: Ledger>(registry: &ContractRegistry<L>, owner: &str) -> ContractId {
    let mut params = DeployParams::new("token", "fungible token", owner);
    params.args = balances(&[(owner, 100)]);
    registry.deploy(params).unwrap()
}

#[test]
fn deploy_and_transfer() {
    let registry = ContractRegistry::new(MemLedger::new(), default!());
    let id = token(&registry, "alice");
    assert!(registry.contains(&id));
    assert!(registry.ledger().contract_exists(&id));

    let exec = registry
        .execute(&id, "transfer", transfer("alice", "bob", 30), "alice", 1000)
        .unwrap();
    assert_eq!(exec.contract_id, id);
    assert_eq!(exec.method, "transfer");
    assert_eq!(exec.executor, "alice");
    assert_eq!(exec.result["fromBalance"], Value::Int(70));
    assert!(exec.gas_used > 0 && exec.gas_used <= 1000);

    let contract = registry.contract(&id).unwrap();
    assert_eq!(contract.state[STATE_BALANCES], balances(&[("alice", 70), ("bob", 30)])[STATE_BALANCES]);
    assert_eq!(contract.state[STATE_EXECUTION_COUNT], Value::Int(1));
    assert_eq!(contract.state[STATE_LAST_EXECUTION_ID], Value::Str(exec.id.to_string()));
    assert_eq!(contract.executions, vec![exec.clone()]);
    assert_eq!(registry.execution(&id, exec.id), Some(exec));

    // The ledger keeps the committed version
    assert_eq!(registry.ledger().record(&id), Some(contract));
}

#[test]
fn call_with_default_gas() {
    let registry = ContractRegistry::new(MemLedger::new(), default!());
    let id = token(&registry, "alice");
    let params = CallParams {
        method: s!("increment"),
        params: bmap! { s!("key") => Value::from("counter") },
        caller: s!("bob"),
        gas_limit: None,
    };
    registry.call(&id, params.clone()).unwrap();
    registry.call(&id, params).unwrap();

    let contract = registry.contract(&id).unwrap();
    assert_eq!(contract.state["counter"], Value::Int(2));
    assert_eq!(contract.state[STATE_EXECUTION_COUNT], Value::Int(2));
    assert_eq!(registry.executions(&id).unwrap().len(), 2);
}

#[test]
fn deploy_validation() {
    let registry = ContractRegistry::new(MemLedger::new(), default!());
    for (name, code, owner) in [("", "code", "alice"), ("token", "", "alice"), ("token", "code", " ")] {
        let err = registry
            .deploy(DeployParams::new(name, code, owner))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    assert!(registry.is_empty());
    assert!(registry.ledger().is_empty());
}

#[test]
fn duplicate_explicit_id() {
    let registry = ContractRegistry::new(MemLedger::new(), default!());
    let id = ContractId::from_str("token.v1").unwrap();

    let mut params = DeployParams::new("token", "code", "alice");
    params.id = Some(id.clone());
    assert_eq!(registry.deploy(params.clone()), Ok(id.clone()));
    let first = registry.contract(&id).unwrap();

    params.owner = s!("mallory");
    params.code = Code::from("other code");
    assert_eq!(registry.deploy(params), Err(DeployError::Duplicate(id.clone())));
    assert_eq!(registry.contract(&id), Some(first));
    assert_eq!(registry.len(), 1);
}

#[test]
fn generated_ids_unique() {
    let registry = ContractRegistry::new(MemLedger::new(), default!());
    let a = registry
        .deploy(DeployParams::new("token", "code", "alice"))
        .unwrap();
    let b = registry
        .deploy(DeployParams::new("token", "code", "alice"))
        .unwrap();
    assert_ne!(a, b);
    assert_eq!(registry.len(), 2);
}

#[test]
fn unknown_method() {
    let registry = ContractRegistry::new(MemLedger::new(), default!());
    let id = token(&registry, "alice");
    let before = registry.contract(&id).unwrap();

    let err = registry
        .execute(&id, "mint", none!(), "alice", 1000)
        .unwrap_err();
    assert_eq!(err, ExecError::Call(CallError::UnknownMethod(s!("mint"))));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(registry.contract(&id), Some(before));
}

#[test]
fn gas_overrun() {
    let registry = ContractRegistry::new(MemLedger::new(), default!());
    let id = token(&registry, "alice");
    let before = registry.contract(&id).unwrap();

    let err = registry
        .execute(&id, "transfer", transfer("alice", "bob", 30), "alice", 150)
        .unwrap_err();
    assert!(matches!(err, ExecError::Call(CallError::OutOfGas { limit: 150, .. })));
    assert_eq!(err.kind(), ErrorKind::GasExceeded);
    assert_eq!(registry.contract(&id), Some(before));
}

#[test]
fn failed_method() {
    let registry = ContractRegistry::new(MemLedger::new(), default!());
    let id = token(&registry, "alice");
    let before = registry.contract(&id).unwrap();

    let err = registry
        .execute(&id, "transfer", transfer("alice", "bob", 101), "alice", 1000)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(registry.contract(&id), Some(before));
}

#[test]
fn unknown_contract() {
    let registry = ContractRegistry::new(MemLedger::new(), default!());
    let id = ContractId::generate("token", "alice");
    let err = registry
        .execute(&id, "noop", none!(), "alice", 1000)
        .unwrap_err();
    assert_eq!(err, ExecError::NotFound(id.clone()));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(registry.update(&id, default!()), Err(UpdateError::NotFound(id.clone())));
    assert!(registry.executions(&id).is_none());
}

#[test]
fn deactivation() {
    let registry = ContractRegistry::new(MemLedger::new(), default!());
    let id = token(&registry, "alice");
    registry.deactivate(&id).unwrap();
    assert!(!registry.ledger().record(&id).unwrap().is_active);

    let err = registry
        .execute(&id, "noop", none!(), "alice", 1000)
        .unwrap_err();
    assert_eq!(err, ExecError::Inactive(id.clone()));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = registry
        .update(&id, ContractUpdate { code: None, is_active: Some(true) })
        .unwrap_err();
    assert_eq!(err, UpdateError::Reactivation(id.clone()));
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert!(!registry.contract(&id).unwrap().is_active);
}

#[test]
fn code_update() {
    let registry = ContractRegistry::new(MemLedger::new(), default!());
    let id = token(&registry, "alice");
    let updated = registry
        .update(&id, ContractUpdate { code: Some(Code::from("fungible token v2")), is_active: None })
        .unwrap();
    assert_eq!(updated.code.as_text(), Some("fungible token v2"));
    assert_eq!(registry.ledger().record(&id), Some(updated));

    let err = registry
        .update(&id, ContractUpdate { code: Some(Code::from("")), is_active: None })
        .unwrap_err();
    assert_eq!(err, UpdateError::Validation(ValidationError::Empty("contract code")));
}

#[test]
fn listing() {
    let registry = ContractRegistry::new(MemLedger::new(), default!());
    let a1 = token(&registry, "alice");
    let b1 = token(&registry, "bob");
    let a2 = token(&registry, "alice");
    registry.deactivate(&a1).unwrap();

    let ids = |contracts: Vec<SmartContract>| contracts.into_iter().map(|c| c.id).collect::<Vec<_>>();
    assert_eq!(ids(registry.list(None, false)), vec![a1.clone(), b1.clone(), a2.clone()]);
    assert_eq!(ids(registry.list(None, true)), vec![b1.clone(), a2.clone()]);
    assert_eq!(ids(registry.list(Some("alice"), false)), vec![a1, a2.clone()]);
    assert_eq!(ids(registry.list(Some("alice"), true)), vec![a2]);
    assert!(registry.list(Some("carol"), false).is_empty());
}

#[test]
fn deploy_rollback() {
    let registry = ContractRegistry::new(FlakyLedger::default(), default!());
    registry.ledger().set_broken(true);

    let err = registry
        .deploy(DeployParams::new("token", "code", "alice"))
        .unwrap_err();
    assert!(matches!(err, DeployError::Persistence(_)));
    assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
    assert!(registry.is_empty());

    registry.ledger().set_broken(false);
    let id = registry
        .deploy(DeployParams::new("token", "code", "alice"))
        .unwrap();
    assert!(registry.contains(&id));
}

#[test]
fn execute_rollback() {
    let registry = ContractRegistry::new(FlakyLedger::default(), default!());
    let id = token(&registry, "alice");
    let before = registry.contract(&id).unwrap();

    registry.ledger().set_broken(true);
    let err = registry
        .execute(&id, "transfer", transfer("alice", "bob", 30), "alice", 1000)
        .unwrap_err();
    assert!(matches!(err, ExecError::Persistence(_)));
    assert_eq!(registry.contract(&id), Some(before.clone()));
    let err = registry.deactivate(&id).unwrap_err();
    assert!(matches!(err, UpdateError::Persistence(_)));
    assert_eq!(registry.contract(&id), Some(before));

    registry.ledger().set_broken(false);
    registry
        .execute(&id, "transfer", transfer("alice", "bob", 30), "alice", 1000)
        .unwrap();
    let contract = registry.contract(&id).unwrap();
    assert_eq!(contract.executions.len(), 1);
    assert_eq!(contract.state[STATE_EXECUTION_COUNT], Value::Int(1));
}

#[test]
fn reopen() {
    let registry = ContractRegistry::new(MemLedger::new(), default!());
    let a = token(&registry, "alice");
    let b = token(&registry, "bob");
    registry
        .execute(&a, "transfer", transfer("alice", "bob", 5), "alice", 1000)
        .unwrap();

    let ledger = MemLedger::new();
    for contract in registry.ledger().contracts().unwrap() {
        ledger.deploy_contract(&contract).unwrap();
    }
    let reopened = ContractRegistry::open(ledger, default!()).unwrap();
    assert_eq!(reopened.list(None, false), registry.list(None, false));
    assert_eq!(reopened.contract(&b), registry.contract(&b));

    // Execution counter continues from the persisted log
    reopened
        .execute(&a, "noop", none!(), "alice", 1000)
        .unwrap();
    assert_eq!(reopened.contract(&a).unwrap().state[STATE_EXECUTION_COUNT], Value::Int(2));
}
