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

use alloc::collections::BTreeMap;

use chrono::Utc;
use indexmap::IndexSet;

use crate::{ContractId, ExecutionId, StateMap, Timestamp};

/// Opaque contract code.
///
/// The engine never interprets the code by itself; it is handed over to the executor together
/// with each call.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct Code(#[cfg_attr(feature = "serde", serde(with = "crate::value::hex_bytes"))] Vec<u8>);

impl Code {
    pub fn as_slice(&self) -> &[u8] { &self.0 }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Interprets the code as UTF-8 text, if possible.
    pub fn as_text(&self) -> Option<&str> { core::str::from_utf8(&self.0).ok() }
}

impl From<Vec<u8>> for Code {
    fn from(bytes: Vec<u8>) -> Self { Code(bytes) }
}

impl From<&str> for Code {
    fn from(text: &str) -> Self { Code(text.as_bytes().to_vec()) }
}

impl From<String> for Code {
    fn from(text: String) -> Self { Code(text.into_bytes()) }
}

/// Record of a single successful contract call.
///
/// Executions are immutable and are only ever appended to the log of the contract they belong to.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "camelCase"))]
pub struct ContractExecution {
    pub id: ExecutionId,
    pub contract_id: ContractId,
    pub method: String,
    pub params: StateMap,
    pub result: StateMap,
    pub gas_used: u64,
    pub executor: String,
    pub timestamp: Timestamp,
}

/// Deployed smart contract with its state and the complete log of its executions.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "camelCase"))]
pub struct SmartContract {
    pub id: ContractId,
    pub name: String,
    pub code: Code,
    pub owner: String,
    pub state: StateMap,
    pub executions: Vec<ContractExecution>,
    pub deployed_at: Timestamp,
    pub is_active: bool,
}

impl SmartContract {
    /// Constructs an active contract with the provided initial state and an empty execution log.
    pub fn new(id: ContractId, name: impl Into<String>, code: Code, owner: impl Into<String>, state: StateMap) -> Self {
        SmartContract {
            id,
            name: name.into(),
            code,
            owner: owner.into(),
            state,
            executions: vec![],
            deployed_at: Utc::now(),
            is_active: true,
        }
    }

    pub fn execution(&self, id: ExecutionId) -> Option<&ContractExecution> {
        self.executions.iter().find(|exec| exec.id == id)
    }

    pub fn last_execution(&self) -> Option<&ContractExecution> { self.executions.last() }
}

/// Contract with a human-readable legal text and a machine-readable rule set, which can be
/// executed only after all of its parties have signed it.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "camelCase"))]
pub struct RicardianContract {
    pub id: ContractId,
    pub human_text: String,
    pub machine_text: String,
    pub parties: IndexSet<String>,
    /// Signatures by party; each party has at most one (the latest) signature.
    pub signatures: BTreeMap<String, String>,
    pub state: StateMap,
    pub executions: Vec<ContractExecution>,
    pub owner: String,
    pub deployed_at: Timestamp,
}

impl RicardianContract {
    pub fn has_party(&self, party: &str) -> bool { self.parties.contains(party) }

    /// Parties which have not signed the contract yet, in the order of their declaration.
    pub fn missing_signatures(&self) -> Vec<String> {
        self.parties
            .iter()
            .filter(|party| !self.signatures.contains_key(*party))
            .cloned()
            .collect()
    }

    /// Detects whether every declared party has provided a signature.
    ///
    /// Signatures of parties outside of the declared set never count towards the quorum.
    pub fn is_fully_signed(&self) -> bool {
        self.parties
            .iter()
            .all(|party| self.signatures.contains_key(party))
    }
}

/// Fact of a contract migration to new code and parameters under a new contract id.
///
/// The migrated contract itself is never modified by the migration.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "camelCase"))]
pub struct MigratedContract {
    pub old_contract_id: ContractId,
    pub new_contract_id: ContractId,
    pub owner: String,
    pub new_code: Code,
    pub new_params: StateMap,
    pub migrated_at: Timestamp,
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;
    use crate::Value;

    fn ricardian(parties: &[&str]) -> RicardianContract {
        RicardianContract {
            id: ContractId::generate("nda", "alice"),
            human_text: s!("The parties agree not to disclose"),
            machine_text: s!("noop"),
            parties: parties.iter().map(|p| p.to_string()).collect(),
            signatures: none!(),
            state: none!(),
            executions: none!(),
            owner: s!("alice"),
            deployed_at: Utc::now(),
        }
    }

    #[test]
    fn quorum() {
        let mut contract = ricardian(&["A", "B"]);
        assert!(!contract.is_fully_signed());
        assert_eq!(contract.missing_signatures(), vec![s!("A"), s!("B")]);

        contract.signatures.insert(s!("A"), s!("sig-a"));
        contract.signatures.insert(s!("A"), s!("sig-a2"));
        contract.signatures.insert(s!("C"), s!("sig-c"));
        assert!(!contract.is_fully_signed());
        assert_eq!(contract.missing_signatures(), vec![s!("B")]);

        contract.signatures.insert(s!("B"), s!("sig-b"));
        assert!(contract.is_fully_signed());
        assert!(contract.missing_signatures().is_empty());
    }

    #[test]
    fn code_text() {
        let code = Code::from("fn transfer() {}");
        assert_eq!(code.as_text(), Some("fn transfer() {}"));
        assert_eq!(code.len(), 16);
        assert_eq!(Code::from(vec![0xFFu8, 0xFE]).as_text(), None);
    }

    #[test]
    fn new_contract_is_active() {
        let mut state = StateMap::new();
        state.insert(s!("supply"), Value::from(1000i64));
        let contract = SmartContract::new(ContractId::generate("token", "alice"), "token", Code::from("x"), "alice", state);
        assert!(contract.is_active);
        assert!(contract.executions.is_empty());
        assert!(contract.last_execution().is_none());
        assert_eq!(contract.state["supply"], Value::Int(1000));
    }
}
