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

use std::fs::{self, File};
use std::path::Path;

use anyhow::Context;
use covenant::{ContractExecution, ContractId, Ledger, SmartContract, StateMap, Timestamp};
use covenant_persist_fs::LedgerDir;

/// Contract record without its execution log, which is dumped into separate files.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContractHeader<'c> {
    id: &'c ContractId,
    name: &'c str,
    code: Option<&'c str>,
    code_len: usize,
    owner: &'c str,
    is_active: bool,
    deployed_at: Timestamp,
    executions: usize,
}

impl<'c> From<&'c SmartContract> for ContractHeader<'c> {
    fn from(contract: &'c SmartContract) -> Self {
        ContractHeader {
            id: &contract.id,
            name: &contract.name,
            code: contract.code.as_text(),
            code_len: contract.code.len(),
            owner: &contract.owner,
            is_active: contract.is_active,
            deployed_at: contract.deployed_at,
            executions: contract.executions.len(),
        }
    }
}

/// Makes an executor-provided method name usable as a part of a file name.
fn file_safe(method: &str) -> String {
    method
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

fn dump_contract(contract: &SmartContract, dst: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dst)?;

    let out = File::create_new(dst.join("contract.yaml"))?;
    serde_yaml::to_writer(&out, &ContractHeader::from(contract))?;

    let out = File::create_new(dst.join("state.yaml"))?;
    serde_yaml::to_writer::<_, StateMap>(&out, &contract.state)?;

    for (no, execution) in contract.executions.iter().enumerate() {
        let name = format!("{:04}-{}-{}.yaml", no + 1, file_safe(&execution.method), execution.id);
        let out = File::create_new(dst.join(name))?;
        serde_yaml::to_writer::<_, ContractExecution>(&out, execution)?;
    }
    Ok(())
}

pub fn dump_ledger(src: impl AsRef<Path>, dst: impl AsRef<Path>, force: bool) -> anyhow::Result<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if force {
        let _ = fs::remove_dir_all(dst);
    }
    fs::create_dir_all(dst)?;

    print!("Reading contract ledger from '{}' ... ", src.display());
    let ledger = LedgerDir::open(src)?;
    println!("success");

    let out = File::create_new(dst.join("meta.yaml")).context("can't create dump files; try to use the `--force` flag")?;
    serde_yaml::to_writer(&out, ledger.meta())?;

    print!("Processing contracts ... none found");
    for (no, contract) in ledger.contracts()?.iter().enumerate() {
        dump_contract(contract, &dst.join(format!("{:04}-{}", no + 1, contract.id)))?;
        print!("\rProcessing contracts ... {} processed", no + 1);
    }
    println!();

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn method_file_names() {
        assert_eq!(file_safe("transfer"), "transfer");
        assert_eq!(file_safe("set_owner-v2"), "set_owner-v2");
        assert_eq!(file_safe("../../etc/passwd"), "______etc_passwd");
        assert_eq!(file_safe("a/b\\c.d"), "a_b_c_d");
    }
}
