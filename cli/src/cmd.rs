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
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;
use covenant::{
    CallParams, Code, ContractId, ContractRegistry, ContractUpdate, DeployParams, EngineConfig, SmartContract,
    StateMap,
};
use covenant_persist_fs::LedgerDir;

use crate::dump::dump_ledger;

#[derive(Subcommand)]
pub enum Cmd {
    /// Initialize a new contract ledger
    Init {
        /// Ledger directory
        dir: PathBuf,

        /// TOML file with engine configuration; defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Deploy a new contract
    Deploy {
        /// Ledger directory
        dir: PathBuf,
        /// YAML file with the contract name, owner, code and constructor arguments
        params: PathBuf,
    },

    /// Make a contract call
    Call {
        /// Ledger directory
        dir: PathBuf,
        /// Contract to call
        contract: ContractId,
        /// YAML file with the method name, parameters, caller and optional gas limit
        call: PathBuf,
    },

    /// Print out a contract state
    State {
        /// Ledger directory
        dir: PathBuf,
        /// Contract id
        contract: ContractId,
    },

    /// Print out all executions of a contract
    History {
        /// Ledger directory
        dir: PathBuf,
        /// Contract id
        contract: ContractId,
    },

    /// List contracts in the ledger
    List {
        /// Ledger directory
        dir: PathBuf,

        /// List only contracts of a specific owner
        #[arg(short, long)]
        owner: Option<String>,

        /// List only active contracts
        #[arg(short, long)]
        active: bool,
    },

    /// Replace a contract code
    Update {
        /// Ledger directory
        dir: PathBuf,
        /// Contract id
        contract: ContractId,
        /// File with the new contract code
        code: PathBuf,
    },

    /// Deactivate a contract, preventing any further calls
    Deactivate {
        /// Ledger directory
        dir: PathBuf,
        /// Contract id
        contract: ContractId,
    },

    /// Dump ledger content into a directory of YAML files
    Dump {
        /// Remove the destination directory if it already exists
        #[arg(short, long)]
        force: bool,

        /// Ledger directory
        src: PathBuf,

        /// Destination directory; defaults to `dump` inside the ledger directory
        dst: Option<PathBuf>,
    },
}

impl Cmd {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self {
            Cmd::Init { dir, config } => init(dir, config.as_deref())?,
            Cmd::Deploy { dir, params } => deploy(dir, params)?,
            Cmd::Call { dir, contract, call: path } => call(dir, contract, path)?,
            Cmd::State { dir, contract } => state(dir, contract)?,
            Cmd::History { dir, contract } => history(dir, contract)?,
            Cmd::List { dir, owner, active } => list(dir, owner.as_deref(), *active)?,
            Cmd::Update { dir, contract, code } => update(dir, contract, code)?,
            Cmd::Deactivate { dir, contract } => deactivate(dir, contract)?,
            Cmd::Dump { force, src, dst } => {
                let dst = dst.clone().unwrap_or_else(|| src.join("dump"));
                dump_ledger(src, dst, *force)?
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeployForm {
    id: Option<ContractId>,
    name: String,
    /// Contract code in a textual form.
    code: String,
    owner: String,
    #[serde(default)]
    args: StateMap,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallForm {
    method: String,
    #[serde(default)]
    params: StateMap,
    caller: String,
    gas_limit: Option<u64>,
}

fn open(dir: &Path) -> anyhow::Result<ContractRegistry<LedgerDir>> {
    let ledger = LedgerDir::open(dir).with_context(|| format!("can't open ledger at '{}'", dir.display()))?;
    let config = ledger.config().clone();
    Ok(ContractRegistry::open(ledger, config)?)
}

fn contract(registry: &ContractRegistry<LedgerDir>, id: &ContractId) -> anyhow::Result<SmartContract> {
    registry
        .contract(id)
        .ok_or_else(|| anyhow::anyhow!("contract '{id}' is not found"))
}

fn init(dir: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let config: EngineConfig = match config {
        Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
        None => default!(),
    };
    let ledger = LedgerDir::create(dir, config)?;
    println!("Ledger initialized at '{}'", ledger.path().display());
    Ok(())
}

fn deploy(dir: &Path, form: &Path) -> anyhow::Result<()> {
    let registry = open(dir)?;
    let file = File::open(form)?;
    let form = serde_yaml::from_reader::<_, DeployForm>(file)?;
    let params =
        DeployParams { id: form.id, name: form.name, code: Code::from(form.code), owner: form.owner, args: form.args };
    let id = registry.deploy(params)?;
    println!("Contract ID: {id}");
    Ok(())
}

fn call(dir: &Path, id: &ContractId, form: &Path) -> anyhow::Result<()> {
    let registry = open(dir)?;
    let file = File::open(form)?;
    let form = serde_yaml::from_reader::<_, CallForm>(file)?;
    let params = CallParams { method: form.method, params: form.params, caller: form.caller, gas_limit: form.gas_limit };
    let execution = registry.call(id, params)?;
    println!("Execution ID: {}", execution.id);
    println!("Gas used: {}", execution.gas_used);
    print!("{}", serde_yaml::to_string(&execution.result)?);
    Ok(())
}

fn state(dir: &Path, id: &ContractId) -> anyhow::Result<()> {
    let registry = open(dir)?;
    let contract = contract(&registry, id)?;
    print!("{}", serde_yaml::to_string(&contract.state)?);
    Ok(())
}

fn history(dir: &Path, id: &ContractId) -> anyhow::Result<()> {
    let registry = open(dir)?;
    let contract = contract(&registry, id)?;
    print!("{}", serde_yaml::to_string(&contract.executions)?);
    Ok(())
}

fn list(dir: &Path, owner: Option<&str>, active_only: bool) -> anyhow::Result<()> {
    let registry = open(dir)?;
    for contract in registry.list(owner, active_only) {
        let status = if contract.is_active { "active" } else { "inactive" };
        println!(
            "{}\t{}\t{}\t{status}\t{} execution(s)",
            contract.id,
            contract.name,
            contract.owner,
            contract.executions.len()
        );
    }
    Ok(())
}

fn update(dir: &Path, id: &ContractId, code: &Path) -> anyhow::Result<()> {
    let registry = open(dir)?;
    let code = fs::read(code)?;
    registry.update(id, ContractUpdate { code: Some(Code::from(code)), is_active: None })?;
    println!("Contract {id} updated");
    Ok(())
}

fn deactivate(dir: &Path, id: &ContractId) -> anyhow::Result<()> {
    let registry = open(dir)?;
    registry.deactivate(id)?;
    println!("Contract {id} deactivated");
    Ok(())
}
