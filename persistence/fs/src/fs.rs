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
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use covenant::{ContractId, EngineConfig, Ledger, SmartContract, Timestamp};
use uuid::Uuid;

/// Version of the ledger directory layout.
pub const LEDGER_VERSION: u16 = 0;

/// Ledger-wide metadata kept in `ledger.toml`.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerMeta {
    pub version: u16,
    pub created_at: Timestamp,
    #[serde(default)]
    pub config: EngineConfig,
}

/// Ledger storing each contract record in a separate YAML file.
///
/// Records are replaced atomically: each write goes into a uniquely named temporary file, which is
/// then renamed over the previous version of the record.
#[derive(Clone, Debug)]
pub struct LedgerDir {
    path: PathBuf,
    meta: LedgerMeta,
}

impl LedgerDir {
    const FILENAME_META: &'static str = "ledger.toml";
    const DIR_CONTRACTS: &'static str = "contracts";
    const EXT_CONTRACT: &'static str = "yaml";
    const EXT_TMP: &'static str = "tmp";

    /// Initializes a new ledger in the `path` directory, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Fails if the directory already contains a ledger.
    pub fn create(path: impl Into<PathBuf>, config: EngineConfig) -> Result<Self, FsError> {
        let path = path.into();
        fs::create_dir_all(path.join(Self::DIR_CONTRACTS))?;

        let meta = LedgerMeta { version: LEDGER_VERSION, created_at: Utc::now(), config };
        let toml = toml::to_string(&meta)?;
        let mut file = File::create_new(path.join(Self::FILENAME_META))?;
        file.write_all(toml.as_bytes())?;
        file.sync_all()?;

        info!("Created ledger at '{}'", path.display());
        Ok(Self { path, meta })
    }

    /// Opens an existing ledger.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, FsError> {
        let path = path.into();
        let toml = fs::read_to_string(path.join(Self::FILENAME_META))?;
        let meta: LedgerMeta = toml::from_str(&toml)?;
        if meta.version != LEDGER_VERSION {
            return Err(FsError::Version(meta.version));
        }
        fs::create_dir_all(path.join(Self::DIR_CONTRACTS))?;
        debug!("Opened ledger at '{}' created at {}", path.display(), meta.created_at);
        Ok(Self { path, meta })
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn meta(&self) -> &LedgerMeta { &self.meta }

    pub fn config(&self) -> &EngineConfig { &self.meta.config }

    /// Path to the file holding a contract record.
    pub fn contract_path(&self, id: &ContractId) -> PathBuf {
        self.path
            .join(Self::DIR_CONTRACTS)
            .join(format!("{id}.{}", Self::EXT_CONTRACT))
    }

    /// Reads a single contract record.
    pub fn contract(&self, id: &ContractId) -> Result<SmartContract, FsError> {
        let file = File::open(self.contract_path(id))?;
        Ok(serde_yaml::from_reader(file)?)
    }

    fn write(&self, contract: &SmartContract) -> Result<(), FsError> {
        let dest = self.contract_path(&contract.id);
        let tmp = dest.with_extension(format!("{}.{}.{}", Self::EXT_CONTRACT, Uuid::new_v4().simple(), Self::EXT_TMP));
        let res = (|| -> Result<(), FsError> {
            let mut file = File::create_new(&tmp)?;
            serde_yaml::to_writer(&mut file, contract)?;
            file.sync_all()?;
            fs::rename(&tmp, &dest)?;
            Ok(())
        })();
        if res.is_err() {
            // the record is either absent or complete, so the leftover is safe to drop
            let _ = fs::remove_file(&tmp);
        }
        res
    }
}

impl Ledger for LedgerDir {
    type Error = FsError;

    fn deploy_contract(&self, contract: &SmartContract) -> Result<(), Self::Error> {
        if self.contract_exists(&contract.id) {
            return Err(FsError::AlreadyExists(contract.id.clone()));
        }
        self.write(contract)?;
        debug!("Contract {} written to '{}'", contract.id, self.path.display());
        Ok(())
    }

    fn update_contract(&self, contract: &SmartContract) -> Result<(), Self::Error> {
        if !self.contract_exists(&contract.id) {
            return Err(FsError::Unknown(contract.id.clone()));
        }
        self.write(contract)?;
        debug!("Contract {} updated in '{}'", contract.id, self.path.display());
        Ok(())
    }

    fn contract_exists(&self, id: &ContractId) -> bool { self.contract_path(id).is_file() }

    fn contracts(&self) -> Result<Vec<SmartContract>, Self::Error> {
        let mut contracts = vec![];
        for entry in fs::read_dir(self.path.join(Self::DIR_CONTRACTS))? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(Self::EXT_CONTRACT) {
                if path.extension().and_then(|ext| ext.to_str()) == Some(Self::EXT_TMP) {
                    warn!("Ignoring unfinished write '{}'", path.display());
                }
                continue;
            }
            let file = File::open(&path)?;
            let contract: SmartContract = serde_yaml::from_reader(file)?;
            contracts.push(contract);
        }
        contracts.sort_by(|a, b| a.deployed_at.cmp(&b.deployed_at).then_with(|| a.id.cmp(&b.id)));
        Ok(contracts)
    }
}

#[derive(Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum FsError {
    #[from]
    #[display(inner)]
    Io(io::Error),

    #[from]
    #[display(inner)]
    Yaml(serde_yaml::Error),

    #[from]
    #[display(inner)]
    TomlDecode(toml::de::Error),

    #[from]
    #[display(inner)]
    TomlEncode(toml::ser::Error),

    /// ledger directory has unsupported version {0}.
    Version(u16),

    /// contract '{0}' is already stored in the ledger.
    AlreadyExists(ContractId),

    /// contract '{0}' is not stored in the ledger.
    Unknown(ContractId),
}
