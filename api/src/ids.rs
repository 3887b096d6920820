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

use core::str::FromStr;

use uuid::Uuid;

/// Maximal number of characters in a [`ContractId`].
pub const CONTRACT_ID_MAX_LEN: usize = 128;

/// Namespace for the UUID v5 contract identifiers minted by [`ContractId::generate`].
const NAMESPACE_CONTRACT: Uuid = Uuid::from_bytes([
    0x6b, 0x1f, 0x3c, 0x52, 0x8e, 0x0d, 0x4a, 0x37, 0x9c, 0x41, 0x2e, 0x77, 0xd5, 0x08, 0xa3, 0x6f,
]);

#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum IdError {
    /// contract id must not be empty.
    Empty,

    /// contract id is longer than {0} characters.
    TooLong(usize),

    /// contract id must not start with a dot.
    LeadingDot,

    /// contract id contains invalid character '{0}'; only ASCII alphanumerics and `_.:-` are
    /// allowed.
    InvalidChar(char),

    /// '{0}' is not a valid UUID-based identifier.
    InvalidUuid(String),
}

/// Identifier of a smart or Ricardian contract.
///
/// Contract ids are either minted by [`ContractId::generate`] or provided explicitly by a caller,
/// in which case they are validated to be usable as file names by persistence backends.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
#[display(inner)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(try_from = "String", into = "String"))]
pub struct ContractId(String);

impl ContractId {
    /// Mints a fresh contract id as a UUID v5 derived from the contract name, its owner and a
    /// random nonce.
    pub fn generate(name: &str, owner: &str) -> Self {
        let nonce = Uuid::new_v4();
        let mut seed = Vec::with_capacity(name.len() + owner.len() + 18);
        seed.extend_from_slice(name.as_bytes());
        seed.push(0);
        seed.extend_from_slice(owner.as_bytes());
        seed.push(0);
        seed.extend_from_slice(nonce.as_bytes());
        Self(Uuid::new_v5(&NAMESPACE_CONTRACT, &seed).to_string())
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl FromStr for ContractId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        if s.chars().count() > CONTRACT_ID_MAX_LEN {
            return Err(IdError::TooLong(CONTRACT_ID_MAX_LEN));
        }
        if s.starts_with('.') {
            return Err(IdError::LeadingDot);
        }
        if let Some(c) = s
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '_' | '.' | ':' | '-'))
        {
            return Err(IdError::InvalidChar(c));
        }
        Ok(Self(s.to_owned()))
    }
}

impl TryFrom<String> for ContractId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> { Self::from_str(&value) }
}

impl From<ContractId> for String {
    fn from(id: ContractId) -> Self { id.0 }
}

macro_rules! uuid_id {
    ($(#[$attr:meta])* $name:ident, $ctor:expr) => {
        $(#[$attr])*
        #[derive(Wrapper, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, From)]
        #[wrapper(Deref)]
        #[display(inner)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
        pub struct $name(Uuid);

        impl $name {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self { Self($ctor) }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| IdError::InvalidUuid(s.to_owned()))
            }
        }
    };
}

uuid_id!(
    /// Identifier of a single contract execution.
    ///
    /// Execution ids are UUID v7 values; thus they are ordered by their creation time.
    ExecutionId,
    Uuid::now_v7()
);

uuid_id!(
    /// Identifier of a recorded contract migration.
    MigrationId,
    Uuid::new_v4()
);

uuid_id!(
    /// Identifier of a marketplace contract template.
    TemplateId,
    Uuid::new_v4()
);

uuid_id!(
    /// Identifier of an escrow created by a template purchase.
    EscrowId,
    Uuid::new_v4()
);
