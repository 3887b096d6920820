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

use chrono::Utc;

use crate::{Code, EscrowId, TemplateId, Timestamp};

/// Purchasable contract template listed in the marketplace.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "camelCase"))]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub description: String,
    pub creator: String,
    pub code: Code,
    pub price: f64,
    pub created_at: Timestamp,
    pub updated_at: Option<Timestamp>,
}

/// Lifecycle stage of an [`Escrow`].
///
/// ```text
///   active ──release──► completed
///     └────dispute────► disputed
/// ```
///
/// Both `completed` and `disputed` are terminal.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Default)]
#[display(lowercase)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "camelCase"))]
pub enum EscrowStatus {
    #[default]
    Active,
    Disputed,
    Completed,
}

/// Pending settlement between a buyer and a seller for a marketplace resource.
///
/// Escrow amounts are bookkeeping entries only; no value is moved by the escrow itself.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "camelCase"))]
pub struct Escrow {
    pub id: EscrowId,
    pub buyer: String,
    pub seller: String,
    pub amount: f64,
    pub resource_id: TemplateId,
    pub created_at: Timestamp,
    /// Set only when the escrow gets released.
    pub completed_at: Option<Timestamp>,
    pub is_released: bool,
    pub is_disputed: bool,
    pub status: EscrowStatus,
    pub dispute_reason: Option<String>,
}

impl Escrow {
    pub fn new(buyer: impl Into<String>, seller: impl Into<String>, amount: f64, resource_id: TemplateId) -> Self {
        Escrow {
            id: EscrowId::new(),
            buyer: buyer.into(),
            seller: seller.into(),
            amount,
            resource_id,
            created_at: Utc::now(),
            completed_at: None,
            is_released: false,
            is_disputed: false,
            status: EscrowStatus::Active,
            dispute_reason: None,
        }
    }

    /// Escrow is unsettled: either still active or stuck in a dispute.
    pub fn is_open(&self) -> bool { matches!(self.status, EscrowStatus::Active | EscrowStatus::Disputed) }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_display() {
        assert_eq!(EscrowStatus::Active.to_string(), "active");
        assert_eq!(EscrowStatus::Disputed.to_string(), "disputed");
        assert_eq!(EscrowStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn new_escrow_is_active() {
        let escrow = Escrow::new("carol", "bob", 10.0, TemplateId::new());
        assert_eq!(escrow.status, EscrowStatus::Active);
        assert!(!escrow.is_released);
        assert!(!escrow.is_disputed);
        assert!(escrow.completed_at.is_none());
        assert!(escrow.is_open());
    }
}
