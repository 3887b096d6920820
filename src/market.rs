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

use std::sync::Mutex;

use chrono::Utc;
use covenantapi::{Code, Escrow, EscrowId, EscrowStatus, Template, TemplateId};
use indexmap::IndexMap;

use crate::error::{non_empty, positive};
use crate::{lock, ErrorKind, ValidationError};

#[derive(Clone, PartialEq, Debug)]
pub struct TemplateParams {
    pub name: String,
    pub description: String,
    pub creator: String,
    pub code: Code,
    pub price: f64,
}

/// Changes to a listed template; absent fields are left as is.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct TemplateUpdate {
    pub description: Option<String>,
    pub code: Option<Code>,
    pub price: Option<f64>,
}

/// Escrow selection criteria; absent fields match any escrow.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct EscrowFilter {
    pub buyer: Option<String>,
    pub seller: Option<String>,
    pub status: Option<EscrowStatus>,
}

impl EscrowFilter {
    pub fn matches(&self, escrow: &Escrow) -> bool {
        self.buyer.as_ref().is_none_or(|buyer| &escrow.buyer == buyer)
            && self
                .seller
                .as_ref()
                .is_none_or(|seller| &escrow.seller == seller)
            && self.status.is_none_or(|status| escrow.status == status)
    }
}

#[derive(Debug, Default)]
struct Market {
    templates: IndexMap<TemplateId, Template>,
    escrows: IndexMap<EscrowId, Escrow>,
}

/// Marketplace selling contract templates, with each purchase settled through an [`Escrow`].
///
/// All templates and escrows are guarded by a single lock, so escrow transitions are linearized.
#[derive(Debug, Default)]
pub struct TemplateMarketplace {
    market: Mutex<Market>,
}

impl TemplateMarketplace {
    pub fn new() -> Self { Self::default() }

    pub fn template(&self, id: TemplateId) -> Option<Template> { lock(&self.market).templates.get(&id).cloned() }

    /// Lists templates in the order of their creation, optionally limited to a single creator.
    pub fn templates(&self, creator: Option<&str>) -> Vec<Template> {
        lock(&self.market)
            .templates
            .values()
            .filter(|template| creator.is_none_or(|creator| template.creator == creator))
            .cloned()
            .collect()
    }

    pub fn escrow(&self, id: EscrowId) -> Option<Escrow> { lock(&self.market).escrows.get(&id).cloned() }

    /// Lists escrows matching the filter in the order of their creation.
    pub fn escrows(&self, filter: &EscrowFilter) -> Vec<Escrow> {
        lock(&self.market)
            .escrows
            .values()
            .filter(|escrow| filter.matches(escrow))
            .cloned()
            .collect()
    }

    pub fn create_template(&self, params: TemplateParams) -> Result<TemplateId, MarketError> {
        non_empty(&params.name, "template name")?;
        non_empty(&params.creator, "template creator")?;
        positive(params.price, "template price")?;

        let id = TemplateId::new();
        let template = Template {
            id,
            name: params.name,
            description: params.description,
            creator: params.creator,
            code: params.code,
            price: params.price,
            created_at: Utc::now(),
            updated_at: None,
        };
        info!("Template {id} '{}' listed by {} for {}", template.name, template.creator, template.price);
        lock(&self.market).templates.insert(id, template);
        Ok(id)
    }

    pub fn update_template(&self, id: TemplateId, update: TemplateUpdate) -> Result<Template, MarketError> {
        if let Some(price) = update.price {
            positive(price, "template price")?;
        }

        let mut market = lock(&self.market);
        let template = market
            .templates
            .get_mut(&id)
            .ok_or(MarketError::TemplateNotFound(id))?;
        if let Some(description) = update.description {
            template.description = description;
        }
        if let Some(code) = update.code {
            template.code = code;
        }
        if let Some(price) = update.price {
            template.price = price;
        }
        template.updated_at = Some(Utc::now());
        info!("Template {id} updated");
        Ok(template.clone())
    }

    /// Removes a template from the marketplace. Templates with unsettled escrows can't be removed.
    pub fn delete_template(&self, id: TemplateId) -> Result<Template, MarketError> {
        let mut market = lock(&self.market);
        if !market.templates.contains_key(&id) {
            return Err(MarketError::TemplateNotFound(id));
        }
        if market
            .escrows
            .values()
            .any(|escrow| escrow.resource_id == id && escrow.is_open())
        {
            warn!("Rejected removal of template {id} with unsettled escrows");
            return Err(MarketError::TemplateInUse(id));
        }
        let template = market
            .templates
            .shift_remove(&id)
            .ok_or(MarketError::TemplateNotFound(id))?;
        info!("Template {id} removed");
        Ok(template)
    }

    /// Purchases a template, opening an active escrow from the buyer to the template creator.
    pub fn purchase(&self, template_id: TemplateId, buyer: &str, amount: f64) -> Result<EscrowId, MarketError> {
        non_empty(buyer, "buyer")?;
        positive(amount, "purchase amount")?;

        let mut market = lock(&self.market);
        let template = market
            .templates
            .get(&template_id)
            .ok_or(MarketError::TemplateNotFound(template_id))?;
        if amount < template.price {
            return Err(ValidationError::InsufficientAmount(amount, template.price).into());
        }
        if template.creator == buyer {
            return Err(ValidationError::SelfPurchase(buyer.to_owned()).into());
        }

        let escrow = Escrow::new(buyer, template.creator.clone(), amount, template_id);
        let id = escrow.id;
        info!("Template {template_id} purchased by {buyer} for {amount} under escrow {id}");
        market.escrows.insert(id, escrow);
        Ok(id)
    }

    /// Releases an active escrow to the seller, completing it.
    pub fn release(&self, id: EscrowId) -> Result<Escrow, MarketError> {
        let mut market = lock(&self.market);
        let escrow = active_escrow(&mut market, id, "release")?;
        escrow.is_released = true;
        escrow.status = EscrowStatus::Completed;
        escrow.completed_at = Some(Utc::now());
        info!("Escrow {id} released to {}", escrow.seller);
        Ok(escrow.clone())
    }

    /// Puts an active escrow into dispute. Disputed escrows can't be released.
    pub fn dispute(&self, id: EscrowId, reason: impl Into<String>) -> Result<Escrow, MarketError> {
        let mut market = lock(&self.market);
        let escrow = active_escrow(&mut market, id, "dispute")?;
        escrow.is_disputed = true;
        escrow.status = EscrowStatus::Disputed;
        escrow.dispute_reason = Some(reason.into());
        info!("Escrow {id} disputed");
        Ok(escrow.clone())
    }
}

fn active_escrow<'m>(market: &'m mut Market, id: EscrowId, action: &'static str) -> Result<&'m mut Escrow, MarketError> {
    let escrow = market
        .escrows
        .get_mut(&id)
        .ok_or(MarketError::EscrowNotFound(id))?;
    if escrow.status != EscrowStatus::Active {
        warn!("Rejected {action} of escrow {id} in {} status", escrow.status);
        return Err(MarketError::Transition { escrow: id, status: escrow.status, action });
    }
    Ok(escrow)
}

#[derive(Clone, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum MarketError {
    #[from]
    #[display(inner)]
    Validation(ValidationError),

    /// template '{0}' is not found.
    TemplateNotFound(TemplateId),

    /// escrow '{0}' is not found.
    EscrowNotFound(EscrowId),

    /// template '{0}' has unsettled escrows and can't be removed.
    TemplateInUse(TemplateId),

    /// escrow '{escrow}' is {status} and can't {action}.
    Transition { escrow: EscrowId, status: EscrowStatus, action: &'static str },
}

impl MarketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketError::Validation(_) => ErrorKind::Validation,
            MarketError::TemplateNotFound(_) | MarketError::EscrowNotFound(_) => ErrorKind::NotFound,
            MarketError::TemplateInUse(_) | MarketError::Transition { .. } => ErrorKind::InvalidState,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn filter() {
        let escrow = Escrow::new("carol", "bob", 10.0, TemplateId::new());
        assert!(EscrowFilter::default().matches(&escrow));
        assert!(EscrowFilter { buyer: Some(s!("carol")), ..default!() }.matches(&escrow));
        assert!(!EscrowFilter { seller: Some(s!("carol")), ..default!() }.matches(&escrow));
        assert!(!EscrowFilter { status: Some(EscrowStatus::Completed), ..default!() }.matches(&escrow));
    }

    #[test]
    fn price_validation() {
        let market = TemplateMarketplace::new();
        let params = TemplateParams {
            name: s!("NDA"),
            description: s!("Mutual non-disclosure agreement"),
            creator: s!("bob"),
            code: Code::from("noop"),
            price: -1.0,
        };
        let err = market.create_template(params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(market.templates(None).is_empty());
    }
}
