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

use covenant::{
    Code, ErrorKind, EscrowFilter, EscrowStatus, MarketError, TemplateId, TemplateMarketplace, TemplateParams,
    TemplateUpdate, ValidationError,
};

fn template(market: &TemplateMarketplace, price: f64) -> TemplateId {
    market
        .create_template(TemplateParams {
            name: s!("t1"),
            description: s!("Freelance service agreement"),
            creator: s!("bob"),
            code: Code::from("noop"),
            price,
        })
        .unwrap()
}

#[test]
fn purchase_and_release() {
    let market = TemplateMarketplace::new();
    let t1 = template(&market, 10.0);

    let e1 = market.purchase(t1, "carol", 10.0).unwrap();
    let escrow = market.escrow(e1).unwrap();
    assert_eq!(escrow.status, EscrowStatus::Active);
    assert_eq!(escrow.buyer, "carol");
    assert_eq!(escrow.seller, "bob");
    assert_eq!(escrow.resource_id, t1);
    assert_eq!(escrow.amount, 10.0);
    assert!(!escrow.is_released);

    let escrow = market.release(e1).unwrap();
    assert_eq!(escrow.status, EscrowStatus::Completed);
    assert!(escrow.is_released);
    assert!(!escrow.is_disputed);
    assert!(escrow.completed_at.is_some());
    assert_eq!(market.escrow(e1), Some(escrow));
}

#[test]
fn purchase_and_dispute() {
    let market = TemplateMarketplace::new();
    let t1 = template(&market, 10.0);
    let e2 = market.purchase(t1, "carol", 12.5).unwrap();

    let escrow = market.dispute(e2, "item not delivered").unwrap();
    assert_eq!(escrow.status, EscrowStatus::Disputed);
    assert!(escrow.is_disputed);
    assert!(!escrow.is_released);
    assert!(escrow.completed_at.is_none());
    assert_eq!(escrow.dispute_reason.as_deref(), Some("item not delivered"));

    // Disputes are terminal
    let err = market.release(e2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert!(matches!(market.dispute(e2, "again"), Err(MarketError::Transition { .. })));
    assert_eq!(market.escrow(e2), Some(escrow));
}

#[test]
fn second_release() {
    let market = TemplateMarketplace::new();
    let t1 = template(&market, 10.0);
    let e1 = market.purchase(t1, "carol", 10.0).unwrap();
    let released = market.release(e1).unwrap();

    let err = market.release(e1).unwrap_err();
    assert_eq!(err, MarketError::Transition { escrow: e1, status: EscrowStatus::Completed, action: "release" });
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let err = market.dispute(e1, "too late").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(market.escrow(e1), Some(released));
}

#[test]
fn purchase_validation() {
    let market = TemplateMarketplace::new();
    let t1 = template(&market, 10.0);

    assert_eq!(
        market.purchase(t1, "carol", 9.99),
        Err(MarketError::Validation(ValidationError::InsufficientAmount(9.99, 10.0)))
    );
    assert_eq!(
        market.purchase(t1, "bob", 10.0),
        Err(MarketError::Validation(ValidationError::SelfPurchase(s!("bob"))))
    );
    assert_eq!(market.purchase(t1, "carol", 0.0).unwrap_err().kind(), ErrorKind::Validation);
    assert_eq!(market.purchase(t1, "", 10.0).unwrap_err().kind(), ErrorKind::Validation);

    let unknown = TemplateId::new();
    assert_eq!(market.purchase(unknown, "carol", 10.0), Err(MarketError::TemplateNotFound(unknown)));
    assert!(market.escrows(&default!()).is_empty());
}

#[test]
fn template_validation() {
    let market = TemplateMarketplace::new();
    for (name, creator, price) in [("", "bob", 1.0), ("t1", "", 1.0), ("t1", "bob", 0.0), ("t1", "bob", f64::NAN)] {
        let err = market
            .create_template(TemplateParams {
                name: name.to_owned(),
                description: none!(),
                creator: creator.to_owned(),
                code: Code::from("noop"),
                price,
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    assert!(market.templates(None).is_empty());
}

#[test]
fn template_update() {
    let market = TemplateMarketplace::new();
    let t1 = template(&market, 10.0);
    let update = TemplateUpdate { description: Some(s!("Updated terms")), price: Some(15.0), ..default!() };
    let updated = market.update_template(t1, update).unwrap();
    assert_eq!(updated.description, "Updated terms");
    assert_eq!(updated.price, 15.0);
    assert_eq!(updated.code, Code::from("noop"));
    assert!(updated.updated_at.is_some());

    let err = market
        .update_template(t1, TemplateUpdate { price: Some(-1.0), ..default!() })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(market.template(t1), Some(updated));

    assert!(market.purchase(t1, "carol", 10.0).is_err());
    assert!(market.purchase(t1, "carol", 15.0).is_ok());
}

#[test]
fn template_removal() {
    let market = TemplateMarketplace::new();
    let t1 = template(&market, 10.0);
    let e1 = market.purchase(t1, "carol", 10.0).unwrap();

    assert_eq!(market.delete_template(t1), Err(MarketError::TemplateInUse(t1)));
    market.dispute(e1, "item not delivered").unwrap();
    assert_eq!(market.delete_template(t1).unwrap_err().kind(), ErrorKind::InvalidState);

    let t2 = template(&market, 5.0);
    let e2 = market.purchase(t2, "dave", 5.0).unwrap();
    market.release(e2).unwrap();
    assert_eq!(market.delete_template(t2).map(|t| t.id), Ok(t2));
    assert_eq!(market.template(t2), None);
    assert_eq!(market.delete_template(t2), Err(MarketError::TemplateNotFound(t2)));

    // Escrow history survives the removal of its template
    assert!(market.escrow(e2).is_some());
}

#[test]
fn filtering() {
    let market = TemplateMarketplace::new();
    let t1 = template(&market, 10.0);
    let e1 = market.purchase(t1, "carol", 10.0).unwrap();
    let e2 = market.purchase(t1, "dave", 10.0).unwrap();
    let e3 = market.purchase(t1, "carol", 11.0).unwrap();
    market.release(e1).unwrap();

    let ids = |filter: EscrowFilter| market.escrows(&filter).into_iter().map(|e| e.id).collect::<Vec<_>>();
    assert_eq!(ids(default!()), vec![e1, e2, e3]);
    assert_eq!(ids(EscrowFilter { buyer: Some(s!("carol")), ..default!() }), vec![e1, e3]);
    assert_eq!(ids(EscrowFilter { status: Some(EscrowStatus::Active), ..default!() }), vec![e2, e3]);
    assert_eq!(ids(EscrowFilter { seller: Some(s!("bob")), status: Some(EscrowStatus::Completed), ..default!() }), vec![e1]);
    assert!(ids(EscrowFilter { seller: Some(s!("carol")), ..default!() }).is_empty());

    assert_eq!(market.templates(Some("bob")).len(), 1);
    assert!(market.templates(Some("carol")).is_empty());
}
