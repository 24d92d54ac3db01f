//! Order creation and status transitions

mod support;

use chrono::Duration;
use dispatch::{
    DispatchError, ErrorKind,
    actor::Session,
    lifecycle::StatusUpdate,
    listing::OrderFilters,
    models::{OrderStatus, Role},
    store::{OrderStore, StatusChange, StoreError},
};
use support::Harness;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn created_order_is_pending_and_priced() {
    let h = Harness::new();
    let customer = h.customer("Anna").await;

    let small = assert_ok!(h.market.create_order(&customer, h.draft(2)).await);
    let large = assert_ok!(h.market.create_order(&customer, h.draft(3)).await);

    assert_eq!(small.status, OrderStatus::Pending);
    assert_eq!(small.driver_id, None);
    assert_eq!(small.customer_id, customer.user_id);
    assert_eq!(small.created_at, h.now());
    assert_eq!(small.estimated_price, 35);
    assert_eq!(large.estimated_price, 42);
    assert_eq!(small.pickup.city, "Zurich");
    assert_eq!(small.pickup.country, "Switzerland");
}

#[tokio::test]
async fn contact_snapshot_defaults_to_the_profile() {
    let h = Harness::new();
    let customer = h.customer("Anna").await;

    let mut draft = h.draft(1);
    draft.customer_phone = Some("+41 44 555 12 12".to_string());
    let order = h.market.create_order(&customer, draft).await.unwrap();

    assert_eq!(order.customer_name, "Anna");
    assert_eq!(order.customer_email, "anna@example.ch");
    assert_eq!(order.customer_phone, "+41 44 555 12 12");
}

#[tokio::test]
async fn invalid_drafts_are_validation_errors() {
    let h = Harness::new();
    let customer = h.customer("Anna").await;

    let err = h.market.create_order(&customer, h.draft(9)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let past = h.draft_at(h.now() - Duration::minutes(5), 2);
    let err = h.market.create_order(&customer, past).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut no_pickup = h.draft(2);
    no_pickup.pickup.address = String::new();
    let err = h.market.create_order(&customer, no_pickup).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn drivers_cannot_create_orders() {
    let h = Harness::new();
    let driver = h.driver("Beat").await;

    let err = h.market.create_order(&driver, h.draft(2)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn claimed_role_must_match_the_stored_role() {
    let h = Harness::new();
    let customer = h.customer("Anna").await;
    let forged = Session {
        user_id: customer.user_id,
        role: Role::Driver,
    };

    let err = h.market.create_order(&forged, h.draft(2)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let unknown = Session::customer(uuid::Uuid::new_v4());
    let err = h.market.create_order(&unknown, h.draft(2)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn created_order_reads_back_unchanged() {
    let h = Harness::new();
    let customer = h.customer("Anna").await;
    let draft = h.draft(2);
    let created = h.market.create_order(&customer, draft.clone()).await.unwrap();

    let listed = h
        .market
        .list_orders(&customer, OrderFilters::default())
        .await
        .unwrap();

    assert_eq!(listed.len(), 1);
    let entry = &listed[0].order;
    assert_eq!(entry.id, created.id);
    assert_eq!(entry.status, OrderStatus::Pending);
    assert_eq!(entry.pickup, created.pickup);
    assert_eq!(entry.destination, created.destination);
    assert_eq!(entry.pickup_at, draft.pickup_at);
    assert_eq!(entry.flight_number.as_deref(), Some("LX318"));
    assert_eq!(entry.passenger_count, 2);
    assert_eq!(entry.luggage_count, 2);
}

#[tokio::test]
async fn full_trip_stamps_each_timestamp_once() {
    let h = Harness::new();
    let customer = h.customer("Anna").await;
    let driver = h.driver("Beat").await;
    let order = h.order(&customer).await;

    h.clock.advance(Duration::minutes(10));
    h.market.accept_order(&driver, order.id).await.unwrap();
    let accepted_at = h.now();

    h.clock.advance(Duration::hours(4));
    let started = h
        .market
        .update_order_status(&driver, order.id, StatusUpdate::to(OrderStatus::InProgress))
        .await
        .unwrap();
    assert_eq!(started.status, OrderStatus::InProgress);
    assert_eq!(started.accepted_at, Some(accepted_at));
    assert_eq!(started.completed_at, None);

    h.clock.advance(Duration::minutes(40));
    let done = h
        .market
        .update_order_status(
            &driver,
            order.id,
            StatusUpdate {
                status: OrderStatus::Completed,
                final_price: Some(48),
            },
        )
        .await
        .unwrap();

    assert_eq!(done.status, OrderStatus::Completed);
    assert_eq!(done.completed_at, Some(h.now()));
    assert_eq!(done.final_price, Some(48));
    assert_eq!(done.estimated_price, order.estimated_price);
    assert_eq!(done.accepted_at, Some(accepted_at));
    assert_eq!(done.created_at, order.created_at);
    h.assert_driver_invariant().await;
}

#[tokio::test]
async fn cancelling_an_accepted_order_keeps_the_driver_for_audit() {
    let h = Harness::new();
    let customer = h.customer("Anna").await;
    let driver = h.driver("Beat").await;
    let order = h.order(&customer).await;
    h.market.accept_order(&driver, order.id).await.unwrap();

    let cancelled = h
        .market
        .update_order_status(&customer, order.id, StatusUpdate::to(OrderStatus::Cancelled))
        .await
        .unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.driver_id, Some(driver.user_id));
    assert_eq!(cancelled.completed_at, None);
    h.assert_driver_invariant().await;
}

#[tokio::test]
async fn pending_and_accepted_cannot_be_requested() {
    let h = Harness::new();
    let customer = h.customer("Anna").await;
    let order = h.order(&customer).await;

    for target in [OrderStatus::Pending, OrderStatus::Accepted] {
        let err = h
            .market
            .update_order_status(&customer, order.id, StatusUpdate::to(target))
            .await
            .unwrap_err();
        assert!(
            matches!(err, DispatchError::InvalidTransition { from: OrderStatus::Pending, to } if to == target),
            "{err:?}"
        );
    }
}

#[tokio::test]
async fn pending_order_cannot_start_or_complete() {
    let h = Harness::new();
    let customer = h.customer("Anna").await;
    let order = h.order(&customer).await;

    for target in [OrderStatus::InProgress, OrderStatus::Completed] {
        let err = h
            .market
            .update_order_status(&customer, order.id, StatusUpdate::to(target))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }
}

#[tokio::test]
async fn terminal_orders_reject_every_status() {
    let h = Harness::new();
    let customer = h.customer("Anna").await;
    let driver = h.driver("Beat").await;

    let cancelled = h.order(&customer).await;
    h.market
        .update_order_status(&customer, cancelled.id, StatusUpdate::to(OrderStatus::Cancelled))
        .await
        .unwrap();

    let completed = h.order(&customer).await;
    h.market.accept_order(&driver, completed.id).await.unwrap();
    h.market
        .update_order_status(&driver, completed.id, StatusUpdate::to(OrderStatus::Completed))
        .await
        .unwrap();

    for order_id in [cancelled.id, completed.id] {
        let before = h.stored(order_id).await;
        for target in OrderStatus::ALL {
            let err = assert_err!(
                h.market
                    .update_order_status(&customer, order_id, StatusUpdate::to(target))
                    .await
            );
            assert_eq!(err.kind(), ErrorKind::InvalidTransition, "{} -> {target}", before.status);
        }
        assert_eq!(h.stored(order_id).await, before);
    }
}

#[tokio::test]
async fn only_parties_to_the_order_may_change_it() {
    let h = Harness::new();
    let customer = h.customer("Anna").await;
    let other_customer = h.customer("Carla").await;
    let driver = h.driver("Beat").await;
    let other_driver = h.driver("Dario").await;
    let order = h.order(&customer).await;

    let err = h
        .market
        .update_order_status(&other_customer, order.id, StatusUpdate::to(OrderStatus::Cancelled))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    h.market.accept_order(&driver, order.id).await.unwrap();
    let err = h
        .market
        .update_order_status(&other_driver, order.id, StatusUpdate::to(OrderStatus::InProgress))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let started = h
        .market
        .update_order_status(&customer, order.id, StatusUpdate::to(OrderStatus::InProgress))
        .await
        .unwrap();
    assert_eq!(started.status, OrderStatus::InProgress);
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let h = Harness::new();
    let customer = h.customer("Anna").await;

    let err = h
        .market
        .update_order_status(&customer, uuid::Uuid::new_v4(), StatusUpdate::to(OrderStatus::Cancelled))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn final_price_only_travels_with_completion() {
    let h = Harness::new();
    let customer = h.customer("Anna").await;
    let driver = h.driver("Beat").await;
    let order = h.order(&customer).await;
    h.market.accept_order(&driver, order.id).await.unwrap();

    let err = h
        .market
        .update_order_status(
            &driver,
            order.id,
            StatusUpdate {
                status: OrderStatus::InProgress,
                final_price: Some(50),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h
        .market
        .update_order_status(
            &driver,
            order.id,
            StatusUpdate {
                status: OrderStatus::Completed,
                final_price: Some(-1),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(h.stored(order.id).await.status, OrderStatus::Accepted);
}

#[tokio::test]
async fn stale_status_write_is_reported_not_applied() {
    let h = Harness::new();
    let customer = h.customer("Anna").await;
    let order = h.order(&customer).await;

    // Another writer cancels first; a second compare-and-set from pending must miss.
    let change = StatusChange {
        to: OrderStatus::Cancelled,
        at: h.now(),
        final_price: None,
    };
    assert!(h.store.transition_order(order.id, OrderStatus::Pending, change).await.unwrap().is_some());
    assert!(h.store.transition_order(order.id, OrderStatus::Pending, change).await.unwrap().is_none());

    let err = h
        .market
        .update_order_status(&customer, order.id, StatusUpdate::to(OrderStatus::Cancelled))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn memory_store_refuses_claimed_orders_without_a_driver() {
    let h = Harness::new();
    let customer = h.customer("Anna").await;
    let mut order = h.order(&customer).await;
    order.id = uuid::Uuid::new_v4();
    order.status = OrderStatus::InProgress;

    let err = assert_err!(h.store.insert_order(order).await);

    assert!(matches!(err, StoreError::Corrupt(_)), "{err:?}");
}
