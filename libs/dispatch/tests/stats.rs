//! Driver stats derived from the order history

mod support;

use chrono::{Duration, TimeZone, Utc};
use dispatch::{
    ErrorKind,
    actor::Session,
    lifecycle::StatusUpdate,
    models::{Order, OrderStatus},
};
use support::{Harness, start_time};

/// Create, claim and settle one order; `Accepted` leaves it active
async fn trip(
    h: &Harness,
    customer: &Session,
    driver: &Session,
    outcome: OrderStatus,
    final_price: Option<i64>,
) -> Order {
    h.clock.advance(Duration::minutes(1));
    let order = h.order(customer).await;
    h.market.accept_order(driver, order.id).await.unwrap();
    if outcome == OrderStatus::Accepted {
        return h.stored(order.id).await;
    }
    h.market
        .update_order_status(
            driver,
            order.id,
            StatusUpdate {
                status: outcome,
                final_price,
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn stats_summarize_the_full_history() {
    let h = Harness::new();
    let customer = h.customer("Anna").await;
    let driver = h.driver("Beat").await;

    h.clock.set(Utc.with_ymd_and_hms(2026, 2, 20, 8, 0, 0).unwrap());
    for _ in 0..3 {
        trip(&h, &customer, &driver, OrderStatus::Completed, Some(50)).await;
    }

    h.clock.set(start_time());
    for _ in 0..4 {
        trip(&h, &customer, &driver, OrderStatus::Completed, None).await;
    }
    let cancelled_a = trip(&h, &customer, &driver, OrderStatus::Cancelled, None).await;
    let cancelled_b = trip(&h, &customer, &driver, OrderStatus::Cancelled, None).await;
    let active = trip(&h, &customer, &driver, OrderStatus::Accepted, None).await;

    let stats = h.market.driver_stats(&driver, driver.user_id).await.unwrap();

    assert_eq!(stats.driver_id, driver.user_id);
    assert_eq!(stats.total_orders, 10);
    assert_eq!(stats.completed_orders, 7);
    assert_eq!(stats.active_orders, 1);
    assert_eq!(stats.completion_rate, 70);
    assert_eq!(stats.monthly_trips, 4);
    assert_eq!(stats.monthly_earnings, 4 * 35);
    assert_eq!(stats.total_earnings, 3 * 50 + 4 * 35);
    assert_eq!(stats.total_trips, Some(10));
    assert_eq!(stats.rating, Some(5.0));

    let recent: Vec<_> = stats.recent_orders.iter().map(|o| o.id).collect();
    assert_eq!(recent.len(), 5);
    assert_eq!(&recent[..3], &[active.id, cancelled_b.id, cancelled_a.id]);
    assert!(stats.recent_orders.iter().all(|o| o.customer_name == "Anna"));
    assert_eq!(stats.recent_orders[0].status, OrderStatus::Accepted);
    assert_eq!(stats.recent_orders[0].price, active.estimated_price);
}

#[tokio::test]
async fn month_boundary_is_inclusive() {
    let h = Harness::new();
    let customer = h.customer("Anna").await;
    let driver = h.driver("Beat").await;

    h.clock.set(Utc.with_ymd_and_hms(2026, 2, 28, 23, 58, 0).unwrap());
    trip(&h, &customer, &driver, OrderStatus::Completed, Some(80)).await;
    assert_eq!(h.now(), Utc.with_ymd_and_hms(2026, 2, 28, 23, 59, 0).unwrap());

    trip(&h, &customer, &driver, OrderStatus::Completed, Some(60)).await;
    assert_eq!(h.now(), Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());

    h.clock.set(start_time());
    let stats = h.market.driver_stats(&driver, driver.user_id).await.unwrap();

    assert_eq!(stats.monthly_trips, 1);
    assert_eq!(stats.monthly_earnings, 60);
    assert_eq!(stats.total_earnings, 140);
}

#[tokio::test]
async fn driver_without_orders_has_zeroed_stats() {
    let h = Harness::new();
    let driver = h.driver("Beat").await;

    let stats = h.market.driver_stats(&driver, driver.user_id).await.unwrap();

    assert_eq!(stats.total_orders, 0);
    assert_eq!(stats.completion_rate, 0);
    assert_eq!(stats.monthly_earnings, 0);
    assert!(stats.recent_orders.is_empty());
    assert_eq!(stats.total_trips, Some(0));
}

#[tokio::test]
async fn stats_are_private_to_the_driver() {
    let h = Harness::new();
    let customer = h.customer("Anna").await;
    let driver = h.driver("Beat").await;
    let other = h.driver("Dario").await;

    let err = h.market.driver_stats(&other, driver.user_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = h.market.driver_stats(&customer, driver.user_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let forged = Session::driver(customer.user_id);
    let err = h.market.driver_stats(&forged, customer.user_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}
