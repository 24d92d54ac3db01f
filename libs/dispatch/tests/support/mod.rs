//! Shared fixtures for the dispatch integration tests
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use dispatch::{
    DispatchConfig, Marketplace,
    actor::Session,
    clock::FixedClock,
    models::{LocationDraft, NewUser, Order, OrderDraft, OrderStatus, Role, Vehicle},
    pricing::ReferencePricing,
    store::{MemoryStore, OrderQuery, OrderStore, Store},
};

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
}

pub struct Harness {
    pub market: Marketplace,
    pub clock: Arc<FixedClock>,
    pub store: MemoryStore,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        Self::with_dyn_store(store.clone(), Arc::new(store))
    }

    /// Run the marketplace over `backend` while keeping `store` for direct
    /// inspection.
    pub fn with_dyn_store(store: MemoryStore, backend: Arc<dyn Store>) -> Self {
        let config = DispatchConfig::default();
        let clock = Arc::new(FixedClock::new(start_time()));
        let pricing = Arc::new(ReferencePricing::with_fixed_factor(config.pricing.clone(), 1.0));
        let market = Marketplace::new(backend, clock.clone(), pricing, config);
        Self { market, clock, store }
    }

    pub fn now(&self) -> DateTime<Utc> {
        use dispatch::clock::Clock;
        self.clock.now()
    }

    pub async fn customer(&self, name: &str) -> Session {
        let user = self
            .market
            .create_user(NewUser {
                email: format!("{}@example.ch", name.to_lowercase()),
                name: name.to_string(),
                phone: "+41 79 000 00 01".to_string(),
                role: Role::Customer,
                license_number: None,
                vehicle: None,
            })
            .await
            .expect("customer is created");
        Session::customer(user.id)
    }

    pub async fn driver(&self, name: &str) -> Session {
        let user = self
            .market
            .create_user(NewUser {
                email: format!("{}@drivers.ch", name.to_lowercase()),
                name: name.to_string(),
                phone: "+41 78 000 00 02".to_string(),
                role: Role::Driver,
                license_number: Some(format!("ZH-{name}")),
                vehicle: Some(vehicle()),
            })
            .await
            .expect("driver is created");
        Session::driver(user.id)
    }

    pub async fn driver_without_profile(&self, name: &str) -> Session {
        let user = self
            .market
            .create_user(NewUser {
                email: format!("{}@drivers.ch", name.to_lowercase()),
                name: name.to_string(),
                phone: String::new(),
                role: Role::Driver,
                license_number: None,
                vehicle: None,
            })
            .await
            .expect("driver is created");
        Session::driver(user.id)
    }

    pub fn draft(&self, passengers: i32) -> OrderDraft {
        self.draft_at(self.now() + Duration::hours(5), passengers)
    }

    pub fn draft_at(&self, pickup_at: DateTime<Utc>, passengers: i32) -> OrderDraft {
        draft_at(pickup_at, passengers)
    }

    pub async fn order(&self, customer: &Session) -> Order {
        self.market
            .create_order(customer, self.draft(2))
            .await
            .expect("order is created")
    }

    pub async fn stored(&self, order_id: uuid::Uuid) -> Order {
        self.store
            .get_order(order_id)
            .await
            .unwrap()
            .expect("order exists")
    }

    /// `driver_id` is set exactly for claimed statuses; cancelled orders may
    /// keep the driver they had.
    pub async fn assert_driver_invariant(&self) {
        let orders = self.store.find_orders(&OrderQuery::default()).await.unwrap();
        for order in orders {
            if order.status.requires_driver() {
                assert!(order.driver_id.is_some(), "{order:?}");
            } else if order.status == OrderStatus::Pending {
                assert!(order.driver_id.is_none(), "{order:?}");
            }
        }
    }
}

pub fn draft_at(pickup_at: DateTime<Utc>, passengers: i32) -> OrderDraft {
    OrderDraft {
        customer_name: None,
        customer_phone: None,
        customer_email: None,
        pickup: LocationDraft {
            address: "Flughafen Zurich, Terminal 1".to_string(),
            city: None,
            postal_code: Some("8058".to_string()),
            country: None,
        },
        destination: LocationDraft {
            address: "Bahnhofstrasse 10".to_string(),
            city: Some("Zurich".to_string()),
            postal_code: Some("8001".to_string()),
            country: None,
        },
        pickup_at,
        flight_number: Some("LX318".to_string()),
        airline: Some("Swiss".to_string()),
        passenger_count: passengers,
        luggage_count: Some(2),
        special_requirements: None,
        notes: None,
    }
}

pub fn vehicle() -> Vehicle {
    Vehicle {
        make: "Mercedes-Benz".to_string(),
        model: "V-Class".to_string(),
        year: 2022,
        color: "Black".to_string(),
        plate: "ZH 123456".to_string(),
        capacity: 7,
    }
}
