use chrono::{NaiveDate, NaiveTime};
use ride_core::notify::Notifier;
use ride_core::payment::{PaymentProof, SignatureVerifier};
use ride_core::{CoreError, FailureCode};
use ride_engine::Engine;
use ride_shared::{
    Booking, BookingRequest, BookingStatus, CancellationReason, DriverProfile, NotificationEvent,
    Ride, RideSpec, RideStatus, RideUpdate, Vehicle,
};
use ride_store::MemoryStore;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

const SECRET: &str = "integration_secret";

struct World {
    store: Arc<MemoryStore>,
    engine: Engine,
    events: UnboundedReceiver<NotificationEvent>,
    driver_id: Uuid,
    vehicle_id: Uuid,
}

impl World {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let driver_id = Uuid::new_v4();
        let vehicle_id = Uuid::new_v4();
        store.seed_driver(DriverProfile {
            id: driver_id,
            first_name: "Meera".to_string(),
            last_name: "Nair".to_string(),
            phone: Some("9845012345".to_string()),
        });
        store.seed_vehicle(Vehicle {
            id: vehicle_id,
            driver_id,
            company: "Toyota".to_string(),
            model: "Innova".to_string(),
            colour: "Silver".to_string(),
            car_number: "KA05MN4321".to_string(),
            seats: 7,
            has_ac: true,
            is_active: true,
        });

        let (notifier, events) = Notifier::channel();
        let engine = Engine::with_memory_store(store.clone(), SignatureVerifier::new(SECRET), notifier);
        Self {
            store,
            engine,
            events,
            driver_id,
            vehicle_id,
        }
    }

    fn spec(&self, total_seats: i32) -> RideSpec {
        RideSpec {
            vehicle_id: self.vehicle_id,
            from_city: "Bengaluru".to_string(),
            to_city: "Chennai".to_string(),
            pickup_points: vec!["Majestic".to_string(), "KR Puram".to_string()],
            drop_points: vec!["Koyambedu".to_string()],
            travel_date: date(),
            departure_time: NaiveTime::from_hms_opt(6, 30, 0).unwrap(),
            total_seats,
            base_fare: 50_000,
            fare_per_km: 1_100,
        }
    }

    async fn ride(&self, total_seats: i32) -> Ride {
        self.engine.post_ride(self.driver_id, self.spec(total_seats)).await.unwrap()
    }

    async fn book(&self, ride: &Ride, passenger_id: Uuid, seats: i32) -> Result<Booking, CoreError> {
        self.engine.create_booking(passenger_id, request(ride, seats)).await
    }

    async fn available(&self, ride_id: Uuid) -> i32 {
        self.engine.get_ride(ride_id).await.unwrap().available_seats
    }

    async fn assert_balanced(&self, ride_id: Uuid) {
        let audit = self.store.audit_ride(ride_id).await.unwrap();
        assert!(audit.is_balanced(), "unbalanced ledger: {:?}", audit);
    }

    fn drain_events(&mut self) -> Vec<NotificationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 12, 18).unwrap()
}

fn request(ride: &Ride, seats: i32) -> BookingRequest {
    BookingRequest {
        ride_id: ride.id,
        pickup_location: "Majestic".to_string(),
        drop_location: "Koyambedu".to_string(),
        seats_booked: seats,
        total_fare: 50_000 * seats as i64,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_exhaustion_single_winner() {
    let world = World::new();

    for _ in 0..25 {
        let ride = world.ride(1).await;

        let first = tokio::spawn({
            let engine = world.engine.clone();
            let req = request(&ride, 1);
            async move { engine.create_booking(Uuid::new_v4(), req).await }
        });
        let second = tokio::spawn({
            let engine = world.engine.clone();
            let req = request(&ride, 1);
            async move { engine.create_booking(Uuid::new_v4(), req).await }
        });
        let outcomes = [first.await.unwrap(), second.await.unwrap()];

        let winners = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        let loser = outcomes.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert_eq!(loser.code(), FailureCode::InsufficientSeats);
        assert_eq!(world.available(ride.id).await, 0);
        world.assert_balanced(ride.id).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_overbooking_under_mixed_load() {
    let world = World::new();
    let ride = world.ride(6).await;

    let mut handles = Vec::new();
    for i in 0..48 {
        let engine = world.engine.clone();
        let req = request(&ride, 1 + (i % 3));
        let driver_id = world.driver_id;
        handles.push(tokio::spawn(async move {
            let passenger_id = Uuid::new_v4();
            let Ok(booking) = engine.create_booking(passenger_id, req).await else {
                return;
            };
            let _ = match i % 4 {
                0 => engine.cancel_booking(booking.id, passenger_id).await,
                1 => engine.reject_booking(booking.id, driver_id).await,
                2 => engine.approve_booking(booking.id, driver_id).await,
                _ => engine.confirm_payment(booking.id, &format!("pay_{}", i)).await,
            };
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let audit = world.store.audit_ride(ride.id).await.unwrap();
    assert!((0..=6).contains(&audit.available_seats));
    assert!(audit.is_balanced(), "unbalanced ledger: {:?}", audit);
}

#[tokio::test]
async fn test_reject_and_cancel_release_reserved_seats() {
    let world = World::new();
    let ride = world.ride(5).await;
    let passenger = Uuid::new_v4();

    let rejected = world.book(&ride, Uuid::new_v4(), 2).await.unwrap();
    let cancelled = world.book(&ride, passenger, 3).await.unwrap();
    assert_eq!(world.available(ride.id).await, 0);

    world.engine.reject_booking(rejected.id, world.driver_id).await.unwrap();
    assert_eq!(world.available(ride.id).await, 2);

    world.engine.approve_booking(cancelled.id, world.driver_id).await.unwrap();
    world.engine.cancel_booking(cancelled.id, passenger).await.unwrap();
    assert_eq!(world.available(ride.id).await, 5);

    // Second attempts release nothing.
    assert!(world.engine.cancel_booking(cancelled.id, passenger).await.is_err());
    assert!(world.engine.reject_booking(rejected.id, world.driver_id).await.is_err());
    assert_eq!(world.available(ride.id).await, 5);
    world.assert_balanced(ride.id).await;
}

#[tokio::test]
async fn test_payment_confirmation_is_idempotent() {
    let world = World::new();
    let ride = world.ride(3).await;
    let booking = world.book(&ride, Uuid::new_v4(), 2).await.unwrap();

    let first = world.engine.confirm_payment(booking.id, "pay_A").await.unwrap();
    let second = world.engine.confirm_payment(booking.id, "pay_A").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.status, BookingStatus::Paid);
    assert_eq!(world.available(ride.id).await, 1);

    let err = world.engine.confirm_payment(booking.id, "pay_B").await.unwrap_err();
    assert_eq!(err.code(), FailureCode::PaymentConflict);
    assert_eq!(
        world.engine.get_booking(booking.id).await.unwrap().payment_id.as_deref(),
        Some("pay_A")
    );
}

#[tokio::test]
async fn test_cascade_cancellation() {
    let mut world = World::new();
    let ride = world.ride(6).await;

    let pending = world.book(&ride, Uuid::new_v4(), 1).await.unwrap();
    let approved = world.book(&ride, Uuid::new_v4(), 2).await.unwrap();
    let paid = world.book(&ride, Uuid::new_v4(), 1).await.unwrap();
    world.engine.approve_booking(approved.id, world.driver_id).await.unwrap();
    world.engine.confirm_payment(paid.id, "pay_cascade").await.unwrap();
    world.drain_events();

    // Stranger first: nothing changes.
    let err = world.engine.cancel_ride(ride.id, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized(_)));
    assert_eq!(world.engine.get_ride(ride.id).await.unwrap().status, RideStatus::Scheduled);
    assert_eq!(world.engine.get_booking(pending.id).await.unwrap().status, BookingStatus::Pending);

    let cancelled = world.engine.cancel_ride(ride.id, world.driver_id).await.unwrap();
    assert_eq!(cancelled.status, RideStatus::Cancelled);
    for id in [pending.id, approved.id, paid.id] {
        assert_eq!(
            world.engine.get_booking(id).await.unwrap().status,
            BookingStatus::Cancelled
        );
    }
    // Seats are not credited back to a withdrawn ride.
    assert_eq!(world.available(ride.id).await, 2);

    let events = world.drain_events();
    assert_eq!(events.len(), 3);
    for event in &events {
        let NotificationEvent::BookingCancelled(cancel) = event else {
            panic!("unexpected event {:?}", event);
        };
        assert_eq!(cancel.reason, CancellationReason::RideCancelled);
        assert_eq!(cancel.refund_due, cancel.booking_id == paid.id);
    }

    let err = world.engine.cancel_ride(ride.id, world.driver_id).await.unwrap_err();
    assert_eq!(err.code(), FailureCode::InvalidTransition);
    let err = world.book(&ride, Uuid::new_v4(), 1).await.unwrap_err();
    assert_eq!(err.code(), FailureCode::InsufficientSeats);
}

#[tokio::test]
async fn test_driver_authorization_boundary() {
    let world = World::new();
    let ride = world.ride(4).await;
    let booking = world.book(&ride, Uuid::new_v4(), 2).await.unwrap();
    let intruder = Uuid::new_v4();

    for result in [
        world.engine.approve_booking(booking.id, intruder).await,
        world.engine.reject_booking(booking.id, intruder).await,
    ] {
        assert_eq!(result.unwrap_err().code(), FailureCode::Unauthorized);
    }

    assert_eq!(world.engine.get_booking(booking.id).await.unwrap().status, BookingStatus::Pending);
    assert_eq!(world.available(ride.id).await, 2);
}

#[tokio::test]
async fn test_terminal_bookings_are_immutable() {
    let world = World::new();
    let ride = world.ride(6).await;
    let passenger = Uuid::new_v4();

    let rejected = world.book(&ride, passenger, 1).await.unwrap();
    world.engine.reject_booking(rejected.id, world.driver_id).await.unwrap();
    let cancelled = world.book(&ride, passenger, 1).await.unwrap();
    world.engine.cancel_booking(cancelled.id, passenger).await.unwrap();
    let paid = world.book(&ride, passenger, 1).await.unwrap();
    world.engine.confirm_payment(paid.id, "pay_final").await.unwrap();

    let before = world.available(ride.id).await;
    for id in [rejected.id, cancelled.id, paid.id] {
        let attempts = [
            world.engine.approve_booking(id, world.driver_id).await,
            world.engine.reject_booking(id, world.driver_id).await,
            world.engine.cancel_booking(id, passenger).await,
        ];
        for attempt in attempts {
            assert_eq!(attempt.unwrap_err().code(), FailureCode::InvalidTransition);
        }
    }
    for id in [rejected.id, cancelled.id] {
        let err = world.engine.confirm_payment(id, "pay_late").await.unwrap_err();
        assert_eq!(err.code(), FailureCode::InvalidTransition);
    }

    assert_eq!(world.available(ride.id).await, before);
    world.assert_balanced(ride.id).await;
}

#[tokio::test]
async fn test_post_ride_checks_vehicle() {
    let world = World::new();

    let mut unknown = world.spec(3);
    unknown.vehicle_id = Uuid::new_v4();
    let err = world.engine.post_ride(world.driver_id, unknown).await.unwrap_err();
    assert!(matches!(err, CoreError::VehicleNotFound(_)));

    let err = world.engine.post_ride(Uuid::new_v4(), world.spec(3)).await.unwrap_err();
    assert_eq!(err.code(), FailureCode::Unauthorized);

    let err = world.engine.post_ride(world.driver_id, world.spec(11)).await.unwrap_err();
    assert_eq!(err.code(), FailureCode::InvalidRequest);

    let ride = world.ride(3).await;
    assert_eq!(ride.status, RideStatus::Scheduled);
    assert_eq!(ride.available_seats, 3);
}

#[tokio::test]
async fn test_search_projects_driver_and_vehicle() {
    let world = World::new();
    let later = world.ride(3).await;
    let mut early_spec = world.spec(2);
    early_spec.departure_time = NaiveTime::from_hms_opt(5, 0, 0).unwrap();
    let early = world.engine.post_ride(world.driver_id, early_spec).await.unwrap();

    // Full and cancelled rides are not offered.
    let full = world.ride(1).await;
    world.book(&full, Uuid::new_v4(), 1).await.unwrap();
    let withdrawn = world.ride(2).await;
    world.engine.cancel_ride(withdrawn.id, world.driver_id).await.unwrap();

    let results = world.engine.search_rides(" bengaluru ", "CHENNAI", date()).await.unwrap();
    let ids: Vec<Uuid> = results.iter().map(|r| r.ride_id).collect();
    assert_eq!(ids, vec![early.id, later.id]);

    let driver = results[0].driver.as_ref().unwrap();
    assert_eq!(driver.name, "Meera Nair");
    let json = serde_json::to_value(&results[0]).unwrap();
    assert_eq!(json["driver"]["phone"], "9845012345");
    assert_eq!(results[0].vehicle.as_ref().unwrap().model, "Innova");
    assert_eq!(results[0].pickup_points, vec!["Majestic", "KR Puram"]);

    assert!(world
        .engine
        .search_rides("Bengaluru", "Chennai", date().succ_opt().unwrap())
        .await
        .unwrap()
        .is_empty());
    let err = world.engine.search_rides("", "Chennai", date()).await.unwrap_err();
    assert_eq!(err.code(), FailureCode::InvalidRequest);
}

#[tokio::test]
async fn test_ride_lifecycle_and_schedule_edits() {
    let world = World::new();
    let ride = world.ride(4).await;
    world.book(&ride, Uuid::new_v4(), 1).await.unwrap();

    let moved = world
        .engine
        .update_ride(
            ride.id,
            world.driver_id,
            RideUpdate {
                travel_date: date().succ_opt(),
                departure_time: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.travel_date, date().succ_opt().unwrap());
    assert_eq!(moved.available_seats, 3);

    let err = world
        .engine
        .update_ride(ride.id, world.driver_id, RideUpdate::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), FailureCode::InvalidRequest);

    let err = world
        .engine
        .update_ride(
            ride.id,
            Uuid::new_v4(),
            RideUpdate {
                travel_date: None,
                departure_time: NaiveTime::from_hms_opt(8, 0, 0),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), FailureCode::Unauthorized);

    let err = world.engine.complete_ride(ride.id, world.driver_id).await.unwrap_err();
    assert_eq!(err.code(), FailureCode::InvalidTransition);

    world.engine.start_ride(ride.id, world.driver_id).await.unwrap();
    // Seats can still be taken while the ride is active.
    world.book(&ride, Uuid::new_v4(), 1).await.unwrap();
    let done = world.engine.complete_ride(ride.id, world.driver_id).await.unwrap();
    assert_eq!(done.status, RideStatus::Completed);

    let err = world.book(&ride, Uuid::new_v4(), 1).await.unwrap_err();
    match err {
        CoreError::InsufficientSeats { available, .. } => assert_eq!(available, 0),
        other => panic!("expected InsufficientSeats, got {:?}", other),
    }
    let err = world.engine.cancel_ride(ride.id, world.driver_id).await.unwrap_err();
    assert_eq!(err.code(), FailureCode::InvalidTransition);
}

#[tokio::test]
async fn test_listings() {
    let world = World::new();
    let first = world.ride(4).await;
    let mut later_spec = world.spec(4);
    later_spec.travel_date = date().succ_opt().unwrap();
    let second = world.engine.post_ride(world.driver_id, later_spec).await.unwrap();

    let passenger = Uuid::new_v4();
    let older = world.book(&first, passenger, 1).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let newer = world.book(&second, passenger, 1).await.unwrap();
    world.engine.approve_booking(newer.id, world.driver_id).await.unwrap();

    let rides: Vec<Uuid> = world
        .engine
        .rides_for_driver(world.driver_id)
        .await
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(rides, vec![second.id, first.id]);

    let mine: Vec<Uuid> = world
        .engine
        .bookings_for_passenger(passenger)
        .await
        .unwrap()
        .iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(mine, vec![newer.id, older.id]);

    let pending = world.engine.pending_bookings_for_driver(world.driver_id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, older.id);

    let err = world.engine.bookings_for_ride(first.id, Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.code(), FailureCode::Unauthorized);
}

#[tokio::test]
async fn test_payment_order_then_verified_confirmation() {
    let mut world = World::new();
    let ride = world.ride(2).await;
    let passenger = Uuid::new_v4();
    let booking = world.book(&ride, passenger, 2).await.unwrap();

    let order = world.engine.create_payment_order(booking.id, passenger).await.unwrap();
    assert_eq!(order.amount, booking.total_fare);
    assert_eq!(order.receipt, format!("booking_{}", booking.id));

    let signer = SignatureVerifier::new(SECRET);
    let proof = PaymentProof {
        order_id: order.order_id.clone(),
        payment_id: "pay_verified".to_string(),
        signature: signer.sign(&order.order_id, "pay_verified"),
    };
    let forged = PaymentProof {
        signature: signer.sign(&order.order_id, "pay_other"),
        ..proof.clone()
    };

    let err = world.engine.confirm_verified_payment(booking.id, &forged).await.unwrap_err();
    assert_eq!(err.code(), FailureCode::InvalidSignature);

    let paid = world.engine.confirm_verified_payment(booking.id, &proof).await.unwrap();
    assert_eq!(paid.status, BookingStatus::Paid);

    let events = world.drain_events();
    assert!(matches!(events.as_slice(), [NotificationEvent::BookingPaid(_)]));

    // Paid bookings need no further order.
    let err = world.engine.create_payment_order(booking.id, passenger).await.unwrap_err();
    assert_eq!(err.code(), FailureCode::InvalidTransition);
}
