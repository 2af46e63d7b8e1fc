use chrono::NaiveDate;
use ride_booking::{BookingStateMachine, MockPaymentGateway, PaymentReconciler};
use ride_core::notify::Notifier;
use ride_core::payment::{GatewayOrder, PaymentGateway, PaymentProof, SignatureVerifier};
use ride_core::repository::{BookingRepository, DirectoryRepository, RideRepository};
use ride_core::search::RideSearchResult;
use ride_core::CoreResult;
use ride_inventory::{InventoryQueryService, RideLifecycle, RideRules};
use ride_shared::{Booking, BookingRequest, Ride, RideSpec, RideUpdate};
use ride_store::MemoryStore;
use std::sync::Arc;
use uuid::Uuid;

/// Everything the engine needs from the outside world.
pub struct EngineParts {
    pub rides: Arc<dyn RideRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub directory: Arc<dyn DirectoryRepository>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub verifier: SignatureVerifier,
    pub currency: String,
    pub rules: RideRules,
    pub notifier: Notifier,
}

/// The ride/booking engine: the single entry point a boundary layer
/// (HTTP handlers, workers) calls into. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    lifecycle: Arc<RideLifecycle>,
    bookings: Arc<BookingStateMachine>,
    payments: Arc<PaymentReconciler>,
    queries: Arc<InventoryQueryService>,
}

impl Engine {
    pub fn new(parts: EngineParts) -> Self {
        let lifecycle = RideLifecycle::new(
            parts.rides.clone(),
            parts.directory.clone(),
            parts.notifier.clone(),
            parts.rules,
        );
        let bookings = BookingStateMachine::new(
            parts.bookings.clone(),
            parts.rides.clone(),
            parts.notifier.clone(),
        );
        let payments = PaymentReconciler::new(
            parts.bookings,
            parts.gateway,
            parts.verifier,
            parts.currency,
            parts.notifier,
        );
        let queries = InventoryQueryService::new(parts.rides, parts.directory);

        Self {
            lifecycle: Arc::new(lifecycle),
            bookings: Arc::new(bookings),
            payments: Arc::new(payments),
            queries: Arc::new(queries),
        }
    }

    /// Engine over a single in-memory store with the mock gateway.
    pub fn with_memory_store(store: Arc<MemoryStore>, verifier: SignatureVerifier, notifier: Notifier) -> Self {
        Self::new(EngineParts {
            rides: store.clone(),
            bookings: store.clone(),
            directory: store,
            gateway: Arc::new(MockPaymentGateway::new()),
            verifier,
            currency: "INR".to_string(),
            rules: RideRules::default(),
            notifier,
        })
    }

    // Rides

    pub async fn post_ride(&self, driver_id: Uuid, spec: RideSpec) -> CoreResult<Ride> {
        self.lifecycle.post_ride(driver_id, spec).await
    }

    pub async fn update_ride(&self, ride_id: Uuid, driver_id: Uuid, update: RideUpdate) -> CoreResult<Ride> {
        self.lifecycle.update_ride(ride_id, driver_id, update).await
    }

    pub async fn start_ride(&self, ride_id: Uuid, driver_id: Uuid) -> CoreResult<Ride> {
        self.lifecycle.start_ride(ride_id, driver_id).await
    }

    pub async fn complete_ride(&self, ride_id: Uuid, driver_id: Uuid) -> CoreResult<Ride> {
        self.lifecycle.complete_ride(ride_id, driver_id).await
    }

    pub async fn cancel_ride(&self, ride_id: Uuid, driver_id: Uuid) -> CoreResult<Ride> {
        self.lifecycle.cancel_ride(ride_id, driver_id).await
    }

    pub async fn get_ride(&self, ride_id: Uuid) -> CoreResult<Ride> {
        self.lifecycle.get_ride(ride_id).await
    }

    pub async fn rides_for_driver(&self, driver_id: Uuid) -> CoreResult<Vec<Ride>> {
        self.lifecycle.rides_for_driver(driver_id).await
    }

    pub async fn search_rides(
        &self,
        from_city: &str,
        to_city: &str,
        date: NaiveDate,
    ) -> CoreResult<Vec<RideSearchResult>> {
        self.queries.search(from_city, to_city, date).await
    }

    // Bookings

    pub async fn create_booking(&self, passenger_id: Uuid, request: BookingRequest) -> CoreResult<Booking> {
        self.bookings.create(passenger_id, request).await
    }

    pub async fn approve_booking(&self, booking_id: Uuid, driver_id: Uuid) -> CoreResult<Booking> {
        self.bookings.approve(booking_id, driver_id).await
    }

    pub async fn reject_booking(&self, booking_id: Uuid, driver_id: Uuid) -> CoreResult<Booking> {
        self.bookings.reject(booking_id, driver_id).await
    }

    pub async fn cancel_booking(&self, booking_id: Uuid, passenger_id: Uuid) -> CoreResult<Booking> {
        self.bookings.cancel(booking_id, passenger_id).await
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.bookings.get(booking_id).await
    }

    pub async fn bookings_for_passenger(&self, passenger_id: Uuid) -> CoreResult<Vec<Booking>> {
        self.bookings.bookings_for_passenger(passenger_id).await
    }

    pub async fn pending_bookings_for_driver(&self, driver_id: Uuid) -> CoreResult<Vec<Booking>> {
        self.bookings.pending_for_driver(driver_id).await
    }

    pub async fn bookings_for_ride(&self, ride_id: Uuid, driver_id: Uuid) -> CoreResult<Vec<Booking>> {
        self.bookings.bookings_for_ride(ride_id, driver_id).await
    }

    // Payments

    pub async fn create_payment_order(&self, booking_id: Uuid, passenger_id: Uuid) -> CoreResult<GatewayOrder> {
        self.payments.create_order(booking_id, passenger_id).await
    }

    pub async fn confirm_payment(&self, booking_id: Uuid, payment_ref: &str) -> CoreResult<Booking> {
        self.payments.confirm(booking_id, payment_ref).await
    }

    pub async fn confirm_verified_payment(&self, booking_id: Uuid, proof: &PaymentProof) -> CoreResult<Booking> {
        self.payments.confirm_verified(booking_id, proof).await
    }
}
