pub mod server;

use actix_web::web;
use app::upload::CancelFlag;
use app::{TimeSource, telemetry};
use payloads::{
    APIClient, Car, CarFeatures, CarId, CarRequirements, CarStatus,
    ClientError, FuelType, GeoPoint, MapCar, StaticToken, Transmission,
    VehicleType,
};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use secrecy::SecretString;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing_log::LogTracer;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

pub use server::{FakeStore, RecordedRequest};

pub const TEST_TOKEN: &str = "test-id-token";

pub struct TestApp {
    #[allow(unused)]
    pub port: u16,
    pub address: String,
    pub store: web::Data<FakeStore>,
    /// Signed in with [`TEST_TOKEN`].
    pub client: APIClient,
    pub time_source: TimeSource,
}

impl TestApp {
    /// A client for the same server with a different identity.
    pub fn client_with_token(&self, token: Option<&str>) -> APIClient {
        let token = token.map(|t| SecretString::from(t.to_string()));
        APIClient::new(self.address.clone(), Arc::new(StaticToken(token)))
    }

    pub fn insert_car(&self, car: Car) -> CarId {
        let id = car.id;
        self.store
            .cars
            .lock()
            .expect("store lock")
            .insert(id, car);
        id
    }

    pub fn stored_car(&self, car_id: &CarId) -> Option<Car> {
        self.store.cars.lock().expect("store lock").get(car_id).cloned()
    }

    pub fn insert_map_car(&self, car: MapCar) {
        self.store.map_cars.lock().expect("store lock").push(car);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.store.requests.lock().expect("store lock").clone()
    }

    /// Requests whose path ends with `suffix`.
    pub fn requests_to(&self, suffix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.ends_with(suffix))
            .collect()
    }

    pub fn uploaded_count(&self) -> usize {
        self.store.uploads.lock().expect("store lock").len()
    }

    pub fn normalize_amenities(&self, on: bool) {
        self.store.normalize_amenities.store(on, Ordering::Relaxed);
    }

    /// Raise `cancel` as soon as the next photo lands in storage.
    pub fn cancel_after_next_upload(&self, cancel: &CancelFlag) {
        *self.store.cancel_on_upload.lock().expect("store lock") =
            Some(cancel.clone());
    }

    pub fn storage_down(&self, down: bool) {
        self.store.storage_down.store(down, Ordering::Relaxed);
    }
}

/// Start the fake API on an OS-assigned port, for parallel testing.
pub async fn spawn_app() -> TestApp {
    let subscriber = telemetry::get_subscriber("error".into());
    let _ = LogTracer::init();
    let _ = subscriber.try_init();

    let time_source =
        TimeSource::new("2025-01-01T12:00:00Z".parse().expect("timestamp"));

    let (server, store) = server::build(TEST_TOKEN).expect("bind fake api");
    tokio::spawn(server);

    let address = store.address.clone();
    let port = address
        .rsplit(':')
        .next()
        .and_then(|p| p.parse().ok())
        .unwrap_or_default();
    let client = APIClient::new(
        address.clone(),
        Arc::new(StaticToken(Some(SecretString::from(TEST_TOKEN)))),
    );

    TestApp {
        port,
        address,
        store,
        client,
        time_source,
    }
}

/// Assert that the result of an API action results in a specific status code.
pub fn assert_status_code<T>(
    result: Result<T, ClientError>,
    expected: StatusCode,
) {
    match result {
        Err(ClientError::APIError(code, _)) => {
            assert_eq!(code, expected)
        }
        _ => panic!("Expected APIError"),
    };
}

/// A freshly created listing: no odometer, no photos, nothing blocked.
pub fn draft_car() -> Car {
    Car {
        id: CarId(Uuid::new_v4()),
        title: "2019 Toyota Corolla".into(),
        vehicle_type: Some(VehicleType::Sedan),
        transmission: Some(Transmission::Automatic),
        fuel_type: Some(FuelType::Petrol),
        seats: Some(5),
        price_per_day: Some(Decimal::new(4500, 2)),
        currency: Some("USD".into()),
        city: Some("Austin".into()),
        area: None,
        country_code: Some("US".into()),
        pickup: Some(GeoPoint {
            lat: 30.2672,
            lng: -97.7431,
        }),
        status: CarStatus::Draft,
        odometer_km: None,
        features: CarFeatures::default(),
        requirements: CarRequirements::default(),
        image_gallery: Vec::new(),
        image_path: None,
    }
}

/// A published listing with a locked odometer and two photos.
pub fn active_car() -> Car {
    let mut car = draft_car();
    car.status = CarStatus::Active;
    car.odometer_km = Some(42_000.0);
    car.features.amenities = vec!["bluetooth".into(), "gps".into()];
    car.requirements.availability.timezone = Some("America/Chicago".into());
    car.image_gallery = vec![
        "https://cdn.test/front.jpg".into(),
        "https://cdn.test/back.jpg".into(),
    ];
    car
}

pub fn map_car(title: &str, lat: f64, lng: f64) -> MapCar {
    MapCar {
        id: CarId(Uuid::new_v4()),
        title: title.into(),
        vehicle_type: Some(VehicleType::Suv),
        transmission: Some(Transmission::Automatic),
        fuel_type: Some(FuelType::Petrol),
        seats: Some(5),
        rating: Some(4.6),
        price_per_day: Some(Decimal::new(6000, 2)),
        currency: Some("USD".into()),
        pickup: GeoPoint { lat, lng },
        image_url: None,
    }
}
