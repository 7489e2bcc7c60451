//! An in-memory stand-in for the Car/Host API, served over real HTTP so the
//! `APIClient` is exercised end to end.

use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer, ResponseError,
    body::BoxBody, delete, dev::HttpServiceFactory, dev::Server, get, http,
    patch, post, put, web,
};
use app::upload::CancelFlag;
use payloads::{
    Car, CarId, CarStatus, MapCar, PhotoId, requests,
    responses::{self, ErrorBody},
};
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// Odometer readings above this are rejected until the car is published.
const DRAFT_ODOMETER_LIMIT_KM: f64 = 200_000.0;

/// One request as the fake saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub authorization: Option<String>,
}

#[derive(Default)]
pub struct FakeStore {
    pub address: String,
    pub token: String,
    pub cars: Mutex<HashMap<CarId, Car>>,
    pub map_cars: Mutex<Vec<MapCar>>,
    /// Photo bytes received at the storage endpoint, by photo id.
    pub uploads: Mutex<HashMap<PhotoId, (String, Vec<u8>)>>,
    pub requests: Mutex<Vec<RecordedRequest>>,
    /// Lowercase amenity ids on update, like the production backend.
    pub normalize_amenities: AtomicBool,
    /// Reject every upload with a 503.
    pub storage_down: AtomicBool,
    /// Raised after the next stored upload, then forgotten.
    pub cancel_on_upload: Mutex<Option<CancelFlag>>,
}

impl FakeStore {
    fn record(&self, req: &HttpRequest) -> Option<String> {
        let authorization = req
            .headers()
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                method: req.method().to_string(),
                path: req.path().to_string(),
                query: req.query_string().to_string(),
                authorization: authorization.clone(),
            });
        }
        authorization
    }

    /// Record the request and check its bearer token.
    fn authorize(&self, req: &HttpRequest) -> Result<(), FakeError> {
        let expected = format!("Bearer {}", self.token);
        match self.record(req) {
            Some(header) if header == expected => Ok(()),
            _ => Err(FakeError::Unauthorized),
        }
    }

    fn with_car<T>(
        &self,
        car_id: CarId,
        f: impl FnOnce(&mut Car) -> Result<T, FakeError>,
    ) -> Result<T, FakeError> {
        let mut cars = self.cars.lock().map_err(|_| FakeError::Poisoned)?;
        let car = cars.get_mut(&car_id).ok_or(FakeError::NotFound("Car"))?;
        f(car)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FakeError {
    #[error("Missing or invalid token")]
    Unauthorized,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Storage unavailable")]
    StorageDown,
    #[error("Store lock poisoned")]
    Poisoned,
}

impl ResponseError for FakeError {
    fn error_response(&self) -> HttpResponse<BoxBody> {
        // The backend is inconsistent about which field carries the message
        match self {
            Self::Unauthorized => HttpResponse::Unauthorized().json(ErrorBody {
                error: Some(self.to_string()),
                ..Default::default()
            }),
            Self::NotFound(_) => HttpResponse::NotFound().json(ErrorBody {
                error: Some(self.to_string()),
                ..Default::default()
            }),
            Self::Validation(_) => {
                HttpResponse::UnprocessableEntity().json(ErrorBody {
                    message: Some(self.to_string()),
                    error: Some("validation".into()),
                })
            }
            Self::BadRequest(_) => HttpResponse::BadRequest().json(ErrorBody {
                message: Some(self.to_string()),
                ..Default::default()
            }),
            Self::StorageDown => {
                HttpResponse::ServiceUnavailable().body(self.to_string())
            }
            Self::Poisoned => HttpResponse::InternalServerError().finish(),
        }
    }
}

pub fn api_services() -> impl HttpServiceFactory {
    web::scope("/api")
        .service(list_cars)
        .service(get_car)
        .service(update_car)
        .service(delete_car)
        .service(publish_car)
        .service(create_photo_upload_url)
        .service(finalize_photos)
        .service(search_map)
}

/// Bind to an OS-assigned port on localhost and build the server, but not
/// await it. Returns the server and the store it serves from.
pub fn build(token: &str) -> std::io::Result<(Server, web::Data<FakeStore>)> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    let store = web::Data::new(FakeStore {
        address: format!("http://127.0.0.1:{port}"),
        token: token.to_string(),
        ..Default::default()
    });

    let app_store = store.clone();
    let server = HttpServer::new(move || {
        App::new()
            .service(api_services())
            .service(upload_photo)
            .app_data(app_store.clone())
    })
    .workers(1)
    .listen(listener)?
    .run();
    Ok((server, store))
}

#[tracing::instrument(skip(req, store))]
#[get("/host/cars")]
async fn list_cars(
    req: HttpRequest,
    page: web::Query<requests::ListCars>,
    store: web::Data<FakeStore>,
) -> Result<HttpResponse, FakeError> {
    store.authorize(&req)?;
    let mut cars: Vec<Car> = store
        .cars
        .lock()
        .map_err(|_| FakeError::Poisoned)?
        .values()
        .filter(|car| car.status != CarStatus::Deleted)
        .cloned()
        .collect();
    cars.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
    let total = cars.len() as u32;
    let items = cars
        .into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect();
    Ok(HttpResponse::Ok().json(responses::CarPage {
        items,
        page: responses::PageInfo {
            total,
            limit: page.limit,
            offset: page.offset,
        },
    }))
}

#[tracing::instrument(skip(req, store))]
#[get("/host/cars/{car_id}")]
async fn get_car(
    req: HttpRequest,
    car_id: web::Path<Uuid>,
    store: web::Data<FakeStore>,
) -> Result<HttpResponse, FakeError> {
    store.authorize(&req)?;
    let car = store.with_car(CarId(*car_id), |car| Ok(car.clone()))?;
    Ok(HttpResponse::Ok().json(car))
}

#[tracing::instrument(skip(req, store))]
#[patch("/host/cars/{car_id}")]
async fn update_car(
    req: HttpRequest,
    car_id: web::Path<Uuid>,
    patch: web::Json<requests::CarPatch>,
    store: web::Data<FakeStore>,
) -> Result<HttpResponse, FakeError> {
    store.authorize(&req)?;
    let normalize = store.normalize_amenities.load(Ordering::Relaxed);
    let patch = patch.into_inner();
    let car = store.with_car(CarId(*car_id), |car| {
        if let Some(km) = patch.odometer_km {
            if car.odometer_locked() && car.odometer_km != Some(km) {
                return Err(FakeError::Validation(
                    "Odometer can no longer be changed".into(),
                ));
            }
            if car.status != CarStatus::Active && km > DRAFT_ODOMETER_LIMIT_KM
            {
                return Err(FakeError::Validation(
                    "Odometer cannot exceed 200,000 km before the car is \
                     published"
                        .into(),
                ));
            }
            car.odometer_km = Some(km);
        }
        if let Some(features) = patch.features {
            car.features.amenities = features
                .amenities
                .into_iter()
                .map(|a| if normalize { a.to_lowercase() } else { a })
                .collect();
        }
        if let Some(requirements) = patch.requirements {
            let availability = requirements.availability;
            car.requirements.availability.blocked_dates =
                availability.blocked_dates;
            car.requirements.availability.timezone =
                Some(availability.timezone);
        }
        if let Some(gallery) = patch.image_gallery {
            car.image_gallery = gallery;
        }
        Ok(car.clone())
    })?;
    Ok(HttpResponse::Ok().json(car))
}

#[tracing::instrument(skip(req, store))]
#[delete("/host/cars/{car_id}")]
async fn delete_car(
    req: HttpRequest,
    car_id: web::Path<Uuid>,
    store: web::Data<FakeStore>,
) -> Result<HttpResponse, FakeError> {
    store.authorize(&req)?;
    store.with_car(CarId(*car_id), |car| {
        car.status = CarStatus::Deleted;
        Ok(())
    })?;
    Ok(HttpResponse::Ok().finish())
}

#[tracing::instrument(skip(req, store))]
#[post("/host/cars/{car_id}/publish")]
async fn publish_car(
    req: HttpRequest,
    car_id: web::Path<Uuid>,
    store: web::Data<FakeStore>,
) -> Result<HttpResponse, FakeError> {
    store.authorize(&req)?;
    let car = store.with_car(CarId(*car_id), |car| {
        if car.image_gallery.is_empty() && car.image_path.is_none() {
            return Err(FakeError::Validation(
                "Add at least one photo before publishing".into(),
            ));
        }
        if !car.odometer_locked() {
            return Err(FakeError::Validation(
                "Enter the odometer reading before publishing".into(),
            ));
        }
        car.status = CarStatus::Active;
        Ok(car.clone())
    })?;
    Ok(HttpResponse::Ok().json(car))
}

#[tracing::instrument(skip(req, store))]
#[post("/host/cars/{car_id}/photos/upload-url")]
async fn create_photo_upload_url(
    req: HttpRequest,
    car_id: web::Path<Uuid>,
    details: web::Json<requests::PhotoUploadRequest>,
    store: web::Data<FakeStore>,
) -> Result<HttpResponse, FakeError> {
    store.authorize(&req)?;
    let car_id = CarId(*car_id);
    store.with_car(car_id, |_| Ok(()))?;
    if !details.mime_type.starts_with("image/") {
        return Err(FakeError::BadRequest(format!(
            "Unsupported file type {}",
            details.mime_type
        )));
    }
    let photo_id = PhotoId(Uuid::new_v4());
    Ok(HttpResponse::Ok().json(responses::PhotoUploadTarget {
        upload_url: format!("{}/storage/{photo_id}", store.address),
        photo_id,
        path: format!("cars/{car_id}/{photo_id}-{}", details.file_name),
        mime_type: details.mime_type.clone(),
    }))
}

/// Pre-signed storage upload. Carries no bearer token.
#[tracing::instrument(skip(req, body, store))]
#[put("/storage/{photo_id}")]
async fn upload_photo(
    req: HttpRequest,
    photo_id: web::Path<Uuid>,
    body: web::Bytes,
    store: web::Data<FakeStore>,
) -> Result<HttpResponse, FakeError> {
    store.record(&req);
    if store.storage_down.load(Ordering::Relaxed) {
        return Err(FakeError::StorageDown);
    }
    let mime_type = req
        .headers()
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| FakeError::BadRequest("Missing content type".into()))?
        .to_string();
    store
        .uploads
        .lock()
        .map_err(|_| FakeError::Poisoned)?
        .insert(PhotoId(*photo_id), (mime_type, body.to_vec()));
    if let Some(cancel) = store
        .cancel_on_upload
        .lock()
        .map_err(|_| FakeError::Poisoned)?
        .take()
    {
        cancel.cancel();
    }
    Ok(HttpResponse::Ok().finish())
}

#[tracing::instrument(skip(req, store))]
#[post("/host/cars/{car_id}/photos/finalize")]
async fn finalize_photos(
    req: HttpRequest,
    car_id: web::Path<Uuid>,
    details: web::Json<requests::FinalizePhotos>,
    store: web::Data<FakeStore>,
) -> Result<HttpResponse, FakeError> {
    store.authorize(&req)?;
    {
        let uploads = store.uploads.lock().map_err(|_| FakeError::Poisoned)?;
        if let Some(missing) = details
            .photos
            .iter()
            .find(|photo| !uploads.contains_key(&photo.photo_id))
        {
            return Err(FakeError::BadRequest(format!(
                "Photo {} was never uploaded",
                missing.photo_id
            )));
        }
    }
    let address = store.address.clone();
    let car = store.with_car(CarId(*car_id), |car| {
        car.image_gallery.extend(
            details
                .photos
                .iter()
                .map(|photo| format!("{address}/files/{}", photo.path)),
        );
        Ok(car.clone())
    })?;
    Ok(HttpResponse::Ok().json(car))
}

#[tracing::instrument(skip(req, store))]
#[get("/cars/map")]
async fn search_map(
    req: HttpRequest,
    query: web::Query<requests::MapSearchQuery>,
    store: web::Data<FakeStore>,
) -> Result<HttpResponse, FakeError> {
    store.authorize(&req)?;
    let items = store
        .map_cars
        .lock()
        .map_err(|_| FakeError::Poisoned)?
        .iter()
        .filter(|car| {
            (query.min_lat..=query.max_lat).contains(&car.pickup.lat)
                && (query.min_lng..=query.max_lng).contains(&car.pickup.lng)
        })
        .cloned()
        .collect();
    Ok(HttpResponse::Ok().json(responses::MapSearchResults { items }))
}
