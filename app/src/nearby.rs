//! Nearby car search around a center point.
//!
//! Distances use a flat-earth approximation (one degree of latitude is
//! about 111 km, one degree of longitude is 111 km scaled by the cosine of
//! the latitude). It holds for city-sized radii and breaks down near the
//! poles.

use payloads::{
    ClientError, FuelType, GeoPoint, MapCar, Transmission, VehicleType,
    requests::MapSearchQuery,
};
use rust_decimal::Decimal;

use crate::backend::HostBackend;

pub const KM_PER_DEGREE: f64 = 111.0;
const EARTH_RADIUS_KM: f64 = 6371.0;
/// Keeps the whole search circle on screen with some margin.
pub const REGION_PADDING: f64 = 1.3;
/// Share of the visible latitude span covered by the bottom results panel.
pub const BOTTOM_PANEL_FRACTION: f64 = 0.25;
pub const DEFAULT_RADIUS_KM: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn around(center: GeoPoint, radius_km: f64) -> Self {
        let lat_delta = radius_km / KM_PER_DEGREE;
        let lng_delta = radius_km / lng_km_per_degree(center.lat);
        Self {
            min_lat: (center.lat - lat_delta).max(-90.0),
            max_lat: (center.lat + lat_delta).min(90.0),
            min_lng: center.lng - lng_delta,
            max_lng: center.lng + lng_delta,
        }
    }

    pub fn to_query(self) -> MapSearchQuery {
        MapSearchQuery {
            min_lat: self.min_lat,
            max_lat: self.max_lat,
            min_lng: self.min_lng,
            max_lng: self.max_lng,
            start_date: None,
            end_date: None,
        }
    }
}

/// Kilometers per degree of longitude at `lat`, floored so the box stays
/// finite at the poles.
fn lng_km_per_degree(lat: f64) -> f64 {
    (KM_PER_DEGREE * lat.to_radians().cos()).max(0.01)
}

/// Great-circle distance, used to order results for display.
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos()
            * b.lat.to_radians().cos()
            * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Client-side refinements over fetched candidates. Unset fields match
/// everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub vehicle_type: Option<VehicleType>,
    pub transmission: Option<Transmission>,
    pub fuel_type: Option<FuelType>,
    pub min_seats: Option<u8>,
    pub min_rating: Option<f32>,
    pub max_price: Option<Decimal>,
}

impl SearchFilters {
    pub fn matches(&self, car: &MapCar) -> bool {
        fn exact<T: PartialEq>(want: Option<T>, have: Option<T>) -> bool {
            want.is_none() || want == have
        }

        exact(self.vehicle_type, car.vehicle_type)
            && exact(self.transmission, car.transmission)
            && exact(self.fuel_type, car.fuel_type)
            && self
                .min_seats
                .is_none_or(|min| car.seats.is_some_and(|s| s >= min))
            && self
                .min_rating
                .is_none_or(|min| car.rating.is_some_and(|r| r >= min))
            && self
                .max_price
                .is_none_or(|max| car.price_per_day.is_some_and(|p| p <= max))
    }

    pub fn apply<'a>(&self, cars: &'a [MapCar]) -> Vec<&'a MapCar> {
        cars.iter().filter(|car| self.matches(car)).collect()
    }
}

/// The visible map area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapRegion {
    pub center: GeoPoint,
    pub lat_delta: f64,
    pub lng_delta: f64,
}

impl MapRegion {
    /// A region showing the full search circle.
    pub fn for_radius(center: GeoPoint, radius_km: f64) -> Self {
        let span_km = 2.0 * radius_km * REGION_PADDING;
        Self {
            center,
            lat_delta: span_km / KM_PER_DEGREE,
            lng_delta: span_km / lng_km_per_degree(center.lat),
        }
    }

    /// Re-center on a selected marker, keeping the zoom level and shifting
    /// the center south so the marker sits above the bottom panel.
    pub fn focus_on(&self, marker: GeoPoint) -> Self {
        Self {
            center: GeoPoint {
                lat: marker.lat - self.lat_delta * BOTTOM_PANEL_FRACTION,
                lng: marker.lng,
            },
            lat_delta: self.lat_delta,
            lng_delta: self.lng_delta,
        }
    }
}

/// Search state for the nearby screen.
///
/// Changing the center or radius requires a new fetch; changing filters
/// only re-filters the candidates already fetched.
#[derive(Debug, Clone)]
pub struct NearbySearch {
    center: GeoPoint,
    radius_km: f64,
    filters: SearchFilters,
    candidates: Vec<MapCar>,
    region: MapRegion,
    needs_fetch: bool,
}

impl NearbySearch {
    pub fn new(center: GeoPoint, radius_km: f64) -> Self {
        Self {
            center,
            radius_km,
            filters: SearchFilters::default(),
            candidates: Vec::new(),
            region: MapRegion::for_radius(center, radius_km),
            needs_fetch: true,
        }
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    pub fn region(&self) -> MapRegion {
        self.region
    }

    pub fn needs_fetch(&self) -> bool {
        self.needs_fetch
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::around(self.center, self.radius_km)
    }

    /// Move the search, animating the map to the new circle.
    pub fn set_center(&mut self, center: GeoPoint) {
        if center != self.center {
            self.center = center;
            self.region = MapRegion::for_radius(center, self.radius_km);
            self.needs_fetch = true;
        }
    }

    pub fn set_radius(&mut self, radius_km: f64) {
        if radius_km > 0.0 && radius_km != self.radius_km {
            self.radius_km = radius_km;
            self.region = MapRegion::for_radius(self.center, radius_km);
            self.needs_fetch = true;
        }
    }

    pub fn set_filters(&mut self, filters: SearchFilters) {
        self.filters = filters;
    }

    pub fn filters(&self) -> &SearchFilters {
        &self.filters
    }

    /// Center the map on a result without changing the zoom.
    pub fn select(&mut self, car: &MapCar) -> MapRegion {
        self.region = self.region.focus_on(car.pickup);
        self.region
    }

    /// Filtered results, nearest first.
    pub fn results(&self) -> Vec<&MapCar> {
        let mut results = self.filters.apply(&self.candidates);
        results.sort_by(|a, b| {
            distance_km(self.center, a.pickup)
                .total_cmp(&distance_km(self.center, b.pickup))
        });
        results
    }

    /// Fetch candidates inside the bounding box. On failure the previous
    /// results are cleared and the error is logged; nothing is retried.
    #[tracing::instrument(skip(self, backend), fields(radius_km = self.radius_km))]
    pub async fn refresh(
        &mut self,
        backend: &dyn HostBackend,
    ) -> Result<usize, ClientError> {
        let query = self.bounding_box().to_query();
        self.needs_fetch = false;
        match backend.search_map(&query).await {
            Ok(cars) => {
                self.candidates = cars;
                Ok(self.candidates.len())
            }
            Err(e) => {
                tracing::warn!("Nearby search failed: {e}");
                self.candidates.clear();
                Err(e)
            }
        }
    }
}
