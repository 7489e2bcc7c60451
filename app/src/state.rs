//! Application state, built once at startup and passed by reference to
//! whatever needs it.
//!
//! Each slice changes only through [`State::reduce`], and each async
//! operation moves through a requested / loaded / failed triple of actions.

use payloads::{
    Car, CarId, ClientError, MapCar,
    requests::ListCars,
    responses::{CarPage, PageInfo},
};
use std::collections::HashMap;

use crate::backend::HostBackend;

pub const HOST_PAGE_SIZE: u32 = 20;

/// Distinguishes "not fetched" from "fetched but empty".
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FetchState<T> {
    #[default]
    NotFetched,
    Fetched(T),
}

impl<T> FetchState<T> {
    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched(_))
    }

    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Self::NotFetched => None,
            Self::Fetched(data) => Some(data),
        }
    }
}

/// Data plus the status of the request currently filling it. A failed
/// refetch keeps the previous data.
#[derive(Debug, Clone, PartialEq)]
pub struct Loadable<T> {
    pub data: FetchState<T>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl<T> Default for Loadable<T> {
    fn default() -> Self {
        Self {
            data: FetchState::NotFetched,
            is_loading: false,
            error: None,
        }
    }
}

impl<T> Loadable<T> {
    fn request(&mut self) {
        self.is_loading = true;
        self.error = None;
    }

    fn succeed(&mut self, data: T) {
        self.data = FetchState::Fetched(data);
        self.is_loading = false;
        self.error = None;
    }

    fn fail(&mut self, error: String) {
        self.is_loading = false;
        self.error = Some(error);
    }

    /// Initial load: nothing fetched yet and nothing failed.
    pub fn is_initial_loading(&self) -> bool {
        self.is_loading && !self.data.is_fetched() && self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthState {
    #[default]
    Unknown,
    SignedOut,
    SignedIn {
        user_id: String,
        email: Option<String>,
    },
}

/// Guest-facing car data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CarsState {
    pub details: HashMap<CarId, Loadable<Car>>,
    pub nearby: Loadable<Vec<MapCar>>,
}

/// A host's own listings, loaded a page at a time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HostState {
    pub cars: Vec<Car>,
    pub page: Option<PageInfo>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl HostState {
    /// More pages exist when nothing has been loaded yet or fewer cars than
    /// the reported total are held.
    pub fn has_more(&self) -> bool {
        match self.page {
            None => true,
            Some(page) => (self.cars.len() as u32) < page.total,
        }
    }

    pub fn next_page(&self) -> ListCars {
        ListCars {
            limit: HOST_PAGE_SIZE,
            offset: self.cars.len() as u32,
        }
    }

    fn merge_page(&mut self, page: CarPage) {
        if page.page.offset == 0 {
            self.cars.clear();
        }
        for car in page.items {
            match self.cars.iter_mut().find(|held| held.id == car.id) {
                Some(held) => *held = car,
                None => self.cars.push(car),
            }
        }
        self.page = Some(page.page);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SignedIn {
        user_id: String,
        email: Option<String>,
    },
    SignedOut,
    CarRequested(CarId),
    CarLoaded(Car),
    CarFailed(CarId, String),
    NearbyRequested,
    NearbyLoaded(Vec<MapCar>),
    NearbyFailed(String),
    HostCarsRequested,
    HostCarsLoaded(CarPage),
    HostCarsFailed(String),
    /// Drop loaded host pages so the next load starts from the first.
    HostCarsReset,
    /// A host car changed elsewhere (saved or published).
    HostCarUpdated(Car),
    /// A host car was deactivated and no longer belongs in the list.
    HostCarRemoved(CarId),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct State {
    pub auth: AuthState,
    pub cars: CarsState,
    pub host: HostState,
}

impl State {
    pub fn is_authenticated(&self) -> bool {
        matches!(self.auth, AuthState::SignedIn { .. })
    }

    pub fn car(&self, car_id: &CarId) -> Option<&Car> {
        self.cars.details.get(car_id)?.data.as_ref()
    }

    pub fn reduce(&mut self, action: Action) {
        match action {
            Action::SignedIn { user_id, email } => {
                self.auth = AuthState::SignedIn { user_id, email };
            }
            Action::SignedOut => {
                // Nothing cached survives a sign out
                *self = State {
                    auth: AuthState::SignedOut,
                    ..Default::default()
                };
            }
            Action::CarRequested(car_id) => {
                self.cars.details.entry(car_id).or_default().request();
            }
            Action::CarLoaded(car) => {
                self.cars.details.entry(car.id).or_default().succeed(car);
            }
            Action::CarFailed(car_id, error) => {
                self.cars.details.entry(car_id).or_default().fail(error);
            }
            Action::NearbyRequested => self.cars.nearby.request(),
            Action::NearbyLoaded(cars) => self.cars.nearby.succeed(cars),
            Action::NearbyFailed(error) => {
                // Stale results are not shown after a failed search
                self.cars.nearby.data = FetchState::NotFetched;
                self.cars.nearby.fail(error);
            }
            Action::HostCarsRequested => {
                self.host.is_loading = true;
                self.host.error = None;
            }
            Action::HostCarsLoaded(page) => {
                self.host.merge_page(page);
                self.host.is_loading = false;
            }
            Action::HostCarsFailed(error) => {
                self.host.is_loading = false;
                self.host.error = Some(error);
            }
            Action::HostCarsReset => self.host = HostState::default(),
            Action::HostCarUpdated(car) => {
                if let Some(held) =
                    self.host.cars.iter_mut().find(|held| held.id == car.id)
                {
                    *held = car.clone();
                }
                if let Some(entry) = self.cars.details.get_mut(&car.id) {
                    entry.succeed(car);
                }
            }
            Action::HostCarRemoved(car_id) => {
                let before = self.host.cars.len();
                self.host.cars.retain(|car| car.id != car_id);
                if self.host.cars.len() < before
                    && let Some(page) = self.host.page.as_mut()
                {
                    page.total = page.total.saturating_sub(1);
                }
                self.cars.details.remove(&car_id);
            }
        }
    }

    /// Load one car into the details cache.
    pub async fn load_car(
        &mut self,
        backend: &dyn HostBackend,
        car_id: CarId,
    ) -> Result<(), ClientError> {
        self.reduce(Action::CarRequested(car_id));
        match backend.get_car(&car_id).await {
            Ok(car) => {
                self.reduce(Action::CarLoaded(car));
                Ok(())
            }
            Err(e) => {
                self.reduce(Action::CarFailed(car_id, e.to_string()));
                Err(e)
            }
        }
    }

    /// Deactivate a listing and drop it from the host's list.
    pub async fn delete_host_car(
        &mut self,
        backend: &dyn HostBackend,
        car_id: CarId,
    ) -> Result<(), ClientError> {
        backend.delete_car(&car_id).await?;
        self.reduce(Action::HostCarRemoved(car_id));
        Ok(())
    }

    /// Load the next page of the host's cars, if there is one. Returns how
    /// many cars arrived.
    pub async fn load_next_host_page(
        &mut self,
        backend: &dyn HostBackend,
    ) -> Result<usize, ClientError> {
        if self.host.is_loading || !self.host.has_more() {
            return Ok(0);
        }
        let page = self.host.next_page();
        self.reduce(Action::HostCarsRequested);
        match backend.list_cars(&page).await {
            Ok(page) => {
                let count = page.items.len();
                self.reduce(Action::HostCarsLoaded(page));
                Ok(count)
            }
            Err(e) => {
                self.reduce(Action::HostCarsFailed(e.to_string()));
                Err(e)
            }
        }
    }
}
