//! Staged edits to a host's car and the save/leave flows around them.
//!
//! A [`CarDraft`] keeps the last confirmed server record apart from the
//! host's staged changes. A snapshot of the comparable values is taken on
//! load and after every save; the draft is dirty whenever the staged values
//! differ from it.

use payloads::{
    Car, CarId, ClientError, DateKey, is_catalog_amenity,
    requests::{
        AvailabilityPatch, CarPatch, FeaturesPatch, RequirementsPatch,
    },
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::availability::{AvailabilityEditor, BlockedDates};
use crate::backend::HostBackend;
use crate::gallery::{Gallery, derive_gallery};
use crate::time::TimeSource;

/// Highest odometer reading accepted before a car is first published.
pub const UNPUBLISHED_ODOMETER_LIMIT_KM: f64 = 200_000.0;

/// Used when the car record carries no availability time zone.
pub const DEFAULT_TIMEZONE: &str = "UTC";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Enter the odometer reading in km")]
    MissingOdometer,
    #[error("Odometer must be a positive number")]
    InvalidOdometer,
    #[error("Odometer cannot exceed 200,000 km before the car is published")]
    OdometerOverLimit,
    #[error("The odometer reading is already set and can't be changed")]
    OdometerLocked,
    #[error("Unknown amenity \"{0}\"")]
    UnknownAmenity(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("A save is already in progress")]
    Busy,
    #[error("There are no changes to save")]
    NoChanges,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Parse the odometer field. Blank counts as zero; anything that isn't a
/// finite number is None. Thousands separators are accepted.
pub fn parse_odometer(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '_'))
        .collect();
    if cleaned.is_empty() {
        return Some(0.0);
    }
    cleaned.parse::<f64>().ok().filter(|km| km.is_finite())
}

/// Comparable values of a draft. Amenities and blocked dates are sorted and
/// unique; gallery order is significant.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSnapshot {
    pub odometer: Option<f64>,
    pub amenities: Vec<String>,
    pub blocked_dates: Vec<DateKey>,
    pub gallery: Vec<String>,
}

/// The host's edits, not yet sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedChanges {
    odometer_text: String,
    amenities: BTreeSet<String>,
    pub availability: AvailabilityEditor,
    pub gallery: Gallery,
}

impl StagedChanges {
    fn from_car(car: &Car, today: DateKey) -> Self {
        let odometer_text = match car.odometer_km {
            Some(km) if km > 0.0 => km.to_string(),
            _ => String::new(),
        };
        Self {
            odometer_text,
            amenities: car
                .features
                .amenities
                .iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            availability: AvailabilityEditor::new(BlockedDates::from_loaded(
                car.blocked_dates().iter().copied(),
                today,
            )),
            gallery: Gallery::new(derive_gallery(
                &car.image_gallery,
                car.image_path.as_deref(),
            )),
        }
    }

    pub fn odometer_text(&self) -> &str {
        &self.odometer_text
    }

    pub fn amenities(&self) -> impl Iterator<Item = &str> {
        self.amenities.iter().map(String::as_str)
    }

    pub fn has_amenity(&self, id: &str) -> bool {
        self.amenities.contains(id)
    }

    fn snapshot(&self) -> EditSnapshot {
        EditSnapshot {
            odometer: parse_odometer(&self.odometer_text),
            amenities: self.amenities.iter().cloned().collect(),
            blocked_dates: self.availability.blocked().to_vec(),
            gallery: self.gallery.photos().to_vec(),
        }
    }
}

/// Shared busy indicator. Clones observe the same flag, so a screen can
/// keep one to disable its save button while a save runs.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Mark busy until the returned guard is dropped, or None when already
    /// busy.
    fn try_begin(&self) -> Option<BusyGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(self.0.clone()))
    }
}

struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveDecision {
    /// Nothing unsaved; navigate away.
    Leave,
    /// Ask the host to discard, cancel or save first.
    Confirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveChoice {
    Discard,
    Cancel,
    Save,
}

pub struct CarDraft {
    confirmed: Car,
    snapshot: EditSnapshot,
    staged: StagedChanges,
    today: DateKey,
    busy: BusyFlag,
}

impl CarDraft {
    pub fn load(car: Car, today: DateKey) -> Self {
        let staged = StagedChanges::from_car(&car, today);
        Self {
            snapshot: staged.snapshot(),
            staged,
            confirmed: car,
            today,
            busy: BusyFlag::default(),
        }
    }

    /// Fetch a car and start a draft for it, with "today" taken in the car's
    /// own time zone.
    #[tracing::instrument(skip(backend, time))]
    pub async fn fetch(
        backend: &dyn HostBackend,
        car_id: &CarId,
        time: &TimeSource,
    ) -> Result<Self, ClientError> {
        let car = backend.get_car(car_id).await?;
        let today = time.today(car.timezone());
        Ok(Self::load(car, today))
    }

    /// The last record confirmed by the backend.
    pub fn car(&self) -> &Car {
        &self.confirmed
    }

    pub fn snapshot(&self) -> &EditSnapshot {
        &self.snapshot
    }

    pub fn staged(&self) -> &StagedChanges {
        &self.staged
    }

    pub fn today(&self) -> DateKey {
        self.today
    }

    pub fn availability_mut(&mut self) -> &mut AvailabilityEditor {
        &mut self.staged.availability
    }

    pub fn gallery_mut(&mut self) -> &mut Gallery {
        &mut self.staged.gallery
    }

    pub fn busy_flag(&self) -> BusyFlag {
        self.busy.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    /// Locked once the loaded record has a positive reading.
    pub fn odometer_locked(&self) -> bool {
        self.confirmed.odometer_locked()
    }

    pub fn set_odometer_text(
        &mut self,
        text: impl Into<String>,
    ) -> Result<(), ValidationError> {
        if self.odometer_locked() {
            return Err(ValidationError::OdometerLocked);
        }
        self.staged.odometer_text = text.into();
        Ok(())
    }

    /// Toggle a catalog amenity, returning whether it is now selected.
    pub fn toggle_amenity(&mut self, id: &str) -> Result<bool, ValidationError> {
        if self.staged.amenities.remove(id) {
            return Ok(false);
        }
        if !is_catalog_amenity(id) {
            return Err(ValidationError::UnknownAmenity(id.to_string()));
        }
        self.staged.amenities.insert(id.to_string());
        Ok(true)
    }

    pub fn is_dirty(&self) -> bool {
        self.staged.snapshot() != self.snapshot
    }

    /// Validate the staged values and build the patch to send.
    pub fn build_patch(&self) -> Result<CarPatch, ValidationError> {
        let odometer_km = if self.odometer_locked() {
            None
        } else {
            Some(self.validated_odometer()?)
        };

        let timezone = self
            .confirmed
            .timezone()
            .unwrap_or(DEFAULT_TIMEZONE)
            .to_string();

        Ok(CarPatch {
            features: Some(FeaturesPatch {
                amenities: self.staged.amenities.iter().cloned().collect(),
            }),
            requirements: Some(RequirementsPatch {
                availability: AvailabilityPatch {
                    blocked_dates: self.staged.availability.blocked().to_vec(),
                    timezone,
                },
            }),
            image_gallery: Some(self.staged.gallery.photos().to_vec()),
            odometer_km,
        })
    }

    fn validated_odometer(&self) -> Result<f64, ValidationError> {
        let text = self.staged.odometer_text.trim();
        if text.is_empty() {
            return Err(ValidationError::MissingOdometer);
        }
        let km = parse_odometer(text)
            .filter(|km| *km > 0.0)
            .ok_or(ValidationError::InvalidOdometer)?;
        if !self.confirmed.status.is_active()
            && km > UNPUBLISHED_ODOMETER_LIMIT_KM
        {
            return Err(ValidationError::OdometerOverLimit);
        }
        Ok(km)
    }

    /// Send the staged changes, then reload the record and rebuild the
    /// snapshot from what the backend returns. On failure the draft stays
    /// dirty. If only the reload fails, the updated record is still taken
    /// as confirmed so a retry matches the server.
    #[tracing::instrument(skip_all, fields(car_id = %self.confirmed.id))]
    pub async fn save(
        &mut self,
        backend: &dyn HostBackend,
    ) -> Result<(), SaveError> {
        let _busy = self.busy.try_begin().ok_or(SaveError::Busy)?;
        if !self.is_dirty() {
            return Err(SaveError::NoChanges);
        }
        let patch = self.build_patch()?;

        let car_id = self.confirmed.id;
        let updated = backend.update_car(&car_id, &patch).await?;
        let fresh = match backend.get_car(&car_id).await {
            Ok(fresh) => fresh,
            Err(e) => {
                self.confirmed = updated;
                return Err(e.into());
            }
        };
        self.reconcile(fresh);
        tracing::info!("Saved car");
        Ok(())
    }

    /// Save pending edits if any, then publish.
    #[tracing::instrument(skip_all, fields(car_id = %self.confirmed.id))]
    pub async fn publish(
        &mut self,
        backend: &dyn HostBackend,
    ) -> Result<(), SaveError> {
        if self.is_dirty() {
            self.save(backend).await?;
        }
        let _busy = self.busy.try_begin().ok_or(SaveError::Busy)?;
        let car_id = self.confirmed.id;
        let published = backend.publish_car(&car_id).await?;
        self.reconcile(published);
        Ok(())
    }

    /// Replace the confirmed record and reset staged edits and the snapshot
    /// to match it.
    pub fn reconcile(&mut self, car: Car) {
        self.staged = StagedChanges::from_car(&car, self.today);
        self.snapshot = self.staged.snapshot();
        self.confirmed = car;
    }

    /// Throw away staged edits.
    pub fn discard(&mut self) {
        self.staged = StagedChanges::from_car(&self.confirmed, self.today);
    }

    pub fn request_leave(&self) -> LeaveDecision {
        if self.is_dirty() {
            LeaveDecision::Confirm
        } else {
            LeaveDecision::Leave
        }
    }

    /// Act on the host's answer to the leave prompt. Returns whether the
    /// screen may navigate away.
    pub async fn resolve_leave(
        &mut self,
        choice: LeaveChoice,
        backend: &dyn HostBackend,
    ) -> Result<bool, SaveError> {
        match choice {
            LeaveChoice::Discard => {
                self.discard();
                Ok(true)
            }
            LeaveChoice::Cancel => Ok(false),
            LeaveChoice::Save => {
                self.save(backend).await?;
                Ok(true)
            }
        }
    }
}
