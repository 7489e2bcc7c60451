//! Sequential photo uploads for a car.
//!
//! Each photo gets its own pre-signed URL, is uploaded, and only then does
//! the next one start. A failure halts the batch; photos uploaded before it
//! are still finalized.

use payloads::{
    Car, CarId, ClientError,
    requests::{FinalizePhotos, PhotoUploadRequest, UploadedPhoto},
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::backend::HostBackend;
use crate::telemetry::log_error;

/// Cooperative cancellation, checked before each photo starts. A photo
/// already uploading is allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPhoto {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoStatus {
    Queued,
    Done,
    Failed(String),
    /// Not attempted because of cancellation or an earlier failure.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// One status per input photo, in input order.
    pub statuses: Vec<PhotoStatus>,
    pub uploaded: Vec<UploadedPhoto>,
    pub cancelled: bool,
    /// The record after finalizing, when anything was uploaded.
    pub car: Option<Car>,
}

impl BatchReport {
    pub fn failure(&self) -> Option<(usize, &str)> {
        self.statuses.iter().enumerate().find_map(|(i, s)| match s {
            PhotoStatus::Failed(message) => Some((i, message.as_str())),
            _ => None,
        })
    }

    pub fn progress(&self) -> (usize, usize) {
        (self.uploaded.len(), self.statuses.len())
    }
}

async fn upload_one(
    backend: &dyn HostBackend,
    car_id: &CarId,
    photo: PendingPhoto,
) -> Result<UploadedPhoto, ClientError> {
    let request = PhotoUploadRequest {
        file_name: photo.file_name,
        mime_type: photo.mime_type,
        size_bytes: photo.bytes.len() as u64,
    };
    let target = backend.create_photo_upload_url(car_id, &request).await?;
    backend.upload_photo_bytes(&target, photo.bytes).await?;
    Ok(UploadedPhoto {
        photo_id: target.photo_id,
        path: target.path,
        mime_type: target.mime_type,
    })
}

/// Upload `photos` one at a time, then finalize whatever succeeded.
///
/// Only a failing finalize is returned as an error; upload failures are
/// reported per photo in the [`BatchReport`].
#[tracing::instrument(skip(backend, photos, cancel), fields(count = photos.len()))]
pub async fn upload_batch(
    backend: &dyn HostBackend,
    car_id: &CarId,
    photos: Vec<PendingPhoto>,
    cancel: &CancelFlag,
) -> Result<BatchReport, ClientError> {
    let mut statuses = vec![PhotoStatus::Queued; photos.len()];
    let mut uploaded = Vec::new();
    let mut cancelled = false;

    for (index, photo) in photos.into_iter().enumerate() {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        match upload_one(backend, car_id, photo).await {
            Ok(done) => {
                statuses[index] = PhotoStatus::Done;
                uploaded.push(done);
            }
            Err(e) => {
                tracing::warn!(index, "Photo failed to upload, halting batch");
                statuses[index] = PhotoStatus::Failed(e.to_string());
                log_error(e);
                break;
            }
        }
    }

    for status in statuses.iter_mut() {
        if *status == PhotoStatus::Queued {
            *status = PhotoStatus::Skipped;
        }
    }

    let car = if uploaded.is_empty() {
        None
    } else {
        let details = FinalizePhotos {
            photos: uploaded.clone(),
        };
        Some(backend.finalize_photos(car_id, &details).await?)
    };

    Ok(BatchReport {
        statuses,
        uploaded,
        cancelled,
        car,
    })
}
