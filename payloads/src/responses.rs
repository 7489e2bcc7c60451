use crate::{Car, MapCar, PhotoId};
use serde::{Deserialize, Serialize};

/// Pagination bookkeeping returned alongside list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub total: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarPage {
    pub items: Vec<Car>,
    pub page: PageInfo,
}

/// Where and how to upload a single photo. The upload itself goes directly
/// to `upload_url`, not through the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoUploadTarget {
    pub upload_url: String,
    pub photo_id: PhotoId,
    pub path: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSearchResults {
    pub items: Vec<MapCar>,
}

/// Error body shape used by the backend. Either field may carry the
/// user-facing message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
