use crate::{DateKey, PhotoId};
use serde::{Deserialize, Serialize};

/// Partial update of a car listing. Absent fields are left untouched by the
/// backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<FeaturesPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<RequirementsPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_gallery: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odometer_km: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturesPatch {
    pub amenities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementsPatch {
    pub availability: AvailabilityPatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityPatch {
    #[serde(rename = "blockedDates")]
    pub blocked_dates: Vec<DateKey>,
    pub timezone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListCars {
    pub limit: u32,
    pub offset: u32,
}

/// Ask for a pre-signed URL to upload a single photo to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoUploadRequest {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedPhoto {
    pub photo_id: PhotoId,
    pub path: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizePhotos {
    pub photos: Vec<UploadedPhoto>,
}

/// Bounding-box search. Serialized as query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSearchQuery {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateKey>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch_serializes_to_empty_object() {
        let json = serde_json::to_value(CarPatch::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn availability_patch_uses_backend_field_names() {
        let patch = CarPatch {
            requirements: Some(RequirementsPatch {
                availability: AvailabilityPatch {
                    blocked_dates: vec!["2025-03-01".parse().unwrap()],
                    timezone: "UTC".into(),
                },
            }),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "requirements": {
                    "availability": {
                        "blockedDates": ["2025-03-01"],
                        "timezone": "UTC"
                    }
                }
            })
        );
    }
}
