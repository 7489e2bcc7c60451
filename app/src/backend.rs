use async_trait::async_trait;
use payloads::{
    APIClient, Car, CarId, ClientError, MapCar, requests, responses,
};

/// The backend operations the client logic depends on.
///
/// Implemented by [`APIClient`]; tests substitute in-memory fakes.
#[async_trait]
pub trait HostBackend: Send + Sync {
    async fn get_car(&self, car_id: &CarId) -> Result<Car, ClientError>;

    async fn update_car(
        &self,
        car_id: &CarId,
        patch: &requests::CarPatch,
    ) -> Result<Car, ClientError>;

    async fn publish_car(&self, car_id: &CarId) -> Result<Car, ClientError>;

    async fn delete_car(&self, car_id: &CarId) -> Result<(), ClientError>;

    async fn list_cars(
        &self,
        page: &requests::ListCars,
    ) -> Result<responses::CarPage, ClientError>;

    async fn create_photo_upload_url(
        &self,
        car_id: &CarId,
        details: &requests::PhotoUploadRequest,
    ) -> Result<responses::PhotoUploadTarget, ClientError>;

    async fn upload_photo_bytes(
        &self,
        target: &responses::PhotoUploadTarget,
        bytes: Vec<u8>,
    ) -> Result<(), ClientError>;

    async fn finalize_photos(
        &self,
        car_id: &CarId,
        details: &requests::FinalizePhotos,
    ) -> Result<Car, ClientError>;

    async fn search_map(
        &self,
        query: &requests::MapSearchQuery,
    ) -> Result<Vec<MapCar>, ClientError>;
}

#[async_trait]
impl HostBackend for APIClient {
    async fn get_car(&self, car_id: &CarId) -> Result<Car, ClientError> {
        APIClient::get_car(self, car_id).await
    }

    async fn update_car(
        &self,
        car_id: &CarId,
        patch: &requests::CarPatch,
    ) -> Result<Car, ClientError> {
        APIClient::update_car(self, car_id, patch).await
    }

    async fn publish_car(&self, car_id: &CarId) -> Result<Car, ClientError> {
        APIClient::publish_car(self, car_id).await
    }

    async fn delete_car(&self, car_id: &CarId) -> Result<(), ClientError> {
        APIClient::delete_car(self, car_id).await
    }

    async fn list_cars(
        &self,
        page: &requests::ListCars,
    ) -> Result<responses::CarPage, ClientError> {
        APIClient::list_cars(self, page).await
    }

    async fn create_photo_upload_url(
        &self,
        car_id: &CarId,
        details: &requests::PhotoUploadRequest,
    ) -> Result<responses::PhotoUploadTarget, ClientError> {
        APIClient::create_photo_upload_url(self, car_id, details).await
    }

    async fn upload_photo_bytes(
        &self,
        target: &responses::PhotoUploadTarget,
        bytes: Vec<u8>,
    ) -> Result<(), ClientError> {
        APIClient::upload_photo_bytes(self, target, bytes).await
    }

    async fn finalize_photos(
        &self,
        car_id: &CarId,
        details: &requests::FinalizePhotos,
    ) -> Result<Car, ClientError> {
        APIClient::finalize_photos(self, car_id, details).await
    }

    async fn search_map(
        &self,
        query: &requests::MapSearchQuery,
    ) -> Result<Vec<MapCar>, ClientError> {
        APIClient::search_map(self, query).await
    }
}
