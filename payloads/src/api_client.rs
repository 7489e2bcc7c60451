use crate::{Car, CarId, MapCar, requests, responses};
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::sync::Arc;

type ReqwestResult = Result<reqwest::Response, reqwest::Error>;

/// Supplies bearer tokens from the identity provider.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Return an ID token, asking the provider for a fresh one when
    /// `force_refresh` is set. Fails with `ClientError::Unauthenticated`
    /// when nobody is signed in.
    async fn id_token(
        &self,
        force_refresh: bool,
    ) -> Result<SecretString, ClientError>;
}

/// A fixed token, for tools and tests. `None` behaves as signed out.
pub struct StaticToken(pub Option<SecretString>);

#[async_trait]
impl TokenSource for StaticToken {
    async fn id_token(
        &self,
        _force_refresh: bool,
    ) -> Result<SecretString, ClientError> {
        self.0.clone().ok_or(ClientError::Unauthenticated)
    }
}

/// An API client for the Car/Host backend.
pub struct APIClient {
    pub address: String,
    pub inner_client: reqwest::Client,
    pub tokens: Arc<dyn TokenSource>,
}

/// Helper methods for http actions
impl APIClient {
    pub fn new(
        address: impl Into<String>,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            address: address.into().trim_end_matches('/').to_string(),
            inner_client: reqwest::Client::new(),
            tokens,
        }
    }

    fn format_url(&self, path: &str) -> String {
        format!("{}/api/{path}", &self.address)
    }

    /// Every request gets a freshly refreshed token.
    async fn authorize(
        &self,
        request: RequestBuilder,
    ) -> Result<RequestBuilder, ClientError> {
        let token = self.tokens.id_token(true).await?;
        Ok(request.bearer_auth(token.expose_secret()))
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ClientError> {
        let request = self.inner_client.get(self.format_url(path));
        Ok(self.authorize(request).await?.send().await?)
    }

    async fn get_with_query(
        &self,
        path: &str,
        query: &impl Serialize,
    ) -> Result<reqwest::Response, ClientError> {
        let request = self.inner_client.get(self.format_url(path)).query(query);
        Ok(self.authorize(request).await?.send().await?)
    }

    async fn post(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<reqwest::Response, ClientError> {
        let request = self.inner_client.post(self.format_url(path)).json(body);
        Ok(self.authorize(request).await?.send().await?)
    }

    async fn empty_post(
        &self,
        path: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let request = self.inner_client.post(self.format_url(path));
        Ok(self.authorize(request).await?.send().await?)
    }

    async fn patch(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<reqwest::Response, ClientError> {
        let request =
            self.inner_client.patch(self.format_url(path)).json(body);
        Ok(self.authorize(request).await?.send().await?)
    }

    async fn delete(
        &self,
        path: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let request = self.inner_client.delete(self.format_url(path));
        Ok(self.authorize(request).await?.send().await?)
    }

    /// Direct upload to a pre-signed storage URL. Not authorized with the
    /// API token; the URL carries its own signature.
    async fn put_bytes(
        &self,
        url: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> ReqwestResult {
        self.inner_client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await
    }
}

/// Methods on the backend API
impl APIClient {
    #[tracing::instrument(skip(self))]
    pub async fn get_car(&self, car_id: &CarId) -> Result<Car, ClientError> {
        let response = self.get(&format!("host/cars/{car_id}")).await?;
        ok_body(response).await
    }

    /// Apply a partial update, returning the backend's view of the car.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_car(
        &self,
        car_id: &CarId,
        patch: &requests::CarPatch,
    ) -> Result<Car, ClientError> {
        let response =
            self.patch(&format!("host/cars/{car_id}"), patch).await?;
        ok_body(response).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn publish_car(
        &self,
        car_id: &CarId,
    ) -> Result<Car, ClientError> {
        let response = self
            .empty_post(&format!("host/cars/{car_id}/publish"))
            .await?;
        ok_body(response).await
    }

    /// Deactivate a car listing.
    #[tracing::instrument(skip(self))]
    pub async fn delete_car(&self, car_id: &CarId) -> Result<(), ClientError> {
        let response = self.delete(&format!("host/cars/{car_id}")).await?;
        ok_empty(response).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_cars(
        &self,
        page: &requests::ListCars,
    ) -> Result<responses::CarPage, ClientError> {
        let response = self.get_with_query("host/cars", page).await?;
        ok_body(response).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_photo_upload_url(
        &self,
        car_id: &CarId,
        details: &requests::PhotoUploadRequest,
    ) -> Result<responses::PhotoUploadTarget, ClientError> {
        let response = self
            .post(&format!("host/cars/{car_id}/photos/upload-url"), details)
            .await?;
        ok_body(response).await
    }

    #[tracing::instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn upload_photo_bytes(
        &self,
        target: &responses::PhotoUploadTarget,
        bytes: Vec<u8>,
    ) -> Result<(), ClientError> {
        let response = self
            .put_bytes(&target.upload_url, &target.mime_type, bytes)
            .await?;
        ok_empty(response).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn finalize_photos(
        &self,
        car_id: &CarId,
        details: &requests::FinalizePhotos,
    ) -> Result<Car, ClientError> {
        let response = self
            .post(&format!("host/cars/{car_id}/photos/finalize"), details)
            .await?;
        ok_body(response).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn search_map(
        &self,
        query: &requests::MapSearchQuery,
    ) -> Result<Vec<MapCar>, ClientError> {
        let response = self.get_with_query("cars/map", query).await?;
        let results: responses::MapSearchResults = ok_body(response).await?;
        Ok(results.items)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An unhandled API error to display, containing the backend's message.
    #[error("{1}")]
    APIError(StatusCode, String),
    #[error("You are not signed in. Please sign in again.")]
    Unauthenticated,
    #[error("Network error. Please check your connection.")]
    Network(#[from] reqwest::Error),
}

impl ClientError {
    /// Errors that require the user to sign in again rather than retry.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::Unauthenticated => true,
            Self::APIError(status, _) => {
                *status == StatusCode::UNAUTHORIZED
                    || *status == StatusCode::FORBIDDEN
            }
            Self::Network(_) => false,
        }
    }
}

/// Deserialize a successful request into the desired type, or return an
/// appropriate error.
pub async fn ok_body<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }
    Ok(response.json::<T>().await?)
}

/// Check that an empty response is OK, returning a ClientError if not.
pub async fn ok_empty(response: reqwest::Response) -> Result<(), ClientError> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }
    Ok(())
}

async fn api_error(response: reqwest::Response) -> ClientError {
    let status = response.status();
    match response.text().await {
        Ok(body) => ClientError::APIError(status, error_message(status, &body)),
        Err(e) => e.into(),
    }
}

/// Pull the user-facing message out of an error body: a JSON `message` or
/// `error` field, then the raw text, then the status reason.
pub fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<responses::ErrorBody>(body)
        && let Some(message) = parsed.message.or(parsed.error)
        && !message.trim().is_empty()
    {
        return message;
    }
    let text = body.trim();
    if !text.is_empty() {
        return text.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_json_message() {
        let msg = error_message(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message":"Odometer too high","error":"validation"}"#,
        );
        assert_eq!(msg, "Odometer too high");
    }

    #[test]
    fn error_message_falls_back_to_error_field_then_text() {
        let msg = error_message(
            StatusCode::BAD_REQUEST,
            r#"{"error":"Car not found"}"#,
        );
        assert_eq!(msg, "Car not found");

        let msg = error_message(StatusCode::BAD_GATEWAY, "  upstream down \n");
        assert_eq!(msg, "upstream down");

        let msg = error_message(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(msg, "Service Unavailable");
    }

    #[test]
    fn auth_errors_are_recognized() {
        assert!(ClientError::Unauthenticated.is_auth_error());
        assert!(
            ClientError::APIError(StatusCode::UNAUTHORIZED, "expired".into())
                .is_auth_error()
        );
        assert!(
            !ClientError::APIError(StatusCode::NOT_FOUND, "gone".into())
                .is_auth_error()
        );
    }

    #[tokio::test]
    async fn signed_out_token_source_is_unauthenticated() {
        let tokens = StaticToken(None);
        let err = tokens.id_token(true).await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthenticated));
    }
}
