mod cars;
mod draft;
mod photos;
mod search;

use payloads::ClientError;
use test_helpers::spawn_app;

#[tokio::test]
async fn signed_out_client_sends_nothing() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let car_id = app.insert_car(test_helpers::active_car());

    let err = app
        .client_with_token(None)
        .get_car(&car_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Unauthenticated));
    assert!(err.is_auth_error());
    assert!(app.requests().is_empty());

    Ok(())
}

#[tokio::test]
async fn every_api_request_carries_the_bearer_token() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let car_id = app.insert_car(test_helpers::active_car());

    app.client.get_car(&car_id).await?;
    app.client.publish_car(&car_id).await?;

    let requests = app.requests();
    assert_eq!(requests.len(), 2);
    for request in requests {
        assert_eq!(
            request.authorization.as_deref(),
            Some("Bearer test-id-token")
        );
    }

    Ok(())
}
