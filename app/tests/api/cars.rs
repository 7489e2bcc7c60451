use app::state::{HOST_PAGE_SIZE, State};
use payloads::{CarStatus, ClientError, requests};
use reqwest::StatusCode;
use test_helpers::{active_car, assert_status_code, draft_car, spawn_app};

#[tokio::test]
async fn read_update_delete_car() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let car_id = app.insert_car(active_car());

    let car = app.client.get_car(&car_id).await?;
    assert_eq!(car.status, CarStatus::Active);
    assert!(car.odometer_locked());
    assert_eq!(car.timezone(), Some("America/Chicago"));

    let patch = requests::CarPatch {
        image_gallery: Some(vec!["https://cdn.test/back.jpg".into()]),
        ..Default::default()
    };
    let updated = app.client.update_car(&car_id, &patch).await?;
    assert_eq!(updated.image_gallery, vec!["https://cdn.test/back.jpg"]);
    // Fields absent from the patch are untouched
    assert_eq!(updated.features.amenities, car.features.amenities);

    app.client.delete_car(&car_id).await?;
    let page = app
        .client
        .list_cars(&requests::ListCars {
            limit: 10,
            offset: 0,
        })
        .await?;
    assert!(page.items.is_empty());
    assert_eq!(page.page.total, 0);

    Ok(())
}

#[tokio::test]
async fn missing_car_is_not_found() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let car_id = draft_car().id;

    let result = app.client.get_car(&car_id).await;
    assert_eq!(result.as_ref().unwrap_err().to_string(), "Car not found");
    assert_status_code(result, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn rejected_token_is_an_auth_error() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let car_id = app.insert_car(active_car());

    let err = app
        .client_with_token(Some("expired"))
        .get_car(&car_id)
        .await
        .unwrap_err();
    assert!(err.is_auth_error());
    assert_eq!(err.to_string(), "Missing or invalid token");

    Ok(())
}

#[tokio::test]
async fn backend_validation_message_reaches_the_caller() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let car_id = app.insert_car(draft_car());

    let patch = requests::CarPatch {
        odometer_km: Some(250_000.0),
        ..Default::default()
    };
    let err = app.client.update_car(&car_id, &patch).await.unwrap_err();
    match err {
        ClientError::APIError(status, message) => {
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
            assert_eq!(
                message,
                "Odometer cannot exceed 200,000 km before the car is published"
            );
        }
        other => panic!("Expected APIError, got {other:?}"),
    }
    assert_eq!(app.stored_car(&car_id).unwrap().odometer_km, None);

    Ok(())
}

#[tokio::test]
async fn host_cars_load_page_by_page() -> anyhow::Result<()> {
    let app = spawn_app().await;
    for i in 0..(HOST_PAGE_SIZE + 3) {
        let mut car = draft_car();
        car.title = format!("car {i:02}");
        app.insert_car(car);
    }
    let mut state = State::default();

    assert_eq!(state.load_next_host_page(&app.client).await?, 20);
    assert_eq!(state.load_next_host_page(&app.client).await?, 3);
    assert!(!state.host.has_more());
    assert_eq!(state.load_next_host_page(&app.client).await?, 0);

    assert_eq!(state.host.cars.len(), 23);
    assert_eq!(state.host.cars[0].title, "car 00");
    assert_eq!(state.host.cars[22].title, "car 22");

    let queries: Vec<String> = app
        .requests_to("/host/cars")
        .into_iter()
        .map(|r| r.query)
        .collect();
    assert_eq!(queries, vec!["limit=20&offset=0", "limit=20&offset=20"]);

    Ok(())
}

#[tokio::test]
async fn deleted_car_drops_out_of_loaded_pages() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let kept = app.insert_car(active_car());
    let removed = app.insert_car(draft_car());
    let mut state = State::default();
    state.load_next_host_page(&app.client).await?;
    assert_eq!(state.host.cars.len(), 2);

    state.delete_host_car(&app.client, removed).await?;
    assert_eq!(state.host.cars.len(), 1);
    assert_eq!(state.host.cars[0].id, kept);
    assert_eq!(state.host.page.unwrap().total, 1);
    assert_eq!(
        app.stored_car(&removed).unwrap().status,
        CarStatus::Deleted
    );

    Ok(())
}
