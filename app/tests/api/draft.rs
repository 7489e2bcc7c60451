use app::availability::TapOutcome;
use app::draft::{CarDraft, LeaveChoice, LeaveDecision, SaveError};
use payloads::{CarStatus, ClientError, DateKey};
use reqwest::StatusCode;
use test_helpers::{active_car, draft_car, spawn_app};

fn day(s: &str) -> DateKey {
    s.parse().unwrap()
}

#[tokio::test]
async fn save_sends_patch_then_reloads() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let car_id = app.insert_car(draft_car());

    let mut draft = CarDraft::fetch(&app.client, &car_id, &app.time_source).await?;
    assert!(!draft.odometer_locked());
    assert!(!draft.is_dirty());

    draft.set_odometer_text("12,500")?;
    draft.toggle_amenity("bluetooth")?;
    let today = draft.today();
    let editor = draft.availability_mut();
    editor.tap(day("2025-02-10"), today);
    assert!(matches!(
        editor.tap(day("2025-02-12"), today),
        TapOutcome::ConfirmRequired(_)
    ));
    editor.confirm();
    assert!(draft.is_dirty());

    draft.save(&app.client).await?;
    assert!(!draft.is_dirty());
    assert!(draft.odometer_locked());

    let stored = app.stored_car(&car_id).unwrap();
    assert_eq!(stored.odometer_km, Some(12_500.0));
    assert_eq!(stored.features.amenities, vec!["bluetooth"]);
    assert_eq!(
        stored.blocked_dates(),
        &[day("2025-02-10"), day("2025-02-11"), day("2025-02-12")]
    );
    assert_eq!(stored.timezone(), Some("UTC"));

    let methods: Vec<String> =
        app.requests().into_iter().map(|r| r.method).collect();
    assert_eq!(methods, vec!["GET", "PATCH", "GET"]);

    Ok(())
}

#[tokio::test]
async fn normalized_record_becomes_the_new_baseline() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.normalize_amenities(true);
    let mut car = active_car();
    car.features.amenities = vec!["GPS".into()];
    let car_id = app.insert_car(car);

    let mut draft = CarDraft::fetch(&app.client, &car_id, &app.time_source).await?;
    draft.toggle_amenity("sunroof")?;
    draft.save(&app.client).await?;

    assert_eq!(draft.car().features.amenities, vec!["gps", "sunroof"]);
    assert!(draft.staged().has_amenity("gps"));
    assert!(!draft.is_dirty());
    assert_eq!(draft.request_leave(), LeaveDecision::Leave);

    Ok(())
}

#[tokio::test]
async fn locked_odometer_is_not_sent() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let car_id = app.insert_car(active_car());

    let mut draft = CarDraft::fetch(&app.client, &car_id, &app.time_source).await?;
    assert!(draft.set_odometer_text("1").is_err());
    draft.gallery_mut().move_photo(1, 0)?;
    draft.save(&app.client).await?;

    let stored = app.stored_car(&car_id).unwrap();
    assert_eq!(stored.odometer_km, Some(42_000.0));
    assert_eq!(
        stored.image_gallery,
        vec!["https://cdn.test/back.jpg", "https://cdn.test/front.jpg"]
    );

    Ok(())
}

#[tokio::test]
async fn failed_save_keeps_edits() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let car_id = app.insert_car(active_car());
    let mut draft = CarDraft::fetch(&app.client, &car_id, &app.time_source).await?;
    draft.toggle_amenity("sunroof")?;

    let expired = app.client_with_token(Some("expired"));
    let err = draft.save(&expired).await.unwrap_err();
    match err {
        SaveError::Client(ClientError::APIError(status, _)) => {
            assert_eq!(status, StatusCode::UNAUTHORIZED)
        }
        other => panic!("Expected a client error, got {other:?}"),
    }
    assert!(draft.is_dirty());
    assert!(!draft.is_busy());
    assert_eq!(draft.request_leave(), LeaveDecision::Confirm);

    // Saving from the leave prompt with a good session succeeds
    assert!(draft.resolve_leave(LeaveChoice::Save, &app.client).await?);
    assert!(!draft.is_dirty());

    Ok(())
}

#[tokio::test]
async fn publish_saves_pending_edits_first() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let mut car = draft_car();
    car.image_path = Some("https://cdn.test/legacy.jpg".into());
    let car_id = app.insert_car(car);

    let mut draft = CarDraft::fetch(&app.client, &car_id, &app.time_source).await?;
    assert_eq!(
        draft.staged().gallery.main_photo(),
        Some("https://cdn.test/legacy.jpg")
    );
    draft.set_odometer_text("8000")?;
    draft.publish(&app.client).await?;

    assert_eq!(draft.car().status, CarStatus::Active);
    let calls: Vec<(String, String)> = app
        .requests()
        .into_iter()
        .map(|r| (r.method, r.path))
        .collect();
    let path = format!("/api/host/cars/{car_id}");
    assert_eq!(
        calls,
        vec![
            ("GET".to_string(), path.clone()),
            ("PATCH".to_string(), path.clone()),
            ("GET".to_string(), path.clone()),
            ("POST".to_string(), format!("{path}/publish")),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn publish_without_photos_is_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let mut car = draft_car();
    car.odometer_km = Some(5_000.0);
    let car_id = app.insert_car(car);

    let mut draft = CarDraft::fetch(&app.client, &car_id, &app.time_source).await?;
    let err = draft.publish(&app.client).await.unwrap_err();
    assert_eq!(err.to_string(), "Add at least one photo before publishing");
    assert_eq!(draft.car().status, CarStatus::Draft);

    Ok(())
}
