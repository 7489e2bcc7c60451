use app::upload::{CancelFlag, PendingPhoto, PhotoStatus, upload_batch};
use test_helpers::{draft_car, spawn_app};

fn photo(name: &str, mime_type: &str) -> PendingPhoto {
    PendingPhoto {
        file_name: name.into(),
        mime_type: mime_type.into(),
        bytes: vec![0xff, 0xd8, 0xff, 0xe0],
    }
}

#[tokio::test]
async fn batch_uploads_directly_then_finalizes() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let car_id = app.insert_car(draft_car());

    let photos = vec![photo("front.jpg", "image/jpeg"), photo("side.png", "image/png")];
    let report =
        upload_batch(&app.client, &car_id, photos, &CancelFlag::default()).await?;

    assert_eq!(report.statuses, vec![PhotoStatus::Done, PhotoStatus::Done]);
    assert_eq!(app.uploaded_count(), 2);
    let car = report.car.expect("finalized car");
    assert_eq!(car.image_gallery.len(), 2);
    assert!(car.image_gallery[0].ends_with("-front.jpg"));
    assert!(car.image_gallery[1].ends_with("-side.png"));

    // Storage uploads go straight to the signed URL without the API token
    let puts: Vec<_> = app
        .requests()
        .into_iter()
        .filter(|r| r.method == "PUT")
        .collect();
    assert_eq!(puts.len(), 2);
    assert!(puts.iter().all(|r| r.authorization.is_none()));
    assert_eq!(app.requests_to("/photos/finalize").len(), 1);

    Ok(())
}

#[tokio::test]
async fn rejected_photo_halts_the_batch() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let car_id = app.insert_car(draft_car());

    let photos = vec![
        photo("front.jpg", "image/jpeg"),
        photo("notes.txt", "text/plain"),
        photo("back.jpg", "image/jpeg"),
    ];
    let report =
        upload_batch(&app.client, &car_id, photos, &CancelFlag::default()).await?;

    assert_eq!(report.failure(), Some((1, "Unsupported file type text/plain")));
    assert_eq!(report.statuses[2], PhotoStatus::Skipped);
    assert_eq!(report.progress(), (1, 3));
    // The photo uploaded before the failure is kept
    assert_eq!(app.stored_car(&car_id).unwrap().image_gallery.len(), 1);

    Ok(())
}

#[tokio::test]
async fn cancel_during_upload_keeps_the_finished_photo() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let car_id = app.insert_car(draft_car());
    let cancel = CancelFlag::default();
    app.cancel_after_next_upload(&cancel);

    let photos = vec![
        photo("front.jpg", "image/jpeg"),
        photo("side.jpg", "image/jpeg"),
        photo("back.jpg", "image/jpeg"),
    ];
    let report = upload_batch(&app.client, &car_id, photos, &cancel).await?;

    assert!(report.cancelled);
    assert_eq!(
        report.statuses,
        vec![PhotoStatus::Done, PhotoStatus::Skipped, PhotoStatus::Skipped]
    );
    assert_eq!(app.uploaded_count(), 1);
    assert_eq!(app.requests_to("/photos/upload-url").len(), 1);
    assert_eq!(app.requests_to("/photos/finalize").len(), 1);

    let stored = app.stored_car(&car_id).unwrap();
    assert_eq!(stored.image_gallery.len(), 1);
    assert!(stored.image_gallery[0].ends_with("-front.jpg"));

    Ok(())
}

#[tokio::test]
async fn storage_outage_finalizes_nothing() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.storage_down(true);
    let car_id = app.insert_car(draft_car());

    let report = upload_batch(
        &app.client,
        &car_id,
        vec![photo("front.jpg", "image/jpeg")],
        &CancelFlag::default(),
    )
    .await?;

    assert_eq!(
        report.statuses,
        vec![PhotoStatus::Failed("Storage unavailable".into())]
    );
    assert!(report.car.is_none());
    assert!(app.requests_to("/photos/finalize").is_empty());
    assert!(app.stored_car(&car_id).unwrap().image_gallery.is_empty());

    Ok(())
}
