use app::nearby::{NearbySearch, SearchFilters};
use payloads::{GeoPoint, VehicleType};
use test_helpers::{map_car, spawn_app};

const AUSTIN: GeoPoint = GeoPoint {
    lat: 30.2672,
    lng: -97.7431,
};

#[tokio::test]
async fn refresh_queries_the_bounding_box() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.insert_map_car(map_car("far", 30.33, -97.74));
    app.insert_map_car(map_car("near", 30.27, -97.745));
    app.insert_map_car(map_car("other city", 29.76, -95.37));

    let mut search = NearbySearch::new(AUSTIN, 10.0);
    assert!(search.needs_fetch());
    assert_eq!(search.refresh(&app.client).await?, 2);
    assert!(!search.needs_fetch());

    let titles: Vec<&str> =
        search.results().iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["near", "far"]);

    let requests = app.requests_to("/cars/map");
    assert_eq!(requests.len(), 1);
    let query = &requests[0].query;
    for key in ["minLat=", "maxLat=", "minLng=", "maxLng="] {
        assert!(query.contains(key), "{key} missing from {query}");
    }
    assert!(!query.contains("startDate"));

    Ok(())
}

#[tokio::test]
async fn filters_do_not_refetch() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.insert_map_car(map_car("suv", 30.27, -97.745));

    let mut search = NearbySearch::new(AUSTIN, 10.0);
    search.refresh(&app.client).await?;
    search.set_filters(SearchFilters {
        vehicle_type: Some(VehicleType::Van),
        ..Default::default()
    });
    assert!(search.results().is_empty());
    assert!(!search.needs_fetch());

    search.set_radius(25.0);
    assert!(search.needs_fetch());
    search.refresh(&app.client).await?;
    assert_eq!(app.requests_to("/cars/map").len(), 2);

    Ok(())
}

#[tokio::test]
async fn failed_search_clears_results() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.insert_map_car(map_car("near", 30.27, -97.745));

    let mut search = NearbySearch::new(AUSTIN, 10.0);
    search.refresh(&app.client).await?;
    assert_eq!(search.results().len(), 1);

    let expired = app.client_with_token(Some("expired"));
    assert!(search.refresh(&expired).await.is_err());
    assert!(search.results().is_empty());

    Ok(())
}
