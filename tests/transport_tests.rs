use axum::{
    extract::{Path, State},
    http::{StatusCode, Uri},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::net::TcpListener;

use cinema_recs::{
    error::{AppError, OrchestratorError, TransportError},
    models::{RecommendationRequest, Subject},
    services::{CatalogClient, ComparisonEngine, HttpTransport, Orchestrator, Transport},
};

/// Path and query of every request the fake service saw
type Seen = Arc<Mutex<Vec<String>>>;

fn record(seen: &Seen, uri: &Uri) {
    seen.lock().unwrap().push(uri.to_string());
}

async fn popular(State(seen): State<Seen>, uri: Uri) -> Json<Value> {
    record(&seen, &uri);
    Json(json!({
        "success": true,
        "count": 2,
        "data": [
            {"movieId": 318, "title": "Shawshank Redemption, The (1994)", "genres": "Crime|Drama", "avg_rating": 4.43},
            {"movieId": 356, "title": "Forrest Gump (1994)", "genres": "Comedy|Drama|Romance|War", "avg_rating": 4.16}
        ]
    }))
}

async fn hybrid(State(seen): State<Seen>, uri: Uri, Path(user_id): Path<i64>) -> Json<Value> {
    record(&seen, &uri);
    Json(json!({
        "success": true,
        "user_id": user_id,
        "data": [
            {"movieId": 1, "title": "Toy Story (1995)", "genres": "Adventure|Animation|Children", "score": 0.91}
        ]
    }))
}

async fn collaborative(Path(user_id): Path<i64>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"success": false, "error": format!("User with ID {} not found", user_id)})),
    )
}

async fn content(State(seen): State<Seen>, uri: Uri) -> Json<Value> {
    record(&seen, &uri);
    Json(json!({"success": true, "count": 0, "data": []}))
}

async fn item() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

async fn genre(State(seen): State<Seen>, uri: Uri, Path(genre): Path<String>) -> Json<Value> {
    record(&seen, &uri);
    if genre == "Sci/Fi" {
        Json(json!({"success": true, "data": [{"movieId": 1240, "title": "Terminator, The (1984)"}]}))
    } else {
        Json(json!({"success": false, "error": "Genre index unavailable"}))
    }
}

async fn search(State(seen): State<Seen>, uri: Uri) -> Json<Value> {
    record(&seen, &uri);
    Json(json!({
        "success": true,
        "data": [{"movie_id": 2571, "title": "Matrix, The (1999)", "genres": ["Action", "Sci-Fi"]}]
    }))
}

async fn rate(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["rating"].as_f64().is_some() && body["userId"].as_i64() == Some(7) {
        (StatusCode::CREATED, Json(json!({"success": true, "message": "Rating saved"})))
    } else {
        (StatusCode::BAD_REQUEST, Json(json!({"success": false, "error": "bad rating"})))
    }
}

/// Binds a fake scoring service on an ephemeral port and returns its `/api` base URL
async fn spawn_service() -> (String, Seen) {
    let seen: Seen = Arc::default();
    let app = Router::new()
        .route("/api/recommendations/popular", get(popular))
        .route("/api/recommendations/hybrid/:user_id", get(hybrid))
        .route("/api/recommendations/collaborative/:user_id", get(collaborative))
        .route("/api/recommendations/content/:movie_id", get(content))
        .route("/api/recommendations/item/:movie_id", get(item))
        .route("/api/movies/genre/:genre", get(genre))
        .route("/api/movies/search", get(search))
        .route("/api/ratings", post(rate))
        .with_state(seen.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/api", addr), seen)
}

fn transport(base_url: &str) -> Arc<dyn Transport> {
    Arc::new(HttpTransport::new(base_url, Duration::from_secs(5)).unwrap())
}

#[tokio::test]
async fn test_popular_sends_limit_and_preserves_order() {
    let (base_url, seen) = spawn_service().await;
    let orchestrator = Orchestrator::new(transport(&base_url));

    let result = tokio_test::assert_ok!(
        orchestrator
            .recommend(RecommendationRequest::new("popular").with_limit(2))
            .await
    );

    let ids: Vec<i64> = result.items.iter().map(|m| m.movie_id).collect();
    assert_eq!(ids, vec![318, 356]);
    assert_eq!(result.items[0].title, "Shawshank Redemption, The");
    assert_eq!(result.items[0].year.as_deref(), Some("1994"));
    assert_eq!(result.items[1].genres.len(), 4);
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        ["/api/recommendations/popular?limit=2"]
    );
}

#[tokio::test]
async fn test_hybrid_sends_limit_then_movie_id() {
    let (base_url, seen) = spawn_service().await;
    let orchestrator = Orchestrator::new(transport(&base_url));

    let request = RecommendationRequest::new("hybrid")
        .with_subject(Subject::user(7).with_movie(1))
        .with_limit(5)
        .with_param("diversity", "0.3");
    let result = orchestrator.recommend(request).await.unwrap();

    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].title, "Toy Story");
    assert_eq!(result.items[0].score, Some(0.91));
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        ["/api/recommendations/hybrid/7?limit=5&movieId=1&diversity=0.3"]
    );
}

#[tokio::test]
async fn test_error_status_carries_server_message() {
    let (base_url, _) = spawn_service().await;
    let orchestrator = Orchestrator::new(transport(&base_url));

    let err = orchestrator
        .recommend(RecommendationRequest::new("collaborative").for_user(99))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        OrchestratorError::Upstream(TransportError::HttpStatus {
            status: Some(404),
            message: Some("User with ID 99 not found".to_string()),
        })
    );
}

#[tokio::test]
async fn test_non_json_error_body_has_no_message() {
    let (base_url, _) = spawn_service().await;
    let orchestrator = Orchestrator::new(transport(&base_url));

    let err = orchestrator
        .recommend(RecommendationRequest::new("item").for_movie(1))
        .await
        .unwrap_err();

    assert_eq!(err.upstream_status(), Some(500));
    assert_eq!(
        err,
        OrchestratorError::Upstream(TransportError::HttpStatus {
            status: Some(500),
            message: None,
        })
    );
}

#[tokio::test]
async fn test_empty_data_is_success() {
    let (base_url, _) = spawn_service().await;
    let orchestrator = Orchestrator::new(transport(&base_url));

    let result = orchestrator
        .recommend(RecommendationRequest::new("content").for_movie(42))
        .await
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(result.subject, Subject::movie(42));
}

#[tokio::test]
async fn test_precondition_failure_sends_nothing() {
    let (base_url, seen) = spawn_service().await;
    let orchestrator = Orchestrator::new(transport(&base_url));

    let err = orchestrator
        .recommend(RecommendationRequest::new("content"))
        .await
        .unwrap_err();

    assert!(err.is_precondition());
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_comparison_keeps_successes_next_to_failures() {
    let (base_url, _) = spawn_service().await;
    let engine = ComparisonEngine::new(Orchestrator::new(transport(&base_url)));

    let result = engine
        .compare(
            ["popular", "content", "item", "collaborative", "hybrid"],
            Subject::user(99).with_movie(1),
            3,
        )
        .await;

    assert_eq!(result.len(), 5);
    assert_eq!(result.success_count(), 3);
    assert!(matches!(result.get("popular"), Some(Ok(r)) if r.items.len() == 2));
    assert!(matches!(result.get("content"), Some(Ok(r)) if r.is_empty()));
    assert!(matches!(result.get("hybrid"), Some(Ok(_))));
    assert_eq!(
        result.get("item").and_then(|o| o.as_ref().err()).and_then(|e| e.upstream_status()),
        Some(500)
    );
    assert_eq!(
        result
            .get("collaborative")
            .and_then(|o| o.as_ref().err())
            .and_then(|e| e.upstream_status()),
        Some(404)
    );
}

#[tokio::test]
async fn test_success_false_on_ok_status_is_an_error() {
    let (base_url, _) = spawn_service().await;
    let catalog = CatalogClient::new(transport(&base_url));

    let err = catalog.movies_by_genre("Drama", 10).await.unwrap_err();

    assert!(matches!(
        err,
        AppError::Transport(TransportError::HttpStatus { status: None, message: Some(ref m) })
            if m == "Genre index unavailable"
    ));
}

#[tokio::test]
async fn test_genre_with_slash_stays_one_segment() {
    let (base_url, seen) = spawn_service().await;
    let catalog = CatalogClient::new(transport(&base_url));

    let movies = catalog.movies_by_genre("Sci/Fi", 10).await.unwrap();

    assert_eq!(movies.len(), 1);
    assert_eq!(movies[0].movie_id, 1240);
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        ["/api/movies/genre/Sci%2FFi?limit=10"]
    );
}

#[tokio::test]
async fn test_search_encodes_query() {
    let (base_url, seen) = spawn_service().await;
    let catalog = CatalogClient::new(transport(&base_url));

    let movies = catalog.search_movies("  the matrix ", 5).await.unwrap();

    assert_eq!(movies.len(), 1);
    assert_eq!(movies[0].movie_id, 2571);
    assert_eq!(movies[0].title, "Matrix, The");
    assert_eq!(movies[0].genres, vec!["Action", "Sci-Fi"]);
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        ["/api/movies/search?q=the+matrix&limit=5"]
    );
}

#[tokio::test]
async fn test_rating_write_posts_json() {
    let (base_url, _) = spawn_service().await;
    let catalog = CatalogClient::new(transport(&base_url));

    let message = catalog.rate_movie(7, 1, 4.5).await.unwrap();
    assert_eq!(message, "Rating saved");
}

#[tokio::test]
async fn test_unreachable_service_is_network_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let orchestrator = Orchestrator::new(transport(&format!("http://{}/api", addr)));
    let err = orchestrator
        .recommend(RecommendationRequest::new("popular"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::Upstream(TransportError::NetworkFailure { .. })
    ));
}
