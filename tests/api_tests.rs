mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::Value;

use marquee_api::api::{create_router, AppState};
use marquee_api::models::Movie;

use common::{indexed_server, sample_catalog, InMemoryCatalog, NEW_USER, WATCHED_M1};

async fn create_test_server() -> TestServer {
    indexed_server(Arc::new(sample_catalog())).await
}

fn result_ids(body: &Value) -> Vec<String> {
    body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server().await;
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_index_info_reports_current_generation() {
    let server = create_test_server().await;
    let response = server.get("/index").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["generation"], 1);
    assert_eq!(body["movie_count"], 3);
    assert!(body["vocabulary_size"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_similar_movies_prefers_shared_genre() {
    let server = create_test_server().await;
    let response = server
        .get("/movies/M1/similar")
        .add_query_param("limit", 1)
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["movie_id"], "M1");
    assert_eq!(result_ids(&body), vec!["M2"]);
    assert_eq!(body["results"][0]["title"], "Interstellar");
    let score = body["results"][0]["score"].as_f64().unwrap();
    assert!(score > 0.0 && score <= 1.0);
}

#[tokio::test]
async fn test_similar_movies_never_returns_query_movie() {
    let server = create_test_server().await;
    let body: Value = server.get("/movies/M1/similar").await.json();
    let ids = result_ids(&body);
    assert_eq!(ids, vec!["M2", "M3"]);
}

#[tokio::test]
async fn test_similar_movies_unknown_movie_is_not_found() {
    let server = create_test_server().await;
    let response = server.get("/movies/tt9999999/similar").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("tt9999999"));
}

#[tokio::test]
async fn test_similar_to_text() {
    let server = create_test_server().await;
    let response = server
        .get("/movies/similar")
        .add_query_param("q", "Interstellar")
        .add_query_param("limit", 1)
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(result_ids(&body), vec!["M2"]);
}

#[tokio::test]
async fn test_similar_to_text_rejects_empty_query() {
    let server = create_test_server().await;
    let response = server.get("/movies/similar").add_query_param("q", "  ").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_pairwise_similarity_is_symmetric() {
    let server = create_test_server().await;
    let forward: Value = server.get("/movies/M1/similarity/M2").await.json();
    let backward: Value = server.get("/movies/M2/similarity/M1").await.json();

    let score = forward["score"].as_f64().unwrap();
    assert!(score > 0.0);
    assert_eq!(Some(score), backward["score"].as_f64());

    let unrelated: Value = server.get("/movies/M1/similarity/M3").await.json();
    assert_eq!(unrelated["score"].as_f64(), Some(0.0));
}

#[tokio::test]
async fn test_recommendations_exclude_watched_and_rank_by_similarity() {
    let server = create_test_server().await;
    let response = server
        .get(&format!("/users/{}/recommendations", WATCHED_M1))
        .add_query_param("limit", 5)
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    let ids = result_ids(&body);
    assert!(!ids.contains(&"M1".to_string()));
    assert_eq!(ids, vec!["M2", "M3"]);
}

#[tokio::test]
async fn test_recommendations_empty_history_is_empty() {
    let server = create_test_server().await;
    let response = server
        .get(&format!("/users/{}/recommendations", NEW_USER))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert!(body["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_recommendations_unknown_user_is_not_found() {
    let server = create_test_server().await;
    let response = server
        .get(&format!("/users/{}/recommendations", uuid::Uuid::new_v4()))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_viewing_history_includes_titles() {
    let server = create_test_server().await;
    let response = server
        .get(&format!("/users/{}/viewing_history", WATCHED_M1))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body[0]["movie_id"], "M1");
    assert_eq!(body[0]["title"], "Inception");
    assert_eq!(body[0]["watch_date"], "2024-03-01");
}

#[tokio::test]
async fn test_get_movie_and_user() {
    let server = create_test_server().await;

    let movie: Value = server.get("/movies/M3").await.json();
    assert_eq!(movie["title"], "Titanic");
    assert_eq!(movie["genres"][0], "Romance");

    server
        .get("/movies/nope")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let user: Value = server.get(&format!("/users/{}", NEW_USER)).await.json();
    assert_eq!(user["name"], "Grace");
}

#[tokio::test]
async fn test_browse_and_search_movies() {
    let server = create_test_server().await;

    let page: Vec<Value> = server
        .get("/movies")
        .add_query_param("limit", 2)
        .add_query_param("offset", 1)
        .await
        .json();
    let ids: Vec<&str> = page.iter().map(|m| m["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["M2", "M3"]);

    let found: Vec<Value> = server
        .get("/movies/search")
        .add_query_param("query", "titan")
        .await
        .json();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], "M3");

    server
        .get("/movies")
        .add_query_param("offset", -1)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_responses_carry_generation_header() {
    let server = create_test_server().await;
    let response = server.get("/health").await;
    assert_eq!(response.header("x-index-generation"), "1");
    assert!(response.headers().get("x-request-id").is_some());
}

#[tokio::test]
async fn test_ranking_header_matches_body_generation() {
    let server = create_test_server().await;
    let response = server.get("/movies/M1/similar").await;
    let body: Value = response.json();
    assert_eq!(
        response.header("x-index-generation"),
        body["generation"].to_string().as_str()
    );

    let rebuilt = server.post("/index/rebuild").await;
    assert_eq!(rebuilt.header("x-index-generation"), "2");
}

#[tokio::test]
async fn test_rebuild_publishes_and_stales_old_pins() {
    let catalog = Arc::new(sample_catalog());
    let server = indexed_server(catalog.clone()).await;

    catalog.add_movie(Movie::new("M4", "Interstellar Returns", &["Sci-Fi"]));

    // Ingested after the build: known to the catalog but not yet indexed
    let pending: Value = server.get("/movies/M4/similar").await.json();
    assert!(pending["results"].as_array().unwrap().is_empty());

    let response = server.post("/index/rebuild").await;
    response.assert_status_ok();
    let info: Value = response.json();
    assert_eq!(info["generation"], 2);
    assert_eq!(info["movie_count"], 4);

    let body: Value = server
        .get("/movies/M4/similar")
        .add_query_param("limit", 1)
        .await
        .json();
    assert_eq!(body["generation"], 2);
    assert_eq!(result_ids(&body), vec!["M2"]);

    let stale = server
        .get("/movies/M1/similar")
        .add_query_param("generation", 1)
        .await;
    stale.assert_status(StatusCode::CONFLICT);

    server
        .get("/movies/M1/similar")
        .add_query_param("generation", 2)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_empty_index_serves_empty_rankings() {
    let state = AppState::new(Arc::new(sample_catalog()));
    let server = TestServer::new(create_router(state)).unwrap();

    let info: Value = server.get("/index").await.json();
    assert_eq!(info["generation"], 0);
    assert_eq!(info["movie_count"], 0);

    let body: Value = server.get("/movies/M1/similar").await.json();
    assert!(body["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_catalog_builds_an_empty_generation() {
    let server = indexed_server(Arc::new(InMemoryCatalog::default())).await;
    let info: Value = server.get("/index").await.json();
    assert_eq!(info["generation"], 1);
    assert_eq!(info["movie_count"], 0);
    assert_eq!(info["vocabulary_size"], 0);

    let body: Value = server
        .get("/movies/similar")
        .add_query_param("q", "anything")
        .await
        .json();
    assert!(body["results"].as_array().unwrap().is_empty());
}
