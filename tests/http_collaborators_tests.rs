mod common;

use axum::{
    Json, Router,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use common::{FakeClassifier, InferBehavior, TempDb, png_bytes, service};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;
use visiongate::GateError;
use visiongate::db::AccountStore;
use visiongate::api::ModelServerApi;
use visiongate::config::{ClassifierConfig, FetchConfig};
use visiongate::service::{
    HttpImageFetcher, ImageClassifier, ImageFetcher, InferenceAdapter, LabelSet,
};

async fn spawn_server(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn image_host() -> Router {
    Router::new()
        .route(
            "/cat.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], png_bytes()) }),
        )
        .route("/missing.png", get(|| async { StatusCode::NOT_FOUND }))
        .route(
            "/page.html",
            get(|| async { ([(header::CONTENT_TYPE, "text/html")], "<html>hi</html>") }),
        )
        .route("/huge.bin", get(|| async { vec![0u8; 4096] }))
        .route(
            "/slow.png",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                png_bytes()
            }),
        )
}

fn fetcher() -> HttpImageFetcher {
    HttpImageFetcher::new(&FetchConfig {
        timeout_secs: 1,
        connect_timeout_secs: 1,
        max_image_bytes: 1024,
        ..FetchConfig::default()
    })
    .expect("fetcher client")
}

fn url(addr: SocketAddr, path: &str) -> Url {
    Url::parse(&format!("http://{addr}{path}")).unwrap()
}

#[tokio::test]
async fn fetcher_returns_image_bytes() {
    let addr = spawn_server(image_host()).await;
    let bytes = fetcher().fetch(&url(addr, "/cat.png")).await.unwrap();
    assert_eq!(bytes, png_bytes());
}

#[tokio::test]
async fn fetcher_maps_every_failure_to_fetch_failed() {
    let addr = spawn_server(image_host()).await;
    let fetcher = fetcher();

    for path in ["/missing.png", "/page.html", "/huge.bin", "/slow.png"] {
        let err = fetcher.fetch(&url(addr, path)).await.unwrap_err();
        assert!(matches!(err, GateError::FetchFailed(_)), "{path}: {err}");
    }

    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = closed.local_addr().unwrap();
    drop(closed);
    let err = fetcher.fetch(&url(dead_addr, "/cat.png")).await.unwrap_err();
    assert!(matches!(err, GateError::FetchFailed(_)));
}

#[tokio::test]
async fn non_image_download_costs_no_credit() {
    let addr = spawn_server(image_host()).await;
    let db = TempDb::new("http-non-image").await;
    let classifier = FakeClassifier::new(InferBehavior::Labels);
    let svc = service(&db, Arc::new(fetcher()), classifier.clone());
    svc.register("alice", "pw1").await.unwrap();
    let alice = svc.authenticate("alice", "pw1").await.unwrap();

    let page = url(addr, "/page.html");
    let err = svc.classify(&alice, page.as_str()).await.unwrap_err();
    assert!(matches!(err, GateError::FetchFailed(_)), "{err}");
    assert_eq!(classifier.calls(), 0);

    let stored = db.storage.find("alice").await.unwrap().unwrap();
    assert_eq!(stored.credits, 10);

    let cat = url(addr, "/cat.png");
    let done = svc.classify(&alice, cat.as_str()).await.unwrap();
    assert_eq!(done.credits_remaining, 9);
}

fn model_server() -> Router {
    Router::new()
        .route(
            "/v1/models/inception_v3:predict",
            post(|Json(body): Json<Value>| async move {
                let batch = body["instances"].as_array().map(Vec::len).unwrap_or(0);
                let first = &body["instances"][0];
                let rows = first.as_array().map(Vec::len).unwrap_or(0);
                let cols = first[0].as_array().map(Vec::len).unwrap_or(0);
                let chans = first[0][0].as_array().map(Vec::len).unwrap_or(0);
                if batch != 1 || (rows, cols, chans) != (8, 8, 3) {
                    return (StatusCode::BAD_REQUEST, Json(json!({"error": "bad shape"})))
                        .into_response();
                }
                Json(json!({"predictions": [[0.05, 0.7, 0.2, 0.05]]})).into_response()
            }),
        )
        .route(
            "/v1/models/broken:predict",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
}

fn adapter(addr: SocketAddr, model: &str) -> InferenceAdapter {
    let cfg = ClassifierConfig {
        endpoint: format!("http://{addr}/v1/models/{model}:predict"),
        input_size: 8,
        timeout_secs: 5,
        ..ClassifierConfig::default()
    };
    let backend = Arc::new(ModelServerApi::new(&cfg).expect("model client"));
    let labels = LabelSet::from_labels(
        ["tench", "goldfish", "great_white_shark", "tiger_shark"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    InferenceAdapter::new(backend, Arc::new(labels), cfg.input_size, cfg.top_k)
        .expect("adapter config")
}

#[tokio::test]
async fn adapter_decodes_model_server_scores() {
    let addr = spawn_server(model_server()).await;
    let top = adapter(addr, "inception_v3")
        .classify(png_bytes())
        .await
        .unwrap();

    let labels: Vec<_> = top.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(&labels[..2], &["goldfish", "great_white_shark"]);
    assert_eq!(top.len(), 4);
    assert!((top[0].confidence - 70.0).abs() < 1e-3);
}

#[tokio::test]
async fn model_server_errors_become_inference_failed() {
    let addr = spawn_server(model_server()).await;
    let err = adapter(addr, "broken")
        .classify(png_bytes())
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::InferenceFailed(_)));
}
