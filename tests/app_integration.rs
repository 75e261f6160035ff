use bcv_rate::core::config::AppConfig;
use bcv_rate::{AppCommand, run_with_config};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;

// Adds automatic logging to test
mod test_utils {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub fn bcv_page(rate: &str) -> String {
        format!(
            r#"<html><body>
            <div id="euro"><span> EUR </span><strong> 39,71 </strong></div>
            <div id="dolar"><span> USD</span><strong> {rate} </strong></div>
            </body></html>"#
        )
    }

    pub async fn create_bcv_mock_server(body: &str, status_code: u16) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(status_code).set_body_string(body))
            .mount(&mock_server)
            .await;

        mock_server
    }
}

struct TestApp {
    base_url: String,
    client: reqwest::Client,
    _data_dir: TempDir,
    _shutdown: oneshot::Sender<()>,
}

impl TestApp {
    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("request failed");
        let status = response.status();
        (status, response.json().await.expect("body is not JSON"))
    }

    async fn post(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("request failed");
        let status = response.status();
        (status, response.json().await.expect("body is not JSON"))
    }
}

async fn spawn_app(source_url: String) -> TestApp {
    let data_dir = tempfile::tempdir().expect("Failed to create temp dir");

    let mut config = AppConfig::default();
    config.source.url = source_url;
    config.source.timeout_secs = 1;
    config.database.url = Some(format!(
        "sqlite://{}",
        data_dir.path().join("rates.db").display()
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let shutdown = async move {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = bcv_rate::serve(&config, listener, shutdown).await {
            panic!("Server failed: {e:#}");
        }
    });

    TestApp {
        base_url: format!("http://{addr}"),
        client: reqwest::Client::new(),
        _data_dir: data_dir,
        _shutdown: shutdown_tx,
    }
}

#[test_log::test(tokio::test)]
async fn test_full_refresh_then_latest_flow() {
    let mock_server =
        test_utils::create_bcv_mock_server(&test_utils::bcv_page("36,50"), 200).await;
    let app = spawn_app(format!("{}/", mock_server.uri())).await;

    let (status, body) = app.post("/api/rate/refresh").await;
    info!(?status, ?body, "Refresh response");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "rate": 36.5, "ok": true }));

    let (status, body) = app.get("/api/rate").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rate"], json!(36.5));
    let recorded_at = body["recorded_at"].as_str().expect("recorded_at is a string");
    assert!(chrono::DateTime::parse_from_rfc3339(recorded_at).is_ok());
}

#[test_log::test(tokio::test)]
async fn test_refresh_accepts_get() {
    let mock_server =
        test_utils::create_bcv_mock_server(&test_utils::bcv_page("36,50"), 200).await;
    let app = spawn_app(format!("{}/", mock_server.uri())).await;

    let (status, body) = app.get("/api/rate/refresh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
}

#[test_log::test(tokio::test)]
async fn test_latest_on_empty_store_is_404() {
    let mock_server =
        test_utils::create_bcv_mock_server(&test_utils::bcv_page("36,50"), 200).await;
    let app = spawn_app(format!("{}/", mock_server.uri())).await;

    let (status, body) = app.get("/api/rate").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[test_log::test(tokio::test)]
async fn test_upstream_error_writes_nothing() {
    let mock_server =
        test_utils::create_bcv_mock_server("Service Unavailable", 503).await;
    let app = spawn_app(format!("{}/", mock_server.uri())).await;

    let (status, body) = app.post("/api/rate/refresh").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["ok"], json!(false));
    assert!(body["error"].is_string());

    let (status, _) = app.get("/api/rate").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test_log::test(tokio::test)]
async fn test_upstream_timeout_writes_nothing() {
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(test_utils::bcv_page("36,50"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;
    let app = spawn_app(format!("{}/", mock_server.uri())).await;

    let (status, body) = app.post("/api/rate/refresh").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["ok"], json!(false));

    let (status, _) = app.get("/api/rate").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test_log::test(tokio::test)]
async fn test_page_without_rate_is_500() {
    let mock_server =
        test_utils::create_bcv_mock_server("<html><body>Sin datos</body></html>", 200).await;
    let app = spawn_app(format!("{}/", mock_server.uri())).await;

    let (status, body) = app.post("/api/rate/refresh").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["ok"], json!(false));
}

#[test_log::test(tokio::test)]
async fn test_latest_returns_most_recent_reading() {
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(test_utils::bcv_page("36,10")))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(test_utils::bcv_page("36,55")))
        .mount(&mock_server)
        .await;
    let app = spawn_app(format!("{}/", mock_server.uri())).await;

    let (_, first) = app.post("/api/rate/refresh").await;
    assert_eq!(first["rate"], json!(36.1));
    let (_, second) = app.post("/api/rate/refresh").await;
    assert_eq!(second["rate"], json!(36.55));

    let (status, history) = app.get("/api/rate/history").await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().expect("history is an array");
    assert_eq!(history.len(), 2);
    assert_eq!(history[1]["rate"], json!(36.1));

    let (status, latest) = app.get("/api/rate").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        latest,
        json!({ "rate": 36.55, "recorded_at": history[0]["recorded_at"] })
    );
}

#[test_log::test(tokio::test)]
async fn test_concurrent_refreshes_all_insert() {
    let mock_server =
        test_utils::create_bcv_mock_server(&test_utils::bcv_page("36,50"), 200).await;
    let app = spawn_app(format!("{}/", mock_server.uri())).await;

    let requests = (0..5).map(|_| app.post("/api/rate/refresh"));
    for (status, body) in futures::future::join_all(requests).await {
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(true));
    }

    let (_, history) = app.get("/api/rate/history?limit=50").await;
    assert_eq!(history.as_array().map(Vec::len), Some(5));
}

#[test_log::test(tokio::test)]
async fn test_index_and_health() {
    let mock_server =
        test_utils::create_bcv_mock_server(&test_utils::bcv_page("36,50"), 200).await;
    let app = spawn_app(format!("{}/", mock_server.uri())).await;

    let response = app
        .client
        .get(format!("{}/", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = response.text().await.unwrap();
    assert!(page.contains("/api/rate/refresh"));

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[test_log::test(tokio::test)]
async fn test_history_with_malformed_limit_is_json_400() {
    let mock_server =
        test_utils::create_bcv_mock_server(&test_utils::bcv_page("36,50"), 200).await;
    let app = spawn_app(format!("{}/", mock_server.uri())).await;

    for path in ["/api/rate/history?limit=abc", "/api/rate/history?limit=-1"] {
        let (status, body) = app.get(path).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}

#[test_log::test(tokio::test)]
async fn test_rate_split_across_inline_tags() {
    let page = r#"<html><body><div id="dolar"><span>USD</span>
        <strong>36,<small>50</small></strong></div></body></html>"#;
    let mock_server = test_utils::create_bcv_mock_server(page, 200).await;
    let app = spawn_app(format!("{}/", mock_server.uri())).await;

    let (status, body) = app.post("/api/rate/refresh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rate"], json!(36.5));
}

fn cli_config(source_url: String, data_dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.source.url = source_url;
    config.source.timeout_secs = 1;
    config.database.url = Some(format!(
        "sqlite://{}",
        data_dir.path().join("rates.db").display()
    ));
    config
}

#[test_log::test(tokio::test)]
async fn test_refresh_and_latest_commands() {
    let mock_server =
        test_utils::create_bcv_mock_server(&test_utils::bcv_page("36,50"), 200).await;
    let data_dir = tempfile::tempdir().unwrap();
    let config = cli_config(format!("{}/", mock_server.uri()), &data_dir);

    let result = run_with_config(AppCommand::Latest, &config).await;
    assert!(result.is_err(), "latest on an empty store should fail");

    run_with_config(AppCommand::Refresh, &config).await.unwrap();
    run_with_config(AppCommand::Latest, &config).await.unwrap();

    let store = bcv_rate::store::open_store(&config).unwrap();
    let reading = store.latest().await.unwrap().expect("refresh stored a reading");
    assert_eq!(reading.value, rust_decimal::Decimal::new(3650, 2));
}

#[test_log::test(tokio::test)]
async fn test_refresh_command_fails_on_upstream_error() {
    let mock_server =
        test_utils::create_bcv_mock_server("Service Unavailable", 503).await;
    let data_dir = tempfile::tempdir().unwrap();
    let config = cli_config(format!("{}/", mock_server.uri()), &data_dir);

    let result = run_with_config(AppCommand::Refresh, &config).await;
    assert!(result.is_err());

    let store = bcv_rate::store::open_store(&config).unwrap();
    assert!(store.recent(10).await.unwrap().is_empty());
}
