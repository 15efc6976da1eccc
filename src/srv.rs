use log::{info, warn};

use primary_tally::*;
use snafu::{prelude::*, Snafu};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::args::Args;
use crate::srv::store::ResultsStore;

#[derive(Debug, Snafu)]
pub enum SrvError {
    #[snafu(display("Error opening results file {path}"))]
    OpeningResults {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing results file {path}"))]
    ParsingResults {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Invalid listen address {addr}"))]
    ParsingAddr {
        source: std::net::AddrParseError,
        addr: String,
    },
    #[snafu(display("Error binding {addr}"))]
    Binding {
        source: std::io::Error,
        addr: String,
    },
    #[snafu(display("Server stopped unexpectedly"))]
    Serving { source: std::io::Error },
}

pub type SrvResult<T> = Result<T, SrvError>;

pub mod store {
    use crate::srv::*;
    use std::fs;
    use std::path::PathBuf;

    /// Where the primary results come from.
    ///
    /// By default the file is reread on every request, so the results can be
    /// swapped underneath a running server. With `cache` the file is read
    /// once at startup and the snapshot is shared read-only across requests.
    #[derive(Debug)]
    pub struct ResultsStore {
        path: PathBuf,
        cached: Option<Arc<PrimaryResults>>,
    }

    impl ResultsStore {
        pub fn open(path: &str, cache: bool) -> SrvResult<ResultsStore> {
            let mut store = ResultsStore {
                path: PathBuf::from(path),
                cached: None,
            };
            if cache {
                store.cached = Some(Arc::new(store.read_file()?));
            }
            Ok(store)
        }

        /// The current dataset: the startup snapshot when caching, a fresh
        /// read otherwise.
        pub fn fetch(&self) -> SrvResult<Arc<PrimaryResults>> {
            match &self.cached {
                Some(results) => Ok(results.clone()),
                None => Ok(Arc::new(self.read_file()?)),
            }
        }

        fn read_file(&self) -> SrvResult<PrimaryResults> {
            let path = self.path.display().to_string();
            let contents = fs::read_to_string(&self.path).context(OpeningResultsSnafu {
                path: path.clone(),
            })?;
            let results = serde_json::from_str(&contents).context(ParsingResultsSnafu { path })?;
            Ok(results)
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ResultsStore>,
}

#[derive(Debug, Deserialize)]
struct CountyParams {
    state: String,
    county: String,
}

#[derive(Debug, Deserialize)]
struct StateParams {
    state: String,
}

fn data_response<T: Serialize>(winners: T) -> Response {
    (StatusCode::OK, Json(json!({ "data": winners }))).into_response()
}

fn message_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn tally_error_response(err: &TallyError) -> Response {
    let status = match err {
        TallyError::UnknownState { .. } | TallyError::UnknownCounty { .. } => StatusCode::NOT_FOUND,
        // Malformed data, not a bad request.
        TallyError::EmptyTally { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    message_response(status, &err.to_string())
}

fn fetch_results(app: &AppState) -> Result<Arc<PrimaryResults>, Response> {
    match app.store.fetch() {
        Result::Ok(results) => Ok(results),
        Result::Err(e) => {
            warn!("could not load the primary results: {}", e);
            Err(message_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &e.to_string(),
            ))
        }
    }
}

async fn county_handler(
    State(app): State<AppState>,
    Query(params): Query<CountyParams>,
) -> Response {
    info!("/county state={:?} county={:?}", params.state, params.county);
    let results = match fetch_results(&app) {
        Ok(x) => x,
        Err(resp) => return resp,
    };
    match county_winners(&results, &params.state, &params.county) {
        Ok(winners) => data_response(winners),
        Err(e) => tally_error_response(&e),
    }
}

async fn state_handler(
    State(app): State<AppState>,
    Query(params): Query<StateParams>,
) -> Response {
    info!("/state state={:?}", params.state);
    let results = match fetch_results(&app) {
        Ok(x) => x,
        Err(resp) => return resp,
    };
    match state_winners(&results, &params.state) {
        Ok(winners) => data_response(winners),
        Err(e) => tally_error_response(&e),
    }
}

async fn all_handler(State(app): State<AppState>) -> Response {
    info!("/all");
    let results = match fetch_results(&app) {
        Ok(x) => x,
        Err(resp) => return resp,
    };
    match all_winners(&results) {
        Ok(winners) => data_response(winners),
        Err(e) => tally_error_response(&e),
    }
}

async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub fn build_router(app: AppState) -> Router {
    Router::new()
        .route("/county", get(county_handler))
        .route("/state", get(state_handler))
        .route("/all", get(all_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(app)
}

pub async fn serve(args: &Args) -> SrvResult<()> {
    let data_path = args
        .data
        .clone()
        .unwrap_or_else(|| "primary_results.json".to_string());
    let store = ResultsStore::open(&data_path, args.cache)?;
    // In reload mode a broken file only surfaces on the first request.
    // Probe it now so the operator hears about it at startup.
    if let Err(e) = store.fetch() {
        warn!("primary results are not readable yet: {}", e);
    }
    let app = AppState {
        store: Arc::new(store),
    };

    let addr_raw = args
        .listen
        .clone()
        .unwrap_or_else(|| "127.0.0.1:8000".to_string());
    let addr: SocketAddr = addr_raw.parse().context(ParsingAddrSnafu {
        addr: addr_raw.clone(),
    })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(BindingSnafu { addr: addr_raw.clone() })?;
    info!("primsrv serving {} on {}", data_path, addr_raw);
    axum::serve(listener, build_router(app))
        .await
        .context(ServingSnafu {})?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const FIXTURE: &str = r#"{
        "Iowa": {
            "Polk": {
                "GOP": {"Smith": 100, "Jones": 200},
                "Dem": {"Lopez": 40, "Ngata": 30}
            },
            "Story": {
                "Dem": {"A": 5, "B": 5}
            }
        }
    }"#;

    fn write_fixture(dir: &tempfile::TempDir, contents: &str) -> String {
        let path = dir.path().join("primary_results.json");
        std::fs::write(&path, contents).expect("write fixture");
        path.display().to_string()
    }

    async fn spawn_router(app: AppState) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, build_router(app)).await.expect("serve");
        });
        addr
    }

    async fn spawn_server(contents: &str, cache: bool) -> (SocketAddr, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_fixture(&dir, contents);
        let store = ResultsStore::open(&path, cache).expect("open store");
        let addr = spawn_router(AppState {
            store: Arc::new(store),
        })
        .await;
        (addr, dir)
    }

    async fn send_raw(addr: SocketAddr, path: &str) -> (u16, String) {
        let mut stream = tokio::net::TcpStream::connect(addr)
            .await
            .expect("connect server");
        let req = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
        stream.write_all(req.as_bytes()).await.expect("write request");
        let mut response = String::new();
        stream
            .read_to_string(&mut response)
            .await
            .expect("read response");
        let (head, body) = response
            .split_once("\r\n\r\n")
            .expect("http response separator");
        let status = head
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|s| s.parse::<u16>().ok())
            .expect("status");
        (status, body.to_string())
    }

    fn json_body(body: &str) -> serde_json::Value {
        serde_json::from_str(body).expect("json body")
    }

    #[tokio::test]
    async fn county_returns_party_winners() {
        let (addr, _dir) = spawn_server(FIXTURE, false).await;
        let (status, body) = send_raw(addr, "/county?state=Iowa&county=Polk").await;
        assert_eq!(status, 200);
        let js = json_body(&body);
        assert_eq!(js["data"]["GOP"], "Jones");
        assert_eq!(js["data"]["Dem"], "Lopez");
    }

    #[tokio::test]
    async fn county_unknown_state_is_404() {
        let (addr, _dir) = spawn_server(FIXTURE, false).await;
        let (status, body) = send_raw(addr, "/county?state=Texas&county=Polk").await;
        assert_eq!(status, 404);
        assert_eq!(json_body(&body)["message"], "Texas not in primary results.");
    }

    #[tokio::test]
    async fn county_unknown_county_gets_its_own_404() {
        let (addr, _dir) = spawn_server(FIXTURE, false).await;
        let (status, body) = send_raw(addr, "/county?state=Iowa&county=Union").await;
        assert_eq!(status, 404);
        assert_eq!(
            json_body(&body)["message"],
            "Union not in Iowa primary results."
        );
    }

    #[tokio::test]
    async fn missing_parameters_are_rejected() {
        let (addr, _dir) = spawn_server(FIXTURE, false).await;
        let (status, _body) = send_raw(addr, "/county?state=Iowa").await;
        assert_eq!(status, 400);
        let (status, _body) = send_raw(addr, "/state").await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn state_includes_tie_break_winner() {
        let (addr, _dir) = spawn_server(FIXTURE, false).await;
        let (status, body) = send_raw(addr, "/state?state=Iowa").await;
        assert_eq!(status, 200);
        let js = json_body(&body);
        assert_eq!(js["data"]["Story"]["Dem"], "A");
        assert_eq!(js["data"]["Polk"]["GOP"], "Jones");
    }

    #[tokio::test]
    async fn all_returns_the_full_shape() {
        let (addr, _dir) = spawn_server(FIXTURE, false).await;
        let (status, body) = send_raw(addr, "/all").await;
        assert_eq!(status, 200);
        assert_eq!(json_body(&body)["data"]["Iowa"]["Polk"]["GOP"], "Jones");
    }

    #[tokio::test]
    async fn all_on_empty_dataset_is_empty() {
        let (addr, _dir) = spawn_server("{}", false).await;
        let (status, body) = send_raw(addr, "/all").await;
        assert_eq!(status, 200);
        assert_eq!(json_body(&body)["data"], json!({}));
    }

    #[tokio::test]
    async fn empty_party_tally_is_500() {
        let (addr, _dir) = spawn_server(r#"{"Iowa": {"Polk": {"GOP": {}}}}"#, false).await;
        let (status, body) = send_raw(addr, "/county?state=Iowa&county=Polk").await;
        assert_eq!(status, 500);
        let message = json_body(&body)["message"].as_str().unwrap().to_string();
        assert!(message.contains("GOP"), "unexpected message: {}", message);
    }

    #[tokio::test]
    async fn missing_results_file_is_500() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nowhere.json").display().to_string();
        let store = ResultsStore::open(&path, false).expect("open store");
        let addr = spawn_router(AppState {
            store: Arc::new(store),
        })
        .await;
        let (status, _body) = send_raw(addr, "/all").await;
        assert_eq!(status, 500);
    }

    #[tokio::test]
    async fn reload_mode_sees_an_updated_file() {
        let (addr, dir) = spawn_server(FIXTURE, false).await;
        write_fixture(&dir, r#"{"Iowa": {"Polk": {"GOP": {"Smith": 300, "Jones": 200}}}}"#);
        let (status, body) = send_raw(addr, "/county?state=Iowa&county=Polk").await;
        assert_eq!(status, 200);
        assert_eq!(json_body(&body)["data"]["GOP"], "Smith");
    }

    #[tokio::test]
    async fn cached_mode_keeps_the_startup_snapshot() {
        let (addr, dir) = spawn_server(FIXTURE, true).await;
        write_fixture(&dir, r#"{"Iowa": {"Polk": {"GOP": {"Smith": 300, "Jones": 200}}}}"#);
        let (status, body) = send_raw(addr, "/county?state=Iowa&county=Polk").await;
        assert_eq!(status, 200);
        assert_eq!(json_body(&body)["data"]["GOP"], "Jones");
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let (addr, _dir) = spawn_server(FIXTURE, false).await;
        let (status, body) = send_raw(addr, "/healthz").await;
        assert_eq!(status, 200);
        assert_eq!(body, "ok");
    }
}
