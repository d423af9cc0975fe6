//! The Rosetta HTTP surface: one `POST` route per endpoint, each handing its
//! JSON body to the [`Dispatcher`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::post;
use axum::Json;
use bytes::Buf;
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;
use tracing::info;

use crate::rosetta::types::MetadataRequest;
use crate::rosetta::ErrorKind;
use crate::rosetta::RosettaError;
use crate::service::dispatch::Dispatcher;

#[derive(Clone)]
pub struct RestState {
    dispatcher: Arc<Dispatcher>,
    log_requests: bool,
}

impl RestState {
    pub fn new(dispatcher: Arc<Dispatcher>, log_requests: bool) -> Self {
        Self {
            dispatcher,
            log_requests,
        }
    }

    /// Decodes a request body. Malformed bodies are Rosetta errors rather
    /// than axum rejections, so clients always get the error schema.
    fn decode<T: DeserializeOwned>(&self, endpoint: &str, body: Bytes) -> Result<T, RosettaError> {
        if self.log_requests {
            debug!(endpoint, body = %String::from_utf8_lossy(&body), "rosetta request");
        }
        serde_json::from_reader(body.reader())
            .map_err(|e| RosettaError::wrap(ErrorKind::InvalidInput, format!("malformed request: {e}")))
    }
}

macro_rules! rosetta_handlers {
    ($($handler:ident => $method:ident;)*) => {
        $(
            async fn $handler(State(state): State<RestState>, body: Bytes) -> Result<Response, RosettaError> {
                let req = state.decode(stringify!($method), body)?;
                let response = state.dispatcher.$method(&req).await?;
                Ok(Json(response).into_response())
            }
        )*
    };
}

rosetta_handlers! {
    network_status => network_status;
    network_options => network_options;
    account_balance => account_balance;
    account_coins => account_coins;
    block => block;
    block_transaction => block_transaction;
    mempool => mempool;
    mempool_transaction => mempool_transaction;
    construction_derive => construction_derive;
    construction_preprocess => construction_preprocess;
    construction_metadata => construction_metadata;
    construction_payloads => construction_payloads;
    construction_parse => construction_parse;
    construction_combine => construction_combine;
    construction_hash => construction_hash;
    construction_submit => construction_submit;
    call => call;
}

async fn network_list(State(state): State<RestState>, body: Bytes) -> Result<Response, RosettaError> {
    let req: MetadataRequest = state.decode("network_list", body)?;
    Ok(Json(state.dispatcher.network_list(&req)).into_response())
}

pub fn router(state: RestState) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    axum::Router::new()
        .route("/network/list", post(network_list))
        .route("/network/status", post(network_status))
        .route("/network/options", post(network_options))
        .route("/account/balance", post(account_balance))
        .route("/account/coins", post(account_coins))
        .route("/block", post(block))
        .route("/block/transaction", post(block_transaction))
        .route("/mempool", post(mempool))
        .route("/mempool/transaction", post(mempool_transaction))
        .route("/construction/derive", post(construction_derive))
        .route("/construction/preprocess", post(construction_preprocess))
        .route("/construction/metadata", post(construction_metadata))
        .route("/construction/payloads", post(construction_payloads))
        .route("/construction/parse", post(construction_parse))
        .route("/construction/combine", post(construction_combine))
        .route("/construction/hash", post(construction_hash))
        .route("/construction/submit", post(construction_submit))
        .route("/call", post(call))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_rest_server(listener: TcpListener, state: RestState) -> Result<(), anyhow::Error> {
    info!("rosetta server listening on {}", listener.local_addr()?);
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use assert2::assert;
    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::Request;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use macro_rules_attr::apply;
    use serde_json::json;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::application::config::cli_args::Mode;
    use crate::tests::shared::c_network;
    use crate::tests::shared::dispatcher;
    use crate::tests::shared::p_network;
    use crate::tests::shared::MockEvm;
    use crate::tests::shared::MockPChain;
    use crate::tests::shared_tokio_runtime;

    fn app(mode: Mode) -> axum::Router {
        let dispatcher = dispatcher(mode, MockPChain::default().with_blocks(2), MockEvm::default().with_blocks(2));
        router(RestState::new(Arc::new(dispatcher), true))
    }

    async fn post_json(app: axum::Router, uri: &str, body: String) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[apply(shared_tokio_runtime)]
    async fn network_list_works_offline() {
        let (status, body) = post_json(app(Mode::Offline), "/network/list", "{}".to_owned()).await;
        assert!(status == StatusCode::OK);
        let ids = body["network_identifiers"].as_array().unwrap();
        assert!(ids.len() == 2);
        assert!(ids[0] == serde_json::to_value(c_network()).unwrap());
        assert!(ids[1] == serde_json::to_value(p_network()).unwrap());
    }

    #[apply(shared_tokio_runtime)]
    async fn offline_errors_use_the_rosetta_schema() {
        let body = json!({ "network_identifier": p_network() }).to_string();
        let (status, body) = post_json(app(Mode::Offline), "/network/status", body).await;
        assert!(status == StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["code"] == 4);
        assert!(body["retriable"] == false);
    }

    #[apply(shared_tokio_runtime)]
    async fn malformed_bodies_are_invalid_input() {
        let (status, body) = post_json(app(Mode::Online), "/block", "{\"network_identifier\":".to_owned()).await;
        assert!(status == StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["code"] == 6);
        assert!(body["details"]["error"].as_str().unwrap().starts_with("malformed request"));
    }

    #[apply(shared_tokio_runtime)]
    async fn platform_blocks_are_served() {
        let body = json!({
            "network_identifier": p_network(),
            "block_identifier": { "index": 1 },
        })
        .to_string();
        let (status, body) = post_json(app(Mode::Online), "/block", body).await;
        assert!(status == StatusCode::OK);
        assert!(body["block"]["block_identifier"]["index"] == 1);
    }

    #[apply(shared_tokio_runtime)]
    async fn evm_status_is_served() {
        let body = json!({ "network_identifier": c_network() }).to_string();
        let (status, body) = post_json(app(Mode::Online), "/network/status", body).await;
        assert!(status == StatusCode::OK);
        assert!(body["current_block_identifier"]["index"] == 2);
    }
}
