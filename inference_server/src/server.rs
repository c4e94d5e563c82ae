use anyhow::Result;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{
    Router,
    extract::{Path, State},
    response::Json,
    routing::get,
};
use data_ingestion::coins::Coin;
use data_ingestion::fetcher::MarketDataSource;
use log::{info, warn};
use model_training::model::Classifier;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::engine::{PredictError, Predictor};
use crate::misc::{Prediction, TrendPoint};

/// Shared application state: the predictor and the latest prediction per coin.
struct AppState<S, C> {
    predictor: Arc<Predictor<S, C>>,
    latest_output: Arc<RwLock<BTreeMap<Coin, Prediction>>>,
}

impl<S, C> Clone for AppState<S, C> {
    fn clone(&self) -> Self {
        Self {
            predictor: self.predictor.clone(),
            latest_output: self.latest_output.clone(),
        }
    }
}

#[derive(Debug)]
enum ApiError {
    UnknownCoin(String),
    Predict(PredictError),
}

impl From<PredictError> for ApiError {
    fn from(e: PredictError) -> Self {
        ApiError::Predict(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownCoin(_) => StatusCode::NOT_FOUND,
            ApiError::Predict(PredictError::InsufficientHistory { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Predict(PredictError::Fetch(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Predict(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::UnknownCoin(coin) => format!("Unknown coin: {}", coin),
            ApiError::Predict(e) => e.to_string(),
        };
        (self.status(), Json(json!({ "error": message }))).into_response()
    }
}

fn parse_coin(raw: &str) -> Result<Coin, ApiError> {
    raw.parse().map_err(|_| ApiError::UnknownCoin(raw.to_string()))
}

#[derive(Serialize)]
struct CoinInfo {
    id: &'static str,
    name: String,
}

/// GET /coins lists the supported vocabulary.
async fn list_coins() -> Json<Vec<CoinInfo>> {
    Json(
        Coin::ALL
            .iter()
            .map(|c| CoinInfo {
                id: c.id(),
                name: c.display_name(),
            })
            .collect(),
    )
}

/// GET /predict/{coin} runs a fresh prediction.
async fn predict_coin<S, C>(
    State(state): State<AppState<S, C>>,
    Path(coin): Path<String>,
) -> Result<Json<Prediction>, ApiError>
where
    S: MarketDataSource + 'static,
    C: Classifier + 'static,
{
    let coin = parse_coin(&coin)?;
    let prediction = state.predictor.predict(coin).await.map_err(|e| {
        warn!("Prediction for {} failed: {}", coin, e);
        e
    })?;

    info!("{}", prediction.headline());
    state.latest_output.write().insert(coin, prediction.clone());
    Ok(Json(prediction))
}

/// GET /trend/{coin} returns the price window behind the chart.
async fn price_trend<S, C>(
    State(state): State<AppState<S, C>>,
    Path(coin): Path<String>,
) -> Result<Json<Vec<TrendPoint>>, ApiError>
where
    S: MarketDataSource + 'static,
    C: Classifier + 'static,
{
    let coin = parse_coin(&coin)?;
    let series = state.predictor.recent_series(coin).await?;
    Ok(Json(
        series
            .records()
            .iter()
            .map(|r| TrendPoint {
                date: r.date,
                price: r.price,
            })
            .collect(),
    ))
}

/// GET /latest returns the latest prediction made for each coin.
async fn get_latest_output<S, C>(State(state): State<AppState<S, C>>) -> Json<Vec<Prediction>> {
    let output = state.latest_output.read();
    Json(output.values().cloned().collect())
}

pub struct Server<S, C> {
    state: AppState<S, C>,
    addr: SocketAddr,
}

impl<S, C> Server<S, C>
where
    S: MarketDataSource + 'static,
    C: Classifier + 'static,
{
    pub fn init(predictor: Predictor<S, C>, addr: SocketAddr) -> Self {
        let state = AppState {
            predictor: Arc::new(predictor),
            latest_output: Arc::new(RwLock::new(BTreeMap::new())),
        };

        Self { state, addr }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/coins", get(list_coins))
            .route("/predict/{coin}", get(predict_coin::<S, C>))
            .route("/trend/{coin}", get(price_trend::<S, C>))
            .route("/latest", get(get_latest_output::<S, C>))
            .with_state(self.state.clone())
    }

    pub async fn run(&self) -> Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!("HTTP server running on {}", self.addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Received shutdown signal, initiating graceful shutdown");
            })
            .await?;
        Ok(())
    }
}
