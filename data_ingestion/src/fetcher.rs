use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::coins::Coin;
use crate::config::ApiConfig;
use crate::error::DataIngestionError;
use crate::series::{DailyRecord, PriceSeries};

const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// Anything that can hand back a coin's recent daily history.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch(&self, coin: Coin, days: u32) -> Result<PriceSeries, DataIngestionError>;
}

/// Body of `/coins/{id}/market_chart`. Every array holds `[unix_ms, value]` pairs.
#[derive(Debug, Deserialize)]
pub struct MarketChart {
    pub prices: Vec<[f64; 2]>,
    pub total_volumes: Vec<[f64; 2]>,
    pub market_caps: Vec<[f64; 2]>,
}

impl MarketChart {
    pub fn into_series(self, coin: Coin) -> Result<PriceSeries, DataIngestionError> {
        let malformed = |reason: String| DataIngestionError::MalformedResponse {
            coin: coin.id().to_string(),
            reason,
        };

        if self.prices.is_empty() {
            return Err(malformed("no price points".to_string()));
        }
        if self.prices.len() != self.total_volumes.len() || self.prices.len() != self.market_caps.len() {
            return Err(malformed(format!(
                "array lengths differ: prices={}, total_volumes={}, market_caps={}",
                self.prices.len(),
                self.total_volumes.len(),
                self.market_caps.len()
            )));
        }

        let mut records = Vec::with_capacity(self.prices.len());
        for ((price, volume), market_cap) in self
            .prices
            .iter()
            .zip(self.total_volumes.iter())
            .zip(self.market_caps.iter())
        {
            let date = date_from_millis(price[0])
                .ok_or_else(|| malformed(format!("invalid timestamp {}", price[0])))?;
            records.push(DailyRecord {
                date,
                price: price[1],
                volume: volume[1],
                market_cap: market_cap[1],
            });
        }

        Ok(PriceSeries::new(coin, records))
    }
}

fn date_from_millis(ts: f64) -> Option<NaiveDate> {
    if !ts.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(ts as i64).map(|dt| dt.date_naive())
}

pub struct CoinGeckoClient {
    client: Client,
    config: ApiConfig,
}

impl CoinGeckoClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn market_chart_url(&self, coin: Coin) -> String {
        format!(
            "{}/coins/{}/market_chart",
            self.config.host.trim_end_matches('/'),
            coin.id()
        )
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    async fn fetch(&self, coin: Coin, days: u32) -> Result<PriceSeries, DataIngestionError> {
        let url = self.market_chart_url(coin);
        debug!("Fetching {} days of {} from {}", days, coin, url);

        let days = days.to_string();
        let mut request = self.client.get(&url).query(&[
            ("vs_currency", self.config.vs_currency.as_str()),
            ("days", days.as_str()),
            ("interval", "daily"),
        ]);
        if let Some(key) = &self.config.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DataIngestionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let chart: MarketChart = serde_json::from_str(&body)?;
        let series = chart.into_series(coin)?;
        info!("Fetched {} daily records for {}", series.len(), coin);
        Ok(series)
    }
}

#[derive(Serialize)]
struct RawRow {
    date: NaiveDate,
    price: f64,
    volume: f64,
    market_cap: f64,
}

/// Writes `{dir}/{coin}_{days}d.csv` and returns its path.
pub fn save_raw_csv(series: &PriceSeries, days: u32, dir: &Path) -> Result<PathBuf, DataIngestionError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}_{}d.csv", series.coin(), days));

    let mut writer = csv::Writer::from_path(&path)?;
    for r in series.records() {
        writer.serialize(RawRow {
            date: r.date,
            price: r.price,
            volume: r.volume,
            market_cap: r.market_cap,
        })?;
    }
    writer.flush()?;

    info!("Raw data saved to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_MS: f64 = 86_400_000.0;
    // 2024-01-01T00:00:00Z
    const START_MS: f64 = 1_704_067_200_000.0;

    fn chart_json(n: usize) -> String {
        let pairs = |scale: f64| {
            (0..n)
                .map(|i| format!("[{}, {}]", START_MS + i as f64 * DAY_MS, scale * (i + 1) as f64))
                .collect::<Vec<_>>()
                .join(",")
        };
        format!(
            r#"{{"prices":[{}],"total_volumes":[{}],"market_caps":[{}]}}"#,
            pairs(1.0),
            pairs(10.0),
            pairs(100.0)
        )
    }

    #[test]
    fn parses_market_chart_into_series() {
        let chart: MarketChart = serde_json::from_str(&chart_json(4)).unwrap();
        let series = chart.into_series(Coin::Ethereum).unwrap();

        assert_eq!(series.coin(), Coin::Ethereum);
        assert_eq!(series.len(), 4);
        let first = series.records()[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(first.price, 1.0);
        assert_eq!(first.volume, 10.0);
        assert_eq!(first.market_cap, 100.0);
        assert_eq!(series.records()[3].date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
    }

    #[test]
    fn trailing_intraday_point_replaces_midnight_point() {
        let json = format!(
            r#"{{"prices":[[{a},1.0],[{b},2.0],[{c},2.5]],
                "total_volumes":[[{a},1.0],[{b},1.0],[{c},1.0]],
                "market_caps":[[{a},1.0],[{b},1.0],[{c},1.0]]}}"#,
            a = START_MS,
            b = START_MS + DAY_MS,
            c = START_MS + DAY_MS + 3_600_000.0,
        );
        let chart: MarketChart = serde_json::from_str(&json).unwrap();
        let series = chart.into_series(Coin::Bitcoin).unwrap();
        assert_eq!(series.prices(), vec![1.0, 2.5]);
    }

    #[test]
    fn mismatched_arrays_are_malformed() {
        let json = format!(
            r#"{{"prices":[[{a},1.0],[{b},2.0]],"total_volumes":[[{a},1.0]],"market_caps":[[{a},1.0],[{b},1.0]]}}"#,
            a = START_MS,
            b = START_MS + DAY_MS,
        );
        let chart: MarketChart = serde_json::from_str(&json).unwrap();
        let err = chart.into_series(Coin::Bitcoin).unwrap_err();
        assert!(matches!(err, DataIngestionError::MalformedResponse { .. }));
    }

    #[test]
    fn empty_chart_is_malformed() {
        let chart: MarketChart =
            serde_json::from_str(r#"{"prices":[],"total_volumes":[],"market_caps":[]}"#).unwrap();
        assert!(chart.into_series(Coin::Solana).is_err());
    }

    #[test]
    fn missing_field_fails_to_deserialize() {
        let res: Result<MarketChart, _> = serde_json::from_str(r#"{"prices":[]}"#);
        assert!(res.is_err());
    }

    #[test]
    fn url_has_no_double_slash() {
        let client = CoinGeckoClient::new(ApiConfig {
            host: "http://localhost:1234/api/v3/".to_string(),
            vs_currency: "usd".to_string(),
            api_key: None,
        });
        assert_eq!(
            client.market_chart_url(Coin::ShibaInu),
            "http://localhost:1234/api/v3/coins/shiba-inu/market_chart"
        );
    }

    #[test]
    fn saves_raw_csv_with_header() {
        let chart: MarketChart = serde_json::from_str(&chart_json(3)).unwrap();
        let series = chart.into_series(Coin::Dogecoin).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let path = save_raw_csv(&series, 90, dir.path()).unwrap();
        assert!(path.ends_with("dogecoin_90d.csv"));

        let content = fs::read_to_string(path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("date,price,volume,market_cap"));
        assert_eq!(lines.next(), Some("2024-01-01,1.0,10.0,100.0"));
        assert_eq!(content.lines().count(), 4);
    }

    mod market_chart_endpoint {
        use super::*;
        use axum::Router;
        use axum::extract::{Path as UrlPath, Query, State};
        use axum::http::{HeaderMap, StatusCode};
        use axum::routing::get;
        use std::collections::HashMap;
        use std::sync::{Arc, Mutex};

        #[derive(Debug, Clone)]
        struct SeenRequest {
            coin: String,
            query: HashMap<String, String>,
            api_key: Option<String>,
        }

        #[derive(Clone)]
        struct Stub {
            status: StatusCode,
            body: String,
            seen: Arc<Mutex<Vec<SeenRequest>>>,
        }

        async fn market_chart(
            State(stub): State<Stub>,
            UrlPath(coin): UrlPath<String>,
            Query(query): Query<HashMap<String, String>>,
            headers: HeaderMap,
        ) -> (StatusCode, String) {
            let api_key = headers
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            stub.seen.lock().unwrap().push(SeenRequest {
                coin,
                query,
                api_key,
            });
            (stub.status, stub.body.clone())
        }

        /// Serves one canned response on a random local port.
        async fn serve(status: StatusCode, body: String) -> (String, Arc<Mutex<Vec<SeenRequest>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let app = Router::new()
                .route("/api/v3/coins/{coin}/market_chart", get(market_chart))
                .with_state(Stub {
                    status,
                    body,
                    seen: seen.clone(),
                });

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            (format!("http://{}/api/v3", addr), seen)
        }

        fn client(host: String, api_key: Option<&str>) -> CoinGeckoClient {
            CoinGeckoClient::new(ApiConfig {
                host,
                vs_currency: "usd".to_string(),
                api_key: api_key.map(str::to_string),
            })
        }

        #[tokio::test]
        async fn fetches_daily_series_with_expected_query() {
            let (host, seen) = serve(StatusCode::OK, chart_json(3)).await;

            let series = client(host, None).fetch(Coin::Bitcoin, 7).await.unwrap();
            assert_eq!(series.coin(), Coin::Bitcoin);
            assert_eq!(series.len(), 3);
            assert_eq!(series.records()[2].price, 3.0);

            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 1);
            let request = &seen[0];
            assert_eq!(request.coin, "bitcoin");
            assert_eq!(request.query.get("vs_currency").map(String::as_str), Some("usd"));
            assert_eq!(request.query.get("days").map(String::as_str), Some("7"));
            assert_eq!(request.query.get("interval").map(String::as_str), Some("daily"));
            assert_eq!(request.api_key, None);
        }

        #[tokio::test]
        async fn sends_demo_key_header_when_configured() {
            let (host, seen) = serve(StatusCode::OK, chart_json(2)).await;

            client(host, Some("CG-test-key"))
                .fetch(Coin::ShibaInu, 2)
                .await
                .unwrap();

            let seen = seen.lock().unwrap();
            assert_eq!(seen[0].coin, "shiba-inu");
            assert_eq!(seen[0].api_key.as_deref(), Some("CG-test-key"));
        }

        #[tokio::test]
        async fn rate_limited_response_is_api_error() {
            let (host, _) = serve(StatusCode::TOO_MANY_REQUESTS, "rate limited".to_string()).await;

            let err = client(host, None).fetch(Coin::Solana, 90).await.unwrap_err();
            match err {
                DataIngestionError::Api { status, body } => {
                    assert_eq!(status, 429);
                    assert_eq!(body, "rate limited");
                }
                other => panic!("unexpected error: {}", other),
            }
        }

        #[tokio::test]
        async fn non_json_body_is_deserialization_error() {
            let (host, _) = serve(StatusCode::OK, "<html>maintenance</html>".to_string()).await;

            let err = client(host, None).fetch(Coin::Dogecoin, 90).await.unwrap_err();
            assert!(matches!(err, DataIngestionError::SerdeJsonError(_)));
        }
    }
}
