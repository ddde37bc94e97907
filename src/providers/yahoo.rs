use super::{MarketDataProvider, ProviderError, RawColumn, RawFrame, RawTimestamp};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) dividend-ml/0.1";

/// Yahoo Finance v8 chart endpoint client
pub struct YahooProvider {
    client: reqwest::Client,
    base_url: String,
    interval: String,
}

impl YahooProvider {
    /// Create a provider against `base_url` (e.g. `https://query1.finance.yahoo.com`)
    pub fn new(base_url: &str, interval: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            interval: interval.to_string(),
        })
    }

    /// Chart URL for a ticker; `period2` is exclusive so the end day is pushed by one
    fn chart_url(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
        let period1 = start.and_hms_opt(0, 0, 0).map(|d| d.and_utc().timestamp()).unwrap_or(0);
        let period2 = end
            .succ_opt()
            .unwrap_or(end)
            .and_hms_opt(0, 0, 0)
            .map(|d| d.and_utc().timestamp())
            .unwrap_or(period1);

        format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval={}&events=div%2Csplit&includeAdjustedClose=true",
            self.base_url,
            urlencoding::encode(ticker),
            period1,
            period2,
            self.interval
        )
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawFrame, ProviderError> {
        let url = self.chart_url(ticker, start, end);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header("referer", "https://finance.yahoo.com/")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Yahoo reports unknown symbols as 404 with a JSON error body
            if let Ok(parsed) = serde_json::from_str::<ChartResponse>(&body) {
                if let Some(message) = parsed.chart.error.as_ref().and_then(describe_error) {
                    return Err(ProviderError::Api(message));
                }
            }
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let frame = parse_chart_response(&body)?;
        if frame.is_empty() {
            return Err(ProviderError::Empty(ticker.to_string()));
        }
        Ok(frame)
    }
}

fn describe_error(error: &Value) -> Option<String> {
    match error {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => {
            let code = map.get("code").and_then(Value::as_str).unwrap_or("error");
            let description = map.get("description").and_then(Value::as_str).unwrap_or("");
            Some(format!("{}: {}", code, description))
        }
        other => Some(other.to_string()),
    }
}

/// Turn a chart response body into a frame.
///
/// Every indicator array is kept as raw JSON values; nulls and odd types are
/// left for the pipeline's per-row coercion.
pub fn parse_chart_response(body: &str) -> Result<RawFrame, ProviderError> {
    let response: ChartResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    if let Some(message) = response.chart.error.as_ref().and_then(describe_error) {
        return Err(ProviderError::Api(message));
    }

    let result = match response.chart.result.and_then(|r| r.into_iter().next()) {
        Some(result) => result,
        None => return Ok(RawFrame::default()),
    };

    let utc_offset = result.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
    let index: Vec<RawTimestamp> = result
        .timestamp
        .unwrap_or_default()
        .into_iter()
        .map(|seconds| RawTimestamp::Epoch { seconds, utc_offset })
        .collect();

    let indicators = result.indicators.unwrap_or_default();
    let mut columns = Vec::new();

    if let Some(quote) = indicators.quote.into_iter().next() {
        columns.push(RawColumn::single("Open", quote.open));
        columns.push(RawColumn::single("High", quote.high));
        columns.push(RawColumn::single("Low", quote.low));
        columns.push(RawColumn::single("Close", quote.close));
        columns.push(RawColumn::single("Volume", quote.volume));
    }

    if let Some(adj) = indicators.adjclose.into_iter().next() {
        columns.push(RawColumn::single("Adj Close", adj.adjclose));
    }

    Ok(RawFrame::new(index, columns))
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartData,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    #[serde(default)]
    indicators: Option<ChartIndicators>,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
    #[serde(default)]
    adjclose: Vec<ChartAdjClose>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Value>,
    #[serde(default)]
    high: Vec<Value>,
    #[serde(default)]
    low: Vec<Value>,
    #[serde(default)]
    close: Vec<Value>,
    #[serde(default)]
    volume: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartAdjClose {
    #[serde(default)]
    adjclose: Vec<Value>,
}
