//! Browser front end.
//!
//! A stateless HTML layer over the serving API: each page forwards the user's
//! input to the API and renders whatever JSON comes back. API-level errors
//! (`{"detail": ...}`) are shown inline; an unreachable API yields a 502 page.

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::error;

const API_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum UiError {
    #[error("API unreachable: {0}")]
    Unreachable(String),
}

impl From<reqwest::Error> for UiError {
    fn from(err: reqwest::Error) -> Self {
        UiError::Unreachable(err.to_string())
    }
}

impl IntoResponse for UiError {
    fn into_response(self) -> Response {
        error!("{}", self);
        let body = format!(
            "<h2>Service unavailable</h2><p class=\"error\">{}</p>",
            escape_html(&self.to_string())
        );
        (StatusCode::BAD_GATEWAY, page("Error", &body)).into_response()
    }
}

/// Status and JSON body of one API call
#[derive(Debug, Clone)]
pub struct ApiReply {
    pub status: u16,
    pub body: Value,
}

impl ApiReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Error text of a failed call
    pub fn detail(&self) -> String {
        match self.body.get("detail").or_else(|| self.body.get("message")) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => format!("API returned status {}", self.status),
        }
    }
}

/// Thin JSON client for the serving API
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(API_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get_json(&self, path: &str) -> Result<ApiReply, UiError> {
        let response = self.client.get(self.url(path)).send().await?;
        Self::reply(response).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<ApiReply, UiError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::reply(response).await
    }

    async fn reply(response: reqwest::Response) -> Result<ApiReply, UiError> {
        let status = response.status().as_u16();
        let text = response.text().await?;
        // Non-JSON bodies (extractor rejections) are shown as plain detail
        let body = serde_json::from_str(&text).unwrap_or_else(|_| {
            serde_json::json!({ "detail": text })
        });
        Ok(ApiReply { status, body })
    }
}

#[derive(Clone)]
struct UiState {
    api: ApiClient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictForm {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
    pub dividends: f64,
    pub earnings: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyForm {
    pub ticker: String,
    pub name: String,
}

/// Build the UI router
pub fn router(api: ApiClient) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predict", get(predict_form).post(predict_submit))
        .route("/metrics", get(metrics))
        .route("/companies", get(companies).post(add_company))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(UiState { api }))
}

async fn index() -> Html<String> {
    page(
        "Dividend ML",
        "<h2>Dividend ML</h2>\
         <p>Predict closing prices from quarterly fundamentals.</p>\
         <ul>\
         <li><a href=\"/predict\">Make a prediction</a></li>\
         <li><a href=\"/metrics\">Model metrics</a></li>\
         <li><a href=\"/companies\">Tracked companies</a></li>\
         </ul>",
    )
}

async fn predict_form() -> Html<String> {
    page("Predict", &render_predict(None, None))
}

async fn predict_submit(
    State(state): State<Arc<UiState>>,
    Form(form): Form<PredictForm>,
) -> Result<Html<String>, UiError> {
    let reply = state.api.post_json("/predict", &form).await?;
    Ok(page("Predict", &render_predict(Some(&form), Some(&reply))))
}

async fn metrics(State(state): State<Arc<UiState>>) -> Result<Html<String>, UiError> {
    let reply = state.api.get_json("/metrics").await?;
    Ok(page("Metrics", &render_metrics(&reply)))
}

async fn companies(State(state): State<Arc<UiState>>) -> Result<Html<String>, UiError> {
    let reply = state.api.get_json("/companies/list").await?;
    Ok(page("Companies", &render_companies(&reply)))
}

async fn add_company(
    State(state): State<Arc<UiState>>,
    Form(form): Form<CompanyForm>,
) -> Result<Redirect, UiError> {
    // Duplicates and validation errors are not surfaced; the list shows the outcome
    state.api.post_json("/companies/add", &form).await?;
    Ok(Redirect::to("/companies"))
}

/// Escape text for safe inclusion in HTML
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n\
         <body>\n<nav><a href=\"/\">Home</a> | <a href=\"/predict\">Predict</a> | \
         <a href=\"/metrics\">Metrics</a> | <a href=\"/companies\">Companies</a></nav>\n\
         {}\n</body>\n</html>\n",
        escape_html(title),
        body
    ))
}

fn number(value: Option<&Value>) -> String {
    match value.and_then(Value::as_f64) {
        Some(v) => format!("{:.6}", v),
        None => "n/a".to_string(),
    }
}

fn render_predict(form: Option<&PredictForm>, reply: Option<&ApiReply>) -> String {
    let field = |name: &str, value: Option<f64>| {
        format!(
            "<label>{name} <input type=\"number\" step=\"any\" name=\"{name}\" value=\"{value}\" required></label><br>",
            name = name,
            value = value.map(|v| v.to_string()).unwrap_or_default()
        )
    };

    let mut html = String::from(
        "<h2>Predict closing price</h2><form method=\"post\" action=\"/predict\">",
    );
    html.push_str(&field("open", form.map(|f| f.open)));
    html.push_str(&field("high", form.map(|f| f.high)));
    html.push_str(&field("low", form.map(|f| f.low)));
    html.push_str(&field("volume", form.map(|f| f.volume)));
    html.push_str(&field("dividends", form.map(|f| f.dividends).or(Some(0.0))));
    html.push_str(&field("earnings", form.map(|f| f.earnings).or(Some(1.0))));
    html.push_str("<button type=\"submit\">Predict</button></form>");

    match reply {
        Some(reply) if reply.is_success() => {
            let _ = write!(
                html,
                "<p class=\"result\">Predicted close: <strong>{}</strong></p>",
                number(reply.body.get("predicted_close"))
            );
        }
        Some(reply) => {
            let _ = write!(html, "<p class=\"error\">{}</p>", escape_html(&reply.detail()));
        }
        None => {}
    }

    html
}

fn render_metrics(reply: &ApiReply) -> String {
    if !reply.is_success() {
        return format!(
            "<h2>Model metrics</h2><p class=\"error\">{}</p>",
            escape_html(&reply.detail())
        );
    }

    let interpretation = reply
        .body
        .get("interpretation")
        .and_then(Value::as_str)
        .unwrap_or("");

    format!(
        "<h2>Model metrics</h2><table>\
         <tr><th>MSE</th><td>{}</td></tr>\
         <tr><th>R²</th><td>{}</td></tr>\
         </table><p>{}</p>",
        number(reply.body.get("mse")),
        number(reply.body.get("r2")),
        escape_html(interpretation)
    )
}

fn render_companies(reply: &ApiReply) -> String {
    let mut html = String::from("<h2>Tracked companies</h2>");

    if reply.is_success() {
        let empty = Vec::new();
        let companies = reply
            .body
            .get("companies")
            .and_then(Value::as_array)
            .unwrap_or(&empty);

        if companies.is_empty() {
            html.push_str("<p>No companies registered.</p>");
        } else {
            html.push_str("<table><tr><th>Ticker</th><th>Name</th></tr>");
            for company in companies {
                let text = |key: &str| company.get(key).and_then(Value::as_str).unwrap_or("");
                let _ = write!(
                    html,
                    "<tr><td>{}</td><td>{}</td></tr>",
                    escape_html(text("ticker")),
                    escape_html(text("name"))
                );
            }
            html.push_str("</table>");
        }
    } else {
        let _ = write!(html, "<p class=\"error\">{}</p>", escape_html(&reply.detail()));
    }

    html.push_str(
        "<h3>Add company</h3><form method=\"post\" action=\"/companies\">\
         <label>Ticker <input name=\"ticker\" required></label><br>\
         <label>Name <input name=\"name\" required></label><br>\
         <button type=\"submit\">Add</button></form>",
    );
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::Json;
    use serde_json::json;
    use tower::ServiceExt;

    fn reply(status: u16, body: Value) -> ApiReply {
        ApiReply { status, body }
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// Serve a canned API on an ephemeral port and return its base URL
    async fn spawn_stub_api() -> String {
        let app = Router::new()
            .route(
                "/predict",
                axum::routing::post(|Json(body): Json<Value>| async move {
                    let open = body["open"].as_f64().unwrap_or(0.0);
                    Json(json!({ "predicted_close": open + 1.0 }))
                }),
            )
            .route(
                "/companies/add",
                axum::routing::post(|| async {
                    Json(json!({ "status": "ok", "message": "Added" }))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<b>\"A&B\"</b> 'x'"),
            "&lt;b&gt;&quot;A&amp;B&quot;&lt;/b&gt; &#39;x&#39;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_render_companies_escapes_names() {
        let html = render_companies(&reply(
            200,
            json!({ "companies": [{ "ticker": "ABC", "name": "<script>" }] }),
        ));
        assert!(html.contains("<td>ABC</td>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_render_metrics_shows_detail_on_error() {
        let html = render_metrics(&reply(400, json!({ "detail": "Model not trained yet." })));
        assert!(html.contains("Model not trained yet."));

        let html = render_metrics(&reply(
            200,
            json!({ "mse": 0.5, "r2": 0.75, "interpretation": "R² in reasonable range." }),
        ));
        assert!(html.contains("0.500000"));
        assert!(html.contains("R² in reasonable range."));
    }

    #[test]
    fn test_reply_detail_fallbacks() {
        assert_eq!(reply(409, json!({ "message": "dup" })).detail(), "dup");
        assert_eq!(reply(500, json!({})).detail(), "API returned status 500");
    }

    #[tokio::test]
    async fn test_unreachable_api_renders_502() {
        let api = ApiClient::new("http://127.0.0.1:1").unwrap();
        let response = router(api)
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(body_text(response).await.contains("Service unavailable"));
    }

    #[tokio::test]
    async fn test_index_and_form_render_without_api() {
        let api = ApiClient::new("http://127.0.0.1:1").unwrap();
        let response = router(api)
            .oneshot(Request::get("/predict").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("name=\"volume\""));
    }

    #[tokio::test]
    async fn test_predict_form_forwards_to_api() {
        let api = ApiClient::new(&spawn_stub_api().await).unwrap();
        let response = router(api)
            .oneshot(
                Request::post("/predict")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(
                        "open=10&high=12&low=9&volume=1000&dividends=0&earnings=1",
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("11.000000"));
    }

    #[tokio::test]
    async fn test_add_company_redirects_with_see_other() {
        let api = ApiClient::new(&spawn_stub_api().await).unwrap();
        let response = router(api)
            .oneshot(
                Request::post("/companies")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("ticker=abc&name=Test+Co"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/companies");
    }
}
