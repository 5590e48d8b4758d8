use anyhow::{Result, anyhow};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct AskRequest<'a> {
    query: &'a str,
}

/// Answer from `POST /ask`. Extra fields the backend tacks on
/// (`understanding`, `filtered`) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    #[serde(default)]
    pub chart_url: Option<String>,
}

#[derive(Serialize)]
struct PerformanceRequest<'a> {
    month: &'a str,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompanyPerformance {
    pub company: String,
    pub performance: String,
}

/// Raw wire shape of `POST /api/revenue-performance`: the backend signals
/// application-level failure with `status != "success"` plus a `message`,
/// so both arms share one envelope.
#[derive(Deserialize)]
struct PerformanceEnvelope {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    results: Option<Vec<CompanyPerformance>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PerformanceOutcome {
    Success(Vec<CompanyPerformance>),
    Failure(String),
}

fn outcome_from_envelope(envelope: PerformanceEnvelope) -> PerformanceOutcome {
    if envelope.status == "success" {
        PerformanceOutcome::Success(envelope.results.unwrap_or_default())
    } else {
        PerformanceOutcome::Failure(
            envelope
                .message
                .unwrap_or_else(|| format!("backend reported status \"{}\"", envelope.status)),
        )
    }
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn ask(&self, query: &str) -> Result<AskResponse> {
        let url = format!("{}/ask", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&AskRequest { query })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("/ask failed with status: {}", response.status()));
        }

        let ask_response: AskResponse = response.json().await?;
        Ok(ask_response)
    }

    pub async fn revenue_performance(&self, month: &str) -> Result<PerformanceOutcome> {
        let url = format!("{}/api/revenue-performance", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&PerformanceRequest { month })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "/api/revenue-performance failed with status: {}",
                response.status()
            ));
        }

        let envelope: PerformanceEnvelope = response.json().await?;
        Ok(outcome_from_envelope(envelope))
    }

    /// Build the force-reload source for a chart image: the `t` timestamp
    /// parameter changes on every fetch so an unchanged path is never served
    /// from a stale cache.
    pub fn chart_source(&self, chart_url: &str, stamp_millis: i64) -> Result<String> {
        let base = Url::parse(&format!("{}/", self.base_url))?;
        let mut url = base.join(chart_url)?;
        url.query_pairs_mut()
            .append_pair("t", &stamp_millis.to_string());
        Ok(url.into())
    }

    pub async fn fetch_chart(&self, source: &str) -> Result<Vec<u8>> {
        let response = self.client.get(source).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "chart fetch failed with status: {}",
                response.status()
            ));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn success_envelope_becomes_rows() {
        let envelope: PerformanceEnvelope = serde_json::from_str(
            r#"{"status":"success","results":[{"company":"Acme","performance":"overperforming"}]}"#,
        )
        .unwrap();

        let outcome = outcome_from_envelope(envelope);
        assert_eq!(
            outcome,
            PerformanceOutcome::Success(vec![CompanyPerformance {
                company: "Acme".to_string(),
                performance: "overperforming".to_string(),
            }])
        );
    }

    #[test]
    fn non_success_envelope_carries_message() {
        let envelope: PerformanceEnvelope =
            serde_json::from_str(r#"{"status":"error","message":"bad month"}"#).unwrap();

        assert_eq!(
            outcome_from_envelope(envelope),
            PerformanceOutcome::Failure("bad month".to_string())
        );
    }

    #[test]
    fn non_success_envelope_without_message_still_fails() {
        let envelope: PerformanceEnvelope =
            serde_json::from_str(r#"{"status":"empty"}"#).unwrap();

        match outcome_from_envelope(envelope) {
            PerformanceOutcome::Failure(msg) => assert!(msg.contains("empty")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn ask_response_ignores_extra_fields() {
        let response: AskResponse = serde_json::from_str(
            r#"{"answer":"hi","understanding":{},"filtered":[],"chart_url":"/chart/q3.png"}"#,
        )
        .unwrap();

        assert_eq!(response.answer, "hi");
        assert_eq!(response.chart_url.as_deref(), Some("/chart/q3.png"));
    }

    #[test]
    fn chart_source_appends_timestamp() {
        let client = BackendClient::new("http://127.0.0.1:5000");
        let source = client.chart_source("/chart/c.png", 1700000000000).unwrap();
        assert_eq!(source, "http://127.0.0.1:5000/chart/c.png?t=1700000000000");
    }

    #[test]
    fn chart_source_differs_across_timestamps() {
        let client = BackendClient::new("http://127.0.0.1:5000");
        let first = client.chart_source("/chart/c.png", 1700000000000).unwrap();
        let second = client.chart_source("/chart/c.png", 1700000000001).unwrap();
        assert_ne!(first, second);
    }

    /// Serve one canned HTTP response, then let the client hit it.
    async fn one_shot_server(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Drain the full request (headers + content-length body) before
            // answering, so the client never sees the connection close while
            // it is still writing.
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);

                if let Some(pos) = request
                    .windows(4)
                    .position(|window| window == b"\r\n\r\n")
                {
                    let headers = String::from_utf8_lossy(&request[..pos]);
                    let content_length = headers
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            if name.eq_ignore_ascii_case("content-length") {
                                value.trim().parse::<usize>().ok()
                            } else {
                                None
                            }
                        })
                        .unwrap_or(0);
                    if request.len() >= pos + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn ask_round_trip() {
        let base = one_shot_server(r#"{"answer":"Revenue grew 4%"}"#).await;
        let client = BackendClient::new(&base);

        let response = client.ask("how did we do?").await.unwrap();
        assert_eq!(response.answer, "Revenue grew 4%");
        assert!(response.chart_url.is_none());
    }

    #[tokio::test]
    async fn revenue_performance_round_trip() {
        let base = one_shot_server(
            r#"{"status":"success","results":[{"company":"Initech","performance":"underperforming"}]}"#,
        )
        .await;
        let client = BackendClient::new(&base);

        let outcome = client.revenue_performance("March").await.unwrap();
        match outcome {
            PerformanceOutcome::Success(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].company, "Initech");
            }
            other => panic!("expected success, got {:?}", other),
        }
    }
}
