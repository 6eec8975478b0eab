/**
 * REMOTE REPORTER - Push du snapshot vers le collecteur distant
 *
 * RÔLE :
 * Transporte la collection de rapports accumulés vers le collecteur.
 * Ne fait aucun retry : c'est le cycle d'inspection qui décide quoi faire
 * d'un échec, et il ne tolère que `PushError::Unavailable`.
 *
 * CLASSIFICATION (HttpReporter) :
 * - connexion refusée / timeout            → Unavailable
 * - HTTP 502 / 503 / 504 (collecteur ou
 *   proxy devant lui hors service)          → Unavailable
 * - autre statut non-2xx                    → Rejected
 * - autre erreur reqwest                    → Transport
 */

use crate::config::CollectorConf;
use crate::error::PushError;
use crate::models::Report;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait RemoteReporter: Send + Sync {
    async fn push(&self, reports: Vec<Report>) -> Result<(), PushError>;
}

/// Client HTTP du collecteur : POST JSON de la liste des rapports
#[derive(Debug, Clone)]
pub struct HttpReporter {
    client: reqwest::Client,
    url: String,
}

impl HttpReporter {
    pub fn new(conf: &CollectorConf) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(conf.timeout_ms))
            .build()?;
        Ok(Self { client, url: conf.url.clone() })
    }
}

#[async_trait]
impl RemoteReporter for HttpReporter {
    async fn push(&self, reports: Vec<Report>) -> Result<(), PushError> {
        let count = reports.len();
        let resp = self
            .client
            .post(&self.url)
            .json(&reports)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = resp.status();
        if status.is_success() {
            debug!(reports = count, "snapshot pushed to collector");
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        if is_unavailable_status(status) {
            return Err(PushError::Unavailable(format!("collector returned {status}: {body}")));
        }
        Err(PushError::Rejected { status: status.as_u16(), message: body })
    }
}

fn is_unavailable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

fn classify_transport_error(e: reqwest::Error) -> PushError {
    if e.is_connect() || e.is_timeout() {
        PushError::Unavailable(e.to_string())
    } else {
        PushError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reporter_for(url: String) -> HttpReporter {
        HttpReporter::new(&CollectorConf { url, timeout_ms: 500 }).unwrap()
    }

    #[tokio::test]
    async fn test_push_success_sends_reports_array() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/reports"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let reporter = reporter_for(format!("{}/reports", server.uri()));
        reporter
            .push(vec![Report::new("a", json!({"ok": true}))])
            .await
            .unwrap();

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body[0]["target_id"], "a");
    }

    #[tokio::test]
    async fn test_503_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = reporter_for(server.uri()).push(vec![]).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_gateway_errors_are_unavailable() {
        for code in [502, 504] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(code).set_body_string("upstream down"))
                .mount(&server)
                .await;

            let err = reporter_for(server.uri()).push(vec![]).await.unwrap_err();
            assert!(err.is_unavailable(), "{code} gave {err:?}");
        }
    }

    #[tokio::test]
    async fn test_server_error_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = reporter_for(server.uri()).push(vec![]).await.unwrap_err();
        assert!(matches!(err, PushError::Rejected { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_other_status_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad payload"))
            .mount(&server)
            .await;

        let err = reporter_for(server.uri()).push(vec![]).await.unwrap_err();
        assert_eq!(err, PushError::Rejected { status: 400, message: "bad payload".into() });
    }

    #[tokio::test]
    async fn test_connection_refused_is_unavailable() {
        // port réservé, rien n'écoute dessus
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = reporter_for(format!("http://{addr}/reports")).push(vec![]).await.unwrap_err();
        assert!(err.is_unavailable(), "got {err:?}");
    }
}
