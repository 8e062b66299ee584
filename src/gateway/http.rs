use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::gateway::{GatewayError, Snapshot, SyncAction, SyncGateway, UserRecord};
use crate::model::Pin;

#[derive(Debug, Deserialize)]
struct SyncReply {
    success: bool,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Talks to the hosted API in front of the relational store.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpGateway {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

    /// Every request, connect included, gives up after `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_client(base_url, http)
    }

    pub fn with_client(base_url: &str, http: reqwest::Client) -> Result<Self, GatewayError> {
        // Url::join drops the last segment unless the base ends with a slash
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url =
            Url::parse(&normalized).map_err(|err| GatewayError::InvalidUrl(err.to_string()))?;
        Ok(Self { base_url, http })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path)
            .map_err(|err| GatewayError::InvalidUrl(err.to_string()))
    }

    async fn status_error(res: reqwest::Response) -> GatewayError {
        let status = res.status().as_u16();
        let body = res
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        GatewayError::Status { status, body }
    }
}

impl SyncGateway for HttpGateway {
    fn name(&self) -> &'static str {
        "http"
    }

    fn fetch_all(&self) -> BoxFuture<'_, Result<Snapshot, GatewayError>> {
        Box::pin(async move {
            let res = self.http.get(self.endpoint("data")?).send().await?;
            if !res.status().is_success() {
                return Err(Self::status_error(res).await);
            }
            let snapshot = res.json::<Snapshot>().await?;
            debug!(
                users = snapshot.users.len(),
                requests = snapshot.requests.len(),
                "Fetched remote snapshot"
            );
            Ok(snapshot)
        })
    }

    fn sync(&self, action: SyncAction) -> BoxFuture<'_, Result<(), GatewayError>> {
        Box::pin(async move {
            let res = self
                .http
                .post(self.endpoint("sync")?)
                .json(&action)
                .send()
                .await?;
            if !res.status().is_success() {
                return Err(Self::status_error(res).await);
            }
            let reply = res.json::<SyncReply>().await?;
            if !reply.success {
                return Err(GatewayError::Rejected(
                    reply.kind.unwrap_or_else(|| action.kind().to_string()),
                ));
            }
            Ok(())
        })
    }

    fn verify<'a>(
        &'a self,
        name: &'a str,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<Option<UserRecord>, GatewayError>> {
        Box::pin(async move {
            let res = self
                .http
                .post(self.endpoint("auth/verify")?)
                .json(&json!({ "name": name, "pin": pin.expose() }))
                .send()
                .await?;
            match res.status() {
                StatusCode::UNAUTHORIZED => Ok(None),
                status if status.is_success() => Ok(Some(res.json::<UserRecord>().await?)),
                _ => Err(Self::status_error(res).await),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn gateway(base_url: &str) -> Result<HttpGateway, GatewayError> {
        HttpGateway::new(base_url, HttpGateway::DEFAULT_TIMEOUT)
    }

    /// Accepts connections and never writes a byte back.
    async fn silent_listener() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{addr}/api")
    }

    #[test]
    fn endpoints_join_below_the_base_path() {
        let gateway = gateway("https://example.org/.netlify/functions/api").unwrap();
        assert_eq!(
            gateway.endpoint("auth/verify").unwrap().as_str(),
            "https://example.org/.netlify/functions/api/auth/verify"
        );

        let gateway = self::gateway("http://localhost:8888/api/").unwrap();
        assert_eq!(
            gateway.endpoint("data").unwrap().as_str(),
            "http://localhost:8888/api/data"
        );
    }

    #[test]
    fn malformed_base_url_is_rejected() {
        assert!(matches!(
            gateway("not a url"),
            Err(GatewayError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn silent_store_times_out_instead_of_hanging() {
        let base = silent_listener().await;
        let gateway = HttpGateway::new(&base, Duration::from_millis(200)).unwrap();

        let fetched = tokio::time::timeout(Duration::from_secs(5), gateway.fetch_all())
            .await
            .expect("fetch_all must give up on its own");
        assert!(matches!(fetched, Err(GatewayError::Transport(_))));

        let pin = Pin::parse("1234").unwrap();
        let verified = tokio::time::timeout(Duration::from_secs(5), gateway.verify("Otieno", &pin))
            .await
            .expect("verify must give up on its own");
        assert!(verified.is_err());
    }
}
