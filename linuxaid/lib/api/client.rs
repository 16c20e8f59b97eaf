use std::fs;

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use reqwest::{
    header::{HeaderValue, CONTENT_TYPE},
    Identity, Method, StatusCode, Url,
};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};

use crate::{
    config::{defaults::DEFAULT_TELEMETRY_MAX_RETRIES, HostIdentity, OrchestratorContext},
    LinuxaidError, LinuxaidResult,
};

use super::{ApiResponse, LastRunReport, ServiceWindow};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const CLOSE_WINDOW_BODY: &[u8] = br#"{"comments": "server has been updated"}"#;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// HTTP client of the Obmondo control plane, authenticated with the host's certificate.
///
/// Window requests are sent exactly once. Telemetry goes through a second middleware stack
/// that retries transient failures.
#[derive(Debug, Clone)]
pub struct ObmondoClient {
    base_url: Url,
    certname: String,
    customer_id: String,
    client: ClientWithMiddleware,
    telemetry_client: ClientWithMiddleware,
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// The operations the update workflow needs from the control plane.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Fetches the host's current service window.
    async fn fetch_service_window_status(&self) -> LinuxaidResult<ServiceWindow>;

    /// Closes today's service window, "today" being computed in `timezone`.
    ///
    /// Closing an already closed window succeeds.
    async fn close_service_window(&self, window_type: &str, timezone: &str) -> LinuxaidResult<()>;

    /// Uploads the agent's last run report.
    async fn report_agent_run_outcome(&self, report: &LastRunReport) -> LinuxaidResult<()>;

    /// Tells the control plane the host is alive.
    async fn ping(&self) -> LinuxaidResult<()>;
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ObmondoClient {
    /// Creates a client using the host identity and API settings of the context.
    pub fn new(context: &OrchestratorContext) -> LinuxaidResult<Self> {
        let identity = load_tls_identity(context.get_identity())?;
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .timeout(*context.get_api_timeout())
            .build()?;

        Self::with_client(
            http,
            context.get_api_url(),
            context.get_identity().get_certname(),
        )
    }

    /// Creates a client on top of an already configured HTTP client.
    pub fn with_client(
        http: reqwest::Client,
        base_url: &str,
        certname: impl Into<String>,
    ) -> LinuxaidResult<Self> {
        let base_url = Url::parse(base_url).map_err(LinuxaidError::custom)?;
        let certname = certname.into();
        let customer_id = crate::config::customer_id(&certname).to_string();

        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(DEFAULT_TELEMETRY_MAX_RETRIES);
        let telemetry_client = ClientBuilder::new(http.clone())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        let client = ClientBuilder::new(http).build();

        Ok(Self {
            base_url,
            certname,
            customer_id,
            client,
            telemetry_client,
        })
    }

    /// Joins path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> LinuxaidResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                LinuxaidError::custom(anyhow::anyhow!(
                    "api url cannot be a base: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, client: &ClientWithMiddleware, method: Method, url: Url) -> RequestBuilder {
        client
            .request(method, url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl ControlPlane for ObmondoClient {
    async fn fetch_service_window_status(&self) -> LinuxaidResult<ServiceWindow> {
        let url = self.endpoint(&["window", "now"])?;
        let response = self
            .request(&self.client, Method::GET, url.clone())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(LinuxaidError::Protocol {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let envelope: ApiResponse<ServiceWindow> =
            serde_json::from_str(&body).map_err(|source| LinuxaidError::MalformedResponse {
                url: url.to_string(),
                source,
            })?;

        envelope.data.ok_or_else(|| LinuxaidError::Protocol {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    async fn close_service_window(&self, window_type: &str, timezone: &str) -> LinuxaidResult<()> {
        let tz: Tz = timezone
            .parse()
            .map_err(|_| LinuxaidError::InvalidTimezone(timezone.to_string()))?;
        let date = Utc::now().with_timezone(&tz).format("%Y-%m-%d").to_string();

        let url = self.endpoint(&[
            "window",
            "close",
            "customer",
            &self.customer_id,
            "certname",
            &self.certname,
            "date",
            &date,
            "type",
            window_type,
        ])?;

        let response = self
            .request(&self.client, Method::PUT, url)
            .body(CLOSE_WINDOW_BODY)
            .send()
            .await?;

        match response.status() {
            StatusCode::ACCEPTED => {
                tracing::info!(status_code = 202, "service window closed for this host");
                Ok(())
            }
            StatusCode::NO_CONTENT => {
                tracing::info!(
                    status_code = 204,
                    "service window closed, all hosts of the window are done"
                );
                Ok(())
            }
            StatusCode::ALREADY_REPORTED => {
                tracing::info!(status_code = 208, "service window already closed");
                Ok(())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(LinuxaidError::WindowClose {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    async fn report_agent_run_outcome(&self, report: &LastRunReport) -> LinuxaidResult<()> {
        let url = self.endpoint(&["servers", "puppet_last_run_report"])?;
        let response = self
            .request(&self.telemetry_client, Method::PUT, url.clone())
            .body(serde_json::to_vec(report)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LinuxaidError::Protocol {
                url: url.to_string(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        tracing::debug!(status_code = status.as_u16(), "agent run report uploaded");
        Ok(())
    }

    async fn ping(&self) -> LinuxaidResult<()> {
        let url = self.endpoint(&["servers", "ping"])?;
        let response = self
            .request(&self.telemetry_client, Method::PUT, url)
            .send()
            .await?;

        tracing::debug!(status_code = response.status().as_u16(), "pinged control plane");
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn load_tls_identity(identity: &HostIdentity) -> LinuxaidResult<Identity> {
    let read = |path: &std::path::Path| {
        fs::read(path).map_err(|e| LinuxaidError::Certificate {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    };

    let mut pem = read(identity.get_key_path())?;
    pem.push(b'\n');
    pem.extend(read(identity.get_cert_path())?);

    Identity::from_pem(&pem).map_err(|e| LinuxaidError::Certificate {
        path: identity.get_cert_path().clone(),
        reason: e.to_string(),
    })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
