use std::time::Duration;

use reqwest::StatusCode;

use crate::{LinuxaidError, LinuxaidResult};

use super::{ExporterErrorResponse, PackageUpdates};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const PACKAGE_UPDATES_PATH: &str = "/total_number_of_packages_with_update";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Client of the security exporter running on the host, which counts pending package updates.
#[derive(Debug, Clone)]
pub struct SecurityExporter {
    client: reqwest::Client,
    base_url: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SecurityExporter {
    /// Creates a client for the exporter listening at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> LinuxaidResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Asks the exporter how many packages still have an update pending.
    pub async fn package_updates(&self) -> LinuxaidResult<PackageUpdates> {
        let url = format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            PACKAGE_UPDATES_PATH
        );
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if status.as_u16() >= StatusCode::BAD_REQUEST.as_u16() {
            let detail = match serde_json::from_str::<ExporterErrorResponse>(&body) {
                Ok(error) => format!("{} (output: {})", error.error, error.output),
                Err(_) => body,
            };
            return Err(LinuxaidError::Protocol {
                url,
                status: status.as_u16(),
                body: detail,
            });
        }

        serde_json::from_str(&body).map_err(|source| LinuxaidError::MalformedResponse { url, source })
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;

    #[test_log::test(tokio::test)]
    async fn test_package_updates() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path(PACKAGE_UPDATES_PATH);
                then.status(200).json_body(serde_json::json!({
                    "total_number_of_packages_with_update": 3,
                    "has_kernel_update": true
                }));
            })
            .await;

        let exporter = SecurityExporter::new(server.base_url(), Duration::from_secs(5))?;
        let updates = exporter.package_updates().await?;

        mock.assert_async().await;
        assert_eq!(updates.total_number_of_packages_with_update, 3);
        assert!(updates.has_kernel_update);

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_package_updates_error_response() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(PACKAGE_UPDATES_PATH);
                then.status(500).json_body(serde_json::json!({
                    "output": "E: Could not get lock /var/lib/dpkg/lock-frontend",
                    "error": "exit status 100"
                }));
            })
            .await;

        let exporter = SecurityExporter::new(server.base_url(), Duration::from_secs(5))?;
        let err = exporter.package_updates().await.unwrap_err();

        assert_eq!(err.status_code(), Some(500));
        assert!(err.to_string().contains("exit status 100"));

        Ok(())
    }
}
