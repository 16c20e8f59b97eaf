use chrono::Utc;
use httpmock::prelude::*;
use linuxaid::{
    api::{ControlPlane, LastRunReport, ObmondoClient},
    ErrorKind, LinuxaidError,
};
use serde_json::json;

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn client(server: &MockServer) -> anyhow::Result<ObmondoClient> {
    Ok(ObmondoClient::with_client(
        reqwest::Client::new(),
        &server.base_url(),
        "web01.acme",
    )?)
}

fn today_in(timezone: chrono_tz::Tz) -> String {
    Utc::now().with_timezone(&timezone).format("%Y-%m-%d").to_string()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test(tokio::test)]
async fn test_fetch_service_window() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/window/now")
                .header("content-type", "application/json");
            then.status(200).json_body(json!({
                "status": 200,
                "success": true,
                "data": {
                    "is_window_open": true,
                    "window_type": "automatic",
                    "timezone": "Europe/Copenhagen"
                },
                "message": "service window is active",
                "resolution": "",
                "error_text": ""
            }));
        })
        .await;

    let window = client(&server)?.fetch_service_window_status().await?;

    mock.assert_async().await;
    assert!(window.is_open());
    assert_eq!(window.get_window_type(), "automatic");
    assert_eq!(window.get_timezone(), "Europe/Copenhagen");

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_fetch_service_window_server_error() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/window/now");
            then.status(500).body("internal server error");
        })
        .await;

    let err = client(&server)?
        .fetch_service_window_status()
        .await
        .unwrap_err();

    mock.assert_hits_async(1).await;
    assert!(matches!(
        &err,
        LinuxaidError::Protocol { status: 500, body, .. } if body == "internal server error"
    ));
    assert_eq!(err.kind(), Some(ErrorKind::TransientApi));

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_fetch_service_window_malformed_body() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/window/now");
            then.status(200).body("<html>maintenance</html>");
        })
        .await;

    let err = client(&server)?
        .fetch_service_window_status()
        .await
        .unwrap_err();
    assert!(matches!(err, LinuxaidError::MalformedResponse { .. }));
    assert_eq!(err.kind(), Some(ErrorKind::TransientApi));

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_fetch_service_window_without_data() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/window/now");
            then.status(200).json_body(json!({
                "status": 200,
                "success": false,
                "data": null,
                "message": "",
                "resolution": "",
                "error_text": "no window configured"
            }));
        })
        .await;

    let err = client(&server)?
        .fetch_service_window_status()
        .await
        .unwrap_err();
    assert!(matches!(err, LinuxaidError::Protocol { status: 200, .. }));

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_fetch_closed_service_window_without_details() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/window/now");
            then.status(200)
                .json_body(json!({"data": {"is_window_open": false}}));
        })
        .await;

    let window = client(&server)?.fetch_service_window_status().await?;

    assert!(!window.is_open());
    assert_eq!(window.get_window_type(), "");
    assert_eq!(window.get_timezone(), "");

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_fetch_service_window_unreachable() -> anyhow::Result<()> {
    let client =
        ObmondoClient::with_client(reqwest::Client::new(), "http://127.0.0.1:1", "web01.acme")?;

    let err = client.fetch_service_window_status().await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::TransientApi));

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_close_service_window_success_statuses() -> anyhow::Result<()> {
    let date = today_in(chrono_tz::Europe::Copenhagen);
    let path = format!("/window/close/customer/acme/certname/web01.acme/date/{date}/type/automatic");

    for status in [202, 204, 208] {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path(path.as_str())
                    .header("content-type", "application/json")
                    .json_body(json!({"comments": "server has been updated"}));
                then.status(status);
            })
            .await;

        client(&server)?
            .close_service_window("automatic", "Europe/Copenhagen")
            .await?;
        mock.assert_async().await;
    }

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_close_service_window_twice_is_not_a_failure() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let client = client(&server)?;

    let mut closed = server
        .mock_async(|when, then| {
            when.method(PUT).path_contains("/window/close/customer/acme/");
            then.status(204);
        })
        .await;
    client.close_service_window("automatic", "UTC").await?;
    closed.assert_async().await;
    closed.delete_async().await;

    let already_reported = server
        .mock_async(|when, then| {
            when.method(PUT).path_contains("/window/close/customer/acme/");
            then.status(208);
        })
        .await;
    client.close_service_window("automatic", "UTC").await?;
    already_reported.assert_async().await;

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_close_service_window_failure_keeps_body() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(PUT).path_contains("/type/manual");
            then.status(409).body("window belongs to another customer");
        })
        .await;

    let err = client(&server)?
        .close_service_window("manual", "America/New_York")
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        LinuxaidError::WindowClose { status: 409, body } if body == "window belongs to another customer"
    ));
    assert_eq!(err.kind(), Some(ErrorKind::WindowClose));
    assert_eq!(err.status_code(), Some(409));

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_close_service_window_rejects_unknown_timezone() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT);
            then.status(202);
        })
        .await;

    let err = client(&server)?
        .close_service_window("automatic", "Mars/Olympus_Mons")
        .await
        .unwrap_err();

    assert!(matches!(err, LinuxaidError::InvalidTimezone(_)));
    mock.assert_hits_async(0).await;

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_report_agent_run_outcome() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/servers/puppet_last_run_report")
                .json_body(json!({
                    "time": "2024-11-05T10:15:02+00:00",
                    "status": "unchanged",
                    "transaction_completed": true,
                    "is_last_run_yaml_file_not_present": false
                }));
            then.status(204);
        })
        .await;

    let report = LastRunReport {
        time: "2024-11-05T10:15:02+00:00".to_string(),
        status: "unchanged".to_string(),
        transaction_completed: true,
        is_last_run_yaml_file_not_present: false,
    };
    client(&server)?.report_agent_run_outcome(&report).await?;
    mock.assert_async().await;

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_ping() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT).path("/servers/ping");
            then.status(204);
        })
        .await;

    client(&server)?.ping().await?;
    mock.assert_async().await;

    Ok(())
}
