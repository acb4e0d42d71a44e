//! Test helper utilities for E2E testing against a running server.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

/// Response from POST /api/v1/moderation
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub task_id: i64,
    pub status: String,
    pub message: String,
}

/// Response from GET /api/v1/moderation/{task_id}
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub task_id: i64,
    pub status: String,
    pub is_violation: Option<bool>,
    pub probability: Option<f64>,
    pub error_message: Option<String>,
}

/// Submit an item for moderation.
pub async fn submit_item(
    client: &reqwest::Client,
    base_url: &str,
    item_id: i64,
) -> Result<SubmitResponse, Box<dyn std::error::Error>> {
    let response = client
        .post(format!("{}/api/v1/moderation", base_url))
        .json(&serde_json::json!({ "item_id": item_id }))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await?;
        return Err(format!("Submit failed with status {}: {}", status, error_text).into());
    }

    let body = response.json::<SubmitResponse>().await?;
    Ok(body)
}

/// Poll task status until completed or failed (with timeout).
pub async fn poll_task_status(
    client: &reqwest::Client,
    base_url: &str,
    task_id: i64,
    timeout_secs: u64,
) -> Result<StatusResponse, Box<dyn std::error::Error>> {
    let max_attempts = timeout_secs * 2; // Poll every 500ms

    for attempt in 0..max_attempts {
        let response = client
            .get(format!("{}/api/v1/moderation/{}", base_url, task_id))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Status check failed: {}", error_text).into());
        }

        let status_response = response.json::<StatusResponse>().await?;

        match status_response.status.as_str() {
            "completed" | "failed" => return Ok(status_response),
            "pending" => {
                if attempt % 10 == 0 && attempt > 0 {
                    println!("  ... still waiting (attempt {}/{})", attempt, max_attempts);
                }
                sleep(Duration::from_millis(500)).await;
            }
            _ => {
                return Err(format!("Unknown task status: {}", status_response.status).into());
            }
        }
    }

    Err(format!("Task did not complete within {} seconds", timeout_secs).into())
}
