use anyhow::Context;
use serde_json::json;

/// Enqueue a single transaction against a running enqueue API.
///
/// This exists purely to make manual testing ergonomic: the executor and
/// the enqueue API can run in separate terminals, and you can submit a
/// transaction without writing a curl command by hand.
pub async fn run(
    enqueue_url: &str,
    host: &str,
    path: &str,
    method: &str,
    payload: &str,
) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let resp = client
        .post(enqueue_url)
        .json(&json!({
            "host": host,
            "path": path,
            "method": method,
            "payload": payload,
        }))
        .send()
        .await
        .context("POST enqueue request")?;

    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!("enqueue failed: {status} {body}");
    }

    println!("enqueued: {body}");
    Ok(())
}
