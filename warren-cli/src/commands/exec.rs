use super::{load_engine, Sources};
use anyhow::{Context, Result};
use serde_json::Value;
use warren_core::ExecutionContext;

/// Execute a capability once and print its JSON result
pub async fn exec_capability(sources: &Sources, capability: &str, payload: &str) -> Result<()> {
    let payload: Value = serde_json::from_str(payload).context("Payload is not valid JSON")?;
    let engine = load_engine(sources).await?;
    let ctx = ExecutionContext::new().caller("warren-cli");

    let result = engine
        .execute(capability, payload, &ctx)
        .await
        .with_context(|| format!("Failed to execute {}", capability))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
