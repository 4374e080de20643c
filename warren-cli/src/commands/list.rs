use super::{load_engine, Sources};
use crate::output::{self, ComponentSummary};
use anyhow::Result;

/// List every registered component in id order
pub async fn list_components(sources: &Sources, json: bool) -> Result<()> {
    let engine = load_engine(sources).await?;
    let components = engine.registry().list_all();

    if json {
        let data: Vec<ComponentSummary> = components.iter().map(ComponentSummary::from).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::envelope("components.list", data))?
        );
        return Ok(());
    }

    if components.is_empty() {
        println!("No components registered");
        return Ok(());
    }
    for meta in &components {
        println!("{}", output::component_line(meta));
    }
    Ok(())
}
