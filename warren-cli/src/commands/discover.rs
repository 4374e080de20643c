use super::{load_engine, Sources};
use crate::output::{self, ScoredComponent};
use anyhow::Result;
use warren_core::DiscoveryRequest;

/// Discover components matching free text or a structured pattern
pub async fn discover_components(
    sources: &Sources,
    request: DiscoveryRequest,
    json: bool,
) -> Result<()> {
    let engine = load_engine(sources).await?;
    let matches = engine.discover(request);

    if json {
        let data: Vec<ScoredComponent> = matches.iter().map(ScoredComponent::from).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::envelope("discover.results", data))?
        );
        return Ok(());
    }

    if matches.is_empty() {
        println!("No matching components");
        return Ok(());
    }
    for m in &matches {
        println!("{:>6.2}  {}", m.score, output::component_line(&m.metadata));
    }
    Ok(())
}
