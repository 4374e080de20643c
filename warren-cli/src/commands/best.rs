use super::{load_engine, Sources};
use crate::output::{self, ScoredComponent};
use anyhow::Result;
use warren_core::{DiscoveryQuery, Strategy};

/// Select a single component; exits non-zero when nothing matches
pub async fn best_component(
    sources: &Sources,
    query: DiscoveryQuery,
    strategy: Option<Strategy>,
    json: bool,
) -> Result<()> {
    let engine = load_engine(sources).await?;
    let strategy = strategy.unwrap_or(engine.config().default_strategy);

    let Some(pick) = engine.best_match_with(&query, strategy) else {
        eprintln!("No component matches the given filters");
        std::process::exit(1);
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::envelope(
                "discover.best",
                ScoredComponent::from(&pick)
            ))?
        );
    } else {
        println!("{}", output::component_line(&pick.metadata));
    }
    Ok(())
}
