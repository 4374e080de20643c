//! # warren CLI
//!
//! Load a component manifest into an engine and query it from the shell.

mod commands;
mod output;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use warren_core::{Capability, DiscoveryQuery, HealthStatus, Strategy};

#[derive(Parser)]
#[command(name = "warren")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to engine configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the component manifest
    #[arg(long, global = true, default_value = "warren.yml")]
    manifest: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered components
    List {
        /// Return JSON for machine consumption
        #[arg(long)]
        json: bool,
    },

    /// Find components by free text or structured filters
    Discover {
        /// Free-text query (matched against descriptions and intents)
        text: Option<String>,

        #[command(flatten)]
        filters: Filters,

        /// Return JSON for machine consumption
        #[arg(long)]
        json: bool,
    },

    /// Pick one component using a load-balancing strategy
    Best {
        #[command(flatten)]
        filters: Filters,

        /// round_robin, least_connections, weighted_round_robin or random
        #[arg(long)]
        strategy: Option<Strategy>,

        /// Return JSON for machine consumption
        #[arg(long)]
        json: bool,
    },

    /// Run a capability once through the registry
    Exec {
        /// Capability id
        capability: String,

        /// JSON payload
        #[arg(long, default_value = "null")]
        payload: String,
    },

    /// Check whether a set of capabilities satisfies a requirement
    Check {
        /// Required capabilities (comma separated)
        #[arg(long, value_delimiter = ',', required = true)]
        require: Vec<Capability>,

        /// Held capabilities (comma separated)
        #[arg(long, value_delimiter = ',')]
        have: Vec<Capability>,

        /// Return JSON for machine consumption
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct Filters {
    /// Substring of the component id
    #[arg(long)]
    name: Option<String>,

    /// Exact component type
    #[arg(long = "type")]
    component_type: Option<String>,

    /// Exact version
    #[arg(long)]
    version: Option<String>,

    /// Exact cached health
    #[arg(long)]
    health: Option<HealthStatus>,

    /// Capabilities the component must satisfy (comma separated)
    #[arg(long = "capability", value_delimiter = ',')]
    capabilities: Vec<Capability>,

    /// Tags the component must carry (comma separated)
    #[arg(long = "tag", value_delimiter = ',')]
    tags: Vec<String>,
}

impl Filters {
    fn into_query(self) -> DiscoveryQuery {
        let mut query = DiscoveryQuery::any();
        if let Some(name) = self.name {
            query = query.name(name);
        }
        if let Some(component_type) = self.component_type {
            query = query.component_type(component_type);
        }
        if let Some(version) = self.version {
            query = query.version(version);
        }
        if let Some(health) = self.health {
            query = query.health(health);
        }
        if !self.capabilities.is_empty() {
            query = query.capabilities(self.capabilities);
        }
        if !self.tags.is_empty() {
            query = query.tags(self.tags);
        }
        query
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::WARN.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let sources = commands::Sources {
        config: cli.config,
        manifest: cli.manifest,
    };

    match cli.command {
        Commands::List { json } => commands::list_components(&sources, json).await,
        Commands::Discover {
            text,
            filters,
            json,
        } => {
            let request = match text {
                Some(text) => text.into(),
                None => filters.into_query().into(),
            };
            commands::discover_components(&sources, request, json).await
        }
        Commands::Best {
            filters,
            strategy,
            json,
        } => commands::best_component(&sources, filters.into_query(), strategy, json).await,
        Commands::Exec {
            capability,
            payload,
        } => commands::exec_capability(&sources, &capability, &payload).await,
        Commands::Check {
            require,
            have,
            json,
        } => commands::check_capabilities(&require, &have, json),
    }
}
