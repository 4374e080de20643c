use crate::output::{self, CheckData};
use anyhow::Result;
use warren_core::capability::{compose, ImplicationRules};
use warren_core::Capability;

/// Report whether `have` satisfies every capability in `require`
///
/// Exits with status 1 when something is missing.
pub fn check_capabilities(require: &[Capability], have: &[Capability], json: bool) -> Result<()> {
    let rules = ImplicationRules::builtin();
    let held = compose(have.iter().cloned());
    let missing = rules.missing(require, &held);
    let allowed = missing.is_empty();

    if json {
        let data = CheckData {
            allowed,
            required: require.iter().map(ToString::to_string).collect(),
            held: held.iter().map(ToString::to_string).collect(),
            missing: missing.iter().map(ToString::to_string).collect(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&output::envelope("capabilities.check", data))?
        );
    } else if allowed {
        println!("allowed");
    } else {
        let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
        println!("denied: missing {}", names.join(", "));
    }

    if !allowed {
        std::process::exit(1);
    }
    Ok(())
}
