// mod.rs — subcommand implementations, one module per concern, mirroring
// `ta-cli`'s `src/commands/` layout (smaller scope: this CLI only covers
// the governed change execution core's §6 boundary operations).

pub mod approve;
pub mod filters;
pub mod list;
pub mod reflect;
pub mod show;
pub mod submit;

use std::path::Path;

use lc_policy::PolicyConfig;

/// Load the policy snapshot from `path`, or fall back to the built-in
/// default (forbidden VCS/secrets/lock paths, always-review schema/security/
/// policy roots) if none was given.
pub fn load_policy(path: Option<&Path>) -> anyhow::Result<PolicyConfig> {
    match path {
        Some(path) => Ok(PolicyConfig::load(path)?),
        None => Ok(PolicyConfig::default()),
    }
}
