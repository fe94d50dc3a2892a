//! Build metadata shown by the `wrangler` banner and its `version` command

use serde::Serialize;
use std::fmt;

/// Crate version of the engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commit the binary was built from, when the build exported `GIT_HASH`
pub const GIT_HASH: Option<&str> = option_env!("GIT_HASH");

pub const BUILD_PROFILE: &str = if cfg!(debug_assertions) {
    "debug"
} else {
    "release"
};

/// What a running Wrangler reports about itself
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub commit: Option<String>,
    pub profile: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: VERSION,
            commit: GIT_HASH.map(short_commit),
            profile: BUILD_PROFILE,
        }
    }

    pub fn is_debug(&self) -> bool {
        self.profile == "debug"
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Wrangler v{}", self.version)?;
        if let Some(commit) = &self.commit {
            write!(f, " ({})", commit)?;
        }
        if self.is_debug() {
            write!(f, " [debug]")?;
        }
        Ok(())
    }
}

/// First eight characters of a commit hash
fn short_commit(hash: &str) -> String {
    hash.chars().take(8).collect()
}

/// One-line banner form of [`BuildInfo::current`]
pub fn version_string() -> String {
    BuildInfo::current().to_string()
}
