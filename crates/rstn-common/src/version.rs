//! ---
//! rstn_section: "01-core-functionality"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Shared primitives and utilities for the station runtime."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use serde::Serialize;

/// Build metadata embedded at compile time.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VersionInfo {
    pub semver: String,
    pub git_sha: String,
    pub profile: String,
    pub target: String,
    pub build_timestamp: String,
}

impl VersionInfo {
    pub fn current() -> Self {
        let profile = match option_env!("VERGEN_CARGO_DEBUG") {
            Some("true") => "debug",
            Some(_) => "release",
            None => "unknown",
        };
        Self {
            semver: env!("CARGO_PKG_VERSION").to_owned(),
            git_sha: option_env!("RSTN_GIT_SHA").unwrap_or("unknown").to_owned(),
            profile: profile.to_owned(),
            target: option_env!("VERGEN_CARGO_TARGET_TRIPLE")
                .unwrap_or("unknown")
                .to_owned(),
            build_timestamp: option_env!("VERGEN_BUILD_TIMESTAMP")
                .unwrap_or("unknown")
                .to_owned(),
        }
    }

    /// Short form used in log lines and the `x-rstn-version` banner header.
    pub fn cli_string(&self) -> String {
        format!("{} ({})", self.semver, self.git_sha)
    }

    /// Multi-line form printed by `--version`.
    pub fn extended(&self) -> String {
        format!(
            "rstnd {}\ncommit: {}\nprofile: {}\ntarget: {}\nbuilt: {}",
            self.semver, self.git_sha, self.profile, self.target, self.build_timestamp
        )
    }
}
