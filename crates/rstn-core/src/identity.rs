//! ---
//! rstn_section: "01-core-functionality"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Session arbitration and idle-timeout supervision."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fmt;

use anyhow::{anyhow, Result};

/// Minimum number of characters before the separator.
const MIN_IDENTITY_CHARS: usize = 4;
const SEPARATOR: char = '-';

/// Operator identity (usually a callsign) derived from an access token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperatorId(String);

impl OperatorId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the uppercased identity from an `IDENTITY-SECRET` token.
///
/// Returns `None` when there is no separator or when fewer than four
/// characters precede the first one.
pub fn identity_of(token: &str) -> Option<OperatorId> {
    let position = token.chars().position(|c| c == SEPARATOR)?;
    if position < MIN_IDENTITY_CHARS {
        return None;
    }
    let prefix: String = token.chars().take(position).collect();
    Some(OperatorId(prefix.to_uppercase()))
}

/// Set of tokens allowed to take the station, compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct AuthorizedTokens {
    tokens: HashSet<String>,
}

impl AuthorizedTokens {
    /// Build the set, rejecting tokens that carry no usable identity.
    pub fn new<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = HashSet::new();
        for token in tokens {
            let normalized = token.as_ref().trim().to_uppercase();
            if identity_of(&normalized).is_none() {
                return Err(anyhow!(
                    "authorized token '{}' has no identity prefix of at least {} characters",
                    normalized,
                    MIN_IDENTITY_CHARS
                ));
            }
            set.insert(normalized);
        }
        if set.is_empty() {
            return Err(anyhow!("at least one authorized token is required"));
        }
        Ok(Self { tokens: set })
    }

    /// `token` must already be uppercased.
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
