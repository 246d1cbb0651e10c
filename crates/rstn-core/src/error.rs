//! ---
//! rstn_section: "01-core-functionality"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Session arbitration and idle-timeout supervision."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use rstn_protocol::ProtocolError;
use thiserror::Error;

/// Why a token was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("no token supplied")]
    MissingToken,
    #[error("token carries no operator identity")]
    MalformedToken,
    #[error("token is not authorized")]
    UnknownToken,
    #[error("station is held by {holder}")]
    SessionHeld { holder: String },
    #[error("no operator session is active")]
    NoSession,
}

/// Why a service change was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictReason {
    #[error("unknown service {0}")]
    UnknownService(String),
    #[error("service {active} is already active")]
    Busy { active: String },
}

/// Rejection of an operator intent. Rejections never change arbiter state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArbiterError {
    #[error("authorization rejected: {0}")]
    Authorization(#[source] AuthFailure),
    #[error("service change rejected: {0}")]
    ServiceConflict(#[source] ConflictReason),
    #[error("invalid parameter: {0}")]
    Validation(#[source] ProtocolError),
}

impl ArbiterError {
    /// Short code reported to clients.
    pub fn code(&self) -> &'static str {
        match self {
            ArbiterError::Authorization(_) => "EAUTH",
            ArbiterError::ServiceConflict(_) => "ESERV",
            ArbiterError::Validation(_) => "EVAL",
        }
    }
}
