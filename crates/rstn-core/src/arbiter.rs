//! ---
//! rstn_section: "01-core-functionality"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Session arbitration and idle-timeout supervision."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rstn_common::time::to_chrono;
use rstn_common::AppConfig;
use rstn_metrics::StationMetrics;
use rstn_protocol::{
    encode_frequency_command, encode_service_command, CivAddresses, ProtocolError, RelayAction,
    ServiceCatalog, ServiceName,
};
use rstn_serial::CommandSink;
use tracing::{debug, info, warn};

use crate::error::{ArbiterError, AuthFailure, ConflictReason};
use crate::identity::{identity_of, AuthorizedTokens, OperatorId};

/// Static inputs of an [`Arbiter`].
#[derive(Debug, Clone)]
pub struct ArbiterSettings {
    pub tokens: AuthorizedTokens,
    pub catalog: ServiceCatalog,
    pub auth_timeout: Duration,
    pub addresses: CivAddresses,
}

impl ArbiterSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let tokens = AuthorizedTokens::new(config.normalized_tokens())
            .context("invalid station.tokens")?;
        let catalog = config
            .services
            .iter()
            .fold(ServiceCatalog::new(), |catalog, (name, service)| {
                catalog.with_service(name, service.relays.iter().cloned())
            });
        Ok(Self {
            tokens,
            catalog,
            auth_timeout: config.station.auth_timeout,
            addresses: CivAddresses {
                transceiver: config.transceiver.civ_address,
                controller: config.transceiver.controller_address,
            },
        })
    }
}

/// Read-only view of the arbiter state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    pub operator: Option<OperatorId>,
    pub active_service: Option<ServiceName>,
    pub session_started_at: Option<DateTime<Utc>>,
}

/// Record of a session torn down by the idle timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutEviction {
    pub operator: OperatorId,
    pub stopped_service: Option<ServiceName>,
    pub session_started_at: DateTime<Utc>,
    pub evicted_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ArbiterState {
    operator: Option<OperatorId>,
    started_at: Option<DateTime<Utc>>,
    active: Option<ServiceName>,
}

impl ArbiterState {
    fn clear_session(&mut self) {
        self.operator = None;
        self.started_at = None;
    }
}

/// Owns the operator session and the active service.
///
/// Every mutation happens under one lock. Hardware commands are handed to the
/// [`CommandSink`] while the lock is held, which is safe because the sink only
/// queues work and returns.
#[derive(Debug)]
pub struct Arbiter {
    settings: ArbiterSettings,
    sink: Arc<dyn CommandSink>,
    metrics: Option<StationMetrics>,
    state: Mutex<ArbiterState>,
}

impl Arbiter {
    pub fn new(settings: ArbiterSettings, sink: Arc<dyn CommandSink>) -> Self {
        Self {
            settings,
            sink,
            metrics: None,
            state: Mutex::new(ArbiterState::default()),
        }
    }

    pub fn from_config(config: &AppConfig, sink: Arc<dyn CommandSink>) -> Result<Self> {
        Ok(Self::new(ArbiterSettings::from_config(config)?, sink))
    }

    pub fn with_metrics(mut self, metrics: StationMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn auth_timeout(&self) -> Duration {
        self.settings.auth_timeout
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.settings.catalog
    }

    /// Grant or refresh the session for the operator behind `token`.
    pub fn authorize(&self, token: &str, now: DateTime<Utc>) -> Result<OperatorId, ArbiterError> {
        let mut state = self.state.lock();
        self.authorize_locked(&mut state, token, now)
    }

    /// Switch `service` on or off on behalf of the current session holder.
    pub fn request_service_change(&self, service: &str, turn_on: bool) -> Result<(), ArbiterError> {
        let mut state = self.state.lock();
        if state.operator.is_none() {
            return Err(ArbiterError::Authorization(AuthFailure::NoSession));
        }
        self.change_service_locked(&mut state, &ServiceName::new(service), turn_on)
    }

    /// Authorize `token` and apply the service change as one step.
    ///
    /// A failed service change keeps the authorization that preceded it.
    pub fn handle_service_intent(
        &self,
        token: &str,
        service: &str,
        turn_on: bool,
        now: DateTime<Utc>,
    ) -> Result<(), ArbiterError> {
        let intent = if turn_on { "start" } else { "stop" };
        let outcome = {
            let mut state = self.state.lock();
            self.authorize_locked(&mut state, token, now)
                .and_then(|_| {
                    self.change_service_locked(&mut state, &ServiceName::new(service), turn_on)
                })
        };
        self.record_intent(intent, &outcome);
        outcome
    }

    /// Evict the session when it was last refreshed more than the timeout ago.
    pub fn check_idle_timeout(&self, now: DateTime<Utc>) -> Option<TimeoutEviction> {
        let mut state = self.state.lock();
        let started_at = state.started_at?;
        let operator = state.operator.clone()?;
        let expires_at = started_at.checked_add_signed(to_chrono(self.settings.auth_timeout))?;
        if expires_at >= now {
            return None;
        }

        let stopped_service = state.active.take();
        if let Some(service) = &stopped_service {
            warn!(operator = %operator, service = %service, "session timed out; stopping service");
            if let Err(err) = self.submit_service_locked(service, false) {
                warn!(service = %service, error = %err, "failed to encode forced stop");
            }
        } else {
            info!(operator = %operator, "session timed out");
        }
        state.clear_session();
        if let Some(metrics) = &self.metrics {
            metrics.record_session_timeout();
            metrics.set_session_active(false);
        }

        Some(TimeoutEviction {
            operator,
            stopped_service,
            session_started_at: started_at,
            evicted_at: now,
        })
    }

    pub fn current_status(&self) -> StatusSnapshot {
        let state = self.state.lock();
        StatusSnapshot {
            operator: state.operator.clone(),
            active_service: state.active.clone(),
            session_started_at: state.started_at,
        }
    }

    /// Tune the transceiver. Needs no session.
    pub fn set_frequency(&self, hz: u64) -> Result<(), ArbiterError> {
        let outcome = encode_frequency_command(hz, self.settings.addresses)
            .map(|frame| {
                info!(hz, "tuning transceiver");
                self.sink.submit_frame(frame);
                if let Some(metrics) = &self.metrics {
                    metrics.record_cat_frame();
                }
            })
            .map_err(ArbiterError::Validation);
        self.record_intent("freq", &outcome);
        outcome
    }

    fn authorize_locked(
        &self,
        state: &mut ArbiterState,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<OperatorId, ArbiterError> {
        let token = token.to_uppercase();
        if token.is_empty() {
            return Err(ArbiterError::Authorization(AuthFailure::MissingToken));
        }
        let identity = identity_of(&token)
            .ok_or(ArbiterError::Authorization(AuthFailure::MalformedToken))?;
        if !self.settings.tokens.contains(&token) {
            debug!(operator = %identity, "token not authorized");
            return Err(ArbiterError::Authorization(AuthFailure::UnknownToken));
        }
        if let Some(holder) = &state.operator {
            if holder != &identity {
                debug!(operator = %identity, holder = %holder, "station busy");
                return Err(ArbiterError::Authorization(AuthFailure::SessionHeld {
                    holder: holder.to_string(),
                }));
            }
        }

        if state.operator.is_none() {
            info!(operator = %identity, "operator session started");
            if let Some(metrics) = &self.metrics {
                metrics.set_session_active(true);
            }
        }
        state.operator = Some(identity.clone());
        state.started_at = Some(now);
        Ok(identity)
    }

    fn change_service_locked(
        &self,
        state: &mut ArbiterState,
        service: &ServiceName,
        turn_on: bool,
    ) -> Result<(), ArbiterError> {
        if !self.settings.catalog.contains(service) {
            return Err(ArbiterError::ServiceConflict(
                ConflictReason::UnknownService(service.to_string()),
            ));
        }
        if let Some(active) = &state.active {
            if active != service {
                return Err(ArbiterError::ServiceConflict(ConflictReason::Busy {
                    active: active.to_string(),
                }));
            }
        }

        self.submit_service_locked(service, turn_on)
            .map_err(|err| match err {
                ProtocolError::UnknownService(name) => {
                    ArbiterError::ServiceConflict(ConflictReason::UnknownService(name))
                }
                other => ArbiterError::Validation(other),
            })?;

        if turn_on {
            info!(operator = ?state.operator.as_ref().map(OperatorId::as_str), service = %service, "service started");
            state.active = Some(service.clone());
        } else {
            info!(operator = ?state.operator.as_ref().map(OperatorId::as_str), service = %service, "service stopped; operator logged out");
            state.active = None;
            state.clear_session();
            if let Some(metrics) = &self.metrics {
                metrics.set_session_active(false);
            }
        }
        Ok(())
    }

    fn submit_service_locked(&self, service: &ServiceName, turn_on: bool) -> Result<(), ProtocolError> {
        let commands = encode_service_command(&self.settings.catalog, service, turn_on)?;
        if let Some(metrics) = &self.metrics {
            metrics.record_relay_commands(RelayAction::from_state(turn_on).as_str(), commands.len());
        }
        self.sink.submit(commands);
        Ok(())
    }

    fn record_intent(&self, intent: &str, outcome: &Result<(), ArbiterError>) {
        if let Some(metrics) = &self.metrics {
            let result = match outcome {
                Ok(()) => "ok",
                Err(err) => err.code(),
            };
            metrics.record_intent(intent, result);
        }
    }
}
