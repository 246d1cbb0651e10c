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

use anyhow::Result;
use rstn_common::time::utc_now;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::arbiter::Arbiter;

/// Periodic idle-timeout check for the [`Arbiter`].
#[derive(Debug)]
pub struct HeartbeatScheduler {
    period: Duration,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl HeartbeatScheduler {
    pub fn spawn(arbiter: Arc<Arbiter>, period: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("heartbeat shutdown");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Some(eviction) = arbiter.check_idle_timeout(utc_now()) {
                            info!(
                                operator = %eviction.operator,
                                service = ?eviction.stopped_service.as_ref().map(|s| s.as_str()),
                                started_at = %eviction.session_started_at,
                                "idle session evicted"
                            );
                        }
                    }
                }
            }
        });
        debug!(period_ms = period.as_millis() as u64, "heartbeat started");
        Self {
            period,
            shutdown,
            task,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.task
            .await
            .map_err(|err| anyhow::anyhow!("heartbeat join failure: {}", err))
    }
}
