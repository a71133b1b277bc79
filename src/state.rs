//! # Application State Management
//!
//! State shared by every HTTP handler and every connection actor.
//!
//! ## What lives here:
//! - **config**: the loaded `AppConfig`
//! - **trips**: address of the `TripHub` actor, the only owner of the trip store
//! - **connector**: opens one upstream session per accepted socket
//! - **metrics**: session and trip counters shown by the health endpoint
//!
//! ## Key Rust Concepts:
//! - **Arc<T>**: the configuration is read-only after startup and shared as is
//! - **Arc<RwLock<T>>**: the counters are shared, mutable data behind a lock
//! - **Arc<dyn Trait>**: one connector shared by all workers without
//!   knowing its concrete type, which is how tests swap in a fake upstream
//! - **Addr<A>**: a cloneable handle for sending messages to an actor
//!
//! Trips are not behind a lock at all: every access goes through the hub's
//! mailbox.

use crate::config::AppConfig;
use crate::trips::hub::TripHub;
use crate::upstream::UpstreamConnector;
use actix::Addr;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub trips: Addr<TripHub>,
    pub connector: Arc<dyn UpstreamConnector>,
    pub metrics: Arc<RwLock<RelayMetrics>>,
    pub start_time: Instant,
}

/// Counters since server start.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RelayMetrics {
    /// Client sockets accepted
    pub connections_total: u64,
    /// Client sockets currently open
    pub active_sessions: u32,
    /// `saveTrip` calls that produced a stored trip
    pub trips_accepted: u64,
    /// `saveTrip` calls rejected by validation
    pub trips_rejected: u64,
}

impl AppState {
    pub fn new(config: AppConfig, trips: Addr<TripHub>, connector: Arc<dyn UpstreamConnector>) -> Self {
        Self {
            config: Arc::new(config),
            trips,
            connector,
            metrics: Arc::new(RwLock::new(RelayMetrics::default())),
            start_time: Instant::now(),
        }
    }

    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session_opened(&self) {
        let mut metrics = self.metrics_mut();
        metrics.connections_total += 1;
        metrics.active_sessions += 1;
    }

    /// Never goes below zero.
    pub fn session_closed(&self) {
        let mut metrics = self.metrics_mut();
        metrics.active_sessions = metrics.active_sessions.saturating_sub(1);
    }

    pub fn record_trip_accepted(&self) {
        self.metrics_mut().trips_accepted += 1;
    }

    pub fn record_trip_rejected(&self) {
        self.metrics_mut().trips_rejected += 1;
    }

    pub fn get_metrics_snapshot(&self) -> RelayMetrics {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    fn metrics_mut(&self) -> std::sync::RwLockWriteGuard<'_, RelayMetrics> {
        self.metrics.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{SessionSetup, UpstreamSession};
    use actix::Actor;
    use anyhow::{anyhow, Result};
    use futures_util::future::BoxFuture;

    struct RefusingConnector;

    impl UpstreamConnector for RefusingConnector {
        fn connect(&self, _setup: SessionSetup) -> BoxFuture<'static, Result<UpstreamSession>> {
            Box::pin(async { Err(anyhow!("offline")) })
        }
    }

    #[actix_web::test]
    async fn test_session_counters() {
        let state = AppState::new(AppConfig::default(), TripHub::new().start(), Arc::new(RefusingConnector));

        state.session_opened();
        state.session_opened();
        state.session_closed();
        state.session_closed();
        state.session_closed();
        state.record_trip_accepted();
        state.record_trip_rejected();
        state.record_trip_rejected();

        let metrics = state.get_metrics_snapshot();
        assert_eq!(metrics.connections_total, 2);
        assert_eq!(metrics.active_sessions, 0);
        assert_eq!(metrics.trips_accepted, 1);
        assert_eq!(metrics.trips_rejected, 2);
        assert_eq!(state.get_config().server.port, 8080);
    }

    #[actix_web::test]
    async fn test_clones_share_one_config() {
        let state = AppState::new(AppConfig::default(), TripHub::new().start(), Arc::new(RefusingConnector));
        let worker_copy = state.clone();

        assert!(Arc::ptr_eq(&state.config, &worker_copy.config));
        assert!(std::ptr::eq(state.get_config(), worker_copy.get_config()));
    }
}
