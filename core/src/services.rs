use crate::error::KiteError;
use chrono::{DateTime, Utc};
use kite_execution::{OrderGateway, OrderGatewayError};
use kite_instrument::ExpiryCalendar;
use std::sync::Arc;

/// Abstracts "now" so a session's wall-clock reads go through one seam
/// (§10.4 Ambient Stack) instead of scattered `Utc::now()` calls — the same
/// reason the teacher framework threads a `Clock` type parameter through its
/// system builder.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The default `Clock`, backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The read-only collaborators a session needs that are not owned
/// exclusively by it (§5's shared-resource policy, Design Notes §9): the
/// broker adapter, the expiry calendar, and the clock. Cheap to clone —
/// every field is an `Arc`, and a `Services` is typically built once per
/// process and shared across every concurrently running session.
///
/// The tick source is deliberately not a field here: unlike the gateway and
/// calendar, a `TickSource` is consumed and mutated by exactly one session
/// for its lifetime (§3 "Lifetimes"), so it is supplied directly to
/// [`crate::supervisor::run_session`] rather than bundled into a
/// multi-session-shared struct.
#[derive(Clone)]
pub struct Services {
    pub gateway: Arc<dyn OrderGateway<Error = OrderGatewayError> + Send + Sync>,
    pub calendar: Arc<dyn ExpiryCalendar + Send + Sync>,
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

/// Builds a [`Services`] bundle, defaulting `clock` to [`SystemClock`] when
/// not overridden (e.g. in tests that need a fixed clock).
#[derive(Default)]
pub struct ServicesBuilder {
    gateway: Option<Arc<dyn OrderGateway<Error = OrderGatewayError> + Send + Sync>>,
    calendar: Option<Arc<dyn ExpiryCalendar + Send + Sync>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ServicesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gateway(mut self, gateway: Arc<dyn OrderGateway<Error = OrderGatewayError> + Send + Sync>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn calendar(mut self, calendar: Arc<dyn ExpiryCalendar + Send + Sync>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Services, KiteError> {
        Ok(Services {
            gateway: self.gateway.ok_or_else(|| KiteError::Builder("missing order gateway".into()))?,
            calendar: self.calendar.ok_or_else(|| KiteError::Builder("missing expiry calendar".into()))?,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_fails_without_a_gateway() {
        let err = ServicesBuilder::new().build().unwrap_err();
        assert!(matches!(err, KiteError::Builder(_)));
    }

    #[test]
    fn system_clock_reports_a_recent_time() {
        let clock = SystemClock;
        let drift = Utc::now().signed_duration_since(clock.now());
        assert!(drift.num_seconds().abs() < 5);
    }
}
