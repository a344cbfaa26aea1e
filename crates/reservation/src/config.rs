//! Reservation engine settings.

use std::time::Duration;

/// Tuning for the reservation engine.
#[derive(Debug, Clone)]
pub struct ReservationConfig {
    /// Extra attempts for a compensating increment after the first one fails.
    ///
    /// Only failures where the store reports that nothing was written are
    /// retried. An increment whose outcome is unknown is never resent.
    pub compensation_retries: u32,

    /// Delay between compensation attempts.
    pub compensation_backoff: Duration,

    /// Restore reserved stock when storing the order fails for a reason other
    /// than a duplicate order ID. Off by default: stock stays decremented.
    pub restock_on_persistence_failure: bool,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            compensation_retries: 3,
            compensation_backoff: Duration::from_millis(50),
            restock_on_persistence_failure: false,
        }
    }
}
