//! Free-tier usage accounting.
//!
//! Parses are metered per client against a fixed quota. A parse first
//! reserves a slot ([`UsageLedger::begin`]), then either commits on success
//! or releases the slot when the permit drops, so failed extractions never
//! consume quota and concurrent requests cannot overshoot the limit.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{ParseError, Result};

/// What a client sees on the usage endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
}

#[derive(Debug, Default)]
struct ClientCounters {
    completed: u32,
    in_flight: u32,
    views: u32,
}

#[derive(Debug)]
pub struct UsageLedger {
    usage_limit: u32,
    view_limit: u32,
    counters: Mutex<HashMap<String, ClientCounters>>,
}

impl UsageLedger {
    pub fn new(usage_limit: u32, view_limit: u32) -> Self {
        Self {
            usage_limit,
            view_limit,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Reserve a quota slot for `client`. Completed and in-flight parses both
    /// count against the limit, so two racing requests cannot squeeze past it.
    pub fn begin(&self, client: &str) -> Result<UsagePermit<'_>> {
        let mut counters = self.counters.lock();
        let entry = counters.entry(client.to_string()).or_default();
        if entry.completed + entry.in_flight >= self.usage_limit {
            return Err(ParseError::LimitReached);
        }
        entry.in_flight += 1;
        Ok(UsagePermit {
            ledger: self,
            client: client.to_string(),
            committed: false,
        })
    }

    /// Completed parse count for `client`.
    pub fn usage_count(&self, client: &str) -> u32 {
        self.counters
            .lock()
            .get(client)
            .map(|c| c.completed)
            .unwrap_or(0)
    }

    pub fn report(&self, client: &str) -> UsageReport {
        let counters = self.counters.lock();
        let views = counters.get(client).map(|c| c.views).unwrap_or(0);
        UsageReport {
            used: views,
            limit: self.view_limit,
            remaining: self.view_limit.saturating_sub(views),
        }
    }

    fn commit(&self, client: &str) {
        let mut counters = self.counters.lock();
        if let Some(entry) = counters.get_mut(client) {
            entry.in_flight = entry.in_flight.saturating_sub(1);
            entry.completed += 1;
            entry.views += 1;
        }
    }

    fn release(&self, client: &str) {
        let mut counters = self.counters.lock();
        if let Some(entry) = counters.get_mut(client) {
            entry.in_flight = entry.in_flight.saturating_sub(1);
        }
    }
}

/// Reserved quota slot. Dropping without committing returns the slot.
#[derive(Debug)]
pub struct UsagePermit<'a> {
    ledger: &'a UsageLedger,
    client: String,
    committed: bool,
}

impl UsagePermit<'_> {
    /// Convert the reservation into consumed quota and one served view.
    pub fn commit(mut self) {
        self.ledger.commit(&self.client);
        self.committed = true;
    }
}

impl Drop for UsagePermit<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.ledger.release(&self.client);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_commit_consumes_quota() {
        let ledger = UsageLedger::new(2, 2);
        ledger.begin("a").unwrap().commit();
        assert_eq!(ledger.usage_count("a"), 1);
        ledger.begin("a").unwrap().commit();
        assert_eq!(ledger.usage_count("a"), 2);
        assert_matches!(ledger.begin("a"), Err(ParseError::LimitReached));
    }

    #[test]
    fn test_limit_error_carries_signin_message() {
        let ledger = UsageLedger::new(0, 0);
        let err = ledger.begin("a").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Free limit reached. Please sign in to continue."
        );
    }

    #[test]
    fn test_dropped_permit_returns_the_slot() {
        let ledger = UsageLedger::new(1, 1);
        let permit = ledger.begin("a").unwrap();
        drop(permit);
        assert_eq!(ledger.usage_count("a"), 0);
        assert!(ledger.begin("a").is_ok());
    }

    #[test]
    fn test_in_flight_reservations_count_against_the_limit() {
        let ledger = UsageLedger::new(2, 2);
        let first = ledger.begin("a").unwrap();
        let second = ledger.begin("a").unwrap();
        assert_matches!(ledger.begin("a"), Err(ParseError::LimitReached));
        drop(second);
        let third = ledger.begin("a").unwrap();
        first.commit();
        third.commit();
        assert_eq!(ledger.usage_count("a"), 2);
    }

    #[test]
    fn test_clients_are_metered_independently() {
        let ledger = UsageLedger::new(1, 1);
        ledger.begin("a").unwrap().commit();
        assert_matches!(ledger.begin("a"), Err(ParseError::LimitReached));
        assert!(ledger.begin("b").is_ok());
    }

    #[test]
    fn test_report_reflects_served_views() {
        let ledger = UsageLedger::new(2, 2);
        let fresh = ledger.report("a");
        assert_eq!(fresh.used, 0);
        assert_eq!(fresh.limit, 2);
        assert_eq!(fresh.remaining, 2);

        ledger.begin("a").unwrap().commit();
        let after = ledger.report("a");
        assert_eq!(after.used, 1);
        assert_eq!(after.remaining, 1);
    }

    #[test]
    fn test_counts_never_decrease_on_failure() {
        let ledger = UsageLedger::new(2, 2);
        ledger.begin("a").unwrap().commit();
        // A failed parse releases its reservation without touching counts.
        drop(ledger.begin("a").unwrap());
        assert_eq!(ledger.usage_count("a"), 1);
        assert_eq!(ledger.report("a").used, 1);
    }
}
