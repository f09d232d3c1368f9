//! `MONITOR`/`WATCH` presence-tracking list (§3 `MonitorList`, §4.8,
//! §9 Open Question #2).
//!
//! Each extension keeps its own ordered nickname set and its own
//! `pending` set used to reconcile an in-flight `MONITOR L`/`WATCH L`
//! enumeration against the list reply burst: entries the burst confirms
//! are kept, entries the previous generation had but the burst didn't
//! repeat are dropped once the terminal reply arrives. Per the decision
//! in `DESIGN.md`, a connection drives at most one of the two extensions
//! at a time; `MonitorList` itself is agnostic to which.

use std::collections::HashSet;

/// An ordered, deduplicated set of monitored nicknames, capped at the
/// server-advertised `monitor_limit` (0 = unsupported/unbounded per §3).
#[derive(Clone, Debug, Default)]
pub struct MonitorList {
    nicknames: Vec<String>,
    /// Set while a `MONITOR L`/`WATCH L` enumeration is outstanding;
    /// entries seen in the reply burst accumulate here until the
    /// terminal reply, at which point they replace `nicknames`.
    pending: Option<HashSet<String>>,
}

impl MonitorList {
    pub fn new() -> Self {
        MonitorList::default()
    }

    pub fn nicknames(&self) -> &[String] {
        &self.nicknames
    }

    pub fn len(&self) -> usize {
        self.nicknames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nicknames.is_empty()
    }

    pub fn contains(&self, nickname: &str) -> bool {
        self.nicknames.iter().any(|n| n.eq_ignore_ascii_case(nickname))
    }

    /// Add nicknames the application asked to monitor (`MONITOR +`/`WATCH +`).
    /// Returns `false` if `limit` (0 = unbounded) would be exceeded.
    pub fn add(&mut self, nickname: &str, limit: usize) -> bool {
        if self.contains(nickname) {
            return true;
        }
        if limit != 0 && self.nicknames.len() >= limit {
            return false;
        }
        self.nicknames.push(nickname.to_string());
        true
    }

    /// Remove nicknames (`MONITOR -`/`WATCH -`).
    pub fn remove(&mut self, nickname: &str) {
        self.nicknames.retain(|n| !n.eq_ignore_ascii_case(nickname));
    }

    pub fn clear(&mut self) {
        self.nicknames.clear();
    }

    /// Begin reconciling an outstanding `MONITOR L`/`WATCH L` enumeration.
    pub fn begin_list(&mut self) {
        self.pending = Some(HashSet::new());
    }

    /// One entry from the enumeration reply burst (`RPL_MONLIST`/
    /// `RPL_WATCHLIST`).
    pub fn observe_list_entry(&mut self, nickname: &str) {
        if let Some(pending) = &mut self.pending {
            pending.insert(nickname.to_string());
        } else {
            // No enumeration in progress; treat as an out-of-band add.
            if !self.contains(nickname) {
                self.nicknames.push(nickname.to_string());
            }
        }
    }

    /// Terminal reply (`RPL_ENDOFMONLIST`/`RPL_ENDOFWATCHLIST`): replace
    /// the tracked set with exactly what the burst confirmed.
    pub fn end_list(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.nicknames = pending.into_iter().collect();
            self.nicknames.sort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_respects_limit() {
        let mut list = MonitorList::new();
        assert!(list.add("alice", 1));
        assert!(!list.add("bob", 1));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn add_is_idempotent() {
        let mut list = MonitorList::new();
        list.add("alice", 0);
        list.add("ALICE", 0);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn list_reconciliation_replaces_with_burst_contents() {
        let mut list = MonitorList::new();
        list.add("alice", 0);
        list.add("stale", 0);

        list.begin_list();
        list.observe_list_entry("alice");
        list.observe_list_entry("bob");
        list.end_list();

        assert!(list.contains("alice"));
        assert!(list.contains("bob"));
        assert!(!list.contains("stale"));
    }
}
