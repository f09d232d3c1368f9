//! Strict Transport Security (STS) policy store (§4.11, C11).
//!
//! The `sts` capability's parameter is a comma list of `key=value`/bare
//! `key` tokens. On plaintext, a `port` token triggers an immediate
//! reconnect-over-TLS; once on TLS, the store just remembers the policy so
//! a later plaintext connection attempt can be redirected before it ever
//! reaches the wire.

use std::time::Duration;

/// A parsed `sts` capability policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StsPolicy {
    /// How long the policy is valid for, in seconds, from the moment it
    /// was recorded. `0` means "clear the policy" and is never stored.
    pub duration_secs: u64,
    /// `preload` was present: the application may want to honor this
    /// policy even before ever connecting (out of scope here, just
    /// recorded for the caller).
    pub preload: bool,
}

impl StsPolicy {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

/// The outcome of feeding one `sts` capability value into the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StsOutcome {
    /// We were plaintext and a `port` was advertised: reconnect over TLS
    /// to this port and do not proceed with registration on this socket.
    Upgrade { port: u16 },
    /// We were already on TLS (or no `port` was present): the policy was
    /// recorded or refreshed, no immediate action needed.
    PolicyUpdated,
    /// `duration=0` cleared a previously recorded policy.
    Cleared,
    /// The token carried no usable information.
    Ignored,
}

/// Tracks the most recently observed STS policy for one connection.
#[derive(Clone, Debug, Default)]
pub struct StsStore {
    policy: Option<StsPolicy>,
}

impl StsStore {
    pub fn new() -> Self {
        StsStore::default()
    }

    pub fn policy(&self) -> Option<StsPolicy> {
        self.policy
    }

    /// A valid policy forbids the application from lowering `tls_mode`
    /// back to plaintext (§4.11).
    pub fn forbids_plaintext(&self) -> bool {
        self.policy.is_some()
    }

    /// Parse the `sts` capability value (`"port=6697,duration=2592000"`)
    /// and apply it given whether the connection is currently on TLS.
    pub fn apply(&mut self, value: &str, is_tls: bool) -> StsOutcome {
        let mut port: Option<u16> = None;
        let mut duration: Option<u64> = None;
        let mut preload = false;

        for token in value.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            match token.split_once('=') {
                Some((key, val)) if key.eq_ignore_ascii_case("port") => {
                    port = val.trim().parse().ok();
                }
                Some((key, val)) if key.eq_ignore_ascii_case("duration") => {
                    duration = val.trim().parse().ok();
                }
                _ if token.eq_ignore_ascii_case("preload") => {
                    preload = true;
                }
                _ => {}
            }
        }

        if !is_tls {
            if let Some(port) = port {
                return StsOutcome::Upgrade { port };
            }
            return StsOutcome::Ignored;
        }

        match duration {
            Some(0) => {
                self.policy = None;
                StsOutcome::Cleared
            }
            Some(duration_secs) => {
                self.policy = Some(StsPolicy {
                    duration_secs,
                    preload,
                });
                StsOutcome::PolicyUpdated
            }
            None if self.policy.is_some() => {
                // Refresh preload flag without touching a remembered duration.
                if let Some(policy) = &mut self.policy {
                    policy.preload = preload;
                }
                StsOutcome::PolicyUpdated
            }
            None => StsOutcome::Ignored,
        }
    }

    /// Clear any recorded policy (e.g. the application reconnected fresh).
    pub fn clear(&mut self) {
        self.policy = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_port_fires_upgrade() {
        let mut store = StsStore::new();
        let outcome = store.apply("port=6697,duration=2592000", false);
        assert_eq!(outcome, StsOutcome::Upgrade { port: 6697 });
        assert!(store.policy().is_none());
    }

    #[test]
    fn tls_records_policy() {
        let mut store = StsStore::new();
        let outcome = store.apply("duration=2592000,preload", true);
        assert_eq!(outcome, StsOutcome::PolicyUpdated);
        let policy = store.policy().unwrap();
        assert_eq!(policy.duration_secs, 2592000);
        assert!(policy.preload);
        assert!(store.forbids_plaintext());
    }

    #[test]
    fn zero_duration_clears_policy() {
        let mut store = StsStore::new();
        store.apply("duration=600", true);
        let outcome = store.apply("duration=0", true);
        assert_eq!(outcome, StsOutcome::Cleared);
        assert!(store.policy().is_none());
    }

    #[test]
    fn plaintext_without_port_is_ignored() {
        let mut store = StsStore::new();
        let outcome = store.apply("duration=600", false);
        assert_eq!(outcome, StsOutcome::Ignored);
    }
}
