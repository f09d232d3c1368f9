//! Dynamic, ISUPPORT-CHANMODES-driven mode engine (§4.5).
//!
//! [`super::types`] covers the fixed, universally-known mode vocabulary.
//! `ModeEngine` classifies mode letters the CHANMODES taxonomy actually
//! advertised by the server and keeps a channel's running `ModeSet`,
//! emitting one [`ModeKind`] event per applied change.

use std::collections::{HashMap, HashSet};

use crate::isupport::{ChanModesState, ModeGroup};

/// A single derived mode-application event, fanned out from one `MODE`
/// line in taxonomy-group order (§4.5).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModeKind {
    /// `A`-group list mode added, e.g. `+b *!*@spam.example`.
    ListAdd(char, String),
    /// `A`-group list mode removed.
    ListRemove(char, String),
    /// Channel key (`k`) set to the given value.
    KeySet(String),
    /// Channel key (`k`) cleared.
    KeyRemoved,
    /// User limit (`l`) set.
    LimitSet(usize),
    /// User limit (`l`) cleared.
    LimitRemoved,
    /// A `B`-group mode other than `k` was set with its parameter.
    ParamSet(char, String),
    /// A `B`-group mode other than `k` was unset.
    ParamUnset(char),
    /// A `D`-group no-argument flag was set.
    FlagSet(char),
    /// A `D`-group no-argument flag was unset.
    FlagUnset(char),
    /// A status (`S`-group) mode changed for a member; only emitted on a
    /// real transition (§4.5: "emits `StatusChanged` only on real
    /// transitions").
    StatusChanged {
        nick: String,
        mode: char,
        added: bool,
    },
    /// A mode letter the server never classified via CHANMODES/PREFIX.
    Unknown(char, Option<String>),
}

/// The running, per-channel mode state a `ModeEngine` maintains: list-mode
/// contents aren't tracked here (no LIST reply without asking the server),
/// only directly observable `B`/`C`/`D` state plus current status holders.
#[derive(Clone, Debug, Default)]
pub struct ModeSet {
    pub key: Option<String>,
    pub limit: Option<usize>,
    pub params: HashMap<char, String>,
    pub flags: HashSet<char>,
    /// `nick -> set of status mode letters currently held`.
    pub statuses: HashMap<String, HashSet<char>>,
}

/// Applies raw `MODE` strings against a channel's [`ModeSet`] using a
/// [`ChanModesState`] taxonomy, producing [`ModeKind`] events.
#[derive(Clone, Debug, Default)]
pub struct ModeEngine {
    set: ModeSet,
}

impl ModeEngine {
    pub fn new() -> Self {
        ModeEngine::default()
    }

    pub fn modes(&self) -> &ModeSet {
        &self.set
    }

    /// Apply one `MODE` line: `mode_string` is the raw `+ov-b` token,
    /// `params` the ordered parameter queue that follows it.
    ///
    /// `is_current` distinguishes a live mode change from a "these are the
    /// channel's current modes" report (e.g. `RPL_CHANNELMODEIS`): for the
    /// latter, flags/params are diffed against the existing `ModeSet`
    /// rather than applied as literal `+`/`-` transitions.
    pub fn apply(
        &mut self,
        taxonomy: &ChanModesState,
        mode_string: &str,
        params: &[&str],
        is_current: bool,
    ) -> Vec<ModeKind> {
        if is_current {
            self.apply_current(taxonomy, mode_string, params)
        } else {
            self.apply_change(taxonomy, mode_string, params)
        }
    }

    fn apply_change(
        &mut self,
        taxonomy: &ChanModesState,
        mode_string: &str,
        params: &[&str],
    ) -> Vec<ModeKind> {
        let mut events = Vec::new();
        let mut adding = true;
        let mut param_iter = params.iter();

        for c in mode_string.chars() {
            match c {
                '+' => adding = true,
                '-' => adding = false,
                _ => {
                    if let Some(event) = self.apply_one(taxonomy, c, adding, &mut param_iter) {
                        events.push(event);
                    }
                }
            }
        }
        events
    }

    fn apply_one<'p, I: Iterator<Item = &'p &'p str>>(
        &mut self,
        taxonomy: &ChanModesState,
        c: char,
        adding: bool,
        param_iter: &mut I,
    ) -> Option<ModeKind> {
        match taxonomy.classify(c) {
            Some(ModeGroup::Status) => {
                let nick = (*param_iter.next()?).to_string();
                let entry = self.set.statuses.entry(nick.clone()).or_default();
                let changed = if adding {
                    entry.insert(c)
                } else {
                    entry.remove(&c)
                };
                if entry.is_empty() {
                    self.set.statuses.remove(&nick);
                }
                if changed {
                    Some(ModeKind::StatusChanged {
                        nick,
                        mode: c,
                        added: adding,
                    })
                } else {
                    None
                }
            }
            Some(ModeGroup::A) => {
                let arg = (*param_iter.next()?).to_string();
                Some(if adding {
                    ModeKind::ListAdd(c, arg)
                } else {
                    ModeKind::ListRemove(c, arg)
                })
            }
            Some(ModeGroup::B) => {
                if c == 'k' {
                    if adding {
                        let arg = (*param_iter.next()?).to_string();
                        self.set.key = Some(arg.clone());
                        Some(ModeKind::KeySet(arg))
                    } else {
                        // A key removal may or may not carry the old key as
                        // a parameter depending on the server; consume it
                        // either way if present so later params stay aligned.
                        let _ = param_iter.next();
                        self.set.key = None;
                        Some(ModeKind::KeyRemoved)
                    }
                } else {
                    let arg = (*param_iter.next()?).to_string();
                    if adding {
                        self.set.params.insert(c, arg.clone());
                        Some(ModeKind::ParamSet(c, arg))
                    } else {
                        self.set.params.remove(&c);
                        Some(ModeKind::ParamUnset(c))
                    }
                }
            }
            Some(ModeGroup::C) => {
                if c == 'l' {
                    if adding {
                        let arg = (*param_iter.next()?).to_string();
                        let limit: usize = arg.parse().ok()?;
                        self.set.limit = Some(limit);
                        Some(ModeKind::LimitSet(limit))
                    } else {
                        self.set.limit = None;
                        Some(ModeKind::LimitRemoved)
                    }
                } else if adding {
                    let arg = (*param_iter.next()?).to_string();
                    self.set.params.insert(c, arg.clone());
                    Some(ModeKind::ParamSet(c, arg))
                } else {
                    self.set.params.remove(&c);
                    Some(ModeKind::ParamUnset(c))
                }
            }
            Some(ModeGroup::D) => {
                if adding {
                    self.set.flags.insert(c);
                    Some(ModeKind::FlagSet(c))
                } else {
                    self.set.flags.remove(&c);
                    Some(ModeKind::FlagUnset(c))
                }
            }
            None => {
                // Unknown letters are assumed parameterless; a server that
                // sends one with an argument will desync the param queue,
                // but there's no taxonomy entry to say otherwise.
                Some(ModeKind::Unknown(c, None))
            }
        }
    }

    /// Diff a "current modes" report (no `+`/`-` direction) against the
    /// existing `ModeSet`, emitting synthetic `+`/`-` events for whatever
    /// changed (§4.5).
    fn apply_current(
        &mut self,
        taxonomy: &ChanModesState,
        mode_string: &str,
        params: &[&str],
    ) -> Vec<ModeKind> {
        let mut reported_flags = HashSet::new();
        let mut reported_params: HashMap<char, String> = HashMap::new();
        let mut reported_key = None;
        let mut reported_limit = None;
        let mut param_iter = params.iter();

        for c in mode_string.chars() {
            match taxonomy.classify(c) {
                Some(ModeGroup::D) => {
                    reported_flags.insert(c);
                }
                Some(ModeGroup::B) if c == 'k' => {
                    if let Some(arg) = param_iter.next() {
                        reported_key = Some(arg.to_string());
                    }
                }
                Some(ModeGroup::B) => {
                    if let Some(arg) = param_iter.next() {
                        reported_params.insert(c, arg.to_string());
                    }
                }
                Some(ModeGroup::C) if c == 'l' => {
                    if let Some(arg) = param_iter.next() {
                        reported_limit = arg.parse().ok();
                    }
                }
                Some(ModeGroup::C) => {
                    if let Some(arg) = param_iter.next() {
                        reported_params.insert(c, arg.to_string());
                    }
                }
                _ => {}
            }
        }

        let mut events = Vec::new();

        for c in self.set.flags.difference(&reported_flags).copied().collect::<Vec<_>>() {
            self.set.flags.remove(&c);
            events.push(ModeKind::FlagUnset(c));
        }
        for c in reported_flags.difference(&self.set.flags).copied().collect::<Vec<_>>() {
            self.set.flags.insert(c);
            events.push(ModeKind::FlagSet(c));
        }

        if self.set.key != reported_key {
            match &reported_key {
                Some(k) => events.push(ModeKind::KeySet(k.clone())),
                None => events.push(ModeKind::KeyRemoved),
            }
            self.set.key = reported_key;
        }

        if self.set.limit != reported_limit {
            match reported_limit {
                Some(n) => events.push(ModeKind::LimitSet(n)),
                None => events.push(ModeKind::LimitRemoved),
            }
            self.set.limit = reported_limit;
        }

        let stale_params: Vec<char> = self
            .set
            .params
            .keys()
            .filter(|c| !reported_params.contains_key(c))
            .copied()
            .collect();
        for c in stale_params {
            self.set.params.remove(&c);
            events.push(ModeKind::ParamUnset(c));
        }
        for (c, arg) in reported_params {
            if self.set.params.get(&c) != Some(&arg) {
                self.set.params.insert(c, arg.clone());
                events.push(ModeKind::ParamSet(c, arg));
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taxonomy() -> ChanModesState {
        ChanModesState {
            a: vec!['b', 'e'],
            b: vec!['k'],
            c: vec!['l'],
            d: vec!['m', 'n', 't'],
            s: vec!['o', 'v'],
        }
    }

    #[test]
    fn test_status_change_emits_once() {
        let mut engine = ModeEngine::new();
        let tax = taxonomy();
        let events = engine.apply(&tax, "+ov", &["alice", "alice"], false);
        assert_eq!(
            events,
            vec![
                ModeKind::StatusChanged {
                    nick: "alice".into(),
                    mode: 'o',
                    added: true
                },
                ModeKind::StatusChanged {
                    nick: "alice".into(),
                    mode: 'v',
                    added: true
                },
            ]
        );
    }

    #[test]
    fn test_redundant_status_not_emitted() {
        let mut engine = ModeEngine::new();
        let tax = taxonomy();
        engine.apply(&tax, "+o", &["alice"], false);
        let events = engine.apply(&tax, "+o", &["alice"], false);
        assert!(events.is_empty());
    }

    #[test]
    fn test_key_and_limit() {
        let mut engine = ModeEngine::new();
        let tax = taxonomy();
        let events = engine.apply(&tax, "+kl", &["hunter2", "10"], false);
        assert_eq!(
            events,
            vec![ModeKind::KeySet("hunter2".into()), ModeKind::LimitSet(10)]
        );

        let events = engine.apply(&tax, "-kl", &[], false);
        assert_eq!(events, vec![ModeKind::KeyRemoved, ModeKind::LimitRemoved]);
    }

    #[test]
    fn test_mode_multi_change_order() {
        let mut engine = ModeEngine::new();
        let tax = taxonomy();
        engine.apply(&tax, "+o", &["alice"], false);
        let events = engine.apply(
            &tax,
            "+ov-b",
            &["alice", "alice", "*!*@spam.example"],
            false,
        );
        assert_eq!(
            events,
            vec![
                ModeKind::StatusChanged {
                    nick: "alice".into(),
                    mode: 'v',
                    added: true
                },
                ModeKind::ListRemove('b', "*!*@spam.example".into()),
            ]
        );
    }

    #[test]
    fn test_current_modes_diff() {
        let mut engine = ModeEngine::new();
        let tax = taxonomy();
        engine.apply(&tax, "+mt", &[], false);

        let events = engine.apply(&tax, "nt", &[], true);
        assert_eq!(
            events,
            vec![ModeKind::FlagUnset('m'), ModeKind::FlagSet('n')]
        );
        assert!(engine.modes().flags.contains(&'n'));
        assert!(engine.modes().flags.contains(&'t'));
        assert!(!engine.modes().flags.contains(&'m'));
    }

    #[test]
    fn test_unknown_mode_letter() {
        let mut engine = ModeEngine::new();
        let tax = taxonomy();
        let events = engine.apply(&tax, "+z", &[], false);
        assert_eq!(events, vec![ModeKind::Unknown('z', None)]);
    }
}
