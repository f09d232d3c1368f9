
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IsupportEntry<'a> {
    pub key: &'a str,
    pub value: Option<&'a str>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Isupport<'a> {
    entries: Vec<IsupportEntry<'a>>, 
}

impl<'a> Isupport<'a> {
    pub fn parse_params(params: &[&'a str]) -> Self {
        let mut entries = Vec::with_capacity(params.len());
        for &p in params {
            if p.starts_with(':') { break; }
            if p.is_empty() { continue; }
            let (k, v) = if let Some(eq) = p.find('=') {
                (&p[..eq], Some(&p[eq + 1..]))
            } else {
                (p, None)
            };

            entries.push(IsupportEntry { key: k, value: v });
        }
        Isupport { entries }
    }

    pub fn from_response_args(args: &[&'a str]) -> Option<Self> {
        if args.is_empty() {
            return None;
        }
        
        let mut tokens = &args[1..];
        
        if let Some(last) = tokens.last() {
            if last.contains(' ') { tokens = &tokens[..tokens.len().saturating_sub(1)]; }
        }
        Some(Self::parse_params(tokens))
    }

    pub fn from_message(msg: &'a crate::Message) -> Option<Self> {
        match &msg.command {
            crate::command::Command::Response(crate::response::Response::RPL_ISUPPORT, ref a) => {
                let borrowed: Vec<&'a str> = a.iter().map(|s| s.as_str()).collect();
                Self::from_response_args(&borrowed)
            }
            _ => None,
        }
    }

    pub fn from_message_ref(msg: &'a crate::MessageRef<'a>) -> Option<Self> {
        if let Ok(resp) = msg.command.name.parse::<crate::response::Response>() {
            if resp == crate::response::Response::RPL_ISUPPORT {
                let borrowed: Vec<&'a str> = msg.command.args.to_vec();
                return Self::from_response_args(&borrowed);
            }
        }
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = &IsupportEntry<'a>> {
        self.entries.iter()
    }

    pub fn get(&self, key: &str) -> Option<Option<&'a str>> {
        self.entries
            .iter()
            .rfind(|e| e.key.eq_ignore_ascii_case(key))
            .map(|e| e.value)
    }



    pub fn casemapping(&self) -> Option<&'a str> { self.get("CASEMAPPING").flatten() }

    pub fn chantypes(&self) -> Option<&'a str> { self.get("CHANTYPES").flatten() }

    pub fn network(&self) -> Option<&'a str> { self.get("NETWORK").flatten() }

    pub fn prefix(&self) -> Option<PrefixSpec<'a>> {
        self.get("PREFIX").flatten().and_then(PrefixSpec::parse)
    }

    pub fn chanmodes(&self) -> Option<ChanModes<'a>> {
        self.get("CHANMODES").flatten().and_then(ChanModes::parse)
    }

    pub fn has_excepts(&self) -> bool { self.get("EXCEPTS").is_some() }

    pub fn excepts_mode(&self) -> Option<char> {
        self.get("EXCEPTS").flatten().and_then(|s| s.chars().next())
    }

    pub fn has_invex(&self) -> bool { self.get("INVEX").is_some() }

    pub fn invex_mode(&self) -> Option<char> {
        self.get("INVEX").flatten().and_then(|s| s.chars().next())
    }

    pub fn targmax(&self) -> Option<TargMax<'a>> {
        self.get("TARGMAX").flatten().and_then(TargMax::parse)
    }

    pub fn maxlist(&self) -> Option<MaxList> {
        self.get("MAXLIST").flatten().and_then(MaxList::parse)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrefixSpec<'a> {
    pub modes: &'a str,
    pub prefixes: &'a str,
}

impl<'a> PrefixSpec<'a> {
    pub fn parse(s: &'a str) -> Option<Self> {

        if let Some(open) = s.find('(') {
            if let Some(close) = s[open + 1..].find(')') {
                let close = open + 1 + close;
                let modes = &s[open + 1..close];
                let prefixes = &s[close + 1..];
                if !modes.is_empty() && !prefixes.is_empty() { return Some(PrefixSpec { modes, prefixes }); }
            }
        } else if !s.is_empty() {
            return Some(PrefixSpec { modes: "", prefixes: s });
        }
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChanModes<'a> {
    pub a: &'a str,
    pub b: &'a str,
    pub c: &'a str,
    pub d: &'a str,
}

impl<'a> ChanModes<'a> {
    pub fn parse(s: &'a str) -> Option<Self> {
        let mut parts = s.splitn(4, ',');
        let (a,b,c,d) = (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
        Some(ChanModes { a, b, c, d })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargMax<'a> {
    entries: Vec<(&'a str, Option<usize>)>,
}

impl<'a> TargMax<'a> {
    pub fn parse(s: &'a str) -> Option<Self> {
        if s.is_empty() { return Some(TargMax { entries: Vec::new() }); }
        let mut entries = Vec::new();
        for part in s.split(',') {
            if part.is_empty() { continue; }
            if let Some(colon) = part.find(':') {
                let (cmd, num) = (&part[..colon], &part[colon+1..]);
                let val = num.parse::<usize>().ok();
                if !cmd.is_empty() { entries.push((cmd, val)); }
            } else {
                
                entries.push((part, None));
            }
        }
        Some(TargMax { entries })
    }

    pub fn get(&self, cmd: &str) -> Option<Option<usize>> {
        self.entries.iter().find(|(k, _)| k.eq_ignore_ascii_case(cmd)).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, Option<usize>)> + '_ {
        self.entries.iter().copied()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaxList {
    entries: Vec<(char, usize)>,
}

impl MaxList {
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() { return Some(MaxList { entries: Vec::new() }); }
        let mut entries: Vec<(char, usize)> = Vec::new();
        for part in s.split(',') {
            if part.is_empty() { continue; }
            let (modes, limit_str) = part.split_once(':')?;


            let limit: usize = match limit_str.parse() { Ok(n) => n, Err(_) => continue };
            for ch in modes.chars() {
                
                entries.retain(|(c, _)| *c != ch);
                entries.push((ch, limit));
            }
        }
        Some(MaxList { entries })
    }

    pub fn limit_for(&self, mode: char) -> Option<usize> {
        self.entries.iter().rev().find(|(c, _)| *c == mode).map(|(_, n)| *n)
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, usize)> + '_ {
        self.entries.iter().copied()
    }
}







/// Grouped CHANMODES taxonomy plus the status-mode letters from `PREFIX`.
///
/// `a`/`b`/`c`/`d` mirror the CHANMODES A/B/C/D groups (§4.4); `s` holds the
/// status/prefix mode letters driving C5's `S` classification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChanModesState {
    pub a: Vec<char>,
    pub b: Vec<char>,
    pub c: Vec<char>,
    pub d: Vec<char>,
    pub s: Vec<char>,
}

impl ChanModesState {
    /// Classify a mode letter, status modes taking priority.
    pub fn classify(&self, c: char) -> Option<ModeGroup> {
        if self.s.contains(&c) {
            Some(ModeGroup::Status)
        } else if self.a.contains(&c) {
            Some(ModeGroup::A)
        } else if self.b.contains(&c) {
            Some(ModeGroup::B)
        } else if self.c.contains(&c) {
            Some(ModeGroup::C)
        } else if self.d.contains(&c) {
            Some(ModeGroup::D)
        } else {
            None
        }
    }
}

/// A CHANMODES/PREFIX taxonomy group (§4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeGroup {
    A,
    B,
    C,
    D,
    Status,
}

/// The default status modes synthesized when a network doesn't support them,
/// ordered highest to lowest (§4.4 "phantom" entries).
const PHANTOM_STATUS_ORDER: &[(char, char)] =
    &[('q', '~'), ('a', '&'), ('o', '@'), ('h', '%'), ('v', '+')];

/// Mutable, owned ISUPPORT state accumulated across `RPL_ISUPPORT` lines.
///
/// Unlike [`Isupport`] (a borrowed, single-line view), this accumulates
/// tokens across the whole registration burst and exposes the derived
/// fields C4 promises: case mapping, channel types, status prefixes,
/// grouped CHANMODES, per-command limits, and feature flags.
#[derive(Clone, Debug)]
pub struct IsupportState {
    pub case_mapping: crate::casemap::CaseMapping,
    pub chan_types: Vec<char>,
    /// Ordered high -> low: `(mode_letter, prefix_symbol)`.
    pub status_prefixes: Vec<(char, char)>,
    pub chan_modes: ChanModesState,
    pub modes_per_command: usize,
    pub nick_len: Option<usize>,
    pub channel_len: Option<usize>,
    pub topic_len: Option<usize>,
    pub kick_len: Option<usize>,
    /// `(chan_type, limit)` pairs from CHANLIMIT.
    pub chan_limits: Vec<(char, Option<usize>)>,
    /// `(mode_letter, limit)` pairs from MAXLIST/MAXBANS.
    pub list_mode_limits: Vec<(char, usize)>,
    /// `(command, limit)` pairs from TARGMAX.
    pub max_targets: Vec<(String, Option<usize>)>,
    pub monitor_limit: usize,
    pub utf8only: bool,
    pub whox: bool,
    pub network: Option<String>,
    raw: std::collections::HashMap<String, Option<String>>,
}

impl Default for IsupportState {
    fn default() -> Self {
        IsupportState {
            case_mapping: crate::casemap::CaseMapping::Rfc1459,
            chan_types: vec!['#'],
            status_prefixes: vec![('o', '@'), ('v', '+')],
            chan_modes: ChanModesState::default(),
            modes_per_command: 3,
            nick_len: None,
            channel_len: None,
            topic_len: None,
            kick_len: None,
            chan_limits: Vec::new(),
            list_mode_limits: Vec::new(),
            max_targets: Vec::new(),
            monitor_limit: 0,
            utf8only: false,
            whox: false,
            network: None,
            raw: std::collections::HashMap::new(),
        }
    }
}

impl IsupportState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply every token in a parsed `RPL_ISUPPORT` line.
    pub fn apply_line(&mut self, isupport: &Isupport<'_>) {
        for entry in isupport.iter() {
            self.apply_token(entry.key, entry.value);
        }
    }

    /// Apply a single ISUPPORT token (key, optional value). A leading `-`
    /// on the key means "remove and restore default" (§4.4).
    pub fn apply_token(&mut self, key: &str, value: Option<&str>) {
        if let Some(removed) = key.strip_prefix('-') {
            self.remove_token(removed);
            return;
        }

        self.raw
            .insert(key.to_ascii_uppercase(), value.map(str::to_string));

        match key.to_ascii_uppercase().as_str() {
            "CASEMAPPING" => {
                self.case_mapping =
                    crate::casemap::CaseMapping::from_token(value.unwrap_or("rfc1459"));
            }
            "CHANTYPES" => {
                self.chan_types = value.map(|v| v.chars().collect()).unwrap_or_default();
            }
            "NETWORK" => {
                self.network = value.map(str::to_string);
            }
            "PREFIX" => {
                if let Some(spec) = value.and_then(PrefixSpec::parse) {
                    self.chan_modes.s = spec.modes.chars().collect();
                    self.status_prefixes =
                        spec.modes.chars().zip(spec.prefixes.chars()).collect();
                } else {
                    self.chan_modes.s.clear();
                    self.status_prefixes.clear();
                }
                self.synthesize_phantom_prefixes();
            }
            "CHANMODES" => {
                if let Some(cm) = value.and_then(ChanModes::parse) {
                    self.chan_modes.a = cm.a.chars().collect();
                    self.chan_modes.b = cm.b.chars().collect();
                    self.chan_modes.c = cm.c.chars().collect();
                    self.chan_modes.d = cm.d.chars().collect();
                }
            }
            "MODES" => {
                self.modes_per_command = value.and_then(|v| v.parse().ok()).unwrap_or(3);
            }
            "NICKLEN" => self.nick_len = value.and_then(|v| v.parse().ok()),
            "CHANNELLEN" => self.channel_len = value.and_then(|v| v.parse().ok()),
            "TOPICLEN" => self.topic_len = value.and_then(|v| v.parse().ok()),
            "KICKLEN" => self.kick_len = value.and_then(|v| v.parse().ok()),
            "CHANLIMIT" => {
                self.chan_limits = value
                    .map(|v| {
                        v.split(',')
                            .filter_map(|part| {
                                let (types, limit) = part.split_once(':')?;
                                let limit = limit.parse().ok();
                                Some(types.chars().map(move |t| (t, limit)))
                            })
                            .flatten()
                            .collect()
                    })
                    .unwrap_or_default();
            }
            "MAXLIST" | "MAXBANS" => {
                if let Some(ml) = value.and_then(MaxList::parse) {
                    self.list_mode_limits = ml.iter().collect();
                } else if key.eq_ignore_ascii_case("MAXBANS") {
                    if let Some(n) = value.and_then(|v| v.parse().ok()) {
                        self.list_mode_limits.retain(|(c, _)| *c != 'b');
                        self.list_mode_limits.push(('b', n));
                    }
                }
            }
            "TARGMAX" => {
                self.max_targets = value
                    .and_then(TargMax::parse)
                    .map(|tm| {
                        tm.iter()
                            .map(|(cmd, n)| (cmd.to_string(), n))
                            .collect()
                    })
                    .unwrap_or_default();
            }
            "MONITOR" => {
                self.monitor_limit = match value {
                    Some(v) => v.parse().unwrap_or(0),
                    None => usize::MAX,
                };
            }
            "UTF8ONLY" => self.utf8only = true,
            "WHOX" => self.whox = true,
            _ => {}
        }
    }

    fn remove_token(&mut self, key: &str) {
        self.raw.remove(&key.to_ascii_uppercase());
        let default = IsupportState::default();
        match key.to_ascii_uppercase().as_str() {
            "CASEMAPPING" => self.case_mapping = default.case_mapping,
            "CHANTYPES" => self.chan_types = default.chan_types,
            "PREFIX" => {
                self.status_prefixes = default.status_prefixes;
                self.chan_modes.s = default.chan_modes.s;
                self.synthesize_phantom_prefixes();
            }
            "CHANMODES" => self.chan_modes = default.chan_modes,
            "MODES" => self.modes_per_command = default.modes_per_command,
            "NICKLEN" => self.nick_len = default.nick_len,
            "CHANNELLEN" => self.channel_len = default.channel_len,
            "TOPICLEN" => self.topic_len = default.topic_len,
            "KICKLEN" => self.kick_len = default.kick_len,
            "CHANLIMIT" => self.chan_limits = default.chan_limits,
            "MAXLIST" | "MAXBANS" => self.list_mode_limits = default.list_mode_limits,
            "TARGMAX" => self.max_targets = default.max_targets,
            "MONITOR" => self.monitor_limit = default.monitor_limit,
            "UTF8ONLY" => self.utf8only = default.utf8only,
            "WHOX" => self.whox = default.whox,
            "NETWORK" => self.network = default.network,
            _ => {}
        }
    }

    /// Insert phantom entries for status modes the network doesn't
    /// advertise, so `status >= Op` comparisons stay meaningful even when
    /// `a`/`q` are unsupported (§4.4).
    fn synthesize_phantom_prefixes(&mut self) {
        let advertised: Vec<char> = self.status_prefixes.iter().map(|(m, _)| *m).collect();
        let mut merged = self.status_prefixes.clone();
        for (mode, prefix) in PHANTOM_STATUS_ORDER {
            if !advertised.contains(mode) {
                merged.push((*mode, *prefix));
            }
        }
        // Re-sort to the canonical highest->lowest phantom order, keeping
        // advertised modes in their server-given relative order first.
        merged.sort_by_key(|(m, _)| {
            PHANTOM_STATUS_ORDER
                .iter()
                .position(|(pm, _)| pm == m)
                .unwrap_or(usize::MAX)
        });
        self.status_prefixes = merged;
    }

    /// Raw token value as received, if present (covers unrecognized
    /// tokens that are stored verbatim per §4.4).
    pub fn raw_token(&self, key: &str) -> Option<Option<&str>> {
        self.raw
            .get(&key.to_ascii_uppercase())
            .map(|v| v.as_deref())
    }

    /// Rank of a status mode letter, higher = more privileged; `None` if
    /// the letter isn't a status mode at all.
    pub fn status_rank(&self, mode: char) -> Option<usize> {
        self.status_prefixes
            .iter()
            .position(|(m, _)| *m == mode)
            .map(|idx| self.status_prefixes.len() - idx)
    }

    pub fn prefix_for(&self, mode: char) -> Option<char> {
        self.status_prefixes
            .iter()
            .find(|(m, _)| *m == mode)
            .map(|(_, p)| *p)
    }
}

#[cfg(test)]
mod state_tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = IsupportState::default();
        assert_eq!(state.chan_types, vec!['#']);
        assert_eq!(state.status_prefixes, vec![('o', '@'), ('v', '+')]);
        assert_eq!(state.modes_per_command, 3);
        assert_eq!(state.monitor_limit, 0);
    }

    #[test]
    fn test_apply_prefix_and_chanmodes() {
        let mut state = IsupportState::default();
        let isupport = Isupport::parse_params(&["PREFIX=(ov)@+", "CHANMODES=beI,k,l,imnpst"]);
        state.apply_line(&isupport);

        assert_eq!(state.status_prefixes[0], ('o', '@'));
        assert_eq!(state.status_prefixes[1], ('v', '+'));
        assert_eq!(state.chan_modes.a, vec!['b', 'e', 'I']);
        assert_eq!(state.chan_modes.b, vec!['k']);
        assert_eq!(state.chan_modes.c, vec!['l']);
        assert!(state.chan_modes.d.contains(&'i'));
    }

    #[test]
    fn test_phantom_prefix_synthesis() {
        let mut state = IsupportState::default();
        let isupport = Isupport::parse_params(&["PREFIX=(ov)@+"]);
        state.apply_line(&isupport);

        // q and a are not advertised but should appear as phantom entries.
        assert!(state.status_rank('q').is_some());
        assert!(state.status_rank('a').is_some());
        assert!(state.status_rank('q').unwrap() > state.status_rank('o').unwrap());
    }

    #[test]
    fn test_removal_restores_default() {
        let mut state = IsupportState::default();
        let isupport = Isupport::parse_params(&["NICKLEN=16"]);
        state.apply_line(&isupport);
        assert_eq!(state.nick_len, Some(16));

        let removal = Isupport::parse_params(&["-NICKLEN"]);
        state.apply_line(&removal);
        assert_eq!(state.nick_len, None);
    }

    #[test]
    fn test_casemapping_and_monitor() {
        let mut state = IsupportState::default();
        let isupport = Isupport::parse_params(&["CASEMAPPING=ascii", "MONITOR=100"]);
        state.apply_line(&isupport);
        assert_eq!(state.case_mapping, crate::casemap::CaseMapping::Ascii);
        assert_eq!(state.monitor_limit, 100);
    }

    #[test]
    fn test_unrecognized_token_stored_verbatim() {
        let mut state = IsupportState::default();
        let isupport = Isupport::parse_params(&["CUSTOMTHING=foo"]);
        state.apply_line(&isupport);
        assert_eq!(state.raw_token("CUSTOMTHING"), Some(Some("foo")));
    }
}
