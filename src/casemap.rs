//! IRC case-mapping.
//!
//! RFC 1459 §2.2 defines three case-folding rules networks can advertise via
//! `CASEMAPPING` in `RPL_ISUPPORT` (§4.4). All name-keyed containers
//! ([`crate::registry`]) derive their equality/hash from whichever mapping is
//! currently in effect.

use std::hash::{Hash, Hasher};

/// A case-folding rule for IRC names (nicknames, channels).
///
/// The folding rules differ only in whether `[]\~` are treated as the
/// lowercase counterparts of `{}|^`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CaseMapping {
    /// Only `A-Z` fold to `a-z`.
    Ascii,
    /// `A-Z` plus `[]\~` fold to `a-z{}|^` (the IRC default).
    #[default]
    Rfc1459,
    /// Like `Rfc1459` but `~` does not fold to `^`.
    StrictRfc1459,
}

impl CaseMapping {
    /// Parse the `CASEMAPPING` ISUPPORT token value.
    pub fn from_token(s: &str) -> Self {
        match s {
            "ascii" => CaseMapping::Ascii,
            "strict-rfc1459" => CaseMapping::StrictRfc1459,
            _ => CaseMapping::Rfc1459,
        }
    }

    /// The ISUPPORT token value for this mapping.
    pub fn as_token(&self) -> &'static str {
        match self {
            CaseMapping::Ascii => "ascii",
            CaseMapping::Rfc1459 => "rfc1459",
            CaseMapping::StrictRfc1459 => "strict-rfc1459",
        }
    }

    /// Fold a single character to its canonical (lowercase) form.
    pub fn fold_char(&self, c: char) -> char {
        match (self, c) {
            (_, 'A'..='Z') => c.to_ascii_lowercase(),
            (CaseMapping::Rfc1459, '[') => '{',
            (CaseMapping::Rfc1459, ']') => '}',
            (CaseMapping::Rfc1459, '\\') => '|',
            (CaseMapping::Rfc1459, '~') => '^',
            (CaseMapping::StrictRfc1459, '[') => '{',
            (CaseMapping::StrictRfc1459, ']') => '}',
            (CaseMapping::StrictRfc1459, '\\') => '|',
            _ => c,
        }
    }

    /// Fold a whole string to its canonical form.
    pub fn fold(&self, s: &str) -> String {
        s.chars().map(|c| self.fold_char(c)).collect()
    }

    /// Compare two strings for equality under this mapping.
    pub fn eq(&self, a: &str, b: &str) -> bool {
        let mut ac = a.chars();
        let mut bc = b.chars();
        loop {
            match (ac.next(), bc.next()) {
                (None, None) => return true,
                (Some(x), Some(y)) => {
                    if self.fold_char(x) != self.fold_char(y) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }

    /// Hash a string consistently with [`CaseMapping::eq`].
    pub fn hash_str<H: Hasher>(&self, s: &str, state: &mut H) {
        for c in s.chars() {
            self.fold_char(c).hash(state);
        }
    }
}

/// A key that compares and hashes according to a [`CaseMapping`].
///
/// Used as the key type of [`crate::registry::Registry`] so that renaming
/// the comparer (an ISUPPORT `CASEMAPPING` change) can rebuild the map from
/// scratch without touching the stored values.
#[derive(Clone, Debug)]
pub struct FoldedKey {
    raw: String,
    folded: String,
}

impl FoldedKey {
    pub fn new(mapping: CaseMapping, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let folded = mapping.fold(&raw);
        FoldedKey { raw, folded }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for FoldedKey {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for FoldedKey {}

impl Hash for FoldedKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

/// Backwards-compatible free function: fold under [`CaseMapping::Rfc1459`].
pub fn irc_to_lower(s: &str) -> String {
    CaseMapping::Rfc1459.fold(s)
}

/// Backwards-compatible free function: compare under [`CaseMapping::Rfc1459`].
pub fn irc_eq(a: &str, b: &str) -> bool {
    CaseMapping::Rfc1459.eq(a, b)
}
