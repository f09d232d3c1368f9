//! `CAP LS` multiline accumulation (§4.9).

use std::collections::HashMap;

/// Accumulates capability name/value pairs across a `CAP * LS *` ...
/// `CAP * LS` burst, since the server may split the list across several
/// lines when it carries a lot of capabilities.
#[derive(Clone, Debug, Default)]
pub struct CapLsAccumulator {
    caps: HashMap<String, Option<String>>,
    complete: bool,
}

impl CapLsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one `CAP LS` line's capability-list parameter.
    ///
    /// `is_multiline` is true when the line's second positional parameter
    /// was `*` (more lines follow).
    pub fn feed(&mut self, caps_str: &str, is_multiline: bool) {
        for tok in caps_str.split_whitespace() {
            let (name, value) = match tok.split_once('=') {
                Some((n, v)) => (n.to_string(), Some(v.to_string())),
                None => (tok.to_string(), None),
            };
            self.caps.insert(name, value);
        }
        self.complete = !is_multiline;
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn caps(&self) -> &HashMap<String, Option<String>> {
        &self.caps
    }

    pub fn into_caps(self) -> HashMap<String, Option<String>> {
        self.caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line_completes_immediately() {
        let mut acc = CapLsAccumulator::new();
        acc.feed("multi-prefix sasl=PLAIN", false);
        assert!(acc.is_complete());
        assert!(acc.caps().contains_key("multi-prefix"));
        assert_eq!(acc.caps().get("sasl"), Some(&Some("PLAIN".to_string())));
    }

    #[test]
    fn test_multiline_accumulates_until_final() {
        let mut acc = CapLsAccumulator::new();
        acc.feed("multi-prefix", true);
        assert!(!acc.is_complete());
        acc.feed("sasl=PLAIN,EXTERNAL", false);
        assert!(acc.is_complete());
        assert!(acc.caps().contains_key("multi-prefix"));
        assert!(acc.caps().contains_key("sasl"));
    }
}
