//! Fuzz target for CTCP trailing-parameter parsing (§4.8, §4.7).

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::str;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = str::from_utf8(data) {
        if input.len() > 512 {
            return;
        }

        let _ = ircaster::Ctcp::parse(input);
        let _ = ircaster::CtcpOwned::parse(input);
        let _ = ircaster::ctcp::looks_like_ctcp(input);
    }
});
