//! Fuzz target for source-prefix parsing (`nick!ident@host` / server name).

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::str;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = str::from_utf8(data) {
        if input.len() > 512 {
            return;
        }

        let _ = ircaster::Prefix::new_from_str(input);
        let _ = ircaster::PrefixRef::parse(input);
    }
});
