//! Fuzz target for MODE-string parsing, both the fixed-enum (Layer 1)
//! tokenizer and the ISUPPORT-driven dynamic engine (Layer 2, C5).

#![no_main]

use ircaster::isupport::IsupportState;
use ircaster::mode::ModeEngine;
use ircaster::{ChannelMode, Mode, UserMode};
use libfuzzer_sys::fuzz_target;
use std::str;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = str::from_utf8(data) {
        if input.len() > 512 {
            return;
        }

        let pieces: Vec<&str> = input.split(' ').collect();
        let _ = Mode::<UserMode>::as_user_modes(&pieces);
        let _ = Mode::<ChannelMode>::as_channel_modes(&pieces);

        let taxonomy = IsupportState::default().chan_modes;
        let mut engine = ModeEngine::new();
        let mode_string = pieces.first().copied().unwrap_or("");
        let params: Vec<&str> = pieces.iter().skip(1).copied().collect();
        let _ = engine.apply(&taxonomy, mode_string, &params, false);
    }
});
