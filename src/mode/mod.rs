//! IRC user and channel mode types.
//!
//! [`types`] and [`parse`] cover the fixed, wire-level mode vocabulary.
//! [`engine`] layers the dynamic, ISUPPORT-CHANMODES-driven classification
//! on top for channels whose mode letters aren't in the fixed vocabulary.

mod engine;
mod parse;
mod types;

pub use self::engine::{ModeEngine, ModeKind};
pub use self::types::{ChannelMode, Mode, ModeType, UserMode};
