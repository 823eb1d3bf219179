//! Newsletter engine: turns chat channel history into curated newsletter content.

pub mod api;
pub mod channels;
pub mod config;
pub mod delivery;
pub mod error;
pub mod newsletter;
pub mod pipeline;
