//! CLI subcommand implementations.

pub mod detect;
pub mod export;
pub mod gallery;
pub mod goal;
pub mod log;
pub mod render;
pub mod sessions;
pub mod status;
pub mod view;
mod util;
