// tui/mod.rs - Interactive sidebar and field editor

pub mod app;
pub mod events;
pub mod state;
pub mod ui;

pub use events::run_tui;
