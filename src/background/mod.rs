//! Wallpaper, lock screen and GDM login background management
//!
//! The wallpaper and lock screen are GSettings keys. The login background is
//! a rule in a root-owned GDM stylesheet, edited after making the file
//! temporarily writable through an elevated `chmod`/`chown`.

pub mod backup;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod login;
pub mod options;
pub mod picker;
pub mod privilege;
pub mod selection;
pub mod settings;
pub mod state;
pub mod stylesheet;

#[cfg(test)]
mod testing;

pub use error::BackgroundError;
