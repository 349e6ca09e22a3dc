pub mod background;
pub mod common;
pub mod ui;
