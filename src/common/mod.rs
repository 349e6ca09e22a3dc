pub mod paths;
pub mod runner;
pub mod shell;
