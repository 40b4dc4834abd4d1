pub mod assembly;
pub mod cli;
pub mod commands;
pub mod utils;
