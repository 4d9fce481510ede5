//! Terminal-facing pieces: slash commands, line editing and answer rendering

pub mod commands;
pub mod input;
pub mod renderer;
