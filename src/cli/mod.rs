//! Command-line front end over a JSON snapshot store.

pub mod commands;
