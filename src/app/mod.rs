//! The interactive tool: modes, key bindings, stock popups and the event loop.

mod commands;
mod components;
mod controller;
mod mode;

pub use controller::Controller;
