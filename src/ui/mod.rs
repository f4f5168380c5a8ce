//! Terminal compositor: windows own named panes, route keys by focus and
//! spawn modal popups as nested blocking loops.

mod input;
mod pane;
mod session;
mod styles;
mod window;

pub use input::Input;
pub use pane::{ChangeHook, Pane, PaneKind};
pub use session::{Console, Session};
pub use styles::Palette;
pub use window::{Dispatch, Focus, PopupSignal, PopupSize, Window};

#[cfg(test)]
pub use session::testing;
