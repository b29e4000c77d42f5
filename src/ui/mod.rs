mod layout;
mod theme;

pub use layout::Layout;
pub use theme::{PanelStyle, Theme};
