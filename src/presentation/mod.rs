//! HTML rendering of library screens.

pub mod markup;
pub mod uri;
pub mod views;

pub use uri::UriMapper;
pub use views::TemplateRenderer;
