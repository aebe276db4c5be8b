mod css;
mod text;

pub use css::{CssAddHandler, CssRemoveHandler, CssUpdateHandler};
pub use text::TextUpdateHandler;
