pub mod chat_renderer;
pub mod headless;
pub mod terminal;

pub use chat_renderer::ChatRenderer;
pub use terminal::{ClientError, TerminalClient};
