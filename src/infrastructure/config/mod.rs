//! Local file-backed stores

mod hint_file;
mod session_file;
mod xdg;

pub use hint_file::QuotaHintFile;
pub use session_file::SessionFile;
pub use xdg::{XdgConfigStore, APP_DIR};
