pub mod headless;
pub mod session;

pub use headless::{ChromiumLauncher, ChromiumSession, PageSettings};
pub use session::{with_session, BrowserLauncher};
