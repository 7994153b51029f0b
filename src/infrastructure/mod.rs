pub mod js_executor;
pub mod page_renderer;

pub use js_executor::JsExecutor;
pub use page_renderer::PageRenderer;
