mod header;
mod window;

pub use header::{BlockHeader, HeaderOrigin};
pub use window::HeaderWindow;
