pub mod types;
pub mod templates;
pub mod items;
pub mod payload;

pub use types::*;
pub use templates::*;
pub use items::*;
pub use payload::*;
