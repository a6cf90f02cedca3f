pub mod chapter;
pub mod document;
pub mod error;
pub mod page;

pub use chapter::*;
pub use document::*;
pub use error::*;
pub use page::*;
