pub mod error;
pub mod types;
pub mod value;

pub use error::CantalError;
pub use types::*;
pub use value::*;
