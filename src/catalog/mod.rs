pub mod cache;
pub mod error;
pub mod handlers;
pub mod shape;

pub use cache::ResponseCache;
pub use error::ApiError;
pub use handlers::*;
pub use shape::{MovieRecord, ShapeError, Shaper};
