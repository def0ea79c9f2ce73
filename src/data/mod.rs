//! Catalog input

mod loader;
mod space_object;

pub use loader::*;
pub use space_object::*;
