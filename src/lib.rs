pub mod modules;
pub mod runtime;
mod schema;
pub mod shared;
