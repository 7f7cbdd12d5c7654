pub mod resolver;

pub use resolver::{Resolution, SchemaResolver};
