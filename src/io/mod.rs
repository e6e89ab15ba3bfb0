// src/io/mod.rs
pub mod catalog;
pub mod fields;

pub use catalog::{SceneCatalog, SceneRecord};
pub use fields::{load_fields, parse_fields};
