mod path;
mod value;

pub use path::{doc_key, field_path, resource_path};
pub use value::{doc_with_a, empty_map, fields, int, map};
