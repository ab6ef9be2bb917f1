mod array_value;
mod map_value;
mod ordering;
mod value;

pub use array_value::ArrayValue;
pub use map_value::MapValue;
pub use ordering::compare_values;
pub use value::{FirestoreValue, SentinelValue, ValueKind};
