pub const DEFAULT_DATABASE_ID: &str = "(default)";
pub const DOCUMENT_ID_FIELD: &str = "__name__";
pub const MAX_BATCH_WRITES: usize = 500;
