pub mod query;
pub mod tail;
