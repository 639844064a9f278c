pub mod batchitem;
pub mod error;
pub mod trajectory;
