pub mod data;
pub mod learner;
pub mod models;
pub mod utils;
