pub mod candidate_generation;
pub mod clustering;
pub mod errors;
pub mod matching;
pub mod models;
pub mod tables;
pub mod utils;
