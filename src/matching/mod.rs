pub mod confirm;
pub mod manager;
pub mod name;
pub mod registry;
