pub mod api;
pub mod models;
pub mod prefecture;

pub use prefecture::Prefecture;
