pub mod body_fat;
pub mod csv_import;
pub mod db;
pub mod models;
pub mod projection;
pub mod service;
pub mod store;
pub mod tdee;
