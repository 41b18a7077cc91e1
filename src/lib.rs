pub mod export;
pub mod models;
pub mod parsing;
pub mod scrapers;
