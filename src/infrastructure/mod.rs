// Infrastructure - persistence for the metadata platform.

pub mod database;

pub use database::Database;
