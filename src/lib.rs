//! Real-estate listing catalog: listings, lead capture and the admin API.

pub mod area;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod id;
pub mod image_migration;
pub mod images;
pub mod logging;
pub mod mail;
pub mod mapper;
pub mod migrate;
pub mod model;
pub mod pagination;
pub mod repo;
pub mod state;
pub mod text;
pub mod time;
pub mod validation;

pub use error::{AppError, AppResult};
