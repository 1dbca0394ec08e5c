mod auth;
mod client;
mod config;
mod error;
mod logger;
mod portal;
mod types;
mod zone;

pub use auth::DEFAULT_MAX_AUTH_ATTEMPTS;
pub use client::{HtccClient, HtccClientBuilder, DEFAULT_MAX_ZONE_PAGES};
pub use config::{Credentials, EMAIL_ENV, LEGACY_EMAIL_ENV, LEGACY_PASSWORD_ENV, PASSWORD_ENV};
pub use error::{Error, Result};
pub use logger::TrafficLogMode;
pub use portal::{CONTROL_KEYS, DEFAULT_BASE_URL};
pub use types::*;
pub use zone::Zone;
