pub mod admin;
pub mod client;
pub mod cron;
pub mod demo;
pub mod health;

pub use admin::*;
pub use client::*;
pub use cron::*;
pub use demo::*;
pub use health::*;
