// Agent Email - Lead Processing Core
//
// This crate ingests leads, researches their company, drafts a personalized
// outreach email with an LLM and optionally delivers it.
//
// The pipeline lives in domains/outreach; infrastructure adapters live in kernel.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
