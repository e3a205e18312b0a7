//! Context harvesting, response extraction and safe file materialization for
//! an LLM-driven code generation loop.

pub mod clients;
pub mod contexts;
pub mod data;
pub mod registries;
pub mod run_report;
