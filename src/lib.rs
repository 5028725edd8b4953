#![recursion_limit = "256"]

pub mod application;
pub mod cli;
pub mod domain;
pub mod infra;
pub mod ml;
pub mod profiler;
pub mod runtime;
