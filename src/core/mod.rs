// Core modules implementing configuration, search path, engine seam, and service control.
pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod error;
pub mod search_path;
pub mod service;
