pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod output;
pub mod process;
pub mod registry;
pub mod resolver;
pub mod script;
pub mod srr;
