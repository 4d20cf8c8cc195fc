#![forbid(unsafe_code)]

pub mod build;
pub mod catalog;
pub mod classify;
pub mod cli;
pub mod content;
pub mod entry;
pub mod epub;
pub mod error;
pub mod fetch;
pub mod formats;
pub mod logging;
pub mod project;
pub mod render;
pub mod toc;
pub mod tree;
