#![forbid(unsafe_code)]

pub mod app;
pub mod case_study;
pub mod cli;
pub mod content;
pub mod formats;
pub mod guard;
pub mod logging;
pub mod messages;
pub mod output;
pub mod progress;
pub mod render;
pub mod sections;
pub mod toc;
