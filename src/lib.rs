#![deny(warnings, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod classification;
pub mod config;
pub mod error;
pub mod observability;
pub mod pipeline;
pub mod review;
pub mod store;
