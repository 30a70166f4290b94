// rmcp's #[tool] macros generate code that calls these functions,
// but rustc/clippy can't trace through the macro-generated dispatching.
#![allow(dead_code)]

pub mod branding;
pub mod browser;
pub mod config;
pub mod dom;
pub mod error;
pub mod geometry;
pub mod model;
pub mod placement;
pub mod player;
pub mod recorder;
pub mod selectors;
pub mod server;
pub mod store;
pub mod tools;
pub mod widget;
