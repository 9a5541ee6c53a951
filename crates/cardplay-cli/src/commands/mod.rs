//! CLI command implementations.

pub mod cards;
pub mod common;
pub mod fix;
pub mod lint;
pub mod plan;
pub mod projects;
pub mod render;
pub mod replay;
pub mod trace;
