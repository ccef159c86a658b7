//! `media-dedup` CLI (§10.4): `scan`, `query`, `verify`, `neg`, `weed`.

pub mod commands;
pub mod error;
pub mod support;
