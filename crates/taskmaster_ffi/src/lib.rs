//! Flutter bridge surface for `taskmaster_core`.

pub mod api;
