//! Core retext library (version history, prompt composition, model gateway,
//! transformation pipeline, config and catalog stores).

pub mod composer;
pub mod config;
pub mod history;
pub mod logging;
pub mod pipeline;
pub mod providers;
pub mod transforms;
