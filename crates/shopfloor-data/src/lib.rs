//! File loading for Shopfloor engine configs.
//!
//! Balance files are RON, TOML or JSON, detected by extension. All three
//! share the [`shopfloor_core::data_loader::ConfigData`] schema: a partial
//! config overlaid on the stock [`EngineConfig`](shopfloor_core::config::EngineConfig).

pub mod loader;

pub use loader::{
    DataLoadError, Format, detect_format, find_config_file, load_config, load_config_layers,
    load_config_str, parse_config_str, require_config_file,
};
