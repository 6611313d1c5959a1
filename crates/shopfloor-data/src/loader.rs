//! Format detection, file discovery and config loading.
//!
//! A config file is parsed into [`ConfigData`] and overlaid on the stock
//! [`EngineConfig`]. Several files can be layered, later files overriding
//! earlier ones, and the result is validated once at the end.

use std::path::{Path, PathBuf};

use shopfloor_core::config::{ConfigError, EngineConfig};
use shopfloor_core::data_loader::{ConfigData, DataLoadError as ConvertError};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during config loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A required config file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A value could not be converted to the engine's representation.
    #[error("in {file}: {source}")]
    Convert {
        file: PathBuf,
        #[source]
        source: ConvertError,
    },

    /// The merged config failed validation.
    #[error("invalid config: {0}")]
    Invalid(#[from] ConfigError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Name used in errors for configs that did not come from a file.
const INLINE: &str = "<inline>";

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Ron, Format::Toml, Format::Json];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for `{base_name}.ron`, `.toml` or `.json`.
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// more than one format exists for the same base name.
pub fn find_config_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for format in Format::ALL {
        let candidate = dir.join(format!("{base_name}.{}", format.extension()));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_config_file`], but a missing file is an error.
pub fn require_config_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_config_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Parsing
// ===========================================================================

fn parse(format: Format, text: &str, file: &Path) -> Result<ConfigData, DataLoadError> {
    let parse_error = |detail: String| DataLoadError::Parse {
        file: file.to_path_buf(),
        detail,
    };
    match format {
        // Optional fields read naturally without `Some(..)`.
        Format::Ron => ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
            .from_str(text)
            .map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(text).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(text).map_err(|e| parse_error(e.to_string())),
    }
}

/// Parse config text without applying it.
pub fn parse_config_str(format: Format, text: &str) -> Result<ConfigData, DataLoadError> {
    parse(format, text, Path::new(INLINE))
}

/// Parse config text and overlay it on the stock config.
pub fn load_config_str(format: Format, text: &str) -> Result<EngineConfig, DataLoadError> {
    let data = parse_config_str(format, text)?;
    finish(data, Path::new(INLINE))
}

fn read(path: &Path) -> Result<ConfigData, DataLoadError> {
    let format = detect_format(path)?;
    let text = std::fs::read_to_string(path)?;
    parse(format, &text, path)
}

fn finish(data: ConfigData, file: &Path) -> Result<EngineConfig, DataLoadError> {
    let mut config = EngineConfig::default();
    data.apply_to(&mut config)
        .map_err(|source| convert_error(file, source))?;
    config.validate()?;
    Ok(config)
}

fn convert_error(file: &Path, source: ConvertError) -> DataLoadError {
    match source {
        ConvertError::Invalid(err) => DataLoadError::Invalid(err),
        source => DataLoadError::Convert {
            file: file.to_path_buf(),
            source,
        },
    }
}

// ===========================================================================
// Loading
// ===========================================================================

/// Load a config file, format detected from its extension.
pub fn load_config(path: &Path) -> Result<EngineConfig, DataLoadError> {
    log::debug!("loading config from {}", path.display());
    let data = read(path)?;
    let config = finish(data, path)?;
    log::info!("loaded config {} (seed {})", path.display(), config.seed);
    Ok(config)
}

/// Overlay several files on the stock config in order and validate the
/// result once. Later files override earlier ones field by field.
pub fn load_config_layers<P: AsRef<Path>>(paths: &[P]) -> Result<EngineConfig, DataLoadError> {
    let mut config = EngineConfig::default();
    for path in paths {
        let path = path.as_ref();
        log::debug!("applying config layer {}", path.display());
        read(path)?
            .apply_to(&mut config)
            .map_err(|source| convert_error(path, source))?;
    }
    config.validate()?;
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use shopfloor_core::fixed::{Fixed64, Money};
    use shopfloor_core::id::{ProductKind, ResourceKind, Stage};

    fn data_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("data")
    }

    /// A scratch directory unique to one test.
    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "shopfloor-data-{name}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn resource(config: &EngineConfig, kind: ResourceKind) -> (u32, u32) {
        let def = config.resources.iter().find(|r| r.kind == kind).unwrap();
        (def.quantity, def.capacity)
    }

    // -----------------------------------------------------------------------
    // Format detection
    // -----------------------------------------------------------------------

    #[test]
    fn detects_formats_by_extension() {
        assert_eq!(detect_format(Path::new("a/b.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("b.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("b.json")).unwrap(), Format::Json);
        assert!(matches!(
            detect_format(Path::new("b.yaml")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
        assert!(detect_format(Path::new("noext")).is_err());
    }

    // -----------------------------------------------------------------------
    // Parsing each format
    // -----------------------------------------------------------------------

    #[test]
    fn ron_with_implicit_some() {
        let config = load_config_str(
            Format::Ron,
            r#"(
                seed: 7,
                starting_cash: 1234.5,
                resources: [(kind: glass, quantity: 10)],
                products: [(kind: tablet, requires: [(metal, 1), (glass, 2)])],
                starting_fleet: [quality],
            )"#,
        )
        .unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.starting_cash, Money::from_num(1234.5));
        assert_eq!(resource(&config, ResourceKind::Glass), (10, 100));
        let tablet = config
            .products
            .iter()
            .find(|p| p.kind == ProductKind::Tablet)
            .unwrap();
        assert_eq!(
            tablet.requires,
            vec![(ResourceKind::Metal, 1), (ResourceKind::Glass, 2)]
        );
        assert_eq!(config.starting_fleet, vec![Stage::Quality]);
    }

    #[test]
    fn toml_tables_and_arrays() {
        let config = load_config_str(
            Format::Toml,
            r#"
            starting_fleet = ["assembly", "assembly"]

            [[resources]]
            kind = "metal"
            capacity = 500

            [orders]
            complaint_window_days = 2
            "#,
        )
        .unwrap();

        assert_eq!(resource(&config, ResourceKind::Metal), (100, 500));
        assert_eq!(config.orders.complaint_window_days, 2);
        assert_eq!(config.starting_fleet, vec![Stage::Assembly, Stage::Assembly]);
    }

    #[test]
    fn json_matches_core_loader() {
        let json = r#"{"seed": 11, "pipeline": {"stage_time_factor": [2.0, 1.0, 0.5]}}"#;
        let from_file_crate = load_config_str(Format::Json, json).unwrap();
        let from_core = shopfloor_core::data_loader::load_config_json(json).unwrap();
        assert_eq!(from_file_crate, from_core);
    }

    #[test]
    fn empty_documents_give_stock_config() {
        assert_eq!(load_config_str(Format::Ron, "()").unwrap(), EngineConfig::default());
        assert_eq!(load_config_str(Format::Toml, "").unwrap(), EngineConfig::default());
        assert_eq!(load_config_str(Format::Json, "{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn parse_without_applying() {
        let data = parse_config_str(Format::Toml, "seed = 3").unwrap();
        assert_eq!(data.seed, Some(3));
        assert!(data.starting_cash.is_none());
    }

    // -----------------------------------------------------------------------
    // Errors
    // -----------------------------------------------------------------------

    #[test]
    fn unknown_fields_are_parse_errors() {
        for (format, text) in [
            (Format::Ron, "(seeed: 1)"),
            (Format::Toml, "seeed = 1"),
            (Format::Json, r#"{"seeed": 1}"#),
        ] {
            let err = load_config_str(format, text).unwrap_err();
            assert!(
                matches!(err, DataLoadError::Parse { ref file, .. } if file == Path::new(INLINE)),
                "{format:?}: {err}"
            );
        }
    }

    #[test]
    fn invalid_values_fail_validation() {
        let err = load_config_str(Format::Toml, "[orders]\nspawn_chance = 1.5").unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::Invalid(ConfigError::InvalidProbability {
                field: "orders.spawn_chance",
                ..
            })
        ));

        let err = load_config_str(
            Format::Ron,
            "(resources: [(kind: metal, quantity: 300)])",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::Invalid(ConfigError::OverCapacity { .. })
        ));
    }

    #[test]
    fn out_of_range_numbers_are_conversion_errors() {
        let err = load_config_str(Format::Json, r#"{"starting_cash": 1e300}"#).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::Convert {
                source: ConvertError::NotFinite { field: "starting_cash", .. },
                ..
            }
        ));
    }

    // -----------------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------------

    #[test]
    fn bundled_campaign_loads() {
        let config = load_config(&data_dir().join("campaign.ron")).unwrap();
        assert_eq!(config.seed, 2024);
        assert_eq!(config.starting_cash, Money::from_num(30_000));
        assert_eq!(resource(&config, ResourceKind::Electronics), (120, 200));
        assert_eq!(config.starting_fleet.len(), 4);
        assert_eq!(config.finance.max_active_loans, 2);
        assert_eq!(config.finance.bankruptcy_floor, Some(Money::from_num(-20_000)));
        assert_eq!(config.pipeline.progress_per_day, Fixed64::from_num(100));
        let laptop = config
            .products
            .iter()
            .find(|p| p.kind == ProductKind::Laptop)
            .unwrap();
        assert!(!laptop.unlocked);
    }

    #[test]
    fn layers_override_in_order() {
        let dir = data_dir();
        let config =
            load_config_layers(&[dir.join("campaign.ron"), dir.join("hard.toml")]).unwrap();

        // From hard.toml.
        assert_eq!(config.seed, 99);
        assert_eq!(config.starting_cash, Money::from_num(15_000));
        assert_eq!(
            config.pipeline.base_defect_chance,
            Fixed64::from_num(0.2)
        );
        // Kept from campaign.ron.
        assert_eq!(config.starting_fleet.len(), 4);
        assert_eq!(config.orders.complaint_window_days, 3);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(&scratch("missing").join("nope.ron")).unwrap_err();
        assert!(matches!(err, DataLoadError::Io(_)));
    }

    #[test]
    fn find_config_file_by_base_name() {
        let dir = scratch("find");
        assert_eq!(find_config_file(&dir, "balance").unwrap(), None);
        assert!(matches!(
            require_config_file(&dir, "balance"),
            Err(DataLoadError::MissingRequired { .. })
        ));

        std::fs::write(dir.join("balance.toml"), "seed = 5").unwrap();
        let path = require_config_file(&dir, "balance").unwrap();
        assert_eq!(load_config(&path).unwrap().seed, 5);

        std::fs::write(dir.join("balance.json"), "{}").unwrap();
        assert!(matches!(
            find_config_file(&dir, "balance"),
            Err(DataLoadError::ConflictingFormats { .. })
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = scratch("broken");
        let path = dir.join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, DataLoadError::Parse { ref file, .. } if *file == path));
        assert!(err.to_string().contains("broken.json"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
