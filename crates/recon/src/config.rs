use serde::Deserialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    pub inputs: InputConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub duplicates: DuplicatesConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub summarize: Option<SummarizeConfig>,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Input file paths, resolved by the caller relative to the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// `(record_key, identifier_field)` rows.
    pub catalog: String,
    /// `(record_key, work_key, image_group_key, volume_index, title_index)` rows.
    pub mapping: String,
    /// Nested per-work detection database (JSON).
    pub detections: String,
}

// ---------------------------------------------------------------------------
// Detection + Validation
// ---------------------------------------------------------------------------

/// Which detections are consumed and how the per-image tie-break works.
///
/// `preferred_prefixes` is ordered but only membership matters: the first
/// detection that is well-formed and carries any of these prefixes wins.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_symbologies")]
    pub symbologies: Vec<String>,
    #[serde(default = "default_prefixes")]
    pub preferred_prefixes: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            symbologies: default_symbologies(),
            preferred_prefixes: default_prefixes(),
        }
    }
}

fn default_symbologies() -> Vec<String> {
    vec!["EAN13".into()]
}

fn default_prefixes() -> Vec<String> {
    vec!["978".into(), "979".into(), "977".into()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    /// Accept the 7-digit + check-char shape as well-formed.
    #[serde(default = "default_true")]
    pub legacy_short_form: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            legacy_short_form: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DuplicatesConfig {
    #[serde(default)]
    pub enabled: bool,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
    #[serde(default)]
    pub json: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            json: None,
        }
    }
}

fn default_output_dir() -> String {
    "analysis".into()
}

// ---------------------------------------------------------------------------
// Summarize
// ---------------------------------------------------------------------------

/// Merging reviewed bucket files back into per-record identifier tables.
#[derive(Debug, Clone, Deserialize)]
pub struct SummarizeConfig {
    #[serde(default = "default_record_prefix")]
    pub record_prefix: String,
    #[serde(default = "default_versions")]
    pub versions: String,
    #[serde(default = "default_outlines")]
    pub outlines: String,
    #[serde(default)]
    pub sources: Vec<ReviewedSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewedSource {
    pub file: String,
    /// Zero-based columns holding identifiers.
    pub columns: Vec<usize>,
    /// Column 1 carries the volume number.
    #[serde(default)]
    pub multi_volume: bool,
    /// When false, 13-digit non-bookland numbers are counted as ISBNs.
    #[serde(default = "default_true")]
    pub allow_ean: bool,
}

fn default_record_prefix() -> String {
    "MW".into()
}

fn default_versions() -> String {
    "reviewed_for_versions.csv".into()
}

fn default_outlines() -> String {
    "reviewed_for_outlines.csv".into()
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.name.trim().is_empty() {
            return Err(ReconError::ConfigValidation("name must not be empty".into()));
        }

        for (field, path) in [
            ("catalog", &self.inputs.catalog),
            ("mapping", &self.inputs.mapping),
            ("detections", &self.inputs.detections),
        ] {
            if path.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "inputs.{field} must not be empty"
                )));
            }
        }

        if self.detection.symbologies.is_empty() {
            return Err(ReconError::ConfigValidation(
                "detection.symbologies must list at least one symbology".into(),
            ));
        }

        for prefix in &self.detection.preferred_prefixes {
            if prefix.len() != 3 || !prefix.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ReconError::ConfigValidation(format!(
                    "detection.preferred_prefixes: '{prefix}' is not a 3-digit prefix"
                )));
            }
        }

        if let Some(ref summarize) = self.summarize {
            for source in &summarize.sources {
                if source.columns.is_empty() {
                    return Err(ReconError::ConfigValidation(format!(
                        "summarize source '{}': no columns",
                        source.file
                    )));
                }
                if source.multi_volume && source.columns.contains(&1) {
                    return Err(ReconError::ConfigValidation(format!(
                        "summarize source '{}': column 1 is the volume column",
                        source.file
                    )));
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name = "isbn-review"

[inputs]
catalog = "mw-isbn.csv"
mapping = "mw-w-ig-vn.csv"
detections = "db.json"
"#;

    #[test]
    fn parse_minimal_applies_defaults() {
        let config = ReconConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.name, "isbn-review");
        assert_eq!(config.detection.symbologies, vec!["EAN13"]);
        assert_eq!(config.detection.preferred_prefixes, vec!["978", "979", "977"]);
        assert!(config.validation.legacy_short_form);
        assert!(!config.duplicates.enabled);
        assert_eq!(config.output.dir, "analysis");
        assert!(config.output.json.is_none());
        assert!(config.summarize.is_none());
    }

    #[test]
    fn parse_full() {
        let input = format!(
            r#"{MINIMAL}
[detection]
symbologies = ["EAN13", "ISBN13"]
preferred_prefixes = ["978", "979"]

[validation]
legacy_short_form = false

[duplicates]
enabled = true

[output]
dir = "out"
json = "summary.json"

[summarize]
record_prefix = "MW"

[[summarize.sources]]
file = "reviewed/malformed.csv"
columns = [2]
allow_ean = false

[[summarize.sources]]
file = "reviewed/multi.csv"
columns = [3, 4]
multi_volume = true
"#
        );
        let config = ReconConfig::from_toml(&input).unwrap();
        assert_eq!(config.detection.symbologies.len(), 2);
        assert!(!config.validation.legacy_short_form);
        assert!(config.duplicates.enabled);
        assert_eq!(config.output.json.as_deref(), Some("summary.json"));

        let summarize = config.summarize.unwrap();
        assert_eq!(summarize.versions, "reviewed_for_versions.csv");
        assert_eq!(summarize.sources.len(), 2);
        assert!(!summarize.sources[0].allow_ean);
        assert!(!summarize.sources[0].multi_volume);
        assert!(summarize.sources[1].allow_ean);
        assert!(summarize.sources[1].multi_volume);
    }

    #[test]
    fn reject_missing_inputs() {
        let err = ReconConfig::from_toml(r#"name = "x""#).unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)));
    }

    #[test]
    fn reject_empty_input_path() {
        let input = r#"
name = "x"
[inputs]
catalog = ""
mapping = "m.csv"
detections = "db.json"
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("inputs.catalog"));
    }

    #[test]
    fn reject_bad_prefix() {
        let input = format!(
            r#"{MINIMAL}
[detection]
preferred_prefixes = ["97"]
"#
        );
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("'97'"));
    }

    #[test]
    fn reject_empty_symbologies() {
        let input = format!(
            r#"{MINIMAL}
[detection]
symbologies = []
"#
        );
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("symbologies"));
    }

    #[test]
    fn reject_volume_column_in_multi_volume_source() {
        let input = format!(
            r#"{MINIMAL}
[summarize]
[[summarize.sources]]
file = "multi.csv"
columns = [1, 3]
multi_volume = true
"#
        );
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("volume column"));
    }
}
