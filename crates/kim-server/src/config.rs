//! Startup configuration.
//!
//! An explicit, validated struct instead of process-wide globals: the
//! serial list, the per-controller shot-file attribute names, and the
//! control port all arrive here and are checked at construction time.

use std::path::Path;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

use kim_core::{KimError, KimResult, CHANNEL_COUNT};

/// Which motor transport to construct at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Real hardware over the Kinesis USB serial transport.
    #[default]
    Kinesis,
    /// In-memory mock motors, one per configured serial.
    Mock,
}

/// Server startup configuration.
///
/// ```toml
/// port = 7426
/// serials = ["97100362", "97100395"]
/// position_globals = [
///     ["Kinesis_Ch1", "Kinesis_Ch2", "Kinesis_Ch3", "Kinesis_Ch4"],
///     ["Steering_Ch1", "Steering_Ch2", "Steering_Ch3", "Steering_Ch4"],
/// ]
/// max_move_globals = ["Kinesis_MaxMove", "Steering_MaxMove"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// TCP port the control listener binds.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Hardware serial number of each controller.
    pub serials: Vec<String>,

    /// For each controller, the four shot-file global names holding its
    /// desired channel positions, in channel order.
    pub position_globals: Vec<Vec<String>>,

    /// For each controller, the shot-file global naming its maximum
    /// allowed single-move magnitude. Agreement with the controller count
    /// is checked per cycle, not here: a shot is allowed to be rejected
    /// at buffered time rather than preventing server startup.
    pub max_move_globals: Vec<String>,

    /// Motor transport selection.
    #[serde(default)]
    pub driver: DriverKind,
}

fn default_port() -> u16 {
    7426
}

impl ServerConfig {
    /// Load from a TOML file with `KIM_SERVER_*` environment overrides,
    /// then validate.
    pub fn load(path: &Path) -> KimResult<Self> {
        let config: ServerConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("KIM_SERVER_"))
            .extract()
            .map_err(|e| KimError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Construction-time shape checks: one position-global group per
    /// serial, four names per group.
    pub fn validate(&self) -> KimResult<()> {
        if self.serials.is_empty() {
            return Err(KimError::Config(
                "at least one controller serial is required".into(),
            ));
        }
        if self.serials.len() != self.position_globals.len() {
            return Err(KimError::Config(format!(
                "{} serials but {} position-global groups; the lists must be the same length",
                self.serials.len(),
                self.position_globals.len()
            )));
        }
        for (serial, group) in self.serials.iter().zip(&self.position_globals) {
            if group.len() != CHANNEL_COUNT {
                return Err(KimError::Config(format!(
                    "controller {serial}: position-global group has {} names, expected {CHANNEL_COUNT}",
                    group.len()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn group(prefix: &str) -> Vec<String> {
        (1..=4).map(|i| format!("{prefix}_Ch{i}")).collect()
    }

    fn valid_config() -> ServerConfig {
        ServerConfig {
            port: 7426,
            serials: vec!["97100362".into(), "97100395".into()],
            position_globals: vec![group("Kinesis"), group("Steering")],
            max_move_globals: vec!["Kinesis_MaxMove".into(), "Steering_MaxMove".into()],
            driver: DriverKind::Mock,
        }
    }

    #[test]
    fn valid_config_passes() {
        valid_config().validate().expect("valid");
    }

    #[test]
    fn serial_and_group_counts_must_agree() {
        let mut config = valid_config();
        config.position_globals.pop();
        let err = config.validate().expect_err("mismatch");
        assert!(err.to_string().contains("must be the same length"));
    }

    #[test]
    fn groups_must_have_four_names() {
        let mut config = valid_config();
        config.position_globals[1].pop();
        let err = config.validate().expect_err("short group");
        assert!(err.to_string().contains("expected 4"));
    }

    #[test]
    fn max_move_count_is_not_checked_at_construction() {
        let mut config = valid_config();
        config.max_move_globals.pop();
        config.validate().expect("checked per cycle instead");
    }

    #[test]
    fn loads_from_toml_file() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").expect("temp file");
        write!(
            file,
            r#"
serials = ["97100362"]
position_globals = [["Kinesis_Ch1", "Kinesis_Ch2", "Kinesis_Ch3", "Kinesis_Ch4"]]
max_move_globals = ["Kinesis_MaxMove"]
driver = "mock"
"#
        )
        .expect("write config");

        let config = ServerConfig::load(file.path()).expect("load");
        assert_eq!(config.port, 7426); // default
        assert_eq!(config.driver, DriverKind::Mock);
        assert_eq!(config.serials, vec!["97100362"]);
    }
}
