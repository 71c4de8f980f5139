use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::Error;

fn default_baud_rate() -> u32 {
    9600
}

fn default_listen_port() -> u16 {
    crate::server::DEFAULT_PORT
}

fn default_retry_interval_seconds() -> u64 {
    5
}

fn default_usb_vendor_ids() -> Vec<u16> {
    // Arduino, and the CH340 serial chip found on most clones.
    vec![0x2341, 0x1a86]
}

fn default_manufacturer_keyword() -> String {
    "arduino".into()
}

/// The configuration used for running the bridge.
///
/// All fields have defaults matching the expected device,
/// so a configuration file may set only what it wants to override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The baud rate the device transmits at.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// The port the websocket server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// How often to re-attempt device discovery while disconnected.
    #[serde(default = "default_retry_interval_seconds")]
    pub retry_interval_seconds: u64,

    /// USB vendor ids which identify the device.
    #[serde(default = "default_usb_vendor_ids")]
    pub usb_vendor_ids: Vec<u16>,

    /// A port whose manufacturer string contains this keyword
    /// (case-insensitively) also counts as the device.
    #[serde(default = "default_manufacturer_keyword")]
    pub manufacturer_keyword: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            listen_port: default_listen_port(),
            retry_interval_seconds: default_retry_interval_seconds(),
            usb_vendor_ids: default_usb_vendor_ids(),
            manufacturer_keyword: default_manufacturer_keyword(),
        }
    }
}

impl Config {
    fn ron() -> ron::Options {
        ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
            .with_default_extension(ron::extensions::Extensions::UNWRAP_NEWTYPES)
    }

    /// Deserialize a .ron file's contents.
    /// Panics if the input is not valid .ron.
    pub fn deserialize(input: &str) -> Self {
        Self::ron().from_str::<Config>(input).unwrap()
    }

    /// An example configuration with all fields filled in.
    pub fn example() -> Self {
        Self::default()
    }

    /// Serialize the configuration in a "pretty" (i.e. non-compact) fashion.
    pub fn serialize_pretty(&self) -> String {
        Self::ron()
            .to_string_pretty(self, ron::ser::PrettyConfig::default())
            .unwrap()
    }

    /// Setup a new configuration from a RON file.
    pub fn new_from_path<P: AsRef<Path>>(p: P) -> Self {
        let s = std::fs::read_to_string(p).unwrap();

        Self::deserialize(&s)
    }

    /// The retry interval as a [`Duration`].
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_seconds)
    }

    fn check_retry_interval(&self) -> Result<(), Error> {
        if self.retry_interval_seconds == 0 {
            return Err(Error::BadConfig(
                "The retry interval must be at least one second, else a missing device turns into a busy loop".into(),
            ));
        }

        Ok(())
    }

    fn check_match_set(&self) -> Result<(), Error> {
        if self.usb_vendor_ids.is_empty() && self.manufacturer_keyword.is_empty() {
            return Err(Error::BadConfig(
                "Both the vendor id set and the manufacturer keyword are empty, no device could ever match".into(),
            ));
        }

        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        self.check_retry_interval()?;
        self.check_match_set()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize() {
        let c = Config::example();

        println!("{}", c.serialize_pretty());
    }

    #[test]
    fn deserialize_partial() {
        // A config file only needs to mention what it overrides.
        let input = r#"
(
    baud_rate: 115200,
)
"#;
        let config = Config::deserialize(input);

        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.listen_port, 3001);
        assert_eq!(config.retry_interval_seconds, 5);
    }

    #[test]
    fn deserialize_full() {
        let input = r#"
(
    baud_rate: 9600,
    listen_port: 3001,
    retry_interval_seconds: 5,
    usb_vendor_ids: [9025, 6790],
    manufacturer_keyword: "arduino",
)
"#;
        let config = Config::deserialize(input);

        assert_eq!(config.usb_vendor_ids, vec![0x2341, 0x1a86]);
        assert_eq!(config.manufacturer_keyword, "arduino");
    }

    #[test]
    fn bad_config_zero_retry() {
        let c = Config {
            retry_interval_seconds: 0,
            ..Default::default()
        };

        let err = c.validate().unwrap_err();

        assert!(err.to_string().contains("retry interval"));
    }

    #[test]
    fn bad_config_empty_match_set() {
        let c = Config {
            usb_vendor_ids: vec![],
            manufacturer_keyword: "".into(),
            ..Default::default()
        };

        let err = c.validate().unwrap_err();

        assert!(err.to_string().contains("match"));
    }
}
