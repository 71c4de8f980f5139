use itertools::Itertools;
use serialport::{SerialPortInfo, SerialPortType};
use tracing::{debug, info, warn};

use crate::config::Config;

/// What we know about an attached serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    /// The path to the port, likely `/dev/ttyACMx` on unix and `COMx` on Windows.
    pub path: String,

    /// The USB vendor id, if the port is a USB device.
    pub vendor_id: Option<u16>,

    /// The manufacturer string, if the transport reported one.
    pub manufacturer: Option<String>,
}

impl From<&SerialPortInfo> for PortDescriptor {
    fn from(info: &SerialPortInfo) -> Self {
        let (vendor_id, manufacturer) = match &info.port_type {
            SerialPortType::UsbPort(usb) => (Some(usb.vid), usb.manufacturer.clone()),
            _ => (None, None),
        };

        Self {
            path: info.port_name.clone(),
            vendor_id,
            manufacturer,
        }
    }
}

impl PortDescriptor {
    fn matches(&self, config: &Config) -> bool {
        if let Some(vid) = self.vendor_id {
            if config.usb_vendor_ids.contains(&vid) {
                return true;
            }
        }

        if let Some(manufacturer) = &self.manufacturer {
            if !config.manufacturer_keyword.is_empty()
                && manufacturer
                    .to_lowercase()
                    .contains(&config.manufacturer_keyword.to_lowercase())
            {
                return true;
            }
        }

        false
    }
}

fn select(config: &Config, descriptors: Vec<PortDescriptor>) -> Option<PortDescriptor> {
    descriptors
        .into_iter()
        .find(|descriptor| descriptor.matches(config))
}

/// Look for the device among the attached serial ports.
///
/// The first port whose USB vendor id is in the configured set, or whose
/// manufacturer string contains the configured keyword, is chosen.
/// Enumeration failure is logged and treated as "not found".
/// No side effects beyond the query; safe to call repeatedly.
pub fn discover(config: &Config) -> Option<PortDescriptor> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            warn!(?e, "Could not list serial ports");
            return None;
        }
    };

    debug!(
        "Available ports: {}",
        ports
            .iter()
            .map(|port| port.port_name.as_str())
            .join(", ")
    );

    let descriptors = ports.iter().map(PortDescriptor::from).collect::<Vec<_>>();

    match select(config, descriptors) {
        Some(descriptor) => {
            info!(%descriptor.path, "Found device");
            Some(descriptor)
        }
        None => {
            info!(
                "No device found in ports: {}",
                ports
                    .iter()
                    .map(|port| {
                        let manufacturer = match &port.port_type {
                            SerialPortType::UsbPort(usb) => {
                                usb.manufacturer.as_deref().unwrap_or("unknown")
                            }
                            _ => "unknown",
                        };
                        format!("{} ({manufacturer})", port.port_name)
                    })
                    .join(", ")
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usb(path: &str, vid: u16, manufacturer: Option<&str>) -> PortDescriptor {
        PortDescriptor {
            path: path.into(),
            vendor_id: Some(vid),
            manufacturer: manufacturer.map(Into::into),
        }
    }

    fn plain(path: &str) -> PortDescriptor {
        PortDescriptor {
            path: path.into(),
            vendor_id: None,
            manufacturer: None,
        }
    }

    #[test]
    fn matches_known_vendor_id() {
        let config = Config::default();

        let descriptor = select(
            &config,
            vec![plain("/dev/ttyS0"), usb("/dev/ttyACM0", 0x2341, None)],
        )
        .unwrap();

        assert_eq!(descriptor.path, "/dev/ttyACM0");
    }

    #[test]
    fn matches_clone_vendor_id() {
        let config = Config::default();

        let descriptor = select(&config, vec![usb("/dev/ttyUSB0", 0x1a86, None)]).unwrap();

        assert_eq!(descriptor.path, "/dev/ttyUSB0");
    }

    #[test]
    fn matches_manufacturer_case_insensitively() {
        let config = Config::default();

        let descriptor = select(
            &config,
            vec![usb("/dev/ttyACM1", 0xffff, Some("Arduino LLC"))],
        )
        .unwrap();

        assert_eq!(descriptor.path, "/dev/ttyACM1");
    }

    #[test]
    fn first_match_wins() {
        let config = Config::default();

        let descriptor = select(
            &config,
            vec![
                plain("/dev/ttyS0"),
                usb("/dev/ttyACM0", 0x2341, None),
                usb("/dev/ttyACM1", 0x2341, None),
            ],
        )
        .unwrap();

        assert_eq!(descriptor.path, "/dev/ttyACM0");
    }

    #[test]
    fn no_match_means_none() {
        let config = Config::default();

        assert_eq!(
            select(
                &config,
                vec![plain("/dev/ttyS0"), usb("/dev/ttyUSB0", 0x0403, Some("FTDI"))]
            ),
            None
        );
    }

    #[test]
    fn empty_keyword_does_not_match_everything() {
        let config = Config {
            manufacturer_keyword: "".into(),
            ..Default::default()
        };

        assert_eq!(
            select(&config, vec![usb("/dev/ttyUSB0", 0x0403, Some("FTDI"))]),
            None
        );
    }
}
