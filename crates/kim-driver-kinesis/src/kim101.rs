//! Driver for Thorlabs KIM-series inertial motor K-Cubes.
//!
//! The cube enumerates as an FTDI USB virtual COM port (115200 8N1) with
//! the Kinesis serial number in the USB descriptor. One port per cube; the
//! stream sits behind an async mutex so capability calls can share `&self`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, instrument, trace, warn};

use kim_core::{Channel, InertialMotor, KimError, MotorFactory};

use crate::apt::{self, msg};

/// FTDI vendor id; all Kinesis K-Cubes enumerate with it.
const THORLABS_USB_VID: u16 = 0x0403;
/// KIM101 serial numbers are allocated in the 97xxxxxx block.
const KIM_SERIAL_PREFIX: &str = "97";

const BAUD: u32 = 115_200;
const RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Driver for one KIM101 cube, speaking APT over a serial stream.
#[derive(Debug)]
pub struct Kim101Driver {
    serial: String,
    port: Mutex<SerialStream>,
}

impl Kim101Driver {
    /// Open the port at `path` for the cube with the given serial number.
    pub async fn open(path: &str, serial: &str) -> Result<Self> {
        let port = tokio_serial::new(path, BAUD)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .open_native_async()
            .with_context(|| format!("opening {path} for KIM {serial}"))?;

        Ok(Self {
            serial: serial.to_string(),
            port: Mutex::new(port),
        })
    }

    /// Serial number this driver was opened for.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Flash the front-panel LED, confirming we are talking to the right
    /// cube.
    pub async fn blink(&self) -> Result<()> {
        let mut guard = self.port.lock().await;
        guard.write_all(&apt::short(msg::MOD_IDENTIFY, 0, 0)).await?;
        guard.flush().await?;
        Ok(())
    }

    /// Send a request and wait for the response with the expected message
    /// id, skipping unsolicited messages (status updates, move-completed
    /// notifications) that may arrive in between.
    #[instrument(skip(self, request), fields(serial = %self.serial))]
    async fn transact(&self, request: &[u8], expect_id: u16) -> Result<(apt::Header, Vec<u8>)> {
        let mut guard = self.port.lock().await;
        guard.write_all(request).await?;
        guard.flush().await?;

        let deadline = tokio::time::Instant::now() + RESPONSE_TIMEOUT;
        loop {
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .ok_or_else(|| {
                    KimError::Instrument(format!(
                        "KIM {}: timed out waiting for message {expect_id:#06x}",
                        self.serial
                    ))
                })?;

            let mut header_bytes = [0u8; 6];
            tokio::time::timeout(remaining, guard.read_exact(&mut header_bytes))
                .await
                .map_err(|_| {
                    KimError::Instrument(format!(
                        "KIM {}: timed out waiting for message {expect_id:#06x}",
                        self.serial
                    ))
                })??;

            let header = apt::Header::parse(header_bytes);
            let payload = if header.has_data() {
                let mut payload = vec![0u8; header.data_len()];
                guard.read_exact(&mut payload).await?;
                payload
            } else {
                Vec::new()
            };

            if header.id == expect_id {
                trace!(id = %format_args!("{:#06x}", header.id), len = payload.len(), "APT response");
                return Ok((header, payload));
            }
            debug!(
                id = %format_args!("{:#06x}", header.id),
                "skipping unsolicited APT message"
            );
        }
    }
}

#[async_trait]
impl InertialMotor for Kim101Driver {
    #[instrument(skip(self), fields(serial = %self.serial))]
    async fn position(&self, channel: Channel) -> Result<i32> {
        let request = apt::req_position(channel);
        let (_, payload) = self.transact(&request, msg::PZMOT_GET_PARAMS).await?;
        let (reported, position) = apt::parse_position(&payload)?;
        if reported != channel {
            return Err(KimError::Instrument(format!(
                "KIM {}: position response for channel {reported}, requested {channel}",
                self.serial
            ))
            .into());
        }
        Ok(position)
    }

    #[instrument(skip(self), fields(serial = %self.serial))]
    async fn move_to(&self, channel: Channel, position: i32, velocity_mode: u16) -> Result<()> {
        // The move message has no per-move velocity word; mode 0 (move now
        // with the stored drive parameters) is the only supported mode.
        if velocity_mode != 0 {
            return Err(KimError::Instrument(format!(
                "KIM {}: unsupported velocity mode {velocity_mode}",
                self.serial
            ))
            .into());
        }
        let message = apt::move_absolute(channel, position);
        let mut guard = self.port.lock().await;
        guard.write_all(&message).await?;
        guard.flush().await?;
        debug!(%channel, position, "move commanded");
        Ok(())
    }

    async fn identify(&self) -> Result<String> {
        let request = apt::short(msg::HW_REQ_INFO, 0, 0);
        let (_, payload) = self.transact(&request, msg::HW_GET_INFO).await?;
        let info = apt::parse_hw_info(&payload)?;
        Ok(format!(
            "{} SN {} (fw {}.{}.{}, {} channels)",
            info.model,
            info.serial_number,
            info.firmware.0,
            info.firmware.1,
            info.firmware.2,
            info.num_channels
        ))
    }
}

/// Factory that discovers KIM cubes by USB serial number and opens them.
pub struct KinesisFactory;

/// Enumerate USB serial ports and keep (serial, path) for KIM cubes.
async fn enumerate_kim_ports() -> Result<Vec<(String, String)>> {
    let ports = tokio::task::spawn_blocking(serialport::available_ports)
        .await
        .map_err(|e| anyhow!("port enumeration task failed: {e}"))??;

    let mut found = Vec::new();
    for port in ports {
        let serialport::SerialPortType::UsbPort(usb) = &port.port_type else {
            continue;
        };
        if usb.vid != THORLABS_USB_VID {
            continue;
        }
        let Some(serial) = usb.serial_number.as_deref() else {
            warn!(port = %port.port_name, "FTDI port without a serial number, skipping");
            continue;
        };
        if serial.starts_with(KIM_SERIAL_PREFIX) {
            found.push((serial.to_string(), port.port_name.clone()));
        }
    }
    found.sort();
    Ok(found)
}

#[async_trait]
impl MotorFactory for KinesisFactory {
    fn driver_type(&self) -> &'static str {
        "kinesis"
    }

    fn name(&self) -> &'static str {
        "Thorlabs K-Cube Inertial Motor"
    }

    async fn discover(&self) -> Result<Vec<String>> {
        Ok(enumerate_kim_ports()
            .await?
            .into_iter()
            .map(|(serial, _)| serial)
            .collect())
    }

    async fn connect(&self, serial: &str) -> Result<Arc<dyn InertialMotor>> {
        let ports = enumerate_kim_ports().await?;
        let path = ports
            .into_iter()
            .find(|(s, _)| s == serial)
            .map(|(_, path)| path)
            .ok_or_else(|| KimError::DeviceNotFound(serial.to_string()))?;

        let driver = Kim101Driver::open(&path, serial).await?;
        driver.blink().await?;
        Ok(Arc::new(driver))
    }
}
