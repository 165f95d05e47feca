//! Thorlabs K-Cube inertial motor driver.
//!
//! Replaces the vendor's .NET Kinesis binding with a native transport: the
//! APT binary protocol ([`apt`]) over the cube's USB virtual COM port
//! ([`kim101`]). The server sees it only through the `InertialMotor` and
//! `MotorFactory` traits in `kim-core`.

pub mod apt;
pub mod kim101;

pub use kim101::{Kim101Driver, KinesisFactory};
