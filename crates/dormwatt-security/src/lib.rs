//! # Dormwatt Security
//! Secrets at rest: the upstream session token never hits disk in clear.

pub mod secrets;

pub use secrets::EncryptedFileStore;
