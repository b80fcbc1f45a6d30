//! Known-hosts file: the registry snapshot kept between runs

use log::{debug, info};
use peer::Host;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_PATH: &str = "known_hosts";

#[derive(Debug, Error)]
pub enum KnownHostsError {
    #[error("cannot access known hosts file: {0}")]
    Io(#[from] std::io::Error),
    #[error("known hosts file is corrupt: {0}")]
    Codec(#[from] bincode::Error),
}

/// Reads the hosts saved by the last run; a missing file is an empty list
pub fn load(path: impl AsRef<Path>) -> Result<Vec<Host>, KnownHostsError> {
    let path = path.as_ref();
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No known hosts file at {}", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let hosts: Vec<Host> = bincode::deserialize(&bytes)?;
    info!("Loaded {} known hosts from {}", hosts.len(), path.display());
    Ok(hosts)
}

/// Replaces the file's contents with `hosts`
pub fn store(path: impl AsRef<Path>, hosts: &[Host]) -> Result<(), KnownHostsError> {
    let path = path.as_ref();
    let bytes = bincode::serialize(hosts)?;
    fs::write(path, bytes)?;
    info!("Saved {} known hosts to {}", hosts.len(), path.display());
    Ok(())
}
