use std::net::{Ipv4Addr, TcpListener};

use anyhow::{Context, Result};

/// Held for the lifetime of the process; a second instance cannot bind the same port.
#[derive(Debug)]
pub struct InstanceLock {
    _listener: TcpListener,
}

impl InstanceLock {
    pub fn acquire(port: u16) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .with_context(|| format!("another tasklog instance is already running (port {port})"))?;
        Ok(Self {
            _listener: listener,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_on_same_port_fails() {
        let probe = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let _first = InstanceLock::acquire(port).unwrap();
        assert!(InstanceLock::acquire(port).is_err());
    }
}
