//! List serial ports

use anyhow::Result;
use ranger_link::{LinkOpener, SerialOpener};

pub fn execute() -> Result<()> {
    let ports = SerialOpener.available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }
    for port in ports {
        println!("{}", port);
    }
    Ok(())
}
