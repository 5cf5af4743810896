//! Device command: check terminal connectivity.

use std::io::Write;

use anyhow::{Context, Result};

use crate::Config;

pub fn test<W: Write>(writer: &mut W, config: &Config, name: &str) -> Result<()> {
    let device_config = config.device(name)?;
    let mut device = device_config.connect_with(config.device_timeout())?;

    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    runtime
        .block_on(att_device::probe(&mut device, config.device_timeout()))
        .with_context(|| format!("device {name} is not reachable"))?;

    writeln!(writer, "{name}: reachable")?;
    Ok(())
}
