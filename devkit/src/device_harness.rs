/*!
In-process PLC for gateway tests

Serves a plain `RegisterMap` through the real register responder on an
ephemeral loopback port. Tests poke registers directly; the listener task
is aborted when the handle is dropped.
*/

use std::net::SocketAddr;

use anyhow::{Context, Result};
use nxd_modbus::{new_state, RegisterMap, Responder, Shared};
use tokio::task::JoinHandle;

pub struct DeviceHandle {
    addr: SocketAddr,
    registers: Shared<RegisterMap>,
    task: JoinHandle<()>,
}

impl DeviceHandle {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn set(&self, address: u16, value: u16) {
        self.registers.lock().set(address, value);
    }

    pub fn get(&self, address: u16) -> u16 {
        self.registers.lock().get(address)
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub async fn spawn_device(registers: RegisterMap, station_id: u8) -> Result<DeviceHandle> {
    env_logger::try_init().ok();

    let registers = new_state(registers);
    let responder = Responder::bind("127.0.0.1:0", registers.clone(), station_id)
        .await
        .context("Failed to bind test device")?;
    let addr = responder.local_addr()?;
    let task = tokio::spawn(responder.run());

    log::info!("🏭 Test device station {} on {}", station_id, addr);
    Ok(DeviceHandle { addr, registers, task })
}
