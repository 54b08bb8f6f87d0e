//! NXD Modbus - register plumbing shared by the simulated PLCs and the DX gateway
//!
//! This crate holds the pieces both sides of the wire agree on:
//! - The fixed 10-register holding map and its layout
//! - Modbus TCP framing (MBAP header + read-holding-registers PDU)
//! - The Register Responder served by every simulated device
//! - The block-read client used by the gateway

pub mod client;
pub mod frame;
pub mod registers;
pub mod responder;
pub mod state;

pub use client::ModbusTcpClient;
pub use frame::{ExceptionCode, MbapHeader, ModbusError, Request, Response};
pub use registers::{layout, RegisterBank, RegisterMap};
pub use responder::Responder;
pub use state::{new_state, snapshot, Shared};
