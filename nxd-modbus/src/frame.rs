//! Modbus TCP framing
//!
//! Every frame is a 7-byte MBAP header followed by the PDU, big-endian:
//!
//! ```text
//! | transaction id (2) | protocol id (2) = 0 | length (2) | unit id (1) | PDU ... |
//! ```
//!
//! `length` counts the unit id plus the PDU bytes. Only function 0x03
//! (read holding registers) is modelled; everything else is answered with
//! an exception PDU.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MBAP_LEN: usize = 7;
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
pub const MAX_READ_QUANTITY: u16 = 125;

/// Largest PDU a Modbus TCP ADU can carry.
const MAX_PDU_LEN: usize = 253;
const EXCEPTION_FLAG: u8 = 0x80;

#[derive(Debug, Error)]
pub enum ModbusError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("device answered with exception {code} (function 0x{function:02x})")]
    Exception { function: u8, code: ExceptionCode },

    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("transaction id mismatch: sent {sent}, received {received}")]
    TransactionMismatch { sent: u16, received: u16 },

    #[error("connection closed by peer")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    ServerDeviceFailure,
    GatewayTargetFailedToRespond,
    Other(u8),
}

impl ExceptionCode {
    pub fn code(self) -> u8 {
        match self {
            ExceptionCode::IllegalFunction => 0x01,
            ExceptionCode::IllegalDataAddress => 0x02,
            ExceptionCode::IllegalDataValue => 0x03,
            ExceptionCode::ServerDeviceFailure => 0x04,
            ExceptionCode::GatewayTargetFailedToRespond => 0x0B,
            ExceptionCode::Other(code) => code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => ExceptionCode::IllegalFunction,
            0x02 => ExceptionCode::IllegalDataAddress,
            0x03 => ExceptionCode::IllegalDataValue,
            0x04 => ExceptionCode::ServerDeviceFailure,
            0x0B => ExceptionCode::GatewayTargetFailedToRespond,
            other => ExceptionCode::Other(other),
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExceptionCode::IllegalFunction => "illegal function",
            ExceptionCode::IllegalDataAddress => "illegal data address",
            ExceptionCode::IllegalDataValue => "illegal data value",
            ExceptionCode::ServerDeviceFailure => "server device failure",
            ExceptionCode::GatewayTargetFailedToRespond => "gateway target failed to respond",
            ExceptionCode::Other(_) => "unknown exception",
        };
        write!(f, "0x{:02x} ({})", self.code(), label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: u16,
    pub protocol_id: u16,
    pub length: u16,
    pub unit_id: u8,
}

impl MbapHeader {
    pub fn for_pdu(transaction_id: u16, unit_id: u8, pdu_len: usize) -> Self {
        Self {
            transaction_id,
            protocol_id: 0,
            length: (pdu_len + 1) as u16,
            unit_id,
        }
    }

    pub fn encode(&self) -> [u8; MBAP_LEN] {
        let tid = self.transaction_id.to_be_bytes();
        let pid = self.protocol_id.to_be_bytes();
        let len = self.length.to_be_bytes();
        [tid[0], tid[1], pid[0], pid[1], len[0], len[1], self.unit_id]
    }

    pub fn decode(buf: &[u8; MBAP_LEN]) -> Result<Self, ModbusError> {
        let header = Self {
            transaction_id: u16::from_be_bytes([buf[0], buf[1]]),
            protocol_id: u16::from_be_bytes([buf[2], buf[3]]),
            length: u16::from_be_bytes([buf[4], buf[5]]),
            unit_id: buf[6],
        };

        if header.protocol_id != 0 {
            return Err(ModbusError::Malformed(format!(
                "unexpected protocol id {}",
                header.protocol_id
            )));
        }
        if header.length < 2 || header.pdu_len() > MAX_PDU_LEN {
            return Err(ModbusError::Malformed(format!(
                "invalid MBAP length {}",
                header.length
            )));
        }
        Ok(header)
    }

    pub fn pdu_len(&self) -> usize {
        (self.length as usize).saturating_sub(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    ReadHoldingRegisters { start: u16, quantity: u16 },
}

impl Request {
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            Request::ReadHoldingRegisters { start, quantity } => {
                let mut pdu = Vec::with_capacity(5);
                pdu.push(FC_READ_HOLDING_REGISTERS);
                pdu.extend_from_slice(&start.to_be_bytes());
                pdu.extend_from_slice(&quantity.to_be_bytes());
                pdu
            }
        }
    }

    /// Parse a request PDU. The error is the exception the server should
    /// answer with.
    pub fn decode(pdu: &[u8]) -> Result<Self, ExceptionCode> {
        match pdu.first() {
            Some(&FC_READ_HOLDING_REGISTERS) => {
                if pdu.len() != 5 {
                    return Err(ExceptionCode::IllegalDataValue);
                }
                let start = u16::from_be_bytes([pdu[1], pdu[2]]);
                let quantity = u16::from_be_bytes([pdu[3], pdu[4]]);
                if quantity == 0 || quantity > MAX_READ_QUANTITY {
                    return Err(ExceptionCode::IllegalDataValue);
                }
                Ok(Request::ReadHoldingRegisters { start, quantity })
            }
            _ => Err(ExceptionCode::IllegalFunction),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    ReadHoldingRegisters(Vec<u16>),
    Exception { function: u8, code: ExceptionCode },
}

impl Response {
    pub fn exception(function: u8, code: ExceptionCode) -> Self {
        Response::Exception {
            function: function & !EXCEPTION_FLAG,
            code,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Response::ReadHoldingRegisters(values) => {
                let mut pdu = Vec::with_capacity(2 + values.len() * 2);
                pdu.push(FC_READ_HOLDING_REGISTERS);
                pdu.push((values.len() * 2) as u8);
                for value in values {
                    pdu.extend_from_slice(&value.to_be_bytes());
                }
                pdu
            }
            Response::Exception { function, code } => {
                vec![function | EXCEPTION_FLAG, code.code()]
            }
        }
    }

    pub fn decode(pdu: &[u8]) -> Result<Self, ModbusError> {
        let function = *pdu
            .first()
            .ok_or_else(|| ModbusError::Malformed("empty PDU".to_string()))?;

        if function & EXCEPTION_FLAG != 0 {
            let code = pdu
                .get(1)
                .copied()
                .ok_or_else(|| ModbusError::Malformed("exception without code".to_string()))?;
            return Ok(Response::exception(function, ExceptionCode::from_code(code)));
        }

        match function {
            FC_READ_HOLDING_REGISTERS => {
                let byte_count = *pdu
                    .get(1)
                    .ok_or_else(|| ModbusError::Malformed("missing byte count".to_string()))?
                    as usize;
                let data = &pdu[2..];
                if byte_count % 2 != 0 || data.len() != byte_count {
                    return Err(ModbusError::Malformed(format!(
                        "byte count {} does not match {} data bytes",
                        byte_count,
                        data.len()
                    )));
                }
                let values = data
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                Ok(Response::ReadHoldingRegisters(values))
            }
            other => Err(ModbusError::Malformed(format!(
                "unsupported function code 0x{other:02x}"
            ))),
        }
    }
}

/// Read one ADU. Returns `Ok(None)` when the peer closed the stream cleanly
/// between frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<(MbapHeader, Vec<u8>)>, ModbusError>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; MBAP_LEN];
    let first = reader.read(&mut header_buf).await?;
    if first == 0 {
        return Ok(None);
    }
    // a close after the first byte is a truncated frame, not a clean close
    match reader.read_exact(&mut header_buf[first..]).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ModbusError::Malformed(format!(
                "connection closed inside MBAP header ({} of {} bytes)",
                first, MBAP_LEN
            )));
        }
        Err(e) => return Err(e.into()),
    }

    let header = MbapHeader::decode(&header_buf)?;
    let mut pdu = vec![0u8; header.pdu_len()];
    reader.read_exact(&mut pdu).await?;
    Ok(Some((header, pdu)))
}

pub async fn write_frame<W>(
    writer: &mut W,
    transaction_id: u16,
    unit_id: u8,
    pdu: &[u8],
) -> Result<(), ModbusError>
where
    W: AsyncWrite + Unpin,
{
    let header = MbapHeader::for_pdu(transaction_id, unit_id, pdu.len());
    let mut adu = Vec::with_capacity(MBAP_LEN + pdu.len());
    adu.extend_from_slice(&header.encode());
    adu.extend_from_slice(pdu);
    writer.write_all(&adu).await?;
    writer.flush().await?;
    Ok(())
}
