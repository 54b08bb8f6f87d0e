//! Block-read client used by the gateway.
//!
//! One client wraps one TCP connection; dropping it closes the socket.

use tokio::net::TcpStream;
use tracing::debug;

use crate::frame::{self, ModbusError, Request, Response};

pub struct ModbusTcpClient {
    stream: TcpStream,
    unit_id: u8,
    next_transaction: u16,
}

impl ModbusTcpClient {
    pub async fn connect(host: &str, port: u16, unit_id: u8) -> Result<Self, ModbusError> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        debug!("Connected to {}:{} (unit {})", host, port, unit_id);
        Ok(Self {
            stream,
            unit_id,
            next_transaction: 1,
        })
    }

    /// Function 0x03. Returns exactly `quantity` values or an error.
    pub async fn read_holding_registers(
        &mut self,
        start: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, ModbusError> {
        let transaction_id = self.next_transaction;
        self.next_transaction = self.next_transaction.wrapping_add(1);

        let request = Request::ReadHoldingRegisters { start, quantity };
        frame::write_frame(&mut self.stream, transaction_id, self.unit_id, &request.encode())
            .await?;

        let (header, pdu) = frame::read_frame(&mut self.stream)
            .await?
            .ok_or(ModbusError::Closed)?;

        if header.transaction_id != transaction_id {
            return Err(ModbusError::TransactionMismatch {
                sent: transaction_id,
                received: header.transaction_id,
            });
        }

        match Response::decode(&pdu)? {
            Response::ReadHoldingRegisters(values) if values.len() == quantity as usize => Ok(values),
            Response::ReadHoldingRegisters(values) => Err(ModbusError::Malformed(format!(
                "asked for {} registers, got {}",
                quantity,
                values.len()
            ))),
            Response::Exception { function, code } => Err(ModbusError::Exception { function, code }),
        }
    }
}
