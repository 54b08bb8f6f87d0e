//! Register Responder - the TCP side of a simulated device
//!
//! Answers read-holding-registers requests against whatever the device's
//! register bank holds at that instant. Answering never advances the
//! simulation. Each connection gets its own task; a broken connection only
//! ends that task, and accept errors are logged without stopping the
//! listener.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::frame::{self, ExceptionCode, ModbusError, Request, Response};
use crate::registers::RegisterBank;
use crate::state::Shared;

/// Unit ids every device answers regardless of its station id.
const BROADCAST_UNITS: [u8; 2] = [0x00, 0xFF];

pub struct Responder<B> {
    listener: TcpListener,
    bank: Shared<B>,
    station_id: u8,
}

impl<B> Responder<B>
where
    B: RegisterBank + Send + 'static,
{
    pub async fn bind(addr: &str, bank: Shared<B>, station_id: u8) -> Result<Self, ModbusError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            bank,
            station_id,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop, runs for the life of the process.
    pub async fn run(self) {
        if let Ok(addr) = self.local_addr() {
            info!("Register responder listening on {} (station {})", addr, self.station_id);
        }

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!("Accepted connection from {}", peer);
                    let bank = self.bank.clone();
                    let station_id = self.station_id;
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, bank, station_id).await {
                            warn!("Connection {} closed: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}

async fn serve_connection<B: RegisterBank>(
    mut stream: TcpStream,
    bank: Shared<B>,
    station_id: u8,
) -> Result<(), ModbusError> {
    while let Some((header, pdu)) = frame::read_frame(&mut stream).await? {
        let response = {
            let bank = bank.lock();
            answer(&*bank, station_id, header.unit_id, &pdu)
        };
        frame::write_frame(&mut stream, header.transaction_id, header.unit_id, &response.encode())
            .await?;
    }
    Ok(())
}

/// Build the response for one request PDU. Pure lookup on `bank`.
pub fn answer<B: RegisterBank + ?Sized>(bank: &B, station_id: u8, unit_id: u8, pdu: &[u8]) -> Response {
    let function = pdu.first().copied().unwrap_or(0);

    if unit_id != station_id && !BROADCAST_UNITS.contains(&unit_id) {
        return Response::exception(function, ExceptionCode::GatewayTargetFailedToRespond);
    }

    match Request::decode(pdu) {
        Ok(Request::ReadHoldingRegisters { start, quantity }) => {
            Response::ReadHoldingRegisters(bank.read_block(start, quantity))
        }
        Err(code) => Response::exception(function, code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ModbusTcpClient;
    use crate::registers::RegisterMap;
    use crate::state::new_state;

    fn scenario_registers() -> RegisterMap {
        RegisterMap::from_pairs([
            (0, 1),
            (1, 650),
            (2, 1200),
            (3, 450),
            (4, 0),
            (5, 0),
            (6, 0),
            (7, 95),
            (8, 0),
            (9, 850),
        ])
    }

    #[test]
    fn test_answer_default_fills_outside_window() {
        let bank = scenario_registers();
        let pdu = Request::ReadHoldingRegisters { start: 8, quantity: 5 }.encode();

        assert_eq!(
            answer(&bank, 1, 1, &pdu),
            Response::ReadHoldingRegisters(vec![0, 850, 0, 0, 0])
        );
    }

    #[test]
    fn test_answer_wrong_unit() {
        let bank = scenario_registers();
        let pdu = Request::ReadHoldingRegisters { start: 0, quantity: 10 }.encode();

        assert_eq!(
            answer(&bank, 1, 7, &pdu),
            Response::exception(0x03, ExceptionCode::GatewayTargetFailedToRespond)
        );
        assert!(matches!(
            answer(&bank, 1, 0xFF, &pdu),
            Response::ReadHoldingRegisters(_)
        ));
    }

    #[test]
    fn test_answer_unsupported_function() {
        let bank = scenario_registers();
        assert_eq!(
            answer(&bank, 1, 1, &[0x10, 0x00, 0x00]),
            Response::exception(0x10, ExceptionCode::IllegalFunction)
        );
    }

    #[tokio::test]
    async fn test_block_read_over_tcp() {
        let bank = new_state(scenario_registers());
        let responder = Responder::bind("127.0.0.1:0", bank.clone(), 1).await.unwrap();
        let addr = responder.local_addr().unwrap();
        tokio::spawn(responder.run());

        let mut client = ModbusTcpClient::connect("127.0.0.1", addr.port(), 1).await.unwrap();
        let values = client.read_holding_registers(0, 10).await.unwrap();
        assert_eq!(values, vec![1, 650, 1200, 450, 0, 0, 0, 95, 0, 850]);

        // the responder always serves the bank's current contents
        bank.lock().set(7, 42);
        let values = client.read_holding_registers(7, 1).await.unwrap();
        assert_eq!(values, vec![42]);
    }

    #[tokio::test]
    async fn test_exception_surfaces_as_error() {
        let bank = new_state(scenario_registers());
        let responder = Responder::bind("127.0.0.1:0", bank, 2).await.unwrap();
        let addr = responder.local_addr().unwrap();
        tokio::spawn(responder.run());

        let mut client = ModbusTcpClient::connect("127.0.0.1", addr.port(), 5).await.unwrap();
        let err = client.read_holding_registers(0, 10).await.unwrap_err();
        assert!(matches!(
            err,
            ModbusError::Exception {
                code: ExceptionCode::GatewayTargetFailedToRespond,
                ..
            }
        ));
    }
}
