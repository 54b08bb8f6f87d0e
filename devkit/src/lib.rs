/*!
# NXD DevKit - test doubles for the telemetry pipeline

Lets gateway tests run without real PLCs or a cloud endpoint:
- In-process Modbus TCP devices backed by a plain register map
- Scriptable ingestion endpoint capturing every POSTed body
- JSON path assertions on captured payloads
*/

pub mod device_harness;
pub mod mock_ingest;

pub use device_harness::{spawn_device, DeviceHandle};
pub use mock_ingest::{get_nested_field, MockIngest};
