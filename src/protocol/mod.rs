//! High-level components of the device-management link: address
//! management, periodic report publication, and CAN transport.
pub mod management;
pub mod publish;
pub mod transport;
