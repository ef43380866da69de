//! Network-management plane: address claiming at startup and address
//! defense/recovery while the node is live.
pub mod address_claiming;
pub mod address_manager;
