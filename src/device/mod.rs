pub mod btle;
pub mod codec;
pub mod constants;
pub mod discovery;
pub mod session;
pub mod transport;
pub mod types;
