pub mod protocol;
pub mod relay;

pub use relay::{serve_relay, TcpRelayer};
