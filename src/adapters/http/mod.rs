pub mod server;
pub mod sink;

pub use server::HyperServer;
pub use sink::{ChannelResponse, ChannelSink, ResponseHead};
