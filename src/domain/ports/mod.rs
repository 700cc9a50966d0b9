mod decoder_port;
mod display_target_port;
mod transport_port;

pub use decoder_port::DecoderPort;
pub use display_target_port::DisplayTarget;
pub use transport_port::TransportPort;
