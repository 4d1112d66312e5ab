mod channel;
mod connection;
mod endpoint;
mod protocol;
mod socket;
mod tracking;
mod udp_socket;

pub use channel::PeerChannel;
pub use connection::{ClientConnection, ConnectionManager, ConnectionState};
pub use endpoint::{NetworkEndpoint, NetworkStats};
pub use protocol::{
    DEFAULT_PORT, DEFAULT_TICK_RATE, FRAME_HEADER_SIZE, Frame, FrameFlags, FrameHeader,
    MAX_PACKET_SIZE, MAX_PAYLOAD_SIZE, PROTOCOL_MAGIC, PROTOCOL_VERSION, sequence_greater_than,
};
pub use socket::{Channel, MemorySocket, SentPacket, Socket};
pub use tracking::{AckTracker, ReceiveTracker};
pub use udp_socket::UdpPeerSocket;
