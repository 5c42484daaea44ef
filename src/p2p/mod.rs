// P2P module: typed message protocol, peer-channel primitive, and the
// message service that rides on established channels

pub mod protocol;
pub mod service;
pub mod transport;

pub use protocol::{MessagePayload, PlayerAction, ProtocolMessage};
pub use service::{P2pEvent, P2pService};
pub use transport::PeerChannel;
