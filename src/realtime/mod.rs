pub mod broker;
pub mod channel;

pub use broker::{Broker, ConnId, DynBroker, Frame, LocalBroker};
pub use channel::{ChannelSession, ChatHub, FrameOutcome};
