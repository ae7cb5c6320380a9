pub mod latest_message;
pub mod store;

pub use latest_message::LatestMessage;
pub use store::{BlockNode, Store};
