pub mod authorizor;
mod conversation;
mod marketplace;
mod session;
mod user;

pub use conversation::Conversation;
pub use marketplace::Marketplace;
pub use session::{Capabilities, Capability, Session};
pub use user::{Role, User};
