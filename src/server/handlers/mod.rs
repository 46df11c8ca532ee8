pub mod bids;
pub mod refunds;
pub mod requests;
pub mod sessions;
pub mod wallet;
