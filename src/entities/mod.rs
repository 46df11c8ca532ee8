mod bid_reply;
mod bid_request;
mod checkout;
mod contact;
mod refund;
mod wallet;

pub use bid_reply::{BidDraft, BidReply, Status as ReplyStatus};
pub use bid_request::{
    display_id, Budget, BidRequest, NewBidRequest, Status as RequestStatus, Urgency, Vehicle,
    MAX_IMAGES,
};
pub use checkout::{CheckoutRequest, CheckoutSession, TopUpRedirect, WALLET_CREDIT_KIND};
pub use contact::{Contact, ContactLink};
pub use refund::{Priority, RefundRequest, Status as RefundStatus};
pub use wallet::{
    validate_top_up, TransactionKind, TransactionStatus, Wallet, WalletTransaction, BID_COST,
    DEFAULT_CURRENCY, MAX_TOP_UP, MIN_TOP_UP,
};

#[cfg(test)]
pub use refund::sample_refund;
