use commons::Token;
use concordium_std::*;

use crate::state::{Auction, AuctionState};

/// Parameter for `NftAuction.create`.
#[derive(Debug, Clone, Serialize, SchemaType)]
pub struct CreateParams {
    /// The token to put up for auction.
    pub token: Token,
    /// Minimum admissible first bid.
    pub start_price: Amount,
    /// Length of the bidding window, which opens at the creation slot time.
    pub duration: Duration,
}

/// Read-only projection of an auction record.
#[derive(Debug, Clone, Serialize, SchemaType, PartialEq, Eq)]
pub struct AuctionView {
    pub seller: AccountAddress,
    pub token: Token,
    pub start_price: Amount,
    pub start: Timestamp,
    pub duration: Duration,
    pub state: AuctionState,
    /// Current leader, if a bid has been placed.
    pub max_bidder: Option<AccountAddress>,
    /// Highest bid, or the start price floor while no bid exists.
    pub max_price: Amount,
    /// Whether the engine currently holds the token for this auction.
    pub escrow_held: bool,
    /// Slot time of settlement, once ended under the current engine.
    pub settled_at: Option<Timestamp>,
}

impl From<Auction> for AuctionView {
    fn from(auction: Auction) -> Self {
        Self {
            max_bidder: auction.highest_bid.as_ref().map(|bid| bid.account),
            max_price: auction.current_price(),
            escrow_held: auction.is_open(),
            seller: auction.seller,
            token: auction.token,
            start_price: auction.start_price,
            start: auction.start,
            duration: auction.duration,
            state: auction.state,
            settled_at: auction.settled_at,
        }
    }
}
