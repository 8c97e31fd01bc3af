use commons::{AuctionId, Token, BID_TAG, CLAIM_TAG, CREATE_TAG, FINALIZE_TAG, RETURN_TAG};
use concordium_std::*;

/// Auction creation event data.
#[derive(Debug, Serial)]
pub struct CreateEvent<'a> {
    /// Auction identifier.
    pub auction_id: AuctionId,
    /// The token locked into escrow.
    pub token: &'a Token,
    /// Seller account address.
    pub seller: &'a AccountAddress,
    /// Minimum admissible first bid.
    pub start_price: Amount,
    /// Length of the bidding window.
    pub duration: Duration,
}

/// Bid event data.
#[derive(Debug, Serial)]
pub struct BidEvent<'a> {
    /// Auction identifier.
    pub auction_id: AuctionId,
    /// Bidder account address.
    pub bidder: &'a AccountAddress,
    /// Bid amount.
    pub amount: Amount,
}

/// Settlement event data for an auction that found a winner.
#[derive(Debug, Serial)]
pub struct FinalizeEvent<'a> {
    /// Auction identifier.
    pub auction_id: AuctionId,
    /// Seller account address.
    pub seller: &'a AccountAddress,
    /// Address of the auction winner.
    pub winner: &'a AccountAddress,
    /// Winning bid, paid out to the seller.
    pub price: Amount,
}

/// Settlement event data for an auction that ended without bids.
#[derive(Debug, Serial)]
pub struct ReturnEvent<'a> {
    /// Auction identifier.
    pub auction_id: AuctionId,
    /// Seller account address the token returns to.
    pub seller: &'a AccountAddress,
}

/// Claim event data.
#[derive(Debug, Serial)]
pub struct ClaimEvent<'a> {
    /// Account withdrawing its claimable balance.
    pub account: &'a AccountAddress,
    /// Withdrawn amount.
    pub amount: Amount,
}

/// Tagged Custom event to be serialized for the event log.
#[derive(Debug)]
pub enum AuctionEvents<'a> {
    Create(CreateEvent<'a>),
    Bid(BidEvent<'a>),
    Finalize(FinalizeEvent<'a>),
    Return(ReturnEvent<'a>),
    Claim(ClaimEvent<'a>),
}

impl<'a> AuctionEvents<'a> {
    pub fn create(
        auction_id: AuctionId,
        token: &'a Token,
        seller: &'a AccountAddress,
        start_price: Amount,
        duration: Duration,
    ) -> Self {
        Self::Create(CreateEvent {
            auction_id,
            token,
            seller,
            start_price,
            duration,
        })
    }

    pub fn bid(auction_id: AuctionId, bidder: &'a AccountAddress, amount: Amount) -> Self {
        Self::Bid(BidEvent {
            auction_id,
            bidder,
            amount,
        })
    }

    pub fn finalize(
        auction_id: AuctionId,
        seller: &'a AccountAddress,
        winner: &'a AccountAddress,
        price: Amount,
    ) -> Self {
        Self::Finalize(FinalizeEvent {
            auction_id,
            seller,
            winner,
            price,
        })
    }

    pub fn token_return(auction_id: AuctionId, seller: &'a AccountAddress) -> Self {
        Self::Return(ReturnEvent { auction_id, seller })
    }

    pub fn claim(account: &'a AccountAddress, amount: Amount) -> Self {
        Self::Claim(ClaimEvent { account, amount })
    }
}

impl<'a> Serial for AuctionEvents<'a> {
    fn serial<W: Write>(&self, out: &mut W) -> Result<(), W::Err> {
        match self {
            AuctionEvents::Create(event) => {
                out.write_u8(CREATE_TAG)?;
                event.serial(out)
            }
            AuctionEvents::Bid(event) => {
                out.write_u8(BID_TAG)?;
                event.serial(out)
            }
            AuctionEvents::Finalize(event) => {
                out.write_u8(FINALIZE_TAG)?;
                event.serial(out)
            }
            AuctionEvents::Return(event) => {
                out.write_u8(RETURN_TAG)?;
                event.serial(out)
            }
            AuctionEvents::Claim(event) => {
                out.write_u8(CLAIM_TAG)?;
                event.serial(out)
            }
        }
    }
}
