//! Auction engine for CIS-2 NFTs.
//!
//! Sellers lock a token into escrow, bidders raise each other with attached
//! CCD within a bounded window, and settlement atomically moves the token to
//! the winner and the winning bid to the seller. Superseded bids become
//! claimable balances that their bidders withdraw themselves.
#![cfg_attr(not(feature = "std"), no_std)]

mod contract;
mod events;
mod external;
mod nft;
mod state;

pub use crate::external::CreateParams;
