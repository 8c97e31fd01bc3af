use commons::{AuctionId, CustomContractError, Token};
use concordium_std::*;

/// The lifecycle state of a single auction.
#[derive(Debug, Clone, Copy, Serialize, SchemaType, PartialEq, Eq)]
pub enum AuctionState {
    /// Accepting bids; the token is held in escrow by the engine.
    Open,
    /// Settled. The record is retained for audit and never mutated again.
    Ended,
}

/// A recorded bid.
#[derive(Debug, Clone, Serialize, SchemaType, PartialEq, Eq)]
pub struct Bid {
    pub account: AccountAddress,
    pub amount: Amount,
    pub timestamp: Timestamp,
}

/// Auction record fields as written by the first released engine.
#[derive(Debug, Clone, Serialize, SchemaType, PartialEq, Eq)]
pub struct AuctionV1 {
    /// Seller account address.
    pub seller: AccountAddress,
    /// The token under auction.
    pub token: Token,
    /// Minimum admissible first bid.
    pub start_price: Amount,
    /// Start of the bidding window.
    pub start: Timestamp,
    /// Length of the bidding window. Bids are accepted while
    /// `slot_time < start + duration`.
    pub duration: Duration,
    /// Current highest bid. `None` until the first valid bid.
    pub highest_bid: Option<Bid>,
    pub state: AuctionState,
}

/// Current auction record. Extends the v1 layout with `settled_at`.
#[derive(Debug, Clone, Serialize, SchemaType, PartialEq, Eq)]
pub struct Auction {
    /// Seller account address.
    pub seller: AccountAddress,
    /// The token under auction.
    pub token: Token,
    /// Minimum admissible first bid.
    pub start_price: Amount,
    /// Start of the bidding window.
    pub start: Timestamp,
    /// Length of the bidding window. Bids are accepted while
    /// `slot_time < start + duration`.
    pub duration: Duration,
    /// Current highest bid. `None` until the first valid bid.
    pub highest_bid: Option<Bid>,
    pub state: AuctionState,
    /// Slot time at which the auction was settled. `None` while open and for
    /// records written before this field existed.
    pub settled_at: Option<Timestamp>,
}

impl Auction {
    /// End of the bidding window. Overflow is ruled out when the record is
    /// created.
    pub fn end_time(&self) -> Timestamp {
        self.start
            .checked_add(self.duration)
            .unwrap_or_else(|| Timestamp::from_timestamp_millis(u64::MAX))
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, AuctionState::Open)
    }

    /// Highest price reached so far, or the start price as the informational
    /// floor while no bid has been placed.
    pub fn current_price(&self) -> Amount {
        self.highest_bid
            .as_ref()
            .map(|bid| bid.amount)
            .unwrap_or(self.start_price)
    }
}

/// Stored form of an auction record.
///
/// The layout is append-only: every engine version keeps decoding the tags
/// written before it, and new fields only ever appear behind a new tag.
#[derive(Debug, Clone, Serialize, SchemaType, PartialEq, Eq)]
pub enum StoredAuction {
    V1(AuctionV1),
    V2(Auction),
}

impl From<StoredAuction> for Auction {
    fn from(stored: StoredAuction) -> Self {
        match stored {
            StoredAuction::V1(v1) => Auction {
                seller: v1.seller,
                token: v1.token,
                start_price: v1.start_price,
                start: v1.start,
                duration: v1.duration,
                highest_bid: v1.highest_bid,
                state: v1.state,
                settled_at: None,
            },
            StoredAuction::V2(auction) => auction,
        }
    }
}

/// Append-only collection of auction records, keyed by sequential id.
#[derive(Serial, DeserialWithState)]
#[concordium(state_parameter = "S")]
pub struct AuctionRegistry<S: HasStateApi> {
    pub(crate) next_id: AuctionId,
    pub(crate) auctions: StateMap<AuctionId, StoredAuction, S>,
}

impl<S: HasStateApi> AuctionRegistry<S> {
    pub fn empty(state_builder: &mut StateBuilder<S>) -> Self {
        Self {
            next_id: 0,
            auctions: state_builder.new_map(),
        }
    }

    /// Reserve the next sequential id. A reserved id only becomes observable
    /// once a record is stored under it.
    fn allocate(&mut self) -> AuctionId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Read a record, widening older stored layouts to the current one.
    pub fn get(&self, id: AuctionId) -> Option<Auction> {
        self.auctions
            .get(&id)
            .map(|stored| Auction::from((*stored).clone()))
    }

    /// Write a record in the current layout.
    fn put(&mut self, id: AuctionId, auction: Auction) {
        self.auctions.insert(id, StoredAuction::V2(auction));
    }
}

/// Settlement duties produced by finalizing an auction. Every transfer listed
/// here must be carried out within the same invocation.
#[must_use]
pub struct Settlement {
    pub token: Token,
    pub seller: AccountAddress,
    /// Winning bid: token goes to the bidder, the amount to the seller.
    /// `None` settles by returning the token to the seller.
    pub winning_bid: Option<Bid>,
}

/// The contract state: the auction registry plus the custody and funds
/// bookkeeping shared by all auctions.
#[derive(Serial, DeserialWithState)]
#[concordium(state_parameter = "S")]
pub struct State<S: HasStateApi> {
    /// Auction records.
    pub registry: AuctionRegistry<S>,
    /// Tokens currently held in escrow, keyed to the owning auction.
    pub escrowed: StateMap<Token, AuctionId, S>,
    /// Claimable balances of superseded bidders.
    pub pending_returns: StateMap<AccountAddress, Amount, S>,
}

impl<S: HasStateApi> State<S> {
    /// Create a new state with no auctions.
    pub fn empty(state_builder: &mut StateBuilder<S>) -> Self {
        State {
            registry: AuctionRegistry::empty(state_builder),
            escrowed: state_builder.new_map(),
            pending_returns: state_builder.new_map(),
        }
    }

    /// Write a new `Open` auction record and index its escrow entry. The
    /// custody lock for the token must follow within the same invocation.
    pub fn create(
        &mut self,
        seller: AccountAddress,
        token: Token,
        start_price: Amount,
        duration: Duration,
        slot_time: Timestamp,
    ) -> Result<AuctionId, CustomContractError> {
        ensure!(duration.millis() > 0, CustomContractError::InvalidDuration);
        // The window end must stay representable.
        ensure!(
            slot_time.checked_add(duration).is_some(),
            CustomContractError::InvalidDuration
        );
        ensure!(
            self.escrowed.get(&token).is_none(),
            CustomContractError::TokenAlreadyInAuction
        );

        let id = self.registry.allocate();
        self.registry.put(
            id,
            Auction {
                seller,
                token: token.clone(),
                start_price,
                start: slot_time,
                duration,
                highest_bid: None,
                state: AuctionState::Open,
                settled_at: None,
            },
        );
        self.escrowed.insert(token, id);

        Ok(id)
    }

    /// Apply a bid. The superseded bid, if any, is credited to its bidder's
    /// claimable balance.
    pub fn bid(
        &mut self,
        id: AuctionId,
        bidder: AccountAddress,
        amount: Amount,
        slot_time: Timestamp,
    ) -> Result<(), CustomContractError> {
        let mut auction = self
            .registry
            .get(id)
            .ok_or(CustomContractError::UnknownAuction)?;

        ensure!(auction.is_open(), CustomContractError::AuctionFinalized);
        // The window is closed at its upper end: a bid arriving at the exact
        // expiry instant is rejected.
        ensure!(
            slot_time < auction.end_time(),
            CustomContractError::AuctionFinished
        );
        ensure_ne!(
            bidder,
            auction.seller,
            CustomContractError::OwnerForbidden
        );

        match &auction.highest_bid {
            // Later bids must strictly raise the price; an equal amount never
            // replaces the current leader.
            Some(highest) => ensure!(amount > highest.amount, CustomContractError::BidTooLow),
            // The start price is an informational floor: a first bid equal to
            // it is admissible.
            None => ensure!(
                amount >= auction.start_price && amount > Amount::zero(),
                CustomContractError::BidTooLow
            ),
        }

        let superseded = auction.highest_bid.replace(Bid {
            account: bidder,
            amount,
            timestamp: slot_time,
        });
        if let Some(previous) = superseded {
            self.credit_pending_return(previous.account, previous.amount);
        }
        self.registry.put(id, auction);

        Ok(())
    }

    /// Flip an auction to `Ended` and drop its escrow index entry. The
    /// returned settlement must be carried out by the caller.
    pub fn finalize(
        &mut self,
        id: AuctionId,
        slot_time: Timestamp,
    ) -> Result<Settlement, CustomContractError> {
        let mut auction = self
            .registry
            .get(id)
            .ok_or(CustomContractError::UnknownAuction)?;

        ensure!(auction.is_open(), CustomContractError::AuctionFinalized);
        ensure!(
            slot_time >= auction.end_time(),
            CustomContractError::AuctionStillActive
        );

        auction.state = AuctionState::Ended;
        auction.settled_at = Some(slot_time);
        self.escrowed.remove(&auction.token);

        let settlement = Settlement {
            token: auction.token.clone(),
            seller: auction.seller,
            winning_bid: auction.highest_bid.clone(),
        };
        self.registry.put(id, auction);

        Ok(settlement)
    }

    /// Remove and return an account's entire claimable balance.
    pub fn claim(&mut self, account: AccountAddress) -> Result<Amount, CustomContractError> {
        self.pending_returns
            .remove_and_get(&account)
            .ok_or(CustomContractError::NothingToClaim)
    }

    fn credit_pending_return(&mut self, account: AccountAddress, amount: Amount) {
        let mut balance = self
            .pending_returns
            .entry(account)
            .or_insert_with(Amount::zero);
        *balance += amount;
    }
}

#[concordium_cfg_test]
mod tests {
    use super::*;
    use concordium_std::test_infrastructure::*;

    const SELLER: AccountAddress = AccountAddress([1u8; 32]);
    const ALICE: AccountAddress = AccountAddress([2u8; 32]);

    const NFT_CONTRACT: ContractAddress = ContractAddress {
        index: 1,
        subindex: 0,
    };

    fn token_0() -> Token {
        Token {
            contract: NFT_CONTRACT,
            id: concordium_cis2::TokenIdVec(vec![0, 1]),
        }
    }

    #[concordium_test]
    /// Ids are handed out sequentially and are never reused, even for tokens
    /// that go through several auctions.
    fn test_registry_ids_sequential() {
        let mut state_builder = TestStateBuilder::new();
        let mut state = State::empty(&mut state_builder);

        let start = Timestamp::from_timestamp_millis(0);
        let duration = Duration::from_millis(1_000);

        let first = state
            .create(SELLER, token_0(), Amount::from_micro_ccd(10), duration, start)
            .expect("First auction should be created");
        claim_eq!(first, 0);

        let settlement = state
            .finalize(first, Timestamp::from_timestamp_millis(1_000))
            .expect("Finalizing should pass");
        claim_eq!(settlement.seller, SELLER);

        let second = state
            .create(SELLER, token_0(), Amount::from_micro_ccd(10), duration, start)
            .expect("Re-auctioning a settled token should be allowed");
        claim_eq!(second, 1);
    }

    #[concordium_test]
    /// A record stored in the v1 layout reads back with identical field
    /// meanings; the field added later defaults to `None`.
    fn test_v1_record_widens() {
        let mut state_builder = TestStateBuilder::new();
        let mut state = State::empty(&mut state_builder);

        let v1 = AuctionV1 {
            seller: SELLER,
            token: token_0(),
            start_price: Amount::from_micro_ccd(10_000),
            start: Timestamp::from_timestamp_millis(100),
            duration: Duration::from_millis(10_000),
            highest_bid: Some(Bid {
                account: ALICE,
                amount: Amount::from_micro_ccd(10_000),
                timestamp: Timestamp::from_timestamp_millis(200),
            }),
            state: AuctionState::Open,
        };
        state
            .registry
            .auctions
            .insert(0, StoredAuction::V1(v1.clone()));
        state.registry.next_id = 1;

        let auction = state.registry.get(0).expect("Record should be readable");
        claim_eq!(auction.seller, v1.seller);
        claim_eq!(auction.token, v1.token);
        claim_eq!(auction.start_price, v1.start_price);
        claim_eq!(auction.start, v1.start);
        claim_eq!(auction.duration, v1.duration);
        claim_eq!(auction.highest_bid, v1.highest_bid);
        claim_eq!(auction.state, v1.state);
        claim_eq!(auction.settled_at, None);
    }

    #[concordium_test]
    /// A token cannot back two open auctions at once.
    fn test_create_duplicate_token() {
        let mut state_builder = TestStateBuilder::new();
        let mut state = State::empty(&mut state_builder);

        let start = Timestamp::from_timestamp_millis(0);
        let duration = Duration::from_millis(1_000);

        state
            .create(SELLER, token_0(), Amount::zero(), duration, start)
            .expect("First auction should be created");
        let second = state.create(SELLER, token_0(), Amount::zero(), duration, start);
        claim_eq!(second, Err(CustomContractError::TokenAlreadyInAuction));
    }
}
