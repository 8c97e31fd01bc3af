use commons::{AuctionId, ContractTokenAmount, ContractTokenId, CustomContractError};
use concordium_cis2::OnReceivingCis2Params;
use concordium_std::*;

use crate::events::*;
use crate::external::*;
use crate::nft;
use crate::state::{Settlement, State};

// Account on whose behalf the call is made: the sender directly, or the
// transaction signer when the call arrives through a forwarding contract.
fn calling_account(ctx: &impl HasReceiveContext) -> AccountAddress {
    match ctx.sender() {
        Address::Account(account) => account,
        Address::Contract(_) => ctx.invoker(),
    }
}

/// Initialize the auction engine with an empty registry.
#[init(contract = "NftAuction")]
fn contract_init<S: HasStateApi>(
    _ctx: &impl HasInitContext,
    state_builder: &mut StateBuilder<S>,
) -> InitResult<State<S>> {
    Ok(State::empty(state_builder))
}

/// Start an auction: writes a new `Open` record and pulls the token into
/// escrow. Returns the id of the new auction.
///
/// The seller must have made this contract an operator on the asset contract
/// before calling.
///
/// It rejects if:
/// - the bidding window has zero length or its end is not representable;
/// - the token already backs another open auction;
/// - the seller does not hold the token or has not authorized the engine.
#[receive(
    mutable,
    contract = "NftAuction",
    name = "create",
    parameter = "CreateParams",
    return_value = "AuctionId",
    enable_logger
)]
fn contract_create<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    logger: &mut impl HasLogger,
) -> ReceiveResult<AuctionId> {
    let params = CreateParams::deserial(&mut ctx.parameter_cursor())?;

    let seller = calling_account(ctx);

    nft::ensure_approved(host, ctx.self_address(), &params.token, seller)?;

    let slot_time = ctx.metadata().slot_time();
    let id = host.state_mut().create(
        seller,
        params.token.clone(),
        params.start_price,
        params.duration,
        slot_time,
    )?;

    logger.log(&AuctionEvents::create(
        id,
        &params.token,
        &seller,
        params.start_price,
        params.duration,
    ))?;

    // The record and escrow index are committed above; a failed pull rejects
    // the invocation and no record remains observable for the reserved id.
    nft::lock(host, ctx.self_address(), &params.token, seller)?;

    Ok(id)
}

/// Place a bid on an open auction. The attached CCD is the bid amount and is
/// held by the engine while the bid leads. The superseded bid, if any,
/// becomes claimable by its bidder.
///
/// It rejects if:
/// - no auction is registered under the id;
/// - the auction was finalized, or its window has elapsed;
/// - the bidder is the auction's seller;
/// - the amount does not exceed the current highest bid, or undercuts the
///   start price for the first bid.
#[receive(
    mutable,
    payable,
    contract = "NftAuction",
    name = "bid",
    parameter = "AuctionId",
    enable_logger
)]
fn contract_bid<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    amount: Amount,
    logger: &mut impl HasLogger,
) -> ReceiveResult<()> {
    let id = AuctionId::deserial(&mut ctx.parameter_cursor())?;

    let bidder = calling_account(ctx);

    host.state_mut()
        .bid(id, bidder, amount, ctx.metadata().slot_time())?;

    logger.log(&AuctionEvents::bid(id, &bidder, amount))?;

    Ok(())
}

/// Settle an auction once its window has elapsed. Callable by anyone.
///
/// With a winner, the token leaves escrow to the winner and the winning bid
/// is paid to the seller; without bids the token returns to the seller and no
/// funds move. Either way the record flips to `Ended` exactly once and is
/// kept for audit.
#[receive(
    mutable,
    contract = "NftAuction",
    name = "finalize",
    parameter = "AuctionId",
    enable_logger
)]
fn contract_finalize<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    logger: &mut impl HasLogger,
) -> ReceiveResult<()> {
    let id = AuctionId::deserial(&mut ctx.parameter_cursor())?;

    // All auction state is committed before the transfers below; a failed
    // transfer rejects the invocation and rolls the flip back.
    let Settlement {
        token,
        seller,
        winning_bid,
    } = host
        .state_mut()
        .finalize(id, ctx.metadata().slot_time())?;

    match winning_bid {
        Some(bid) => {
            logger.log(&AuctionEvents::finalize(id, &seller, &bid.account, bid.amount))?;

            nft::release(host, ctx.self_address(), &token, bid.account)?;
            host.invoke_transfer(&seller, bid.amount)?;
        }
        None => {
            logger.log(&AuctionEvents::token_return(id, &seller))?;

            nft::release(host, ctx.self_address(), &token, seller)?;
        }
    }

    Ok(())
}

/// Withdraw the caller's claimable balance accumulated from superseded bids.
#[receive(mutable, contract = "NftAuction", name = "claim", enable_logger)]
fn contract_claim<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    logger: &mut impl HasLogger,
) -> ReceiveResult<()> {
    let claimer = calling_account(ctx);

    // The balance leaves the table before the transfer is invoked.
    let amount = host.state_mut().claim(claimer)?;

    logger.log(&AuctionEvents::claim(&claimer, amount))?;

    host.invoke_transfer(&claimer, amount)?;

    Ok(())
}

/// Read-only projection of a single auction record.
#[receive(
    contract = "NftAuction",
    name = "view",
    parameter = "AuctionId",
    return_value = "AuctionView"
)]
fn contract_view<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &impl HasHost<State<S>, StateApiType = S>,
) -> ReceiveResult<AuctionView> {
    let id = AuctionId::deserial(&mut ctx.parameter_cursor())?;
    let auction = host
        .state()
        .registry
        .get(id)
        .ok_or(CustomContractError::UnknownAuction)?;

    Ok(AuctionView::from(auction))
}

/// Claimable balance of an account, zero when none was ever credited.
#[receive(
    contract = "NftAuction",
    name = "viewPendingReturn",
    parameter = "AccountAddress",
    return_value = "Amount"
)]
fn contract_view_pending_return<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &impl HasHost<State<S>, StateApiType = S>,
) -> ReceiveResult<Amount> {
    let account = AccountAddress::deserial(&mut ctx.parameter_cursor())?;

    Ok(host
        .state()
        .pending_returns
        .get(&account)
        .map(|amount| *amount)
        .unwrap_or_else(Amount::zero))
}

/// CIS-2 receive hook. The asset contract invokes it when this contract
/// receives a token, which only happens while `create` pulls one into escrow.
#[receive(
    contract = "NftAuction",
    name = "onReceivingCIS2",
    parameter = "OnReceivingCis2Params<ContractTokenId, ContractTokenAmount>"
)]
fn contract_on_cis2_received<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    _host: &impl HasHost<State<S>, StateApiType = S>,
) -> ReceiveResult<()> {
    ensure!(
        matches!(ctx.sender(), Address::Contract(_)),
        CustomContractError::ContractOnly.into()
    );

    let _params: OnReceivingCis2Params<ContractTokenId, ContractTokenAmount> =
        ctx.parameter_cursor().get()?;

    Ok(())
}

#[concordium_cfg_test]
mod tests {
    use super::*;
    use crate::state::{AuctionState, AuctionV1, Bid, StoredAuction};
    use commons::test::parse_and_ok_mock;
    use commons::{
        ContractBalanceOfQueryParams, ContractBalanceOfQueryResponse, Token, TransferParameter,
    };
    use concordium_cis2::{OperatorOfQueryParams, OperatorOfQueryResponse, TokenIdVec};
    use concordium_std::test_infrastructure::*;

    const SELLER: AccountAddress = AccountAddress([1u8; 32]);
    const ALICE: AccountAddress = AccountAddress([2u8; 32]);
    const BOB: AccountAddress = AccountAddress([3u8; 32]);

    const SELF_ADDRESS: ContractAddress = ContractAddress {
        index: 10,
        subindex: 0,
    };
    const NFT_CONTRACT: ContractAddress = ContractAddress {
        index: 1,
        subindex: 0,
    };

    // Slot times in milliseconds.
    const WINDOW_START: u64 = 1_000;
    const WINDOW_LENGTH: u64 = 10_000;

    // 0.01 CCD, the scenario start price.
    fn start_price() -> Amount {
        Amount::from_micro_ccd(10_000)
    }

    // A bid that comfortably beats the start price.
    fn raised_price() -> Amount {
        Amount::from_micro_ccd(20_000)
    }

    fn token_0() -> Token {
        Token {
            contract: NFT_CONTRACT,
            id: TokenIdVec(vec![0, 1]),
        }
    }

    fn create_params() -> CreateParams {
        CreateParams {
            token: token_0(),
            start_price: start_price(),
            duration: Duration::from_millis(WINDOW_LENGTH),
        }
    }

    fn new_ctx<'a>(sender: AccountAddress, slot_time: u64) -> TestReceiveContext<'a> {
        let mut ctx = TestReceiveContext::empty();
        ctx.set_sender(Address::Account(sender));
        ctx.set_self_address(SELF_ADDRESS);
        ctx.set_metadata_slot_time(Timestamp::from_timestamp_millis(slot_time));
        ctx
    }

    /// Host over an empty state with a well-behaved asset contract mocked in.
    fn new_host(seller_balance: u64, is_operator: bool) -> TestHost<State<TestStateApi>> {
        let mut state_builder = TestStateBuilder::new();
        let state = State::empty(&mut state_builder);
        let mut host = TestHost::new(state, state_builder);

        host.setup_mock_entrypoint(
            NFT_CONTRACT,
            OwnedEntrypointName::new_unchecked("balanceOf".into()),
            parse_and_ok_mock::<ContractBalanceOfQueryParams, _>(
                ContractBalanceOfQueryResponse::from(vec![ContractTokenAmount::from(
                    seller_balance,
                )]),
            ),
        );
        host.setup_mock_entrypoint(
            NFT_CONTRACT,
            OwnedEntrypointName::new_unchecked("operatorOf".into()),
            parse_and_ok_mock::<OperatorOfQueryParams, _>(OperatorOfQueryResponse::from(vec![
                is_operator,
            ])),
        );
        host.setup_mock_entrypoint(
            NFT_CONTRACT,
            OwnedEntrypointName::new_unchecked("transfer".into()),
            parse_and_ok_mock::<TransferParameter, _>(()),
        );

        host
    }

    /// Create the scenario auction, returning its id.
    fn create_auction(host: &mut TestHost<State<TestStateApi>>) -> AuctionId {
        let parameter_bytes = to_bytes(&create_params());
        let mut ctx = new_ctx(SELLER, WINDOW_START);
        ctx.set_parameter(&parameter_bytes);
        let mut logger = TestLogger::init();

        contract_create(&ctx, host, &mut logger).expect("Creating auction should pass")
    }

    fn bid(
        host: &mut TestHost<State<TestStateApi>>,
        id: AuctionId,
        bidder: AccountAddress,
        amount: Amount,
        slot_time: u64,
    ) -> ReceiveResult<()> {
        let parameter_bytes = to_bytes(&id);
        let mut ctx = new_ctx(bidder, slot_time);
        ctx.set_parameter(&parameter_bytes);
        let mut logger = TestLogger::init();

        contract_bid(&ctx, host, amount, &mut logger)
    }

    fn finalize(
        host: &mut TestHost<State<TestStateApi>>,
        id: AuctionId,
        sender: AccountAddress,
        slot_time: u64,
    ) -> ReceiveResult<()> {
        let parameter_bytes = to_bytes(&id);
        let mut ctx = new_ctx(sender, slot_time);
        ctx.set_parameter(&parameter_bytes);
        let mut logger = TestLogger::init();

        contract_finalize(&ctx, host, &mut logger)
    }

    fn pending_return(host: &TestHost<State<TestStateApi>>, account: AccountAddress) -> Option<Amount> {
        host.state().pending_returns.get(&account).map(|amount| *amount)
    }

    fn expect_error<E, T>(expr: Result<T, E>, err: E, msg: &str)
    where
        E: Eq + Debug,
        T: Debug,
    {
        let actual = expr.expect_err(msg);
        assert_eq!(actual, err);
    }

    #[concordium_test]
    /// Creation allocates id 0, records the window and start price, holds the
    /// token in escrow and leaves the floor without a bidder.
    fn test_create() {
        let mut host = new_host(1, true);
        let id = create_auction(&mut host);
        claim_eq!(id, 0);

        let auction = host.state().registry.get(id).expect("Record should exist");
        claim_eq!(auction.seller, SELLER);
        claim_eq!(auction.token, token_0());
        claim_eq!(auction.start_price, start_price());
        claim_eq!(auction.start, Timestamp::from_timestamp_millis(WINDOW_START));
        claim_eq!(auction.duration, Duration::from_millis(WINDOW_LENGTH));
        claim_eq!(auction.highest_bid, None);
        claim_eq!(auction.state, AuctionState::Open);
        claim_eq!(
            host.state().escrowed.get(&token_0()).map(|id| *id),
            Some(0)
        );
    }

    #[concordium_test]
    /// A seller that does not hold the token leaves no record behind.
    fn test_create_not_owner() {
        let mut host = new_host(0, true);

        let parameter_bytes = to_bytes(&create_params());
        let mut ctx = new_ctx(SELLER, WINDOW_START);
        ctx.set_parameter(&parameter_bytes);
        let mut logger = TestLogger::init();

        let result = contract_create(&ctx, &mut host, &mut logger);
        expect_error(
            result,
            CustomContractError::NotTokenOwner.into(),
            "Creating without holding the token should fail",
        );
        claim!(host.state().registry.get(0).is_none());
        claim!(host.state().escrowed.get(&token_0()).is_none());
    }

    #[concordium_test]
    /// A seller that has not authorized the engine leaves no record behind.
    fn test_create_not_operator() {
        let mut host = new_host(1, false);

        let parameter_bytes = to_bytes(&create_params());
        let mut ctx = new_ctx(SELLER, WINDOW_START);
        ctx.set_parameter(&parameter_bytes);
        let mut logger = TestLogger::init();

        let result = contract_create(&ctx, &mut host, &mut logger);
        expect_error(
            result,
            CustomContractError::NotOperator.into(),
            "Creating without approval should fail",
        );
        claim!(host.state().registry.get(0).is_none());
    }

    #[concordium_test]
    fn test_create_zero_duration() {
        let mut host = new_host(1, true);

        let parameter_bytes = to_bytes(&CreateParams {
            duration: Duration::from_millis(0),
            ..create_params()
        });
        let mut ctx = new_ctx(SELLER, WINDOW_START);
        ctx.set_parameter(&parameter_bytes);
        let mut logger = TestLogger::init();

        let result = contract_create(&ctx, &mut host, &mut logger);
        expect_error(
            result,
            CustomContractError::InvalidDuration.into(),
            "Creating with a zero window should fail",
        );
    }

    #[concordium_test]
    /// A first bid equal to the start price takes the lead; a later higher
    /// bid supersedes it and the first bidder's amount becomes claimable.
    fn test_bid_and_outbid() {
        let mut host = new_host(1, true);
        let id = create_auction(&mut host);

        bid(&mut host, id, ALICE, start_price(), WINDOW_START + 1)
            .expect("First bid at the start price should pass");

        let auction = host.state().registry.get(id).expect("Record should exist");
        claim_eq!(
            auction.highest_bid.as_ref().map(|bid| bid.account),
            Some(ALICE)
        );
        claim_eq!(pending_return(&host, ALICE), None);

        let raised = start_price() + Amount::from_micro_ccd(5_000);
        bid(&mut host, id, BOB, raised, WINDOW_START + 2).expect("Higher bid should pass");

        let auction = host.state().registry.get(id).expect("Record should exist");
        claim_eq!(
            auction.highest_bid.as_ref().map(|bid| bid.account),
            Some(BOB)
        );
        claim_eq!(auction.current_price(), raised);
        // The superseded amount is claimable the instant it is superseded.
        claim_eq!(pending_return(&host, ALICE), Some(start_price()));
    }

    #[concordium_test]
    /// Bids that do not strictly raise the price are rejected and change
    /// nothing.
    fn test_bid_too_low() {
        let mut host = new_host(1, true);
        let id = create_auction(&mut host);

        bid(&mut host, id, ALICE, start_price(), WINDOW_START + 1).expect("First bid should pass");

        let result = bid(&mut host, id, BOB, start_price(), WINDOW_START + 2);
        expect_error(
            result,
            CustomContractError::BidTooLow.into(),
            "An equal bid should not replace the leader",
        );

        let auction = host.state().registry.get(id).expect("Record should exist");
        claim_eq!(
            auction.highest_bid.as_ref().map(|bid| bid.account),
            Some(ALICE)
        );
        claim_eq!(pending_return(&host, ALICE), None);
    }

    #[concordium_test]
    /// A first bid below the start price is rejected.
    fn test_bid_below_start_price() {
        let mut host = new_host(1, true);
        let id = create_auction(&mut host);

        let result = bid(
            &mut host,
            id,
            ALICE,
            Amount::from_micro_ccd(9_999),
            WINDOW_START + 1,
        );
        expect_error(
            result,
            CustomContractError::BidTooLow.into(),
            "A bid under the start price should fail",
        );
    }

    #[concordium_test]
    /// The window is closed at its upper end: a bid arriving at the exact
    /// expiry instant is rejected.
    fn test_bid_at_expiry() {
        let mut host = new_host(1, true);
        let id = create_auction(&mut host);

        let result = bid(
            &mut host,
            id,
            ALICE,
            start_price(),
            WINDOW_START + WINDOW_LENGTH,
        );
        expect_error(
            result,
            CustomContractError::AuctionFinished.into(),
            "A bid at the expiry instant should fail",
        );
    }

    #[concordium_test]
    fn test_bid_unknown_auction() {
        let mut host = new_host(1, true);

        let result = bid(&mut host, 7, ALICE, start_price(), WINDOW_START + 1);
        expect_error(
            result,
            CustomContractError::UnknownAuction.into(),
            "Bidding on a missing auction should fail",
        );
    }

    #[concordium_test]
    fn test_bid_by_seller() {
        let mut host = new_host(1, true);
        let id = create_auction(&mut host);

        let result = bid(&mut host, id, SELLER, start_price(), WINDOW_START + 1);
        expect_error(
            result,
            CustomContractError::OwnerForbidden.into(),
            "The seller should not be able to bid",
        );
    }

    #[concordium_test]
    /// The observed scenario: 10 second window, 0.01 CCD start price, a
    /// single bid of exactly 0.01 CCD wins once the window has elapsed.
    fn test_bid_and_finalize() {
        let mut host = new_host(1, true);
        let id = create_auction(&mut host);

        bid(&mut host, id, ALICE, start_price(), WINDOW_START + 1).expect("Bid should pass");

        // Settling before the window has elapsed fails.
        let early = finalize(&mut host, id, SELLER, WINDOW_START + WINDOW_LENGTH - 1);
        expect_error(
            early,
            CustomContractError::AuctionStillActive.into(),
            "Finalizing a running auction should fail",
        );

        host.set_self_balance(start_price());
        finalize(&mut host, id, SELLER, WINDOW_START + WINDOW_LENGTH)
            .expect("Finalizing after the window should pass");

        let auction = host.state().registry.get(id).expect("Record should exist");
        claim_eq!(auction.state, AuctionState::Ended);
        claim_eq!(
            auction.highest_bid.as_ref().map(|bid| bid.account),
            Some(ALICE)
        );
        claim_eq!(auction.current_price(), start_price());
        claim_eq!(
            auction.settled_at,
            Some(Timestamp::from_timestamp_millis(WINDOW_START + WINDOW_LENGTH))
        );
        // Escrow is gone the moment the settlement returns.
        claim!(host.state().escrowed.get(&token_0()).is_none());

        // Settling twice fails.
        let again = finalize(&mut host, id, SELLER, WINDOW_START + WINDOW_LENGTH + 1);
        expect_error(
            again,
            CustomContractError::AuctionFinalized.into(),
            "Finalizing twice should fail",
        );

        // And so does a late bid.
        let late = bid(&mut host, id, BOB, raised_price(), WINDOW_START + WINDOW_LENGTH + 1);
        expect_error(
            late,
            CustomContractError::AuctionFinalized.into(),
            "Bidding on a finalized auction should fail",
        );
    }

    #[concordium_test]
    /// An auction without bids returns the token to the seller and moves no
    /// funds.
    fn test_finalize_no_bids() {
        let mut host = new_host(1, true);
        let id = create_auction(&mut host);

        finalize(&mut host, id, BOB, WINDOW_START + WINDOW_LENGTH)
            .expect("Finalizing without bids should pass");

        let auction = host.state().registry.get(id).expect("Record should exist");
        claim_eq!(auction.state, AuctionState::Ended);
        claim_eq!(auction.highest_bid, None);
        // The floor price is informational; nothing was ever held for it.
        claim_eq!(auction.current_price(), start_price());
        claim!(host.state().escrowed.get(&token_0()).is_none());
    }

    #[concordium_test]
    /// A superseded bidder withdraws once; the second attempt finds nothing.
    fn test_claim() {
        let mut host = new_host(1, true);
        let id = create_auction(&mut host);

        bid(&mut host, id, ALICE, start_price(), WINDOW_START + 1).expect("Bid should pass");
        bid(&mut host, id, BOB, raised_price(), WINDOW_START + 2).expect("Bid should pass");

        host.set_self_balance(Amount::from_micro_ccd(30_000));

        let mut ctx = new_ctx(ALICE, WINDOW_START + 3);
        let mut logger = TestLogger::init();
        contract_claim(&ctx, &mut host, &mut logger).expect("Claiming should pass");
        claim_eq!(pending_return(&host, ALICE), None);

        let again = contract_claim(&ctx, &mut host, &mut logger);
        expect_error(
            again,
            CustomContractError::NothingToClaim.into(),
            "Claiming twice should fail",
        );

        ctx.set_sender(Address::Account(BOB));
        let leader = contract_claim(&ctx, &mut host, &mut logger);
        expect_error(
            leader,
            CustomContractError::NothingToClaim.into(),
            "The current leader has nothing to claim",
        );
    }

    #[concordium_test]
    /// The view projects the record fields, the derived leader columns and
    /// the escrow flag.
    fn test_view() {
        let mut host = new_host(1, true);
        let id = create_auction(&mut host);
        bid(&mut host, id, ALICE, start_price(), WINDOW_START + 1).expect("Bid should pass");

        let parameter_bytes = to_bytes(&id);
        let mut ctx = new_ctx(BOB, WINDOW_START + 2);
        ctx.set_parameter(&parameter_bytes);

        let view = contract_view(&ctx, &host).expect("Viewing should pass");
        claim_eq!(view.seller, SELLER);
        claim_eq!(view.max_bidder, Some(ALICE));
        claim_eq!(view.max_price, start_price());
        claim_eq!(view.state, AuctionState::Open);
        claim!(view.escrow_held);
        claim_eq!(view.settled_at, None);
    }

    #[concordium_test]
    fn test_view_pending_return() {
        let mut host = new_host(1, true);
        let id = create_auction(&mut host);
        bid(&mut host, id, ALICE, start_price(), WINDOW_START + 1).expect("Bid should pass");
        bid(&mut host, id, BOB, raised_price(), WINDOW_START + 2).expect("Bid should pass");

        let parameter_bytes = to_bytes(&ALICE);
        let mut ctx = new_ctx(ALICE, WINDOW_START + 3);
        ctx.set_parameter(&parameter_bytes);

        let balance = contract_view_pending_return(&ctx, &host).expect("Viewing should pass");
        claim_eq!(balance, start_price());
    }

    #[concordium_test]
    /// An auction created and bid on under the version 1 record layout
    /// settles under the current code with identical field semantics.
    fn test_finalize_v1_record() {
        let mut host = new_host(1, true);

        let v1 = AuctionV1 {
            seller: SELLER,
            token: token_0(),
            start_price: start_price(),
            start: Timestamp::from_timestamp_millis(WINDOW_START),
            duration: Duration::from_millis(WINDOW_LENGTH),
            highest_bid: Some(Bid {
                account: ALICE,
                amount: start_price(),
                timestamp: Timestamp::from_timestamp_millis(WINDOW_START + 1),
            }),
            state: AuctionState::Open,
        };
        host.state_mut()
            .registry
            .auctions
            .insert(0, StoredAuction::V1(v1));
        host.state_mut().registry.next_id = 1;
        host.state_mut().escrowed.insert(token_0(), 0);

        // The old record reads back unchanged under current code.
        let parameter_bytes = to_bytes(&0u64);
        let mut view_ctx = new_ctx(BOB, WINDOW_START + 2);
        view_ctx.set_parameter(&parameter_bytes);
        let view = contract_view(&view_ctx, &host).expect("Viewing should pass");
        claim_eq!(view.max_bidder, Some(ALICE));
        claim_eq!(view.max_price, start_price());
        claim_eq!(view.state, AuctionState::Open);
        claim_eq!(view.settled_at, None);

        host.set_self_balance(start_price());
        finalize(&mut host, 0, BOB, WINDOW_START + WINDOW_LENGTH)
            .expect("Finalizing a v1 record should pass");

        let auction = host.state().registry.get(0).expect("Record should exist");
        claim_eq!(auction.state, AuctionState::Ended);
        claim_eq!(
            auction.highest_bid.as_ref().map(|bid| bid.account),
            Some(ALICE)
        );
        claim!(auction.settled_at.is_some());
        claim!(host.state().escrowed.get(&token_0()).is_none());

        // New auctions keep allocating past the ids the old engine used.
        let id = create_auction(&mut host);
        claim_eq!(id, 1);
    }
}
