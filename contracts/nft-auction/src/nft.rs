use commons::{
    ContractBalanceOfQueryParams, ContractBalanceOfQueryResponse, ContractTokenAmount,
    CustomContractError, Token,
};
use concordium_cis2::{
    AdditionalData, BalanceOfQuery, OperatorOfQuery, OperatorOfQueryParams,
    OperatorOfQueryResponse, Receiver, Transfer, TransferParams,
};
use concordium_std::*;

/// Entrypoint of this contract named as the CIS-2 receive hook when a token
/// is pulled into escrow.
pub const RECEIVE_HOOK_NAME: &str = "onReceivingCIS2";

/// Check the custody preconditions for pulling `token` from `owner`: the
/// owner must hold the token and must have made the engine an operator on the
/// asset contract.
pub fn ensure_approved<T>(
    host: &mut impl HasHost<T>,
    self_address: ContractAddress,
    token: &Token,
    owner: AccountAddress,
) -> Result<(), CustomContractError> {
    ensure!(
        balance_of(host, token, Address::Account(owner))? >= ContractTokenAmount::from(1),
        CustomContractError::NotTokenOwner
    );
    ensure!(
        is_operator_of(
            host,
            &token.contract,
            Address::Account(owner),
            Address::Contract(self_address),
        )?,
        CustomContractError::NotOperator
    );

    Ok(())
}

/// Pull `token` from `owner` into the engine's custody. The asset contract
/// itself enforces that the engine is an operator of the owner.
pub fn lock<T>(
    host: &mut impl HasHost<T>,
    self_address: ContractAddress,
    token: &Token,
    owner: AccountAddress,
) -> Result<(), CustomContractError> {
    let transfer = Transfer {
        token_id: token.id.clone(),
        amount: ContractTokenAmount::from(1),
        from: Address::Account(owner),
        to: Receiver::Contract(
            self_address,
            OwnedEntrypointName::new_unchecked(RECEIVE_HOOK_NAME.into()),
        ),
        data: AdditionalData::empty(),
    };
    host.invoke_contract(
        &token.contract,
        &TransferParams(vec![transfer]),
        EntrypointName::new_unchecked("transfer"),
        Amount::zero(),
    )
    .map_err(|error| handle_call_error(error, CustomContractError::NotOperator))?;

    Ok(())
}

/// Transfer a token out of the engine's custody to the account `to`.
pub fn release<T>(
    host: &mut impl HasHost<T>,
    self_address: ContractAddress,
    token: &Token,
    to: AccountAddress,
) -> Result<(), CustomContractError> {
    let transfer = Transfer {
        token_id: token.id.clone(),
        amount: ContractTokenAmount::from(1),
        from: Address::Contract(self_address),
        to: Receiver::Account(to),
        data: AdditionalData::empty(),
    };
    host.invoke_contract(
        &token.contract,
        &TransferParams(vec![transfer]),
        EntrypointName::new_unchecked("transfer"),
        Amount::zero(),
    )
    .map_err(|error| handle_call_error(error, CustomContractError::TokenNotHeld))?;

    Ok(())
}

fn balance_of<T>(
    host: &mut impl HasHost<T>,
    token: &Token,
    address: Address,
) -> Result<ContractTokenAmount, CustomContractError> {
    let parameter = ContractBalanceOfQueryParams {
        queries: vec![BalanceOfQuery {
            token_id: token.id.clone(),
            address,
        }],
    };
    let (_, value) = host
        .invoke_contract(
            &token.contract,
            &parameter,
            EntrypointName::new_unchecked("balanceOf"),
            Amount::zero(),
        )
        .map_err(|error| handle_call_error(error, CustomContractError::NotTokenOwner))?;

    let mut response = value.ok_or(CustomContractError::Incompatible)?;
    let ContractBalanceOfQueryResponse(amounts) =
        ContractBalanceOfQueryResponse::deserial(&mut response)
            .map_err(|_| CustomContractError::Incompatible)?;

    amounts
        .first()
        .copied()
        .ok_or(CustomContractError::Incompatible)
}

fn is_operator_of<T>(
    host: &mut impl HasHost<T>,
    contract: &ContractAddress,
    owner: Address,
    address: Address,
) -> Result<bool, CustomContractError> {
    let parameter = OperatorOfQueryParams {
        queries: vec![OperatorOfQuery { owner, address }],
    };
    let (_, value) = host
        .invoke_contract(
            contract,
            &parameter,
            EntrypointName::new_unchecked("operatorOf"),
            Amount::zero(),
        )
        .map_err(|error| handle_call_error(error, CustomContractError::NotOperator))?;

    let mut response = value.ok_or(CustomContractError::Incompatible)?;
    let OperatorOfQueryResponse(answers) = OperatorOfQueryResponse::deserial(&mut response)
        .map_err(|_| CustomContractError::Incompatible)?;

    answers
        .first()
        .copied()
        .ok_or(CustomContractError::Incompatible)
}

// A rejection by the asset contract maps to the custody error of the call
// site; protocol-level mismatches map to Incompatible.
fn handle_call_error<R>(
    error: CallContractError<R>,
    rejection: CustomContractError,
) -> CustomContractError {
    match error {
        CallContractError::MissingEntrypoint | CallContractError::MessageFailed => {
            CustomContractError::Incompatible
        }
        CallContractError::LogicReject { .. } => rejection,
        e => e.into(),
    }
}

#[concordium_cfg_test]
mod tests {
    use commons::test::{parse_and_check_mock, parse_and_ok_mock};
    use commons::TransferParameter;
    use concordium_cis2::TokenIdVec;
    use concordium_std::test_infrastructure::*;

    use super::*;

    const NFT_CONTRACT: ContractAddress = ContractAddress {
        index: 1,
        subindex: 0,
    };
    const SELF_ADDRESS: ContractAddress = ContractAddress {
        index: 5,
        subindex: 0,
    };

    const SELLER: AccountAddress = AccountAddress([1; 32]);
    const WINNER: AccountAddress = AccountAddress([2; 32]);

    fn token_0() -> Token {
        Token {
            contract: NFT_CONTRACT,
            id: TokenIdVec(vec![0, 1]),
        }
    }

    fn mock_balance_of(host: &mut TestHost<()>, balance: u64) {
        host.setup_mock_entrypoint(
            NFT_CONTRACT,
            OwnedEntrypointName::new_unchecked("balanceOf".into()),
            parse_and_ok_mock::<ContractBalanceOfQueryParams, _>(
                ContractBalanceOfQueryResponse::from(vec![ContractTokenAmount::from(balance)]),
            ),
        );
    }

    fn mock_operator_of(host: &mut TestHost<()>, is_operator: bool) {
        host.setup_mock_entrypoint(
            NFT_CONTRACT,
            OwnedEntrypointName::new_unchecked("operatorOf".into()),
            parse_and_ok_mock::<OperatorOfQueryParams, _>(OperatorOfQueryResponse::from(vec![
                is_operator,
            ])),
        );
    }

    #[concordium_test]
    fn test_ensure_approved() {
        let state_builder = TestStateBuilder::default();
        let mut host = TestHost::new((), state_builder);
        mock_balance_of(&mut host, 1);
        mock_operator_of(&mut host, true);

        let response = ensure_approved(&mut host, SELF_ADDRESS, &token_0(), SELLER);
        claim_eq!(response, Ok(()));
    }

    #[concordium_test]
    fn test_ensure_approved_not_owner() {
        let state_builder = TestStateBuilder::default();
        let mut host = TestHost::new((), state_builder);
        mock_balance_of(&mut host, 0);
        mock_operator_of(&mut host, true);

        let response = ensure_approved(&mut host, SELF_ADDRESS, &token_0(), SELLER);
        claim_eq!(response, Err(CustomContractError::NotTokenOwner));
    }

    #[concordium_test]
    fn test_ensure_approved_not_operator() {
        let state_builder = TestStateBuilder::default();
        let mut host = TestHost::new((), state_builder);
        mock_balance_of(&mut host, 1);
        mock_operator_of(&mut host, false);

        let response = ensure_approved(&mut host, SELF_ADDRESS, &token_0(), SELLER);
        claim_eq!(response, Err(CustomContractError::NotOperator));
    }

    #[concordium_test]
    /// The pull into escrow names this contract's receive hook as receiver.
    fn test_lock() {
        let state_builder = TestStateBuilder::default();
        let mut host = TestHost::new((), state_builder);
        host.setup_mock_entrypoint(
            NFT_CONTRACT,
            OwnedEntrypointName::new_unchecked("transfer".into()),
            parse_and_check_mock::<TransferParameter, _>(
                |params: &TransferParameter| {
                    let TransferParams(transfers) = params;
                    transfers.len() == 1
                        && transfers[0].from == Address::Account(SELLER)
                        && matches!(
                            &transfers[0].to,
                            Receiver::Contract(address, hook)
                                if *address == SELF_ADDRESS
                                    && hook.as_entrypoint_name()
                                        == EntrypointName::new_unchecked(RECEIVE_HOOK_NAME)
                        )
                },
                (),
            ),
        );

        let response = lock(&mut host, SELF_ADDRESS, &token_0(), SELLER);
        claim_eq!(response, Ok(()));
    }

    #[concordium_test]
    /// The transfer out of escrow carries the winner as receiver and the
    /// engine as sender.
    fn test_release() {
        let state_builder = TestStateBuilder::default();
        let mut host = TestHost::new((), state_builder);
        host.setup_mock_entrypoint(
            NFT_CONTRACT,
            OwnedEntrypointName::new_unchecked("transfer".into()),
            parse_and_check_mock::<TransferParameter, _>(
                |params: &TransferParameter| {
                    let TransferParams(transfers) = params;
                    transfers.len() == 1
                        && transfers[0].from == Address::Contract(SELF_ADDRESS)
                        && matches!(&transfers[0].to, Receiver::Account(to) if *to == WINNER)
                },
                (),
            ),
        );

        let response = release(&mut host, SELF_ADDRESS, &token_0(), WINNER);
        claim_eq!(response, Ok(()));
    }

    #[concordium_test]
    /// A rejection by the asset contract on release reports the token as not
    /// held.
    fn test_release_rejected() {
        let state_builder = TestStateBuilder::default();
        let mut host = TestHost::new((), state_builder);
        host.setup_mock_entrypoint(
            NFT_CONTRACT,
            OwnedEntrypointName::new_unchecked("transfer".into()),
            MockFn::new_v1(|_parameter, _, _, _: &mut ()| {
                Err(CallContractError::LogicReject {
                    reason: -42,
                    return_value: (),
                })
            }),
        );

        let response = release(&mut host, SELF_ADDRESS, &token_0(), WINNER);
        claim_eq!(response, Err(CustomContractError::TokenNotHeld));
    }
}
