use super::*;

/// The custom errors the contracts can produce.
#[derive(Serialize, Debug, PartialEq, Eq, Reject, SchemaType)]
pub enum CustomContractError {
    /// Failed parsing the parameter (Error code: -1).
    #[from(ParseError)]
    ParseParams,
    /// Failed logging: Log is full (Error code: -2).
    LogFull,
    /// Failed logging: Log is malformed (Error code: -3).
    LogMalformed,
    /// No auction is registered under this id (Error code: -4).
    UnknownAuction,
    /// Attempt to bid on or settle an auction that was already finalized
    /// (Error code: -5).
    AuctionFinalized,
    /// Attempt to bid after the bidding window has elapsed (Error code: -6).
    AuctionFinished,
    /// Attempt to settle an auction before its bidding window has elapsed
    /// (Error code: -7).
    AuctionStillActive,
    /// Bid does not exceed the current highest bid, or undercuts the start
    /// price (Error code: -8).
    BidTooLow,
    /// The seller is not allowed to bid on their own auction (Error code: -9).
    OwnerForbidden,
    /// The bidding window has zero length or its end is not representable
    /// (Error code: -10).
    InvalidDuration,
    /// Token is already held in escrow for another open auction
    /// (Error code: -11).
    TokenAlreadyInAuction,
    /// The asserted seller does not hold the token (Error code: -12).
    NotTokenOwner,
    /// The engine was not made an operator for the seller on the asset
    /// contract (Error code: -13).
    NotOperator,
    /// The engine does not currently hold the token it is asked to release
    /// (Error code: -14).
    TokenNotHeld,
    /// No claimable balance for this account (Error code: -15).
    NothingToClaim,
    /// This function must only be called by a contract (Error code: -16).
    ContractOnly,
    /// Incompatible asset contract (Error code: -17).
    Incompatible,
    /// Failed to invoke a contract (Error code: -18).
    InvokeContractError,
    /// Failed to invoke a transfer (Error code: -19).
    InvokeTransferError,
}

/// Mapping the logging errors to CustomContractError.
impl From<LogError> for CustomContractError {
    fn from(le: LogError) -> Self {
        match le {
            LogError::Full => Self::LogFull,
            LogError::Malformed => Self::LogMalformed,
        }
    }
}

/// Mapping errors related to contract invocations to CustomContractError.
impl<T> From<CallContractError<T>> for CustomContractError {
    fn from(_cce: CallContractError<T>) -> Self {
        Self::InvokeContractError
    }
}

/// Mapping CustomContractError to ContractError
impl From<CustomContractError> for ContractError {
    fn from(c: CustomContractError) -> Self {
        Cis2Error::Custom(c)
    }
}

/// Mapping errors related to CCD transfers to CustomContractError.
impl From<TransferError> for CustomContractError {
    fn from(_te: TransferError) -> Self {
        Self::InvokeTransferError
    }
}
