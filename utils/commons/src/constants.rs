/// Tag for the Custom Create event.
pub const CREATE_TAG: u8 = u8::MAX;

/// Tag for the Custom Bid event.
pub const BID_TAG: u8 = u8::MAX - 1;

/// Tag for the Custom Finalize event.
pub const FINALIZE_TAG: u8 = u8::MAX - 2;

/// Tag for the Custom Return event.
pub const RETURN_TAG: u8 = u8::MAX - 3;

/// Tag for the Custom Claim event.
pub const CLAIM_TAG: u8 = u8::MAX - 4;
