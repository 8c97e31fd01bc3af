#![no_std]

use generic_proxy::proxy_contract;

#[allow(unused)]
use commons::AuctionId;
#[allow(unused)]
use nft_auction::CreateParams;

proxy_contract! {
    contract: "NftAuctionProxy"

    pub contract_create => "create"("CreateParams");
    pub contract_bid => "bid"("AuctionId");
    pub contract_finalize => "finalize"("AuctionId");
    pub contract_claim => "claim"();
    pub contract_view => "view"("AuctionId");
    pub contract_view_pending_return => "viewPendingReturn"("AccountAddress");
}
