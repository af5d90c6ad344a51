//! Bindings for the swap-protocol contract deployed on the remote ledger.
//!
//! `revert` is a Solidity keyword, so the unwind entry point is named
//! `revertSwap` on the wire.

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface ISwapProtocol {
        function commit(
            bytes32 swapId,
            address token,
            uint256 amount,
            uint256 tokenId,
            address recipient,
            uint256 threshold,
            address[] calldata signers
        ) external;

        function claim(bytes32 swapId) external;

        function revertSwap(bytes32 swapId) external;

        function claimWithSignatures(
            bytes32 swapId,
            bytes[] calldata notarySignatures
        ) external;

        function commitExists(bytes32 swapId) external view returns (bool);

        event ClaimOrRevert(
            bytes32 indexed swapId,
            address from,
            address to,
            uint256 amount,
            uint256 tokenId,
            address tokenAddress
        );
    }
}
