pub mod abi;
pub mod evm;
pub mod memory_drafts;
pub mod mock_local;
pub mod mock_remote;
