pub mod abi;
pub mod contracts;
pub mod error;
pub mod functions;
pub mod rpc;
pub mod signer;

pub use contracts::{ContractAddresses, Contracts, TxRequest};
pub use error::ChainError;
pub use rpc::RpcClient;
pub use signer::LocalSigner;
