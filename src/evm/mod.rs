pub mod abi;
pub mod address;
pub mod chains;
