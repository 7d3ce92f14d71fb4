pub mod num;
pub mod serde;
