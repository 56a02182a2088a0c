pub mod context;
pub mod crypto;
pub mod serialization;
