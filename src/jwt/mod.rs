pub mod signing;
pub mod verification;
