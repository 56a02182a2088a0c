pub mod credential;
pub mod did;
pub mod record;
pub mod request;
