pub mod key_management;
