pub mod convert;
pub mod inventory;
pub mod publish;
pub mod status;
