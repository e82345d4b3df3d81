pub mod refunds;
pub mod transaction;
