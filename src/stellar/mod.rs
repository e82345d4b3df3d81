mod client;

pub use client::{HorizonClient, HorizonError, TransactionRecord};
