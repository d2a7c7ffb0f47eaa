pub mod wallet;
pub mod wallets;

pub use wallet::Wallet;
pub use wallets::Wallets;
