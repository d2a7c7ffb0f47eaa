use thiserror::Error;

#[derive(Clone, Error, Debug)]
pub enum CoinError {
    // Invariant violations. These abort the operation that detected them.
    #[error("Invalid transaction")]
    InvalidTransaction,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Merkle root of an empty transaction list")]
    EmptyMerkleTree,
    #[error("Mining interrupted by shutdown")]
    MiningInterrupted,

    // Surfaced to the caller.
    #[error("Insufficient funds")]
    InsufficientFunds,
    #[error("Block not found: {0}")]
    BlockNotFound(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("No chain database found at {0}")]
    ChainNotFound(String),
    #[error("A chain database already exists at {0}")]
    ChainAlreadyExists(String),
    #[error("No wallet for address {0} in the local wallet file")]
    WalletNotFound(String),

    // Configuration.
    #[error("NODE_ID environment variable is not set")]
    NodeIdMissing,
    #[error("Invalid node address: {0}")]
    InvalidNodeAddress(String),

    // Crypto.
    #[error("Key pair error: {0}")]
    KeyPair(String),
    #[error("Signature error: {0}")]
    Signature(String),
    #[error("Address decoding error: {0}")]
    AddressDecoding(String),

    // Serialization.
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    #[error("Hex decoding error: {0}")]
    HexDecoding(String),

    // Wire protocol.
    #[error("Unknown wire command: {0}")]
    UnknownCommand(String),
    #[error("Frame shorter than the command header")]
    MalformedFrame,

    // Storage and I/O.
    #[error("Chain store error: {0}")]
    Store(String),
    #[error("Wallet file error: {0}")]
    WalletFile(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Poisoned lock: {0}")]
    PoisonedLock(String),
}

pub type Result<T> = std::result::Result<T, CoinError>;
