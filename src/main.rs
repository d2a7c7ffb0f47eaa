use clap::{Parser, Subcommand};
use data_encoding::HEXLOWER;
use rustcoin::network::send_transaction_once;
use rustcoin::{
    ChainStore, CoinError, GLOBAL_CONFIG, ProofOfWork, Result, Server, Transaction, UTXOSet,
    Wallets, address_from_pub_key_hash, hash_pub_key, validate_address,
};
use std::sync::atomic::AtomicBool;
use tracing::info;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt,
    prelude::*,
};

#[derive(Debug, Parser)]
#[command(name = "rustcoin", about = "A minimal UTXO cryptocurrency node")]
struct Opt {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(name = "createchain", about = "Create a chain; genesis reward goes to ADDRESS")]
    CreateChain {
        #[arg(short = 'a', long = "address")]
        address: String,
    },
    #[command(name = "balance", about = "Sum the unspent outputs locked to ADDRESS")]
    Balance {
        #[arg(short = 'a', long = "address")]
        address: String,
    },
    #[command(name = "send", about = "Transfer tokens between addresses")]
    Send {
        #[arg(short = 'f', long = "from")]
        from: String,
        #[arg(short = 't', long = "to")]
        to: String,
        #[arg(long = "amount", value_parser = clap::value_parser!(i32).range(1..))]
        amount: i32,
        #[arg(long = "mine", help = "Mine the transaction locally instead of dispatching it")]
        mine: bool,
    },
    #[command(name = "print", about = "Walk the chain tip-to-genesis and print each block")]
    Print,
    #[command(name = "createwallet", about = "Create new wallets")]
    CreateWallet {
        #[arg(short = 'n', long = "count", default_value_t = 1)]
        count: u32,
    },
    #[command(name = "listaddresses", about = "List local wallet addresses")]
    ListAddresses,
    #[command(name = "reindexutxo", about = "Rebuild the UTXO index")]
    ReindexUtxo,
    #[command(name = "startnode", about = "Start the node at localhost:$NODE_ID")]
    StartNode {
        #[arg(long = "miner", help = "Enable mining; rewards go to this address")]
        miner: Option<String>,
    },
}

fn initialize_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(filter))
        .init();
}

fn ensure_valid_address(address: &str) -> Result<()> {
    match validate_address(address) {
        Ok(true) => Ok(()),
        _ => Err(CoinError::InvalidAddress(address.to_string())),
    }
}

async fn create_chain(address: String) -> Result<()> {
    ensure_valid_address(&address)?;
    let chain = ChainStore::create(&address)?;
    let utxo_set = UTXOSet::new(chain);
    utxo_set.reindex().await?;
    println!("Done! The genesis reward went to {}.", address);
    Ok(())
}

async fn balance(address: String) -> Result<()> {
    ensure_valid_address(&address)?;
    let chain = ChainStore::open()?;
    let utxo_set = UTXOSet::new(chain);
    let balance = utxo_set.get_balance(&address).await?;
    println!("Balance of {}: {}", address, balance);
    Ok(())
}

async fn send(from: String, to: String, amount: i32, mine: bool) -> Result<()> {
    ensure_valid_address(&from)?;
    ensure_valid_address(&to)?;

    let chain = ChainStore::open()?;
    let utxo_set = UTXOSet::new(chain);
    let wallets = Wallets::new()?;
    let wallet = wallets
        .get_wallet(&from)
        .ok_or_else(|| CoinError::WalletNotFound(from.clone()))?;

    let tx = Transaction::new_utxo_transaction(wallet, &to, amount, &utxo_set).await?;

    if mine {
        let coinbase = Transaction::new_coinbase_tx(&from, "")?;
        let block = utxo_set
            .chain()
            .mine_block(&[coinbase, tx], &AtomicBool::new(false))
            .await?;
        utxo_set.update(&block).await?;
        println!("Mined block {}", block.hash_hex());
    } else {
        send_transaction_once(&GLOBAL_CONFIG.central_node(), &tx).await?;
    }
    println!("Success! Sent {} from {} to {}.", amount, from, to);
    Ok(())
}

fn print_transaction(tx: &Transaction) {
    println!("- Transaction {}", tx.id_hex());
    if !tx.is_coinbase() {
        for input in tx.vin() {
            let from = address_from_pub_key_hash(hash_pub_key(input.pub_key()).as_slice());
            println!(
                "  -- Input  txid = {}, out = {}, from = {}",
                input.txid_hex(),
                input.vout(),
                from
            );
        }
    }
    for output in tx.vout() {
        let to = address_from_pub_key_hash(output.pub_key_hash());
        println!("  -- Output value = {}, to = {}", output.value(), to);
    }
}

async fn print_chain() -> Result<()> {
    let chain = ChainStore::open()?;
    let mut iterator = chain.iterator().await;
    while let Some(block) = iterator.next() {
        println!("============ Block {} ============", block.hash_hex());
        println!("Height: {}", block.height());
        println!("Prev hash: {}", HEXLOWER.encode(block.prev_block_hash()));
        println!("Nonce: {}", block.nonce());
        let pow = ProofOfWork::new(block.clone())?;
        println!("PoW valid: {}", pow.validate()?);
        for tx in block.transactions() {
            print_transaction(tx);
        }
        println!();
    }
    Ok(())
}

fn create_wallets(count: u32) -> Result<()> {
    let mut wallets = Wallets::new()?;
    for _ in 0..count {
        let address = wallets.create_wallet()?;
        println!("New address: {}", address);
    }
    Ok(())
}

fn list_addresses() -> Result<()> {
    let wallets = Wallets::new()?;
    for address in wallets.get_addresses() {
        println!("{}", address);
    }
    Ok(())
}

async fn reindex_utxo() -> Result<()> {
    let chain = ChainStore::open()?;
    let utxo_set = UTXOSet::new(chain);
    utxo_set.reindex().await?;
    let count = utxo_set.count_transactions().await?;
    println!(
        "Done! There are {} transactions in the UTXO set.",
        count
    );
    Ok(())
}

async fn start_node(miner: Option<String>) -> Result<()> {
    let node_id = GLOBAL_CONFIG.node_id()?;
    info!(node_id = %node_id, "starting node");

    if let Some(miner_address) = miner {
        ensure_valid_address(&miner_address)?;
        GLOBAL_CONFIG.set_miner_address(&miner_address)?;
        info!(address = %miner_address, "mining enabled");
    }

    let chain = ChainStore::open()?;
    Server::new(chain).run().await
}

async fn process_command(command: Command) -> Result<()> {
    match command {
        Command::CreateChain { address } => create_chain(address).await,
        Command::Balance { address } => balance(address).await,
        Command::Send {
            from,
            to,
            amount,
            mine,
        } => send(from, to, amount, mine).await,
        Command::Print => print_chain().await,
        Command::CreateWallet { count } => create_wallets(count),
        Command::ListAddresses => list_addresses(),
        Command::ReindexUtxo => reindex_utxo().await,
        Command::StartNode { miner } => start_node(miner).await,
    }
}

#[tokio::main]
async fn main() {
    initialize_logging();
    let opt = Opt::parse();
    if let Err(e) = process_command(opt.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
