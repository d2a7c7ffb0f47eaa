//! Wire protocol.
//!
//! Each connection carries exactly one framed message:
//! `command (12 bytes, ASCII, zero-padded) ‖ payload (bincode)`.
//! The command discriminates the payload type; handlers never inspect the
//! payload shape to tell messages apart.

use crate::error::{CoinError, Result};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::net::SocketAddr;

pub const COMMAND_LENGTH: usize = 12;
pub const PROTOCOL_VERSION: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvKind {
    Block,
    Tx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionPayload {
    pub addr_from: SocketAddr,
    pub version: usize,
    pub best_height: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBlocksPayload {
    pub addr_from: SocketAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvPayload {
    pub addr_from: SocketAddr,
    pub kind: InvKind,
    pub items: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDataPayload {
    pub addr_from: SocketAddr,
    pub kind: InvKind,
    pub id: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockPayload {
    pub addr_from: SocketAddr,
    pub block: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxPayload {
    pub addr_from: SocketAddr,
    pub transaction: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddrPayload {
    pub addr_list: Vec<SocketAddr>,
}

#[derive(Debug, Clone)]
pub enum Message {
    Version(VersionPayload),
    GetBlocks(GetBlocksPayload),
    Inv(InvPayload),
    GetData(GetDataPayload),
    Block(BlockPayload),
    Tx(TxPayload),
    Addr(AddrPayload),
}

impl Message {
    pub fn command(&self) -> &'static str {
        match self {
            Message::Version(_) => "version",
            Message::GetBlocks(_) => "getblocks",
            Message::Inv(_) => "inv",
            Message::GetData(_) => "getdata",
            Message::Block(_) => "block",
            Message::Tx(_) => "tx",
            Message::Addr(_) => "addr",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut frame = command_to_bytes(self.command()).to_vec();
        let payload = match self {
            Message::Version(p) => encode_payload(p)?,
            Message::GetBlocks(p) => encode_payload(p)?,
            Message::Inv(p) => encode_payload(p)?,
            Message::GetData(p) => encode_payload(p)?,
            Message::Block(p) => encode_payload(p)?,
            Message::Tx(p) => encode_payload(p)?,
            Message::Addr(p) => encode_payload(p)?,
        };
        frame.extend(payload);
        Ok(frame)
    }

    pub fn decode(frame: &[u8]) -> Result<Message> {
        if frame.len() < COMMAND_LENGTH {
            return Err(CoinError::MalformedFrame);
        }
        let command = bytes_to_command(&frame[..COMMAND_LENGTH]);
        let payload = &frame[COMMAND_LENGTH..];
        match command.as_str() {
            "version" => Ok(Message::Version(decode_payload(payload)?)),
            "getblocks" => Ok(Message::GetBlocks(decode_payload(payload)?)),
            "inv" => Ok(Message::Inv(decode_payload(payload)?)),
            "getdata" => Ok(Message::GetData(decode_payload(payload)?)),
            "block" => Ok(Message::Block(decode_payload(payload)?)),
            "tx" => Ok(Message::Tx(decode_payload(payload)?)),
            "addr" => Ok(Message::Addr(decode_payload(payload)?)),
            _ => Err(CoinError::UnknownCommand(command)),
        }
    }
}

fn command_to_bytes(command: &str) -> [u8; COMMAND_LENGTH] {
    let mut bytes = [0u8; COMMAND_LENGTH];
    bytes[..command.len()].copy_from_slice(command.as_bytes());
    bytes
}

fn bytes_to_command(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|b| **b != 0x00)
        .map(|b| *b as char)
        .collect()
}

fn encode_payload<T: Serialize>(payload: &T) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(payload, bincode::config::standard())
        .map_err(|e| CoinError::Serialization(e.to_string()))
}

fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map(|(payload, _)| payload)
        .map_err(|e| CoinError::Deserialization(e.to_string()))
}
