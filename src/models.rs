//! Typed explorer records
//!
//! The API is loosely typed and most fields are optional. Every field here is
//! an `Option`: `None` means the API did not say, never `false` or `0`.
//! Fields we do not model are kept in `extra` so raw JSON views lose nothing.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unix seconds as rendered in list rows.
pub fn format_unix(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".into())
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Block {
    pub height: Option<String>,
    pub hash: Option<String>,
    pub previous_hash: Option<String>,
    pub chain_address: Option<String>,
    pub validator_address: Option<String>,
    pub protocol: Option<u32>,
    /// Unix seconds.
    pub date: Option<i64>,
    pub reward: Option<String>,
    pub transactions: Option<Vec<Transaction>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transaction {
    pub hash: Option<String>,
    pub block_height: Option<String>,
    pub block_hash: Option<String>,
    pub index: Option<u32>,
    pub date: Option<i64>,
    pub fee: Option<String>,
    pub gas_price: Option<String>,
    pub gas_limit: Option<String>,
    pub state: Option<String>,
    pub sender: Option<AddressRef>,
    pub gas_payer: Option<AddressRef>,
    pub payload: Option<String>,
    pub script_raw: Option<String>,
    pub events: Option<Vec<Event>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An address as embedded in other records.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressRef {
    pub address: Option<String>,
    pub address_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Balance {
    pub token: Option<TokenRef>,
    pub chain: Option<String>,
    pub amount: Option<String>,
    pub amount_raw: Option<String>,
    pub token_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenRef {
    pub symbol: Option<String>,
    pub fungible: Option<bool>,
    pub decimals: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub address: Option<String>,
    pub address_name: Option<String>,
    pub validator_kind: Option<String>,
    pub stake: Option<String>,
    pub unclaimed: Option<String>,
    pub relay: Option<String>,
    pub balances: Option<Vec<Balance>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub fungible: Option<bool>,
    pub transferable: Option<bool>,
    pub finite: Option<bool>,
    pub divisible: Option<bool>,
    pub fuel: Option<bool>,
    pub stakable: Option<bool>,
    pub fiat: Option<bool>,
    pub swappable: Option<bool>,
    pub burnable: Option<bool>,
    pub mintable: Option<bool>,
    pub decimals: Option<u32>,
    pub current_supply: Option<String>,
    pub max_supply: Option<String>,
    pub burned_supply: Option<String>,
    pub script_raw: Option<String>,
    pub create_event: Option<Box<Event>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    pub event_id: Option<u64>,
    pub event_kind: Option<String>,
    pub chain: Option<String>,
    pub date: Option<i64>,
    pub block_hash: Option<String>,
    pub transaction_hash: Option<String>,
    pub contract: Option<ContractRef>,
    pub address: Option<String>,
    pub address_name: Option<String>,
    pub token_id: Option<String>,
    pub payload_json: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractRef {
    pub name: Option<String>,
    pub hash: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Nft {
    pub token_id: Option<String>,
    pub chain: Option<String>,
    pub symbol: Option<String>,
    pub creator_address: Option<String>,
    pub creator_onchain_name: Option<String>,
    pub owners: Option<Vec<AddressRef>>,
    pub contract: Option<ContractRef>,
    pub nft_metadata: Option<Value>,
    pub series: Option<Series>,
    pub infusion: Option<Vec<Value>>,
    pub infused_into: Option<Value>,
    pub mint_date: Option<i64>,
    pub mint_number: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Series {
    pub id: Option<String>,
    pub series_id: Option<String>,
    pub creator: Option<String>,
    pub current_supply: Option<i64>,
    pub max_supply: Option<i64>,
    pub mode_name: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub royalties: Option<String>,
    pub r#type: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contract {
    pub name: Option<String>,
    pub hash: Option<String>,
    pub symbol: Option<String>,
    pub address: Option<AddressRef>,
    pub script_raw: Option<String>,
    pub token: Option<TokenRef>,
    pub methods: Option<Value>,
    pub create_event: Option<Box<Event>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A DAO.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Organization {
    pub id: Option<String>,
    pub name: Option<String>,
    pub address: Option<AddressRef>,
    pub size: Option<u64>,
    pub create_event: Option<Box<Event>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Decoded list envelope: the rows plus pagination metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    /// `None` when absent or empty: no further page.
    pub next_cursor: Option<String>,
    pub total_results: Option<u64>,
    /// Error message the API embedded in a 2xx body, if any.
    pub error: Option<String>,
}

impl<T: DeserializeOwned> ListPage<T> {
    /// Parse an envelope whose rows live under `items_key`. A missing or null
    /// items array is an empty page; a malformed row is an error.
    pub fn from_value(value: &Value, items_key: &str) -> Result<Self, serde_json::Error> {
        let items = match value.get(items_key) {
            Some(Value::Null) | None => Vec::new(),
            Some(v) => Vec::<T>::deserialize(v)?,
        };
        let next_cursor = value
            .get("next_cursor")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let total_results = value.get("total_results").and_then(|v| {
            v.as_u64()
                .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        });
        let error = value
            .get("error")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Ok(Self {
            items,
            next_cursor,
            total_results,
            error,
        })
    }
}
