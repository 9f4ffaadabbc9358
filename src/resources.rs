//! Resource catalogue: endpoints, envelope keys and per-list defaults.

use crate::pagination::{OrderDirection, PaginationDefaults, PaginationMode};
use crate::request::{ParamValue, RequestDescriptor};
use anyhow::{anyhow, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    Blocks,
    Transactions,
    Addresses,
    Tokens,
    Events,
    Nfts,
    Series,
    Contracts,
    Organizations,
}

impl Resource {
    pub const ALL: [Resource; 9] = [
        Resource::Blocks,
        Resource::Transactions,
        Resource::Addresses,
        Resource::Tokens,
        Resource::Events,
        Resource::Nfts,
        Resource::Series,
        Resource::Contracts,
        Resource::Organizations,
    ];

    pub fn endpoint(&self) -> &'static str {
        match self {
            Resource::Blocks => "blocks",
            Resource::Transactions => "transactions",
            Resource::Addresses => "addresses",
            Resource::Tokens => "tokens",
            Resource::Events => "events",
            Resource::Nfts => "nfts",
            Resource::Series => "series",
            Resource::Contracts => "contracts",
            Resource::Organizations => "organizations",
        }
    }

    /// Envelope field holding the rows. Same as the endpoint name for every
    /// list the API serves today.
    pub fn items_key(&self) -> &'static str {
        self.endpoint()
    }

    /// High-volume, append-heavy lists page by cursor; the rest by offset.
    pub fn pagination_mode(&self) -> PaginationMode {
        match self {
            Resource::Transactions | Resource::Events | Resource::Nfts => PaginationMode::Cursor,
            _ => PaginationMode::Offset,
        }
    }

    pub fn default_order_by(&self) -> &'static str {
        match self {
            Resource::Blocks => "height",
            Resource::Transactions | Resource::Events | Resource::Nfts => "date",
            Resource::Addresses => "address",
            Resource::Tokens | Resource::Contracts => "symbol",
            Resource::Series => "id",
            Resource::Organizations => "name",
        }
    }

    pub fn default_order_direction(&self) -> OrderDirection {
        match self {
            Resource::Blocks | Resource::Transactions | Resource::Events | Resource::Nfts => {
                OrderDirection::Desc
            }
            _ => OrderDirection::Asc,
        }
    }

    /// Query parameter identifying a single record on detail requests.
    pub fn id_param(&self) -> &'static str {
        match self {
            Resource::Blocks | Resource::Transactions | Resource::Contracts => "hash",
            Resource::Addresses => "address",
            Resource::Tokens => "symbol",
            Resource::Events => "event_id",
            Resource::Nfts => "token_id",
            Resource::Series => "series_id",
            Resource::Organizations => "organization_name",
        }
    }

    pub fn pagination_defaults(&self) -> PaginationDefaults {
        PaginationDefaults::new(self.default_order_by(), self.default_order_direction())
    }

    pub fn list_request(&self) -> RequestDescriptor {
        RequestDescriptor::new(self.endpoint())
    }
}

impl std::str::FromStr for Resource {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        let found = match s.as_str() {
            "block" | "blocks" => Resource::Blocks,
            "tx" | "txs" | "transaction" | "transactions" => Resource::Transactions,
            "address" | "addresses" | "account" | "accounts" => Resource::Addresses,
            "token" | "tokens" => Resource::Tokens,
            "event" | "events" => Resource::Events,
            "nft" | "nfts" => Resource::Nfts,
            "series" => Resource::Series,
            "contract" | "contracts" => Resource::Contracts,
            "organization" | "organizations" | "dao" | "daos" => Resource::Organizations,
            _ => {
                let valid: Vec<&str> = Resource::ALL.iter().map(|r| r.endpoint()).collect();
                return Err(anyhow!(
                    "Invalid resource '{s}'. Valid options: {}",
                    valid.join(", ")
                ));
            }
        };
        Ok(found)
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// Single-record request with optional nested data (`with_balance=1`, ...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetailRequest {
    pub resource: Resource,
    pub id: String,
    pub with: Vec<String>,
}

impl DetailRequest {
    pub fn new(resource: Resource, id: impl Into<String>) -> Self {
        Self {
            resource,
            id: id.into(),
            with: Vec::new(),
        }
    }

    /// Request nested data; accepts `balance` or `with_balance`.
    pub fn with(mut self, name: &str) -> Self {
        let name = name.trim();
        let flag = name.strip_prefix("with_").unwrap_or(name);
        if !flag.is_empty() && !self.with.iter().any(|w| w == flag) {
            self.with.push(flag.to_string());
        }
        self
    }

    pub fn descriptor(&self) -> RequestDescriptor {
        let mut req = RequestDescriptor::new(self.resource.endpoint())
            .param(self.resource.id_param(), self.id.as_str());
        for flag in &self.with {
            req.set(format!("with_{flag}"), ParamValue::flag(true));
        }
        req
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("DAO".parse::<Resource>().unwrap(), Resource::Organizations);
        assert_eq!("tx".parse::<Resource>().unwrap(), Resource::Transactions);
        assert_eq!(" nfts ".parse::<Resource>().unwrap(), Resource::Nfts);
        let err = "wallets".parse::<Resource>().unwrap_err().to_string();
        assert!(err.contains("Valid options: blocks"));
    }

    #[test]
    fn test_display_round_trips_for_all() {
        for r in Resource::ALL {
            assert_eq!(r.to_string().parse::<Resource>().unwrap(), r);
        }
    }

    #[test]
    fn test_modes() {
        assert_eq!(Resource::Blocks.pagination_mode(), PaginationMode::Offset);
        assert_eq!(Resource::Events.pagination_mode(), PaginationMode::Cursor);
    }

    #[test]
    fn test_detail_descriptor() {
        let d = DetailRequest::new(Resource::Addresses, "P2KABC")
            .with("balance")
            .with("with_storage")
            .with("balance");
        assert_eq!(
            d.descriptor().path(),
            "addresses?address=P2KABC&with_balance=1&with_storage=1"
        );
    }
}
