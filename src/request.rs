//! Request descriptors and canonical request keys
//!
//! A [`RequestDescriptor`] is rebuilt from view state on every render. Its
//! serialized form ([`RequestKey`]) is the cache identity: two descriptors with
//! the same endpoint and the same non-null params produce the same key no
//! matter the insertion order.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Str(s) => f.write_str(s),
            Scalar::Int(n) => write!(f, "{n}"),
            Scalar::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamValue {
    Null,
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl ParamValue {
    /// `0|1` encoding used by the API's `with_*` detail flags.
    pub fn flag(on: bool) -> Self {
        ParamValue::Scalar(Scalar::Int(i64::from(on)))
    }

    fn is_omitted(&self) -> bool {
        match self {
            ParamValue::Null => true,
            ParamValue::List(items) => items.is_empty(),
            ParamValue::Scalar(_) => false,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Scalar(Scalar::Str(v.to_string()))
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Scalar(Scalar::Str(v))
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Scalar(Scalar::Bool(v))
    }
}

macro_rules! int_param {
    ($($t:ty),*) => {$(
        impl From<$t> for ParamValue {
            fn from(v: $t) -> Self {
                ParamValue::Scalar(Scalar::Int(v as i64))
            }
        }
    )*};
}

int_param!(i32, i64, u32, u64, usize);

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ParamValue::Null)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        ParamValue::List(v.into_iter().map(Scalar::Str).collect())
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(v: Vec<&str>) -> Self {
        ParamValue::List(v.into_iter().map(|s| Scalar::Str(s.to_string())).collect())
    }
}

/// Canonical cache identity: `endpoint` or `endpoint?k=v&...`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Endpoint part of the key (everything before `?`).
    pub fn endpoint(&self) -> &str {
        self.0.split_once('?').map(|(e, _)| e).unwrap_or(&self.0)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestDescriptor {
    endpoint: String,
    params: BTreeMap<String, ParamValue>,
}

impl RequestDescriptor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            endpoint: endpoint.trim_matches('/').to_string(),
            params: BTreeMap::new(),
        }
    }

    /// Builder form of [`RequestDescriptor::set`].
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.params.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) {
        self.params.remove(key);
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key).filter(|v| !v.is_omitted())
    }

    /// Percent-encoded query string without the leading `?`. Keys are sorted;
    /// list values become repeated keys in list order.
    pub fn query_string(&self) -> String {
        let mut parts = Vec::new();
        for (key, value) in &self.params {
            let k = urlencoding::encode(key);
            match value {
                ParamValue::Null => {}
                ParamValue::Scalar(s) => {
                    parts.push(format!("{k}={}", urlencoding::encode(&s.to_string())));
                }
                ParamValue::List(items) => {
                    for s in items {
                        parts.push(format!("{k}={}", urlencoding::encode(&s.to_string())));
                    }
                }
            }
        }
        parts.join("&")
    }

    /// Relative path handed to the fetcher (same text as the key).
    pub fn path(&self) -> String {
        let qs = self.query_string();
        if qs.is_empty() {
            self.endpoint.clone()
        } else {
            format!("{}?{}", self.endpoint, qs)
        }
    }

    pub fn key(&self) -> RequestKey {
        RequestKey(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ignores_insertion_order() {
        let a = RequestDescriptor::new("blocks")
            .param("limit", 25u32)
            .param("order_by", "height");
        let b = RequestDescriptor::new("blocks")
            .param("order_by", "height")
            .param("limit", 25u32);
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().as_str(), "blocks?limit=25&order_by=height");
    }

    #[test]
    fn test_null_and_empty_values_are_omitted() {
        let d = RequestDescriptor::new("/tokens/")
            .param("q", None::<String>)
            .param("symbol", Vec::<String>::new())
            .param("limit", 10u32);
        assert_eq!(d.key().as_str(), "tokens?limit=10");
        assert!(d.get("q").is_none());
        assert!(d.get("limit").is_some());
    }

    #[test]
    fn test_no_params_is_bare_endpoint() {
        let d = RequestDescriptor::new("organizations");
        assert_eq!(d.path(), "organizations");
        assert_eq!(d.key().endpoint(), "organizations");
    }

    #[test]
    fn test_lists_and_encoding() {
        let d = RequestDescriptor::new("events")
            .param("event_kind", vec!["TokenMint", "TokenBurn"])
            .param("q", "a b&c");
        assert_eq!(
            d.path(),
            "events?event_kind=TokenMint&event_kind=TokenBurn&q=a%20b%26c"
        );
        assert_eq!(d.key().endpoint(), "events");
    }

    #[test]
    fn test_flag_encoding() {
        let d = RequestDescriptor::new("addresses")
            .param("address", "P2K")
            .param("with_balance", ParamValue::flag(true))
            .param("with_storage", ParamValue::flag(false));
        assert_eq!(
            d.path(),
            "addresses?address=P2K&with_balance=1&with_storage=0"
        );
    }

    #[test]
    fn test_overwrite_and_remove() {
        let mut d = RequestDescriptor::new("blocks").param("offset", 0u64);
        d.set("offset", 25u64);
        assert_eq!(d.path(), "blocks?offset=25");
        d.remove("offset");
        assert_eq!(d.path(), "blocks");
    }
}
