use std::collections::BTreeMap;
use std::fmt;

use reqwest::Url;

use crate::error::{ApiError, Result};

/// Logical identity of a remote read: an endpoint plus its parameters.
///
/// Two queries are equal iff the endpoint and the sorted parameter set match
/// exactly, so a `Query` can key the de-duplicating cache directly. The sorted
/// `BTreeMap` makes parameter order irrelevant to equality and hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    endpoint: String,
    params: BTreeMap<String, String>,
}

impl Query {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: BTreeMap::new(),
        }
    }

    /// Builder-style parameter attachment; later calls overwrite earlier ones
    /// for the same key.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Render the full request URL against `base`, with parameters urlencoded
    /// in sorted order.
    pub fn to_url(&self, base: &str) -> Result<Url> {
        let joined = format!("{}{}", base.trim_end_matches('/'), self.endpoint);
        let mut url = Url::parse(&joined)
            .map_err(|err| ApiError::Transport(format!("invalid request URL {joined}: {err}")))?;
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(self.params.iter());
        }
        Ok(url)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.endpoint)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            write!(f, "{}{}={}", if i == 0 { "?" } else { "&" }, key, value)?;
        }
        Ok(())
    }
}
