//! Blocklist of client addresses that may not complete a verification.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

use crate::TypeError;

/// Maps disallowed client addresses to the reason shown to them.
///
/// Keys are parsed as IP addresses when the list is built, so a typo in the
/// configuration fails at startup instead of silently never matching.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "HashMap<String, String>",
    into = "HashMap<String, String>"
)]
pub struct BlockList {
    entries: HashMap<IpAddr, String>,
}

impl BlockList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block `addr`, replacing any previous reason.
    pub fn insert(&mut self, addr: IpAddr, reason: impl Into<String>) {
        self.entries.insert(addr, reason.into());
    }

    /// The configured reason if `addr` is blocked.
    pub fn reason_for(&self, addr: &IpAddr) -> Option<&str> {
        self.entries.get(addr).map(String::as_str)
    }

    pub fn contains(&self, addr: &IpAddr) -> bool {
        self.entries.contains_key(addr)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<HashMap<String, String>> for BlockList {
    type Error = TypeError;

    fn try_from(raw: HashMap<String, String>) -> Result<Self, Self::Error> {
        let mut list = BlockList::new();
        for (address, reason) in raw {
            let addr = address
                .trim()
                .parse::<IpAddr>()
                .map_err(|source| TypeError::InvalidBlockListAddress {
                    address: address.clone(),
                    source,
                })?;
            list.insert(addr, reason);
        }
        Ok(list)
    }
}

impl From<BlockList> for HashMap<String, String> {
    fn from(list: BlockList) -> Self {
        list.entries
            .into_iter()
            .map(|(addr, reason)| (addr.to_string(), reason))
            .collect()
    }
}

impl<R: Into<String>> FromIterator<(IpAddr, R)> for BlockList {
    fn from_iter<T: IntoIterator<Item = (IpAddr, R)>>(iter: T) -> Self {
        let mut list = BlockList::new();
        for (addr, reason) in iter {
            list.insert(addr, reason);
        }
        list
    }
}
