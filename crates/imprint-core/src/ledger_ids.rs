//! Identifiers used by the consensus ledger.
//!
//! Accounts and topics use the dotted `shard.realm.num` form. Transaction ids
//! are `<payer account>@<seconds>.<nanoseconds>`, where the timestamp is the
//! transaction's valid-start time chosen by the submitter.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

fn parse_triplet(s: &str) -> Option<(u64, u64, u64)> {
    let mut parts = s.split('.');
    let shard = parts.next()?.parse().ok()?;
    let realm = parts.next()?.parse().ok()?;
    let num = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((shard, realm, num))
}

/// A ledger account, e.g. the operator that pays for submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

impl AccountId {
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl FromStr for AccountId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (shard, realm, num) = parse_triplet(s.trim())
            .ok_or_else(|| CoreError::InvalidIdentifier(format!("account id {:?}", s)))?;
        Ok(Self { shard, realm, num })
    }
}

impl TryFrom<String> for AccountId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.to_string()
    }
}

/// A consensus topic that submissions are appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TopicId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

impl TopicId {
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl FromStr for TopicId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (shard, realm, num) = parse_triplet(s.trim())
            .ok_or_else(|| CoreError::InvalidIdentifier(format!("topic id {:?}", s)))?;
        Ok(Self { shard, realm, num })
    }
}

impl TryFrom<String> for TopicId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TopicId> for String {
    fn from(id: TopicId) -> Self {
        id.to_string()
    }
}

/// A client-generated transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId {
    pub payer: AccountId,
    pub valid_start: DateTime<Utc>,
}

impl TransactionId {
    /// A transaction id for `payer` starting at `at`.
    pub fn generate(payer: AccountId, at: DateTime<Utc>) -> Self {
        Self {
            payer,
            valid_start: at,
        }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}.{:09}",
            self.payer,
            self.valid_start.timestamp(),
            self.valid_start.timestamp_subsec_nanos()
        )
    }
}

impl FromStr for TransactionId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidIdentifier(format!("transaction id {:?}", s));

        let (payer, start) = s.trim().split_once('@').ok_or_else(invalid)?;
        let payer: AccountId = payer.parse()?;
        let (secs, nanos) = start.split_once('.').ok_or_else(invalid)?;
        if nanos.len() != 9 {
            return Err(invalid());
        }
        let secs: i64 = secs.parse().map_err(|_| invalid())?;
        let nanos: u32 = nanos.parse().map_err(|_| invalid())?;
        let valid_start = Utc
            .timestamp_opt(secs, nanos)
            .single()
            .ok_or_else(invalid)?;

        Ok(Self { payer, valid_start })
    }
}

impl TryFrom<String> for TransactionId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_parse_display() {
        let id: AccountId = "0.0.4821".parse().unwrap();
        assert_eq!(id, AccountId::new(0, 0, 4821));
        assert_eq!(id.to_string(), "0.0.4821");
    }

    #[test]
    fn test_entity_id_rejects_garbage() {
        assert!("0.0".parse::<AccountId>().is_err());
        assert!("0.0.1.2".parse::<TopicId>().is_err());
        assert!("a.b.c".parse::<TopicId>().is_err());
        assert!("".parse::<AccountId>().is_err());
    }

    #[test]
    fn test_transaction_id_format() {
        let at = Utc.timestamp_opt(1_700_000_000, 5_000).unwrap();
        let tx = TransactionId::generate(AccountId::new(0, 0, 2), at);
        assert_eq!(tx.to_string(), "0.0.2@1700000000.000005000");
        assert_eq!(tx.to_string().parse::<TransactionId>().unwrap(), tx);
    }

    #[test]
    fn test_transaction_id_rejects_short_nanos() {
        assert!("0.0.2@1700000000.5".parse::<TransactionId>().is_err());
        assert!("0.0.2-1700000000.000000005".parse::<TransactionId>().is_err());
    }

    #[test]
    fn test_ids_serialize_as_strings() {
        let topic = TopicId::new(0, 0, 77);
        assert_eq!(serde_json::to_string(&topic).unwrap(), "\"0.0.77\"");
        let back: TopicId = serde_json::from_str("\"0.0.77\"").unwrap();
        assert_eq!(back, topic);
    }
}
