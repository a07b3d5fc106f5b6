//! Subscriber record: the single value stored per subscriber key.
//!
//! The stored representation is a flat JSON object with camelCase field
//! names. Enumerated fields are closed variants here and plain strings on
//! the wire; an absent serving operator is stored as `""`.

use crate::{
    error::{LedgerError, LedgerResult},
    types::{Msisdn, SubscriberKey, Timestamp},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

// ── Enumerated fields ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "ABC")]
    Abc,
    #[serde(rename = "XYZ")]
    Xyz,
}

impl Operator {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Abc => "ABC",
            Self::Xyz => "XYZ",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Operator {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ABC" => Ok(Self::Abc),
            "XYZ" => Ok(Self::Xyz),
            other => Err(LedgerError::InvalidArguments(format!(
                "unknown operator code '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateType {
    #[default]
    #[serde(rename = "")]
    Unassigned,
    #[serde(rename = "RoamingABC")]
    RoamingAbc,
    #[serde(rename = "RoamingXYZ")]
    RoamingXyz,
}

impl RateType {
    /// Roaming plan billed by the serving operator.
    pub fn roaming_on(serving: Operator) -> Self {
        match serving {
            Operator::Abc => Self::RoamingAbc,
            Operator::Xyz => Self::RoamingXyz,
        }
    }
}

/// Label of the last event applied to the record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[default]
    #[serde(rename = "")]
    None,
    Discovery,
    Authentication,
    Register,
    #[serde(rename = "Call Initialization")]
    CallInitialization,
    #[serde(rename = "Call Received")]
    CallReceived,
    #[serde(rename = "Call End")]
    CallEnd,
    #[serde(rename = "Pay Charge")]
    PayCharge,
    OverageCheck,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    #[default]
    #[serde(rename = "")]
    None,
    Setup,
    #[serde(rename = "Call Out")]
    CallOut,
    #[serde(rename = "Call In")]
    CallIn,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flag {
    #[default]
    #[serde(rename = "")]
    None,
    Fraud,
    #[serde(rename = "OVERAGE")]
    Overage,
}

// ── Record ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberRecord {
    pub key: SubscriberKey,
    pub msisdn: Msisdn,
    pub name: String,
    pub address: String,
    pub home_operator: Operator,
    #[serde(with = "serving_operator")]
    pub current_operator: Option<Operator>,
    pub roaming: bool,
    pub location: String,
    pub lat: f64,
    pub long: f64,
    pub rate_type: RateType,
    pub action: Action,
    pub transaction_type: TransactionType,
    pub destination: String,
    pub duration_minutes: f64,
    pub charges: f64,
    pub flag: Flag,
    pub last_updated: Timestamp,
}

/// Enrollment fields. Everything else starts zeroed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub key: SubscriberKey,
    pub msisdn: Msisdn,
    pub name: String,
    pub address: String,
    pub home_operator: Operator,
    pub lat: f64,
    pub long: f64,
}

impl SubscriberRecord {
    /// Fresh, non-roaming record. Location defaults to the address.
    pub fn enrolled(e: Enrollment, now: Timestamp) -> Self {
        Self {
            location: e.address.clone(),
            key: e.key,
            msisdn: e.msisdn,
            name: e.name,
            address: e.address,
            home_operator: e.home_operator,
            current_operator: None,
            roaming: false,
            lat: e.lat,
            long: e.long,
            rate_type: RateType::Unassigned,
            action: Action::None,
            transaction_type: TransactionType::None,
            destination: String::new(),
            duration_minutes: 0.0,
            charges: 0.0,
            flag: Flag::None,
            last_updated: now,
        }
    }

    pub fn encode(&self) -> LedgerResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode the bytes stored under `key`. A record whose own key differs
    /// from the one it was stored under is rejected as malformed.
    pub fn decode(key: &str, bytes: &[u8]) -> LedgerResult<Self> {
        let record: Self = serde_json::from_slice(bytes).map_err(|source| LedgerError::Decode {
            key: key.to_string(),
            source,
        })?;
        if record.key != key {
            return Err(LedgerError::Decode {
                key: key.to_string(),
                source: <serde_json::Error as serde::de::Error>::custom(format!(
                    "record carries key '{}'",
                    record.key
                )),
            });
        }
        Ok(record)
    }
}

/// `Option<Operator>` stored as `""` when absent.
mod serving_operator {
    use super::Operator;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(op: &Option<Operator>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(op.map(|o| o.code()).unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Operator>, D::Error> {
        let raw = String::deserialize(d)?;
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("unknown operator code '{raw}'")))
    }
}
