//! Typed commands and the named invocations they are parsed from.
//!
//! Parsing checks arity, numbers and operator codes, so handlers only ever
//! see well-formed payloads.

use crate::{
    error::{LedgerError, LedgerResult},
    record::{Enrollment, Operator},
    types::SubscriberKey,
};
use serde::{Deserialize, Serialize};

/// Every command the ledger accepts, with its exact payload.
/// Variants are appended, never reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum LedgerCommand {
    // ── Inventory ─────────────────────────────────
    ResetInventory,
    Enroll(Enrollment),

    // ── Roaming setup ─────────────────────────────
    Discover {
        key: SubscriberKey,
        serving_operator: Option<Operator>,
        location: String,
        lat: f64,
        long: f64,
    },
    Authenticate { key: SubscriberKey },
    AssignRate { key: SubscriberKey },

    // ── Calls ─────────────────────────────────────
    CallOut { key: SubscriberKey, destination: String },
    CallIn { key: SubscriberKey, destination: String },
    CallEnd { key: SubscriberKey },
    CallPay { key: SubscriberKey },
    Overage { key: SubscriberKey },

    // ── Query ─────────────────────────────────────
    Lookup { key: SubscriberKey },
}

impl LedgerCommand {
    /// Build a command from a named invocation with positional arguments.
    pub fn parse(function: &str, args: &[String]) -> LedgerResult<Self> {
        let command = match function {
            "resetInventory" => {
                expect_arity(function, args, 0)?;
                Self::ResetInventory
            }
            "enterData" => {
                expect_arity(function, args, 7)?;
                Self::Enroll(Enrollment {
                    key: args[0].clone(),
                    msisdn: args[1].clone(),
                    name: args[2].clone(),
                    address: args[3].clone(),
                    home_operator: args[4].parse()?,
                    lat: parse_coordinate(function, "lat", &args[5])?,
                    long: parse_coordinate(function, "long", &args[6])?,
                })
            }
            "discoverRP" => {
                expect_arity(function, args, 5)?;
                Self::Discover {
                    key: args[0].clone(),
                    serving_operator: parse_serving(&args[1])?,
                    location: args[2].clone(),
                    lat: parse_coordinate(function, "lat", &args[3])?,
                    long: parse_coordinate(function, "long", &args[4])?,
                }
            }
            "authentication" => Self::Authenticate { key: single_key(function, args)? },
            "updateRates" => Self::AssignRate { key: single_key(function, args)? },
            "CallOut" => {
                expect_arity(function, args, 2)?;
                Self::CallOut { key: args[0].clone(), destination: args[1].clone() }
            }
            "CallIn" => {
                expect_arity(function, args, 2)?;
                Self::CallIn { key: args[0].clone(), destination: args[1].clone() }
            }
            "CallEnd" => Self::CallEnd { key: single_key(function, args)? },
            "CallPay" => Self::CallPay { key: single_key(function, args)? },
            "Overage" => Self::Overage { key: single_key(function, args)? },
            "queryMSISDN" => Self::Lookup { key: single_key(function, args)? },
            other => {
                return Err(LedgerError::InvalidArguments(format!(
                    "unknown function '{other}'"
                )))
            }
        };
        Ok(command)
    }

    /// Invocation name this command is parsed from.
    pub fn function_name(&self) -> &'static str {
        match self {
            Self::ResetInventory => "resetInventory",
            Self::Enroll(_) => "enterData",
            Self::Discover { .. } => "discoverRP",
            Self::Authenticate { .. } => "authentication",
            Self::AssignRate { .. } => "updateRates",
            Self::CallOut { .. } => "CallOut",
            Self::CallIn { .. } => "CallIn",
            Self::CallEnd { .. } => "CallEnd",
            Self::CallPay { .. } => "CallPay",
            Self::Overage { .. } => "Overage",
            Self::Lookup { .. } => "queryMSISDN",
        }
    }
}

/// A raw inbound invocation, as delivered by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub function: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, A>(function: &str, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            function: function.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn parse(&self) -> LedgerResult<LedgerCommand> {
        LedgerCommand::parse(&self.function, &self.args)
    }
}

fn expect_arity(function: &str, args: &[String], expected: usize) -> LedgerResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(LedgerError::InvalidArguments(format!(
            "{function} takes {expected} argument(s), got {}",
            args.len()
        )))
    }
}

fn single_key(function: &str, args: &[String]) -> LedgerResult<SubscriberKey> {
    expect_arity(function, args, 1)?;
    Ok(args[0].clone())
}

/// Empty means no serving operator (home network).
fn parse_serving(raw: &str) -> LedgerResult<Option<Operator>> {
    if raw.is_empty() {
        Ok(None)
    } else {
        raw.parse().map(Some)
    }
}

fn parse_coordinate(function: &str, field: &str, raw: &str) -> LedgerResult<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            LedgerError::InvalidArguments(format!("{function}: {field} '{raw}' is not a number"))
        })
}
