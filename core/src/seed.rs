//! Fixed starting inventory: seven subscribers across the two home
//! operators, plus the fraud-registry entries that go with them.

use crate::{
    record::{Enrollment, Operator},
    types::{Msisdn, SubscriberKey},
};

/// (key, msisdn, name, address, home operator, lat, long)
const INVENTORY: [(&str, &str, &str, &str, Operator, f64, f64); 7] = [
    ("rs1", "14691234567", "A", "DC", Operator::Abc, 32.942746, 38.91),
    ("rs2", "14691234568", "B", "DALLAS", Operator::Abc, 32.942746, -96.994838),
    ("rs3", "14691234569", "C", "SF", Operator::Abc, 37.776, -122.414),
    ("rs4", "03097218855", "D", "BERLIN", Operator::Xyz, 52.5200, 13.4050),
    ("rs5", "349091234567", "E", "BARCELONA", Operator::Xyz, 41.3851, 2.1734),
    ("rs6", "349091234568", "F", "BARCELONA", Operator::Xyz, 41.385064, 2.173403),
    ("rs7", "349091234569", "G", "BARCELONA", Operator::Xyz, 41.385064, 2.173403),
];

pub fn inventory() -> Vec<Enrollment> {
    INVENTORY
        .iter()
        .map(|&(key, msisdn, name, address, home_operator, lat, long)| Enrollment {
            key: key.to_string(),
            msisdn: msisdn.to_string(),
            name: name.to_string(),
            address: address.to_string(),
            home_operator,
            lat,
            long,
        })
        .collect()
}

pub fn inventory_keys() -> impl Iterator<Item = &'static str> {
    INVENTORY.iter().map(|entry| entry.0)
}

/// Registry entries: every inventory msisdn under its key, plus the
/// sentinel key tracking an empty identity.
pub fn registry_entries(sentinel_key: &str) -> Vec<(SubscriberKey, Msisdn)> {
    INVENTORY
        .iter()
        .map(|entry| (entry.0.to_string(), entry.1.to_string()))
        .chain(std::iter::once((sentinel_key.to_string(), Msisdn::new())))
        .collect()
}
