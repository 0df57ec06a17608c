//! Inventory records and mutation inputs.
//!
//! Records mirror table rows one-to-one. Relations are foreign-key ids only;
//! nested views are assembled on read by `hierarchy` and `topology`.

use crate::core::error::FibermapError;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub type EntityId = i64;

/// Closed string enums stored as TEXT and exchanged as their canonical names.
/// Parsing is case-insensitive so `?status=faulty` matches `Faulty`.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = FibermapError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(needle))
                    .ok_or_else(|| {
                        let allowed: Vec<&str> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        FibermapError::ValidationError(format!(
                            "Invalid {} '{}'. Must be one of: {}",
                            stringify!($name),
                            s,
                            allowed.join(", ")
                        ))
                    })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let raw = value.as_str()?;
                raw.parse::<$name>()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum! {
    /// Hardware categories tracked in inventory.
    AssetType {
        Ont => "ONT",
        Router => "Router",
        Splitter => "Splitter",
        Fdh => "FDH",
        Switch => "Switch",
        Cpe => "CPE",
        FiberRoll => "FiberRoll",
    }
}

text_enum! {
    #[derive(Default)]
    AssetStatus {
        #[default]
        Available => "Available",
        Assigned => "Assigned",
        Faulty => "Faulty",
        Retired => "Retired",
    }
}

text_enum! {
    #[derive(Default)]
    CustomerStatus {
        Active => "Active",
        Inactive => "Inactive",
        #[default]
        Pending => "Pending",
    }
}

text_enum! {
    #[derive(Default)]
    ConnectionType {
        #[default]
        Wired => "Wired",
        Wireless => "Wireless",
    }
}

// --- Records ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headend {
    pub id: EntityId,
    pub name: String,
    pub location: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fdh {
    pub id: EntityId,
    pub name: String,
    pub location: String,
    pub region: Option<String>,
    pub max_ports: u32,
    pub headend_id: EntityId,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Splitter {
    pub id: EntityId,
    pub model: String,
    pub location: String,
    pub port_capacity: u32,
    pub used_ports: u32,
    pub fdh_id: EntityId,
    pub created_at: String,
}

impl Splitter {
    pub fn is_full(&self) -> bool {
        self.used_ports >= self.port_capacity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: EntityId,
    pub name: String,
    pub address: String,
    pub neighborhood: Option<String>,
    pub plan: Option<String>,
    pub connection_type: ConnectionType,
    pub status: CustomerStatus,
    pub splitter_id: Option<EntityId>,
    /// 1-based port on the attached splitter.
    pub assigned_port: Option<u32>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: EntityId,
    pub serial_number: String,
    pub model: String,
    pub asset_type: AssetType,
    pub status: AssetStatus,
    pub location: Option<String>,
    pub assigned_customer_id: Option<EntityId>,
    pub assigned_on: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: EntityId,
    pub event_id: String,
    pub ts: String,
    pub action_type: String,
    pub description: String,
}

// --- Inputs ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHeadend {
    pub name: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFdh {
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub region: Option<String>,
    pub max_ports: u32,
    pub headend_id: EntityId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FdhUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub max_ports: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSplitter {
    pub model: String,
    pub port_capacity: u32,
    #[serde(default)]
    pub location: String,
    pub fdh_id: EntityId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SplitterUpdate {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub port_capacity: Option<u32>,
    #[serde(default)]
    pub fdh_id: Option<EntityId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub neighborhood: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub connection_type: ConnectionType,
    #[serde(default)]
    pub status: CustomerStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomerUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub neighborhood: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub connection_type: Option<ConnectionType>,
    #[serde(default)]
    pub status: Option<CustomerStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAsset {
    pub asset_type: AssetType,
    pub model: String,
    pub serial_number: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub status: AssetStatus,
}

/// `serial_number` and `asset_type` are accepted only so that a client
/// echoing the full record back is not rejected; changing either is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetUpdate {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub status: Option<AssetStatus>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub asset_type: Option<AssetType>,
}

/// Exact-match and substring predicates for `store::list`, applied before paging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListFilter {
    #[serde(default, alias = "type")]
    pub asset_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub skip: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}
