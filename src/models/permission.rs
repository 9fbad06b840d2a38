use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::FromRow;
use uuid::Uuid;

/// Access-type ranking used when the same screen is reachable through more
/// than one grant. Variant order is the priority order, so the derived `Ord`
/// is the tie-break: Read-Write > Read-Only > Unauthorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessLevel {
    Unauthorized,
    ReadOnly,
    ReadWrite,
}

impl AccessLevel {
    pub fn priority(&self) -> u8 {
        match self {
            AccessLevel::Unauthorized => 0,
            AccessLevel::ReadOnly => 1,
            AccessLevel::ReadWrite => 2,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AccessLevel::Unauthorized => "Unauthorized",
            AccessLevel::ReadOnly => "Read-Only",
            AccessLevel::ReadWrite => "Read-Write",
        }
    }

    /// Parses the access-type display name stored in master data. Unknown
    /// names rank lowest rather than failing the whole resolution.
    pub fn from_name(name: &str) -> Self {
        let normalized: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "readwrite" => AccessLevel::ReadWrite,
            "readonly" => AccessLevel::ReadOnly,
            _ => AccessLevel::Unauthorized,
        }
    }
}

impl Serialize for AccessLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.display_name())
    }
}

impl<'de> Deserialize<'de> for AccessLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(AccessLevel::from_name(&name))
    }
}

/// One candidate grant row, joined to its screen/system/access-type display
/// data at fetch time.
#[derive(Debug, Clone, FromRow)]
pub struct PermissionGrantRow {
    pub role_id: Uuid,
    pub department_id: Option<Uuid>,
    pub screen_id: Uuid,
    pub screen_name: String,
    pub screen_code: String,
    pub system_id: Uuid,
    pub system_name: String,
    pub access_type: String,
}

/// Deduplicated, client-facing permission entry. One per
/// (screenName, screenCode, systemName) identity, carrying the
/// highest-priority access level among the user's matching grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPermission {
    pub screen_name: String,
    pub screen_code: String,
    pub system_name: String,
    pub access_type: AccessLevel,
    pub access_type_priority: u8,
}
