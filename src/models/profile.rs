use serde::Serialize;
use tokio_postgres::Row;
use uuid::Uuid;

/// Public profile columns read from the identity-service-owned users table.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub phone_number: Option<String>,
}

impl Profile {
    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            username: row.get("username"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            avatar_url: row.get("avatar_url"),
            phone_number: row.get("phone_number"),
        }
    }

    /// "First Last" when either part exists, None otherwise.
    pub fn display_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (None, None) => None,
            (first, last) => {
                let name = format!(
                    "{} {}",
                    first.as_deref().unwrap_or(""),
                    last.as_deref().unwrap_or("")
                );
                Some(name.trim().to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(first: Option<&str>, last: Option<&str>) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            username: "sam".into(),
            first_name: first.map(|s| s.to_string()),
            last_name: last.map(|s| s.to_string()),
            avatar_url: None,
            phone_number: None,
        }
    }

    #[test]
    fn display_name_joins_both_parts() {
        assert_eq!(
            profile(Some("Sam"), Some("Rivera")).display_name().unwrap(),
            "Sam Rivera"
        );
    }

    #[test]
    fn display_name_handles_partial_names() {
        assert_eq!(profile(Some("Sam"), None).display_name().unwrap(), "Sam");
        assert_eq!(profile(None, Some("Rivera")).display_name().unwrap(), "Rivera");
        assert_eq!(profile(None, None).display_name(), None);
    }
}
