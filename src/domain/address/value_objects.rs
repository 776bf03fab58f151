use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Address Value Objects
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub recipient: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl ShippingAddress {
    /// Single-line rendering for emails and logs.
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.recipient.as_str(), self.line1.as_str()];
        if let Some(line2) = self.line2.as_deref() {
            parts.push(line2);
        }
        parts.extend([
            self.city.as_str(),
            self.region.as_str(),
            self.postal_code.as_str(),
            self.country.as_str(),
        ]);
        parts.retain(|part| !part.is_empty());
        parts.join(", ")
    }
}

/// Caller input for creating or replacing an address.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressInput {
    pub recipient: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub make_default: bool,
}

impl AddressInput {
    /// Name of the first required field that is blank.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("recipient", &self.recipient),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> AddressInput {
        AddressInput {
            recipient: "Ada Lovelace".to_string(),
            line1: "12 Marylebone Rd".to_string(),
            line2: None,
            city: "London".to_string(),
            region: "".to_string(),
            postal_code: "NW1 5LR".to_string(),
            country: "GB".to_string(),
            make_default: false,
        }
    }

    #[test]
    fn test_missing_field() {
        assert_eq!(input().missing_field(), None);

        let mut blank_city = input();
        blank_city.city = "  ".to_string();
        assert_eq!(blank_city.missing_field(), Some("city"));
    }

    #[test]
    fn test_one_line_skips_empty_parts() {
        let i = input();
        let address = ShippingAddress {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            recipient: i.recipient,
            line1: i.line1,
            line2: i.line2,
            city: i.city,
            region: i.region,
            postal_code: i.postal_code,
            country: i.country,
            is_default: true,
            created_at: Utc::now(),
        };

        assert_eq!(address.one_line(), "Ada Lovelace, 12 Marylebone Rd, London, NW1 5LR, GB");
    }
}
