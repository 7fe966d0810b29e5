use crate::types::Deal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// FieldMap — semantic deal field -> spreadsheet column header
// ---------------------------------------------------------------------------

/// Static, process-lifetime mapping from a deal field to the header string of
/// the column it syncs with. Headers are resolved against the live header row
/// on every write; nothing here assumes column positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMap {
    pub name: String,
    pub status: String,
    pub price: String,
    pub phone: String,
    pub email: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            name: "Name".to_string(),
            status: "Status".to_string(),
            price: "Amount".to_string(),
            phone: "Phone".to_string(),
            email: "Email".to_string(),
        }
    }
}

/// Map a deal to the column updates it implies.
///
/// Rules: status maps to the stage display name (never the numeric id), price
/// is the stringified amount, phone/email pass through verbatim. A field the
/// deal has no data for is omitted entirely — a reconciler must never blank a
/// cell it knows nothing about.
pub fn map_deal_to_columns(deal: &Deal, map: &FieldMap) -> Vec<(String, String)> {
    let mut updates = Vec::with_capacity(4);
    if !deal.status.name.is_empty() {
        updates.push((map.status.clone(), deal.status.name.clone()));
    }
    updates.push((map.price.clone(), deal.price.to_string()));
    if let Some(phone) = &deal.contact.phone {
        updates.push((map.phone.clone(), phone.clone()));
    }
    if let Some(email) = &deal.contact.email {
        updates.push((map.email.clone(), email.clone()));
    }
    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContactInfo, StageRef};

    fn deal() -> Deal {
        Deal {
            id: 42,
            name: "Acme".into(),
            price: 500,
            status: StageRef {
                id: 7,
                name: "Won".into(),
            },
            contact: ContactInfo {
                phone: Some("+1 555 0100".into()),
                email: None,
            },
        }
    }

    #[test]
    fn status_maps_to_display_name_not_id() {
        let updates = map_deal_to_columns(&deal(), &FieldMap::default());
        assert!(updates.contains(&("Status".into(), "Won".into())));
        assert!(!updates.iter().any(|(_, v)| v == "7"));
    }

    #[test]
    fn price_is_stringified() {
        let updates = map_deal_to_columns(&deal(), &FieldMap::default());
        assert!(updates.contains(&("Amount".into(), "500".into())));
    }

    #[test]
    fn absent_fields_are_omitted_not_blanked() {
        let updates = map_deal_to_columns(&deal(), &FieldMap::default());
        assert!(updates.iter().any(|(c, _)| c == "Phone"));
        assert!(!updates.iter().any(|(c, _)| c == "Email"));
    }

    #[test]
    fn unresolved_stage_name_skips_the_status_column() {
        let mut d = deal();
        d.status.name.clear();
        let updates = map_deal_to_columns(&d, &FieldMap::default());
        assert!(!updates.iter().any(|(c, _)| c == "Status"));
    }

    #[test]
    fn custom_headers_are_respected() {
        let map = FieldMap {
            status: "Статус".into(),
            price: "Сумма".into(),
            ..FieldMap::default()
        };
        let updates = map_deal_to_columns(&deal(), &map);
        assert!(updates.contains(&("Статус".into(), "Won".into())));
        assert!(updates.contains(&("Сумма".into(), "500".into())));
    }
}
