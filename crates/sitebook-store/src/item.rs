//! A stored estimate line item and the per-row upsert rule both stores share.

use sitebook_types::{BatchResult, ItemUpdate, RowId, VersionToken};

use crate::error::StoreError;

/// Full server-side state of one row.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredItem {
    pub id: RowId,
    pub category: String,
    pub description: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    pub markup_percent: f64,
    pub labels: Vec<String>,
    pub sort_order: i64,
    pub block_id: Option<String>,
    pub updated_at: VersionToken,
}

impl StoredItem {
    /// A blank row at version `updated_at`.
    pub fn new(id: impl Into<RowId>, updated_at: VersionToken) -> Self {
        Self {
            id: id.into(),
            category: String::new(),
            description: String::new(),
            quantity: 0.0,
            unit: String::new(),
            unit_price: 0.0,
            markup_percent: 0.0,
            labels: Vec::new(),
            sort_order: 0,
            block_id: None,
            updated_at,
        }
    }

    /// Line total including markup.
    pub fn total(&self) -> f64 {
        self.quantity * self.unit_price * (1.0 + self.markup_percent / 100.0)
    }

    fn apply(&mut self, update: &ItemUpdate) {
        if let Some(category) = &update.category {
            self.category = category.clone();
        }
        if let Some(description) = &update.description {
            self.description = description.clone();
        }
        if let Some(quantity) = update.quantity {
            self.quantity = quantity;
        }
        if let Some(unit) = &update.unit {
            self.unit = unit.clone();
        }
        if let Some(unit_price) = update.unit_price {
            self.unit_price = unit_price;
        }
        if let Some(markup_percent) = update.markup_percent {
            self.markup_percent = markup_percent;
        }
        if let Some(labels) = &update.labels {
            self.labels = labels.clone();
        }
        if let Some(sort_order) = update.sort_order {
            self.sort_order = sort_order;
        }
        if let Some(block_id) = &update.block_id {
            self.block_id = block_id.clone();
        }
    }

    fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("quantity", self.quantity),
            ("unit price", self.unit_price),
            ("markup percent", self.markup_percent),
        ] {
            if !value.is_finite() {
                return Err(format!("{name} must be a finite number"));
            }
        }
        if self.quantity < 0.0 {
            return Err("quantity must not be negative".to_string());
        }
        if self.unit_price < 0.0 {
            return Err("unit price must not be negative".to_string());
        }
        Ok(())
    }
}

/// Why a row update was not applied.
#[derive(Clone, Debug, PartialEq)]
pub enum Refusal {
    /// `expected_updated_at` is stale; carries the stored version.
    Conflict(VersionToken),
    /// An expected version was given for a row that does not exist.
    Missing,
    Invalid(String),
}

impl Refusal {
    pub fn into_result(self, id: &RowId) -> BatchResult {
        match self {
            Refusal::Conflict(current) => BatchResult::conflict(id.clone(), current),
            Refusal::Missing => {
                BatchResult::rejected(id.clone(), StoreError::NotFound(id.clone()).to_string())
            }
            Refusal::Invalid(message) => BatchResult::rejected(id.clone(), message),
        }
    }
}

/// Next version after `previous`: wall-clock millis, but always strictly
/// greater than the previous numeric token.
pub fn next_version(previous: Option<&VersionToken>, now_ms: u64) -> VersionToken {
    let floor = previous
        .and_then(VersionToken::as_millis)
        .map_or(0, |ms| ms + 1);
    VersionToken::from_millis(now_ms.max(floor))
}

/// Apply `update` to the current row, or create it.
///
/// Without `expected_updated_at` the update always wins. With one, it must
/// match the stored version.
pub fn apply_update(
    current: Option<StoredItem>,
    update: &ItemUpdate,
    now_ms: u64,
) -> Result<StoredItem, Refusal> {
    let mut item = match (current, &update.expected_updated_at) {
        (Some(item), Some(expected)) if &item.updated_at != expected => {
            return Err(Refusal::Conflict(item.updated_at));
        }
        (Some(item), _) => item,
        (None, Some(_)) => return Err(Refusal::Missing),
        (None, None) => StoredItem::new(update.id.clone(), VersionToken::from_millis(0)),
    };

    item.apply(update);
    item.validate().map_err(Refusal::Invalid)?;
    item.updated_at = next_version(Some(&item.updated_at), now_ms);
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(id: &str, version: u64) -> StoredItem {
        let mut item = StoredItem::new(id, VersionToken::from_millis(version));
        item.quantity = 1.0;
        item.unit_price = 10.0;
        item
    }

    #[test]
    fn test_next_version_is_strictly_increasing() {
        assert_eq!(next_version(None, 500).as_str(), "500");
        assert_eq!(next_version(Some(&VersionToken::from_millis(100)), 500).as_str(), "500");
        // Same millisecond, or a clock that went backwards
        assert_eq!(next_version(Some(&VersionToken::from_millis(500)), 500).as_str(), "501");
        assert_eq!(next_version(Some(&VersionToken::from_millis(900)), 500).as_str(), "901");
        assert_eq!(next_version(Some(&VersionToken::from("opaque")), 500).as_str(), "500");
    }

    #[test]
    fn test_matching_version_applies() {
        let update = ItemUpdate::new("r1")
            .with_quantity(3.0)
            .with_expected_updated_at(Some(VersionToken::from_millis(100)));

        let item = apply_update(Some(stored("r1", 100)), &update, 200).unwrap();

        assert_eq!(item.quantity, 3.0);
        assert_eq!(item.unit_price, 10.0);
        assert_eq!(item.updated_at, VersionToken::from_millis(200));
    }

    #[test]
    fn test_stale_version_conflicts() {
        let update = ItemUpdate::new("r1")
            .with_quantity(3.0)
            .with_expected_updated_at(Some(VersionToken::from_millis(50)));

        let refusal = apply_update(Some(stored("r1", 100)), &update, 200).unwrap_err();
        assert_eq!(refusal, Refusal::Conflict(VersionToken::from_millis(100)));

        let result = refusal.into_result(&RowId::from("r1"));
        assert!(result.is_conflict());
        assert_eq!(result.server_updated_at, Some(VersionToken::from_millis(100)));
    }

    #[test]
    fn test_no_expected_version_always_wins() {
        let update = ItemUpdate::new("r1").with_unit("m2");
        let item = apply_update(Some(stored("r1", 100)), &update, 20).unwrap();
        assert_eq!(item.unit, "m2");
        assert_eq!(item.updated_at, VersionToken::from_millis(101));
    }

    #[test]
    fn test_upsert_creates_missing_row() {
        let update = ItemUpdate::new("new")
            .with_description("Rebar")
            .with_block_id(Some("b1".into()));
        let item = apply_update(None, &update, 42).unwrap();
        assert_eq!(item.description, "Rebar");
        assert_eq!(item.block_id.as_deref(), Some("b1"));
        assert_eq!(item.updated_at, VersionToken::from_millis(42));

        let expecting =
            ItemUpdate::new("gone").with_expected_updated_at(Some(VersionToken::from("1")));
        let refusal = apply_update(None, &expecting, 42).unwrap_err();
        assert_eq!(refusal, Refusal::Missing);
        assert_eq!(
            refusal.into_result(&RowId::from("gone")).error.as_deref(),
            Some("row gone not found")
        );
    }

    #[test]
    fn test_validation_rejects_bad_numbers() {
        let negative = ItemUpdate::new("r1").with_unit_price(-1.0);
        assert_eq!(
            apply_update(Some(stored("r1", 1)), &negative, 2),
            Err(Refusal::Invalid("unit price must not be negative".into()))
        );

        let nan = ItemUpdate::new("r1").with_quantity(f64::NAN);
        assert!(matches!(
            apply_update(Some(stored("r1", 1)), &nan, 2),
            Err(Refusal::Invalid(msg)) if msg.contains("quantity")
        ));
    }

    #[test]
    fn test_block_id_can_be_cleared() {
        let mut item = stored("r1", 1);
        item.block_id = Some("b1".into());
        let update = ItemUpdate::new("r1").with_block_id(None);
        let item = apply_update(Some(item), &update, 5).unwrap();
        assert_eq!(item.block_id, None);
    }

    #[test]
    fn test_total_includes_markup() {
        let mut item = stored("r1", 1);
        item.quantity = 2.0;
        item.markup_percent = 10.0;
        assert!((item.total() - 22.0).abs() < 1e-9);
    }
}
