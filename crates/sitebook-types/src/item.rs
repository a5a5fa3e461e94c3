//! Field-level deltas for estimate line items.
//!
//! An [`ItemUpdate`] names one row and carries only the fields that changed.
//! `None` means "leave as is". Repeated edits to the same row fold together
//! with [`ItemUpdate::merge`]: later values overwrite earlier ones field by
//! field, untouched fields survive.

use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::{RowId, VersionToken};

/// A bag of optional field changes for one row.
///
/// `expected_updated_at` is the optimistic-locking token. It is always
/// serialized (as `null` when absent) so the store can tell "no expectation"
/// apart from a missing key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub id: RowId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
    /// Parent block. `Some(None)` moves the row out of any block.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub block_id: Option<Option<String>>,
    #[serde(default)]
    pub expected_updated_at: Option<VersionToken>,
}

/// Keeps an explicit `null` distinct from an absent key.
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

macro_rules! merge_fields {
    ($dst:ident, $src:ident; $($field:ident),+ $(,)?) => {
        $(
            if $src.$field.is_some() {
                $dst.$field = $src.$field;
            }
        )+
    };
}

impl ItemUpdate {
    /// An update for `id` that changes nothing yet.
    pub fn new(id: impl Into<RowId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_unit_price(mut self, unit_price: f64) -> Self {
        self.unit_price = Some(unit_price);
        self
    }

    pub fn with_markup_percent(mut self, markup_percent: f64) -> Self {
        self.markup_percent = Some(markup_percent);
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = Some(sort_order);
        self
    }

    pub fn with_block_id(mut self, block_id: Option<String>) -> Self {
        self.block_id = Some(block_id);
        self
    }

    pub fn with_expected_updated_at(mut self, token: Option<VersionToken>) -> Self {
        self.expected_updated_at = token;
        self
    }

    /// Shallow merge: every field set in `later` overwrites ours.
    /// Both updates must name the same row; `self.id` is never changed.
    pub fn merge(&mut self, later: ItemUpdate) {
        debug_assert_eq!(self.id, later.id, "merging updates for different rows");
        merge_fields!(self, later;
            category,
            description,
            quantity,
            unit,
            unit_price,
            markup_percent,
            labels,
            sort_order,
            block_id,
            expected_updated_at,
        );
    }

    /// True when no data field is set (the version token doesn't count).
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Names of the data fields this update touches, in declaration order.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.category.is_some() {
            fields.push("category");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.quantity.is_some() {
            fields.push("quantity");
        }
        if self.unit.is_some() {
            fields.push("unit");
        }
        if self.unit_price.is_some() {
            fields.push("unit_price");
        }
        if self.markup_percent.is_some() {
            fields.push("markup_percent");
        }
        if self.labels.is_some() {
            fields.push("labels");
        }
        if self.sort_order.is_some() {
            fields.push("sort_order");
        }
        if self.block_id.is_some() {
            fields.push("block_id");
        }
        fields
    }
}
