//! Bidirectional translation between raw wiki records and [`Item`]s.
//!
//! The field table is fixed: twelve raw keys, one per item field. Raw keys
//! outside the table are ignored so that new wiki columns never break
//! mapping. `uid` is the one field that never travels in the payload; it is
//! derived from the page address and therefore has no reverse entry.

use chrono::NaiveDate;

use crate::error::InventoryError;
use crate::model::{Item, RawRecord, RawValue};

/// Item fields addressable through the field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Uid,
    Name,
    Typ,
    Standort,
    Os,
    Zubehoer,
    Seriennummern,
    Status,
    Ausleiher,
    Von,
    Bis,
    Anmerkungen,
}

impl Field {
    /// Item-side field name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uid => "uid",
            Self::Name => "name",
            Self::Typ => "typ",
            Self::Standort => "standort",
            Self::Os => "os",
            Self::Zubehoer => "zubehoer",
            Self::Seriennummern => "seriennummern",
            Self::Status => "status",
            Self::Ausleiher => "ausleiher",
            Self::Von => "von",
            Self::Bis => "bis",
            Self::Anmerkungen => "anmerkungen",
        }
    }
}

/// Raw wiki key → item field.
pub const FIELD_MAP: [(&str, Field); 12] = [
    ("ID", Field::Uid),
    ("Name", Field::Name),
    ("Typ_devicetypes", Field::Typ),
    ("Standort", Field::Standort),
    ("OS", Field::Os),
    ("Zubehör", Field::Zubehoer),
    ("Seriennummern", Field::Seriennummern),
    ("Status_devicestat", Field::Status),
    ("Ausleiher", Field::Ausleiher),
    ("Von_dt", Field::Von),
    ("Bis_dt", Field::Bis),
    ("Anmerkungen", Field::Anmerkungen),
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Look up the item field for a raw wiki key.
#[must_use]
pub fn field_for_raw_key(key: &str) -> Option<Field> {
    FIELD_MAP
        .iter()
        .find_map(|&(raw, field)| (raw == key).then_some(field))
}

/// Look up the raw wiki key for an item field. `None` for [`Field::Uid`].
#[must_use]
pub fn raw_key_for(field: Field) -> Option<&'static str> {
    if field == Field::Uid {
        return None;
    }
    FIELD_MAP
        .iter()
        .find_map(|&(raw, f)| (f == field).then_some(raw))
}

/// Build an [`Item`] from the raw record of page `uid`.
///
/// Empty values become `None`. A scalar `typ` is wrapped into a one-element
/// list. A missing `typ` is logged, not rejected.
///
/// # Errors
///
/// Returns [`InventoryError::Validation`] when a known field cannot be
/// coerced, e.g. a malformed date or a list on a single-valued field.
pub fn to_item(uid: u32, raw: &RawRecord) -> Result<Item, InventoryError> {
    let mut item = Item {
        uid: Some(uid),
        ..Item::default()
    };

    for (key, value) in raw {
        let Some(field) = field_for_raw_key(key) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }

        match field {
            Field::Uid => check_content_id(uid, value),
            Field::Typ => {
                item.typ = Some(match value {
                    RawValue::Scalar(tag) => vec![tag.clone()],
                    RawValue::List(tags) => tags.clone(),
                });
            }
            Field::Von => item.von = Some(parse_date(field, value)?),
            Field::Bis => item.bis = Some(parse_date(field, value)?),
            _ => {
                let RawValue::Scalar(text) = value else {
                    return Err(InventoryError::validation(
                        field.name(),
                        "list value on a single-valued field",
                    ));
                };
                if let Some(slot) = text_slot(&mut item, field) {
                    *slot = Some(text.clone());
                }
            }
        }
    }

    if item.typ.is_none() {
        tracing::warn!(uid, "item has no type");
    }

    Ok(item)
}

/// Build the raw record for `item`.
///
/// `uid` is never emitted and fields without a value are omitted rather than
/// written as empty strings.
#[must_use]
pub fn to_raw(item: &Item) -> RawRecord {
    let mut raw = RawRecord::new();

    for &(key, field) in &FIELD_MAP {
        let value = match field {
            Field::Uid => None,
            Field::Typ => item.typ.clone().map(RawValue::List),
            Field::Von => item.von.map(format_date),
            Field::Bis => item.bis.map(format_date),
            _ => text_value(item, field).map(|s| RawValue::Scalar(s.to_string())),
        };
        if let Some(value) = value {
            raw.insert(key.to_string(), value);
        }
    }

    raw
}

fn text_slot(item: &mut Item, field: Field) -> Option<&mut Option<String>> {
    match field {
        Field::Name => Some(&mut item.name),
        Field::Standort => Some(&mut item.standort),
        Field::Os => Some(&mut item.os),
        Field::Zubehoer => Some(&mut item.zubehoer),
        Field::Seriennummern => Some(&mut item.seriennummern),
        Field::Status => Some(&mut item.status),
        Field::Ausleiher => Some(&mut item.ausleiher),
        Field::Anmerkungen => Some(&mut item.anmerkungen),
        Field::Uid | Field::Typ | Field::Von | Field::Bis => None,
    }
}

fn text_value(item: &Item, field: Field) -> Option<&str> {
    let value = match field {
        Field::Name => &item.name,
        Field::Standort => &item.standort,
        Field::Os => &item.os,
        Field::Zubehoer => &item.zubehoer,
        Field::Seriennummern => &item.seriennummern,
        Field::Status => &item.status,
        Field::Ausleiher => &item.ausleiher,
        Field::Anmerkungen => &item.anmerkungen,
        Field::Uid | Field::Typ | Field::Von | Field::Bis => return None,
    };
    value.as_deref()
}

fn parse_date(field: Field, value: &RawValue) -> Result<NaiveDate, InventoryError> {
    let text = match value {
        RawValue::Scalar(s) => s.as_str(),
        RawValue::List(items) if items.len() == 1 => items[0].as_str(),
        RawValue::List(items) => {
            return Err(InventoryError::validation(
                field.name(),
                format!("expected one date, got {}", items.len()),
            ));
        }
    };
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).map_err(|e| {
        InventoryError::validation(field.name(), format!("'{text}' is not a YYYY-MM-DD date: {e}"))
    })
}

fn format_date(date: NaiveDate) -> RawValue {
    RawValue::Scalar(date.format(DATE_FORMAT).to_string())
}

fn check_content_id(uid: u32, value: &RawValue) {
    match value.to_string().trim().parse::<u32>() {
        Ok(content_id) if content_id == uid => {}
        Ok(content_id) => {
            tracing::warn!(uid, content_id, "dataentry ID disagrees with page address");
        }
        Err(_) => {
            tracing::warn!(uid, id = %value, "dataentry ID is not numeric");
        }
    }
}
