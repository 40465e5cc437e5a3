//! Response-shape extraction
//!
//! The listing endpoint has served its items under several wrappers over time.
//! Each known shape is one candidate; candidates are tried in order and the
//! first one that finds an array wins. An array that is present but empty still
//! counts as a match: it means the stream is exhausted.

use crate::table::Record;
use serde_json::Value;

/// One known location of the item list inside a payload
#[derive(Debug, Clone, Copy)]
pub struct ItemListShape {
    pub name: &'static str,
    pointer: &'static str,
}

impl ItemListShape {
    /// Returns the item array if this shape matches the payload
    pub fn extract<'a>(&self, payload: &'a Value) -> Option<&'a [Value]> {
        payload
            .pointer(self.pointer)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
    }
}

/// Candidate item-list shapes, in priority order
pub const ITEM_LIST_SHAPES: &[ItemListShape] = &[
    ItemListShape {
        name: "bare array",
        pointer: "",
    },
    ItemListShape {
        name: "data",
        pointer: "/data",
    },
    ItemListShape {
        name: "data.data",
        pointer: "/data/data",
    },
    ItemListShape {
        name: "results",
        pointer: "/results",
    },
    ItemListShape {
        name: "items",
        pointer: "/items",
    },
    ItemListShape {
        name: "formasi",
        pointer: "/formasi",
    },
];

/// Locations of a total-count hint, in priority order
const TOTAL_HINT_POINTERS: &[&str] = &[
    "/data/meta/total",
    "/data/page/total",
    "/meta/total",
    "/total",
    "/count",
];

/// Extracts the page's records from a decoded payload
///
/// Returns None if no shape matches, or if the matched array holds anything
/// other than JSON objects.
pub fn extract_items(payload: &Value) -> Option<Vec<Record>> {
    let (shape, items) = ITEM_LIST_SHAPES
        .iter()
        .find_map(|shape| shape.extract(payload).map(|items| (shape, items)))?;

    tracing::trace!("Payload matched item-list shape '{}'", shape.name);

    items.iter().cloned().map(Record::from_json).collect()
}

/// Extracts the server's total record count, when the payload carries one
pub fn extract_total_hint(payload: &Value) -> Option<u64> {
    TOTAL_HINT_POINTERS
        .iter()
        .find_map(|pointer| payload.pointer(pointer).and_then(Value::as_u64))
}
