//! Query signature used to key the result cache.

use time::{OffsetDateTime, UtcOffset};

use crate::application::repos::EventQueryFilter;
use crate::domain::events::EventKind;

/// Normalized tuple of every filter parameter of an event query.
///
/// Absent fields are concrete values: a signature with no category never
/// equals one with a category, and two signatures are equal only when every
/// field matches. Time bounds are stored in UTC so equal instants written with
/// different offsets share a signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuerySignature {
    pub subject_id: Option<i64>,
    pub kind: Option<EventKind>,
    pub category: Option<String>,
    pub related_item_id: Option<i64>,
    pub from: Option<OffsetDateTime>,
    pub to: Option<OffsetDateTime>,
}

impl From<&EventQueryFilter> for QuerySignature {
    fn from(filter: &EventQueryFilter) -> Self {
        Self {
            subject_id: filter.subject_id,
            kind: filter.kind,
            category: filter.category.clone(),
            related_item_id: filter.related_item_id,
            from: filter.from.map(to_utc),
            to: filter.to.map(to_utc),
        }
    }
}

fn to_utc(value: OffsetDateTime) -> OffsetDateTime {
    value.to_offset(UtcOffset::UTC)
}
