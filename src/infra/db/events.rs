use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::repos::{EventQueryFilter, EventsRepo, NewEventParams, RepoError},
    domain::events::{EventKind, EventRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

const EVENT_COLUMNS: &str = "id, subject_id, kind, related_item_id, category, occurred_at";

#[derive(sqlx::FromRow)]
struct EventRow {
    id: i64,
    subject_id: i64,
    kind: EventKind,
    related_item_id: Option<i64>,
    category: Option<String>,
    occurred_at: OffsetDateTime,
}

impl From<EventRow> for EventRecord {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            subject_id: row.subject_id,
            kind: row.kind,
            related_item_id: row.related_item_id,
            category: row.category,
            occurred_at: row.occurred_at,
        }
    }
}

impl PostgresRepositories {
    fn apply_event_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q EventQueryFilter) {
        if let Some(subject_id) = filter.subject_id {
            qb.push(" AND subject_id = ");
            qb.push_bind(subject_id);
        }

        if let Some(kind) = filter.kind {
            qb.push(" AND kind = ");
            qb.push_bind(kind);
        }

        if let Some(category) = filter.category.as_ref() {
            qb.push(" AND category = ");
            qb.push_bind(category);
        }

        if let Some(related_item_id) = filter.related_item_id {
            qb.push(" AND related_item_id = ");
            qb.push_bind(related_item_id);
        }

        if let Some(from) = filter.from {
            qb.push(" AND occurred_at >= ");
            qb.push_bind(from);
        }

        if let Some(to) = filter.to {
            qb.push(" AND occurred_at <= ");
            qb.push_bind(to);
        }
    }
}

#[async_trait]
impl EventsRepo for PostgresRepositories {
    async fn persist(&self, params: NewEventParams) -> Result<EventRecord, RepoError> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            INSERT INTO events (subject_id, kind, related_item_id, category, occurred_at)
            VALUES ($1, $2, $3, $4, COALESCE($5, now()))
            RETURNING id, subject_id, kind, related_item_id, category, occurred_at
            "#,
        )
        .bind(params.subject_id)
        .bind(params.kind)
        .bind(params.related_item_id)
        .bind(params.category)
        .bind(params.occurred_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn query_with_filters(
        &self,
        filter: &EventQueryFilter,
    ) -> Result<Vec<EventRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(EVENT_COLUMNS);
        qb.push(" FROM events WHERE 1=1");
        Self::apply_event_filter(&mut qb, filter);
        qb.push(" ORDER BY occurred_at DESC, id DESC");

        let rows = qb
            .build_query_as::<EventRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(EventRecord::from).collect())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.ping().await.map_err(map_sqlx_error)
    }
}
