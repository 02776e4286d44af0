//! Database operations using SQLx

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{FromRow, Pool, QueryBuilder, Row, Sqlite};
use thiserror::Error;
use uuid::Uuid;

use crate::query::ast::{GroupByToken, Query};
use crate::query::sql::{
    group_column_list, push_drilldown_conditions, push_drilldown_joins, push_group_joins,
    push_group_projection, push_query_conditions, GroupColumnFilter,
};

use super::models::*;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Record not found")]
    NotFound,
    #[error("Record already exists")]
    AlreadyExists,
    #[error("Referenced record does not exist")]
    ForeignKeyViolation,
}

/// Half-open `[start, end)` filter over row creation times.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Stored timestamp format. Fixed fractional width keeps the TEXT
/// ordering identical to the chronological one.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, false)
}

fn now_timestamp() -> String {
    timestamp(Utc::now())
}

fn translate_constraint(err: sqlx::Error) -> DatabaseError {
    if err
        .as_database_error()
        .is_some_and(|db_err| db_err.is_foreign_key_violation())
    {
        return DatabaseError::ForeignKeyViolation;
    }
    DatabaseError::Sqlx(err)
}

/// Database wrapper with connection pool
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    // ==================== User Operations ====================

    pub async fn create_user(
        &self,
        username: &str,
        password_salt: &[u8],
        password_hash: &[u8],
    ) -> Result<UserRow, DatabaseError> {
        let row = UserRow {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_salt: password_salt.to_vec(),
            password_hash: password_hash.to_vec(),
            created_at: now_timestamp(),
            updated_at: now_timestamp(),
        };
        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_salt, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.username)
        .bind(&row.password_salt)
        .bind(&row.password_hash)
        .bind(&row.created_at)
        .bind(&row.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_user(&self, id: &str) -> Result<UserRow, DatabaseError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DatabaseError::NotFound)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<UserRow, DatabaseError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DatabaseError::NotFound)
    }

    pub async fn update_user_password(
        &self,
        user_id: &str,
        password_salt: &[u8],
        password_hash: &[u8],
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE users SET password_salt = ?, password_hash = ?, updated_at = ? WHERE id = ?",
        )
        .bind(password_salt)
        .bind(password_hash)
        .bind(now_timestamp())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== API Key Operations ====================

    pub async fn create_api_key(
        &self,
        user_id: &str,
        description: Option<String>,
        secret_salt: &[u8],
        secret_hash: &[u8],
    ) -> Result<ApiKeyRow, DatabaseError> {
        let row = ApiKeyRow {
            id: Uuid::new_v4().to_string(),
            description,
            secret_salt: secret_salt.to_vec(),
            secret_hash: secret_hash.to_vec(),
            user_id: user_id.to_string(),
            created_at: now_timestamp(),
            updated_at: now_timestamp(),
        };
        sqlx::query(
            r#"
            INSERT INTO api_keys (id, description, secret_salt, secret_hash, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.description)
        .bind(&row.secret_salt)
        .bind(&row.secret_hash)
        .bind(&row.user_id)
        .bind(&row.created_at)
        .bind(&row.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(row)
    }

    /// Unscoped lookup used by API-key authentication.
    pub async fn get_api_key(&self, id: &str) -> Result<Option<ApiKeyRow>, DatabaseError> {
        Ok(sqlx::query_as::<_, ApiKeyRow>("SELECT * FROM api_keys WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn get_api_key_for_user(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<ApiKeyRow, DatabaseError> {
        sqlx::query_as::<_, ApiKeyRow>("SELECT * FROM api_keys WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DatabaseError::NotFound)
    }

    pub async fn list_api_keys(
        &self,
        user_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<ApiKeyRow>, i64), DatabaseError> {
        let items = sqlx::query_as::<_, ApiKeyRow>(
            "SELECT * FROM api_keys WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM api_keys WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((items, total))
    }

    pub async fn delete_api_key(&self, id: &str, user_id: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound);
        }
        Ok(())
    }

    // ==================== Session Operations ====================

    pub async fn create_session(
        &self,
        id: &str,
        description: Option<String>,
        baggage: Option<String>,
        user_id: &str,
    ) -> Result<SessionRow, DatabaseError> {
        let row = SessionRow {
            id: id.to_string(),
            description,
            baggage,
            user_id: user_id.to_string(),
            created_at: now_timestamp(),
            updated_at: now_timestamp(),
        };
        let result = sqlx::query(
            r#"
            INSERT INTO sessions (id, description, baggage, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.description)
        .bind(&row.baggage)
        .bind(&row.user_id)
        .bind(&row.created_at)
        .bind(&row.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(row),
            Err(e) => {
                if e.as_database_error()
                    .is_some_and(|db_err| db_err.is_unique_violation())
                {
                    return Err(DatabaseError::AlreadyExists);
                }
                Err(DatabaseError::Sqlx(e))
            }
        }
    }

    /// Unscoped lookup used by ingress to distinguish "unknown session"
    /// from "someone else's session".
    pub async fn get_session(&self, id: &str) -> Result<Option<SessionRow>, DatabaseError> {
        Ok(sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn get_session_for_user(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<SessionRow, DatabaseError> {
        sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DatabaseError::NotFound)
    }

    pub async fn list_sessions(
        &self,
        user_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<SessionRow>, i64), DatabaseError> {
        let items = sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM sessions WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((items, total))
    }

    // ==================== Label Operations ====================

    pub async fn insert_labels(
        &self,
        session_id: &str,
        user_id: &str,
        labels: &[(String, Option<String>)],
    ) -> Result<(), DatabaseError> {
        if labels.is_empty() {
            return Ok(());
        }
        let now = now_timestamp();
        let mut builder = QueryBuilder::new(
            "INSERT INTO labels (key, value, session_id, user_id, created_at, updated_at) ",
        );
        builder.push_values(labels, |mut b, (key, value)| {
            b.push_bind(key.clone())
                .push_bind(value.clone())
                .push_bind(session_id.to_string())
                .push_bind(user_id.to_string())
                .push_bind(now.clone())
                .push_bind(now.clone());
        });
        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(translate_constraint)?;
        Ok(())
    }

    pub async fn list_labels(
        &self,
        session_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<LabelRow>, i64), DatabaseError> {
        let items = sqlx::query_as::<_, LabelRow>(
            "SELECT * FROM labels WHERE session_id = ? ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?",
        )
        .bind(session_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM labels WHERE session_id = ?")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((items, total))
    }

    // ==================== Testcase Operations ====================

    /// One multi-row INSERT for a whole ingress batch; returns the
    /// assigned ids in input order.
    pub async fn insert_testcases(
        &self,
        testcases: &[NewTestcase],
    ) -> Result<Vec<String>, DatabaseError> {
        if testcases.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = testcases
            .iter()
            .map(|_| Uuid::new_v4().to_string())
            .collect();
        let now = now_timestamp();
        let mut builder = QueryBuilder::new(
            "INSERT INTO testcases (id, status, name, classname, file, testsuite, output, baggage, session_id, user_id, created_at, updated_at) ",
        );
        builder.push_values(testcases.iter().zip(&ids), |mut b, (tc, id)| {
            b.push_bind(id.clone())
                .push_bind(tc.status.code())
                .push_bind(tc.name.clone())
                .push_bind(tc.classname.clone())
                .push_bind(tc.file.clone())
                .push_bind(tc.testsuite.clone())
                .push_bind(tc.output.clone())
                .push_bind(tc.baggage.clone())
                .push_bind(tc.session_id.clone())
                .push_bind(tc.user_id.clone())
                .push_bind(now.clone())
                .push_bind(now.clone());
        });
        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(translate_constraint)?;
        Ok(ids)
    }

    pub async fn get_testcase_for_user(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<TestcaseRow, DatabaseError> {
        sqlx::query_as::<_, TestcaseRow>("SELECT * FROM testcases WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DatabaseError::NotFound)
    }

    // ==================== Query Execution ====================

    /// Filtered testcase listing: one round trip producing the page rows,
    /// the unpaginated total and the worst status over the whole result.
    pub async fn list_testcases(
        &self,
        user_id: &str,
        query: &Query,
        window: DateWindow,
        drilldown: Option<&[GroupColumnFilter]>,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<TestcaseRow>, i64, Option<TestcaseStatus>), DatabaseError> {
        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("WITH cte AS (SELECT testcases.* FROM testcases");
        if let Some(filters) = drilldown {
            push_drilldown_joins(&mut builder, filters);
        }
        builder.push(" WHERE testcases.user_id = ");
        builder.push_bind(user_id.to_string());
        self.push_filters(&mut builder, query, window);
        if let Some(filters) = drilldown {
            push_drilldown_conditions(&mut builder, filters);
        }
        builder.push(
            ") SELECT cte.*, COUNT(1) OVER () AS total_count, \
             MIN(cte.status) OVER () AS aggregated_status \
             FROM cte ORDER BY cte.created_at DESC LIMIT ",
        );
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder.build().fetch_all(&self.pool).await?;

        let mut items = Vec::with_capacity(rows.len());
        let mut total = 0i64;
        let mut aggregated_status = None;
        for (i, row) in rows.iter().enumerate() {
            if i == 0 {
                total = row.try_get("total_count")?;
                aggregated_status = row.try_get("aggregated_status")?;
            }
            items.push(TestcaseRow::from_row(row)?);
        }
        Ok((items, total, aggregated_status))
    }

    /// Grouped listing: group columns in token order, `MIN(status)` per
    /// group, ordered by the group columns for a deterministic page.
    pub async fn list_groups(
        &self,
        user_id: &str,
        tokens: &[GroupByToken],
        query: &Query,
        window: DateWindow,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<GroupItem>, i64, Option<TestcaseStatus>), DatabaseError> {
        let columns = group_column_list(tokens);

        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new("WITH cte AS (SELECT ");
        push_group_projection(&mut builder, tokens);
        builder.push(", MIN(testcases.status) AS group_status FROM testcases");
        push_group_joins(&mut builder, tokens);
        builder.push(" WHERE testcases.user_id = ");
        builder.push_bind(user_id.to_string());
        self.push_filters(&mut builder, query, window);
        builder.push(format!(
            " GROUP BY {columns}) \
             SELECT cte.*, COUNT(1) OVER () AS total_count, \
             MIN(cte.group_status) OVER () AS aggregated_status \
             FROM cte ORDER BY {columns} LIMIT "
        ));
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder.build().fetch_all(&self.pool).await?;

        let mut items = Vec::with_capacity(rows.len());
        let mut total = 0i64;
        let mut aggregated_status = None;
        for (i, row) in rows.iter().enumerate() {
            if i == 0 {
                total = row.try_get("total_count")?;
                aggregated_status = row.try_get("aggregated_status")?;
            }
            let mut group_columns = Vec::with_capacity(tokens.len());
            for col in 0..tokens.len() {
                group_columns.push(row.try_get::<Option<String>, _>(format!("group_{col}").as_str())?);
            }
            items.push(GroupItem {
                columns: group_columns,
                status: row.try_get("group_status")?,
            });
        }
        Ok((items, total, aggregated_status))
    }

    fn push_filters(
        &self,
        builder: &mut QueryBuilder<'_, Sqlite>,
        query: &Query,
        window: DateWindow,
    ) {
        if !matches!(query, Query::Empty) {
            builder.push(" AND (");
            push_query_conditions(builder, query);
            builder.push(")");
        }
        if let Some(start) = window.start {
            builder.push(" AND testcases.created_at >= ");
            builder.push_bind(timestamp(start));
        }
        if let Some(end) = window.end {
            builder.push(" AND testcases.created_at < ");
            builder.push_bind(timestamp(end));
        }
    }
}
