//! SurrealDB implementation of [`CommentRepository`].

use chrono::{DateTime, Utc};
use softdesk_core::error::SoftdeskResult;
use softdesk_core::models::comment::{Comment, CommentQuery, CreateComment, UpdateComment};
use softdesk_core::repository::{CommentRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{
    ACTIVE_PROJECT_CLAUSE, CountRow, claim_users, first_total, parse_uuid, retry_on_conflict,
};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct CommentRow {
    record_id: String,
    tenant_id: String,
    project_id: String,
    issue_id: String,
    description: String,
    author_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CommentRow {
    fn try_into_comment(self) -> Result<Comment, DbError> {
        Ok(Comment {
            id: parse_uuid("comment", &self.record_id)?,
            tenant_id: parse_uuid("comment", &self.tenant_id)?,
            project_id: parse_uuid("comment", &self.project_id)?,
            issue_id: parse_uuid("comment", &self.issue_id)?,
            description: self.description,
            author_id: parse_uuid("comment", &self.author_id)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Comment repository.
#[derive(Clone)]
pub struct SurrealCommentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCommentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// One attempt at the guarded create; `None` when the author is gone.
    async fn try_create(
        &self,
        id: Uuid,
        input: &CreateComment,
    ) -> Result<Option<CommentRow>, DbError> {
        let query = format!(
            "IF {claims} {{ \
                 CREATE type::record('comment', $id) SET \
                 tenant_id = $tenant_id, project_id = $project_id, \
                 issue_id = $issue_id, description = $description, \
                 author_id = $author_id; \
             }}; \
             SELECT meta::id(id) AS record_id, * \
             FROM type::record('comment', $id);",
            claims = claim_users(&["author_id"]),
        );

        let mut result = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("project_id", input.project_id.to_string()))
            .bind(("issue_id", input.issue_id.to_string()))
            .bind(("description", input.description.clone()))
            .bind(("author_id", input.author_id.to_string()))
            .await
            .map_err(|e| DbError::from_statement(e, "comment"))?
            .check()
            .map_err(|e| DbError::from_statement(e, "comment"))?;

        let rows: Vec<CommentRow> = result.take(1)?;
        Ok(rows.into_iter().next())
    }

    /// One attempt at the guarded update; `false` when a new author is gone.
    async fn try_update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: &UpdateComment,
    ) -> Result<bool, DbError> {
        let mut sets = Vec::new();
        let mut referenced = Vec::new();
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.author_id.is_some() {
            sets.push("author_id = $author_id");
            referenced.push("author_id");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "IF {claims} {{ \
                 UPDATE type::record('comment', $id) SET {sets} \
                 WHERE tenant_id = $tenant_id; \
                 [$id] \
             }} ELSE {{ [] }};",
            claims = claim_users(&referenced),
            sets = sets.join(", "),
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()));

        if let Some(description) = &input.description {
            builder = builder.bind(("description", description.clone()));
        }
        if let Some(author_id) = input.author_id {
            builder = builder.bind(("author_id", author_id.to_string()));
        }

        let mut result = builder
            .await
            .map_err(|e| DbError::from_statement(e, "comment"))?
            .check()
            .map_err(|e| DbError::from_statement(e, "comment"))?;

        let applied: Vec<surrealdb_types::Value> = result.take(0)?;
        Ok(!applied.is_empty())
    }

    async fn select_one(&self, tenant_id: Uuid, id: Uuid, query: &str) -> SoftdeskResult<Comment> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(query.to_string())
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CommentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "comment".into(),
            id: id_str,
        })?;

        Ok(row.try_into_comment()?)
    }
}

const SELECT_COMMENT: &str = "SELECT meta::id(id) AS record_id, * \
     FROM type::record('comment', $id) WHERE tenant_id = $tenant_id";

impl<C: Connection> CommentRepository for SurrealCommentRepository<C> {
    async fn create(&self, input: CreateComment) -> SoftdeskResult<Comment> {
        let id = Uuid::new_v4();
        let pending = &input;

        let row = retry_on_conflict(move || self.try_create(id, pending))
            .await?
            .ok_or_else(|| DbError::NotFound {
                entity: "user".into(),
                id: input.author_id.to_string(),
            })?;

        Ok(row.try_into_comment()?)
    }

    async fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        visible_only: bool,
    ) -> SoftdeskResult<Comment> {
        if visible_only {
            let query = format!("{SELECT_COMMENT} AND {ACTIVE_PROJECT_CLAUSE}");
            self.select_one(tenant_id, id, &query).await
        } else {
            self.select_one(tenant_id, id, SELECT_COMMENT).await
        }
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateComment,
    ) -> SoftdeskResult<Comment> {
        let pending = &input;
        if !retry_on_conflict(move || self.try_update(tenant_id, id, pending)).await? {
            return Err(DbError::NotFound {
                entity: "user".into(),
                id: input.author_id.map(|author| author.to_string()).unwrap_or_default(),
            }
            .into());
        }

        self.select_one(tenant_id, id, SELECT_COMMENT).await
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> SoftdeskResult<()> {
        let mut result = self
            .db
            .query(
                "DELETE type::record('comment', $id) \
                 WHERE tenant_id = $tenant_id RETURN BEFORE",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let deleted: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        if deleted.is_empty() {
            return Err(DbError::NotFound {
                entity: "comment".into(),
                id: id.to_string(),
            }
            .into());
        }

        Ok(())
    }

    async fn list(
        &self,
        query: CommentQuery,
        pagination: Pagination,
    ) -> SoftdeskResult<PaginatedResult<Comment>> {
        let mut conditions = vec!["tenant_id = $tenant_id", "issue_id = $issue_id"];
        if query.author_id.is_some() {
            conditions.push("author_id = $author_id");
        }
        if query.visible_only {
            conditions.push(ACTIVE_PROJECT_CLAUSE);
        }
        let filter = conditions.join(" AND ");

        let statement = format!(
            "SELECT count() AS total FROM comment WHERE {filter} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM comment WHERE {filter} \
             ORDER BY created_at ASC \
             LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(statement)
            .bind(("tenant_id", query.tenant_id.to_string()))
            .bind(("issue_id", query.issue_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));

        if let Some(author_id) = query.author_id {
            builder = builder.bind(("author_id", author_id.to_string()));
        }

        let mut result = builder.await.map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = first_total(&count_rows);

        let rows: Vec<CommentRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_comment())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
