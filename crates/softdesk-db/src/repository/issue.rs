//! SurrealDB implementation of [`IssueRepository`].

use chrono::{DateTime, Utc};
use softdesk_core::error::SoftdeskResult;
use softdesk_core::models::issue::{
    Balise, CreateIssue, Issue, IssueQuery, Priority, Progression, UpdateIssue,
};
use softdesk_core::repository::{IssueRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{
    ACTIVE_PROJECT_CLAUSE, CountRow, claim_users, first_total, parse_uuid, retry_on_conflict,
};
use crate::error::DbError;

/// DB-side row struct; the record ID comes from `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct IssueRow {
    record_id: String,
    tenant_id: String,
    project_id: String,
    name: String,
    description: String,
    priority: String,
    balise: String,
    progression: String,
    author_id: String,
    attribution_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IssueRow {
    fn try_into_issue(self) -> Result<Issue, DbError> {
        let priority: Priority = self.priority.parse().map_err(|_| {
            DbError::invalid("issue", format!("unknown priority: {}", self.priority))
        })?;
        let balise: Balise = self
            .balise
            .parse()
            .map_err(|_| DbError::invalid("issue", format!("unknown balise: {}", self.balise)))?;
        let progression: Progression = self.progression.parse().map_err(|_| {
            DbError::invalid("issue", format!("unknown progression: {}", self.progression))
        })?;
        Ok(Issue {
            id: parse_uuid("issue", &self.record_id)?,
            tenant_id: parse_uuid("issue", &self.tenant_id)?,
            project_id: parse_uuid("issue", &self.project_id)?,
            name: self.name,
            description: self.description,
            priority,
            balise,
            progression,
            author_id: parse_uuid("issue", &self.author_id)?,
            attribution_id: parse_uuid("issue", &self.attribution_id)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Issue repository.
#[derive(Clone)]
pub struct SurrealIssueRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealIssueRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// One attempt at the guarded create; `None` when the author or the
    /// attributed user is gone.
    async fn try_create(&self, id: Uuid, input: &CreateIssue) -> Result<Option<IssueRow>, DbError> {
        let query = format!(
            "IF {claims} {{ \
                 CREATE type::record('issue', $id) SET \
                 tenant_id = $tenant_id, project_id = $project_id, \
                 name = $name, description = $description, \
                 priority = $priority, balise = $balise, \
                 progression = $progression, \
                 author_id = $author_id, attribution_id = $attribution_id; \
                 [$id] \
             }} ELSE {{ [] }}; \
             SELECT meta::id(id) AS record_id, * \
             FROM type::record('issue', $id);",
            claims = claim_users(&["author_id", "attribution_id"]),
        );

        let mut result = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("project_id", input.project_id.to_string()))
            .bind(("name", input.name.clone()))
            .bind(("description", input.description.clone()))
            .bind(("priority", input.priority.as_str().to_string()))
            .bind(("balise", input.balise.as_str().to_string()))
            .bind(("progression", input.progression.as_str().to_string()))
            .bind(("author_id", input.author_id.to_string()))
            .bind(("attribution_id", input.attribution_id.to_string()))
            .await
            .map_err(|e| DbError::from_statement(e, "issue"))?
            .check()
            .map_err(|e| DbError::from_statement(e, "issue"))?;

        let rows: Vec<IssueRow> = result.take(1)?;
        Ok(rows.into_iter().next())
    }

    /// One attempt at the guarded update; `Ok(None)` when a newly
    /// referenced user is gone.
    async fn try_update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: &UpdateIssue,
    ) -> Result<Option<Vec<IssueRow>>, DbError> {
        let mut sets = Vec::new();
        let mut referenced = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.priority.is_some() {
            sets.push("priority = $priority");
        }
        if input.balise.is_some() {
            sets.push("balise = $balise");
        }
        if input.progression.is_some() {
            sets.push("progression = $progression");
        }
        if input.author_id.is_some() {
            sets.push("author_id = $author_id");
            referenced.push("author_id");
        }
        if input.attribution_id.is_some() {
            sets.push("attribution_id = $attribution_id");
            referenced.push("attribution_id");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "IF {claims} {{ \
                 UPDATE type::record('issue', $id) SET {sets} \
                 WHERE tenant_id = $tenant_id; \
                 [$id] \
             }} ELSE {{ [] }}; \
             SELECT meta::id(id) AS record_id, * FROM type::record('issue', $id) \
             WHERE tenant_id = $tenant_id;",
            claims = claim_users(&referenced),
            sets = sets.join(", "),
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()));

        if let Some(name) = &input.name {
            builder = builder.bind(("name", name.clone()));
        }
        if let Some(description) = &input.description {
            builder = builder.bind(("description", description.clone()));
        }
        if let Some(priority) = input.priority {
            builder = builder.bind(("priority", priority.as_str().to_string()));
        }
        if let Some(balise) = input.balise {
            builder = builder.bind(("balise", balise.as_str().to_string()));
        }
        if let Some(progression) = input.progression {
            builder = builder.bind(("progression", progression.as_str().to_string()));
        }
        if let Some(author_id) = input.author_id {
            builder = builder.bind(("author_id", author_id.to_string()));
        }
        if let Some(attribution_id) = input.attribution_id {
            builder = builder.bind(("attribution_id", attribution_id.to_string()));
        }

        let mut result = builder
            .await
            .map_err(|e| DbError::from_statement(e, "issue"))?
            .check()
            .map_err(|e| DbError::from_statement(e, "issue"))?;

        let applied: Vec<surrealdb_types::Value> = result.take(0)?;
        if applied.is_empty() {
            return Ok(None);
        }
        Ok(Some(result.take(1)?))
    }
}

fn referenced_user_gone(author: Option<Uuid>, attribution: Option<Uuid>) -> DbError {
    let ids: Vec<String> = [author, attribution]
        .into_iter()
        .flatten()
        .map(|id| id.to_string())
        .collect();
    DbError::NotFound {
        entity: "user".into(),
        id: ids.join(", "),
    }
}

impl<C: Connection> IssueRepository for SurrealIssueRepository<C> {
    async fn create(&self, input: CreateIssue) -> SoftdeskResult<Issue> {
        let id = Uuid::new_v4();
        let pending = &input;

        let row = retry_on_conflict(move || self.try_create(id, pending))
            .await?
            .ok_or_else(|| {
                referenced_user_gone(Some(input.author_id), Some(input.attribution_id))
            })?;

        Ok(row.try_into_issue()?)
    }

    async fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        visible_only: bool,
    ) -> SoftdeskResult<Issue> {
        let id_str = id.to_string();

        let mut query = String::from(
            "SELECT meta::id(id) AS record_id, * FROM type::record('issue', $id) \
             WHERE tenant_id = $tenant_id",
        );
        if visible_only {
            query.push_str(" AND ");
            query.push_str(ACTIVE_PROJECT_CLAUSE);
        }

        let mut result = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IssueRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "issue".into(),
            id: id_str,
        })?;

        Ok(row.try_into_issue()?)
    }

    async fn name_taken(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        name: &str,
        exclude: Option<Uuid>,
    ) -> SoftdeskResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM issue \
                 WHERE tenant_id = $tenant_id AND project_id = $project_id \
                 AND name = $name AND meta::id(id) != $exclude GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("project_id", project_id.to_string()))
            .bind(("name", name.to_string()))
            .bind(("exclude", exclude.map(|id| id.to_string()).unwrap_or_default()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_total(&rows) > 0)
    }

    async fn update(&self, tenant_id: Uuid, id: Uuid, input: UpdateIssue) -> SoftdeskResult<Issue> {
        let pending = &input;
        let rows = retry_on_conflict(move || self.try_update(tenant_id, id, pending))
            .await?
            .ok_or_else(|| referenced_user_gone(input.author_id, input.attribution_id))?;

        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "issue".into(),
            id: id.to_string(),
        })?;

        Ok(row.try_into_issue()?)
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> SoftdeskResult<()> {
        self.get_by_id(tenant_id, id, false).await?;

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE comment WHERE tenant_id = $tenant_id AND issue_id = $id; \
                 DELETE type::record('issue', $id) WHERE tenant_id = $tenant_id; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(e, "issue"))?;

        Ok(())
    }

    async fn list(
        &self,
        query: IssueQuery,
        pagination: Pagination,
    ) -> SoftdeskResult<PaginatedResult<Issue>> {
        let mut conditions = vec!["tenant_id = $tenant_id", "project_id = $project_id"];
        if query.author_id.is_some() {
            conditions.push("author_id = $author_id");
        }
        if query.visible_only {
            conditions.push(ACTIVE_PROJECT_CLAUSE);
        }
        let filter = conditions.join(" AND ");

        let statement = format!(
            "SELECT count() AS total FROM issue WHERE {filter} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM issue WHERE {filter} \
             ORDER BY created_at ASC \
             LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(statement)
            .bind(("tenant_id", query.tenant_id.to_string()))
            .bind(("project_id", query.project_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));

        if let Some(author_id) = query.author_id {
            builder = builder.bind(("author_id", author_id.to_string()));
        }

        let mut result = builder.await.map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = first_total(&count_rows);

        let rows: Vec<IssueRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_issue())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
