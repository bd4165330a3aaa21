//! SurrealDB implementation of [`ProjectRepository`].
//!
//! Membership lives on the `contributes_to` edge (user -> project). The
//! author's first membership and `contributor_count` are written in the
//! same statement as the project itself.

use chrono::{DateTime, Utc};
use softdesk_core::error::SoftdeskResult;
use softdesk_core::models::project::{
    CreateProject, Project, ProjectQuery, ProjectType, UpdateProject,
};
use softdesk_core::repository::{PaginatedResult, Pagination, ProjectRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, claim_user, first_total, parse_uuid, retry_on_conflict};
use crate::error::DbError;

/// DB-side row struct; the record ID comes from `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct ProjectRow {
    record_id: String,
    tenant_id: String,
    name: String,
    description: String,
    kind: String,
    author_id: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProjectRow {
    fn try_into_project(self) -> Result<Project, DbError> {
        let kind: ProjectType = self
            .kind
            .parse()
            .map_err(|_| DbError::invalid("project", format!("unknown type: {}", self.kind)))?;
        Ok(Project {
            id: parse_uuid("project", &self.record_id)?,
            tenant_id: parse_uuid("project", &self.tenant_id)?,
            name: self.name,
            description: self.description,
            kind,
            author_id: parse_uuid("project", &self.author_id)?,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Project repository.
#[derive(Clone)]
pub struct SurrealProjectRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealProjectRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// One attempt at the guarded create; `false` when the author is gone.
    async fn try_create(&self, id: Uuid, input: &CreateProject) -> Result<bool, DbError> {
        let id_str = id.to_string();
        let author_str = input.author_id.to_string();

        let query = format!(
            "IF {claim} {{ \
                 CREATE type::record('project', $id) SET \
                 tenant_id = $tenant_id, name = $name, \
                 description = $description, kind = $kind, \
                 author_id = $author_id, is_active = true, \
                 contributor_count = 1; \
                 RELATE user:`{author_str}` -> contributes_to -> project:`{id_str}` \
                 SET tenant_id = $tenant_id; \
                 [$id] \
             }} ELSE {{ [] }};",
            claim = claim_user("author_id"),
        );

        let mut result = self
            .db
            .query(query)
            .bind(("id", id_str))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("name", input.name.clone()))
            .bind(("description", input.description.clone()))
            .bind(("kind", input.kind.as_str().to_string()))
            .bind(("author_id", author_str))
            .await
            .map_err(|e| DbError::from_statement(e, "project"))?
            .check()
            .map_err(|e| DbError::from_statement(e, "project"))?;

        let created: Vec<surrealdb_types::Value> = result.take(0)?;
        Ok(!created.is_empty())
    }

    /// One attempt at the guarded transfer; `false` when the new author is
    /// gone.
    async fn try_transfer(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        new_author_id: Uuid,
    ) -> Result<bool, DbError> {
        let id_str = id.to_string();
        let author_str = new_author_id.to_string();

        let query = format!(
            "IF {claim} {{ \
                 UPDATE type::record('project', $id) SET \
                 author_id = $author_id, updated_at = time::now() \
                 WHERE tenant_id = $tenant_id; \
                 IF array::len((SELECT VALUE id FROM contributes_to \
                     WHERE in = type::record('user', $author_id) \
                     AND out = type::record('project', $id))) = 0 {{ \
                     UPDATE type::record('project', $id) \
                     SET contributor_count += 1; \
                     RELATE user:`{author_str}` -> contributes_to -> project:`{id_str}` \
                     SET tenant_id = $tenant_id; \
                 }}; \
                 [$id] \
             }} ELSE {{ [] }};",
            claim = claim_user("author_id"),
        );

        let mut result = self
            .db
            .query(query)
            .bind(("id", id_str))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("author_id", author_str))
            .await
            .map_err(|e| DbError::from_statement(e, "project"))?
            .check()
            .map_err(|e| DbError::from_statement(e, "project"))?;

        let transferred: Vec<surrealdb_types::Value> = result.take(0)?;
        Ok(!transferred.is_empty())
    }
}

fn author_gone(author_id: Uuid) -> DbError {
    DbError::NotFound {
        entity: "user".into(),
        id: author_id.to_string(),
    }
}

fn visibility_clause(visible_only: bool) -> &'static str {
    if visible_only { " AND is_active = true" } else { "" }
}

impl<C: Connection> ProjectRepository for SurrealProjectRepository<C> {
    async fn create(&self, input: CreateProject) -> SoftdeskResult<Project> {
        let id = Uuid::new_v4();

        let pending = &input;
        if !retry_on_conflict(move || self.try_create(id, pending)).await? {
            return Err(author_gone(input.author_id).into());
        }

        self.get_by_id(input.tenant_id, id, false).await
    }

    async fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        visible_only: bool,
    ) -> SoftdeskResult<Project> {
        let id_str = id.to_string();

        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM type::record('project', $id) \
             WHERE tenant_id = $tenant_id{}",
            visibility_clause(visible_only)
        );

        let mut result = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ProjectRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "project".into(),
            id: id_str,
        })?;

        Ok(row.try_into_project()?)
    }

    async fn name_taken(
        &self,
        tenant_id: Uuid,
        name: &str,
        exclude: Option<Uuid>,
    ) -> SoftdeskResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM project \
                 WHERE tenant_id = $tenant_id AND name = $name \
                 AND meta::id(id) != $exclude GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("name", name.to_string()))
            .bind(("exclude", exclude.map(|id| id.to_string()).unwrap_or_default()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_total(&rows) > 0)
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateProject,
    ) -> SoftdeskResult<Project> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.kind.is_some() {
            sets.push("kind = $kind");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('project', $id) SET {} \
             WHERE tenant_id = $tenant_id",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(kind) = input.kind {
            builder = builder.bind(("kind", kind.as_str().to_string()));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(e, "project"))?;

        self.get_by_id(tenant_id, id, false).await
    }

    async fn transfer_author(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        new_author_id: Uuid,
    ) -> SoftdeskResult<Project> {
        // Confirms the project belongs to the tenant before the edge is written.
        self.get_by_id(tenant_id, id, false).await?;

        let transferred =
            retry_on_conflict(move || self.try_transfer(tenant_id, id, new_author_id)).await?;
        if !transferred {
            return Err(author_gone(new_author_id).into());
        }

        self.get_by_id(tenant_id, id, false).await
    }

    async fn deactivate(&self, tenant_id: Uuid, id: Uuid) -> SoftdeskResult<Project> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "UPDATE type::record('project', $id) SET \
                 is_active = false, updated_at = time::now() \
                 WHERE tenant_id = $tenant_id; \
                 SELECT meta::id(id) AS record_id, * FROM type::record('project', $id) \
                 WHERE tenant_id = $tenant_id;",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ProjectRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "project".into(),
            id: id_str,
        })?;

        Ok(row.try_into_project()?)
    }

    async fn list(
        &self,
        query: ProjectQuery,
        pagination: Pagination,
    ) -> SoftdeskResult<PaginatedResult<Project>> {
        let mut conditions = vec!["tenant_id = $tenant_id"];
        if query.contributor_id.is_some() {
            conditions.push(
                "id IN (SELECT VALUE out FROM contributes_to \
                 WHERE in = type::record('user', $contributor_id))",
            );
        }
        if query.author_id.is_some() {
            conditions.push("author_id = $author_id");
        }
        if query.kind.is_some() {
            conditions.push("kind = $kind");
        }
        if query.visible_only {
            conditions.push("is_active = true");
        }
        let filter = conditions.join(" AND ");

        let statement = format!(
            "SELECT count() AS total FROM project WHERE {filter} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM project WHERE {filter} \
             ORDER BY id ASC \
             LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(statement)
            .bind(("tenant_id", query.tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));

        if let Some(contributor_id) = query.contributor_id {
            builder = builder.bind(("contributor_id", contributor_id.to_string()));
        }
        if let Some(author_id) = query.author_id {
            builder = builder.bind(("author_id", author_id.to_string()));
        }
        if let Some(kind) = query.kind {
            builder = builder.bind(("kind", kind.as_str().to_string()));
        }

        let mut result = builder.await.map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = first_total(&count_rows);

        let rows: Vec<ProjectRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_project())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
