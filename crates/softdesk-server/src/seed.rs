//! Local development fixtures for the Meridien tenant.

use anyhow::Context;
use chrono::NaiveDate;
use softdesk_core::error::SoftdeskError;
use softdesk_core::models::comment::CreateComment;
use softdesk_core::models::issue::{Balise, CreateIssue, Priority, Progression};
use softdesk_core::models::project::{CreateProject, ProjectType};
use softdesk_core::models::tenant::{CreateTenant, Tenant};
use softdesk_core::models::user::{CreateUser, User};
use softdesk_core::repository::{
    CommentRepository, ContributorRepository, IssueRepository, ProjectRepository,
    TenantRepository, UserRepository,
};
use softdesk_db::maintenance::erase_tenant;
use softdesk_db::repository::{
    SurrealCommentRepository, SurrealContributorRepository, SurrealIssueRepository,
    SurrealProjectRepository, SurrealTenantRepository, SurrealUserRepository,
};
use surrealdb::{Connection, Surreal};
use tracing::info;
use uuid::Uuid;

pub const TENANT_NAME: &str = "Meridien";
pub const TENANT_DOMAIN: &str = "meridien.dev";
pub const SUPERUSER: &str = "meridien";

#[derive(Debug, Clone, Copy)]
enum Member {
    Alicia,
    Bob,
}

struct CommentSeed {
    author: Member,
    description: &'static str,
}

struct IssueSeed {
    name: &'static str,
    description: &'static str,
    priority: Priority,
    balise: Balise,
    progression: Progression,
    author: Member,
    attribution: Member,
    comments: &'static [CommentSeed],
}

struct ProjectSeed {
    name: &'static str,
    description: &'static str,
    kind: ProjectType,
    author: Member,
    issues: &'static [IssueSeed],
}

const fn project(
    name: &'static str,
    description: &'static str,
    kind: ProjectType,
    author: Member,
) -> ProjectSeed {
    ProjectSeed {
        name,
        description,
        kind,
        author,
        issues: &[],
    }
}

const PROJECTS: &[ProjectSeed] = &[
    ProjectSeed {
        name: "GeoNode",
        description: "Geospatial content management system to catalogue, store and share \
                      map data within organisations.",
        kind: ProjectType::Frontend,
        author: Member::Alicia,
        issues: &[
            IssueSeed {
                name: "Cannot sign in",
                description: "Signing in is impossible!",
                priority: Priority::High,
                balise: Balise::Bug,
                progression: Progression::ToDo,
                author: Member::Bob,
                attribution: Member::Alicia,
                comments: &[
                    CommentSeed {
                        author: Member::Alicia,
                        description: "Could caps lock be on?",
                    },
                    CommentSeed {
                        author: Member::Bob,
                        description: "Have you checked your internet access?",
                    },
                ],
            },
            IssueSeed {
                name: "Lack of contrast",
                description: "Can we change the colours?",
                priority: Priority::Low,
                balise: Balise::Feature,
                progression: Progression::ToDo,
                author: Member::Bob,
                attribution: Member::Bob,
                comments: &[CommentSeed {
                    author: Member::Alicia,
                    description: "Would a dark theme do?",
                }],
            },
        ],
    },
    ProjectSeed {
        name: "Atlas.co",
        description: "Cloud GIS platform focused on speed, real-time collaboration and \
                      AI integration.",
        kind: ProjectType::Backend,
        author: Member::Bob,
        issues: &[IssueSeed {
            name: "GeoJSON format not supported",
            description: "This standard is essential.",
            priority: Priority::High,
            balise: Balise::Feature,
            progression: Progression::ToDo,
            author: Member::Alicia,
            attribution: Member::Bob,
            comments: &[],
        }],
    },
    project(
        "Leaflet",
        "Open source JavaScript library for mobile-friendly interactive maps.",
        ProjectType::Android,
        Member::Alicia,
    ),
    project(
        "ArcGIS Online",
        "Cloud platform to build, share and analyse interactive maps.",
        ProjectType::Android,
        Member::Alicia,
    ),
    project(
        "Carto",
        "Cloud native analysis of large datasets for location intelligence.",
        ProjectType::Ios,
        Member::Bob,
    ),
    project(
        "Mapbox",
        "Developer platform with highly customisable maps and navigation tools.",
        ProjectType::Frontend,
        Member::Alicia,
    ),
    project(
        "Felt",
        "Collaborative tool for building maps quickly with a fluid interface.",
        ProjectType::Backend,
        Member::Bob,
    ),
    project(
        "Google Earth Engine",
        "Planetary-scale geospatial analysis of satellite imagery.",
        ProjectType::Android,
        Member::Alicia,
    ),
    project(
        "GeoServer",
        "Open source map server publishing geospatial data over WMS and WFS.",
        ProjectType::Frontend,
        Member::Bob,
    ),
    project(
        "QGIS Server",
        "Publishes desktop QGIS projects directly on the web.",
        ProjectType::Backend,
        Member::Alicia,
    ),
    project(
        "MapStore",
        "Framework for building map portals and interactive dashboards.",
        ProjectType::Ios,
        Member::Alicia,
    ),
];

/// What [`seed`] created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub projects: usize,
    pub issues: usize,
    pub comments: usize,
}

fn date(y: i32, m: u32, d: u32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d).with_context(|| format!("invalid date {y}-{m}-{d}"))
}

fn account(
    tenant_id: Uuid,
    username: &str,
    password: &str,
    date_birth: NaiveDate,
    is_staff: bool,
    is_superuser: bool,
) -> CreateUser {
    CreateUser {
        tenant_id,
        username: username.into(),
        email: format!("{}@{TENANT_DOMAIN}", username.to_ascii_lowercase()),
        password: password.into(),
        is_staff,
        is_superuser,
        date_birth,
        can_be_contacted: false,
        can_data_be_collected: false,
        can_data_be_shared: false,
    }
}

async fn ensure_tenant<C: Connection>(db: &Surreal<C>) -> anyhow::Result<Tenant> {
    let tenants = SurrealTenantRepository::new(db.clone());
    match tenants.get_by_domain(TENANT_DOMAIN).await {
        Ok(tenant) => Ok(tenant),
        Err(SoftdeskError::NotFound { .. }) => {
            let tenant = tenants
                .create(CreateTenant {
                    name: TENANT_NAME.into(),
                    description: "Local development client".into(),
                    domain: TENANT_DOMAIN.into(),
                })
                .await?;
            info!(tenant_id = %tenant.id, "Development tenant created");
            Ok(tenant)
        }
        Err(other) => Err(other.into()),
    }
}

async fn ensure_superuser<C: Connection>(
    users: &SurrealUserRepository<C>,
    tenant_id: Uuid,
) -> anyhow::Result<User> {
    match users.get_by_username(tenant_id, SUPERUSER).await {
        Ok(user) => Ok(user),
        Err(SoftdeskError::NotFound { .. }) => {
            let input = account(tenant_id, SUPERUSER, "meridien22", date(1990, 1, 1)?, true, true);
            Ok(users.create(input).await?)
        }
        Err(other) => Err(other.into()),
    }
}

fn user_repository<C: Connection>(
    db: &Surreal<C>,
    pepper: Option<String>,
) -> SurrealUserRepository<C> {
    match pepper {
        Some(pepper) => SurrealUserRepository::with_pepper(db.clone(), pepper),
        None => SurrealUserRepository::new(db.clone()),
    }
}

/// Reset the development tenant to its superuser only.
pub async fn erase<C: Connection>(db: &Surreal<C>, pepper: Option<String>) -> anyhow::Result<()> {
    let tenant = ensure_tenant(db).await?;
    let users = user_repository(db, pepper);
    let superuser = ensure_superuser(&users, tenant.id).await?;

    erase_tenant(db, tenant.id, Some(superuser.id))
        .await
        .context("erasing development tenant")?;
    Ok(())
}

/// Reset the development tenant and load the fixture projects. Alicia
/// (staff) and Bob both contribute to every project.
pub async fn seed<C: Connection>(
    db: &Surreal<C>,
    pepper: Option<String>,
) -> anyhow::Result<SeedSummary> {
    let tenant = ensure_tenant(db).await?;
    let users = user_repository(db, pepper);
    let superuser = ensure_superuser(&users, tenant.id).await?;
    erase_tenant(db, tenant.id, Some(superuser.id))
        .await
        .context("erasing development tenant")?;

    let alicia = users
        .create(account(tenant.id, "Alicia", "alicia-pwd", date(1980, 1, 1)?, true, false))
        .await?;
    let bob = users
        .create(account(tenant.id, "Bob", "bob-pwd", date(1980, 2, 2)?, false, false))
        .await?;
    let id_of = |member: Member| match member {
        Member::Alicia => alicia.id,
        Member::Bob => bob.id,
    };

    let projects = SurrealProjectRepository::new(db.clone());
    let contributors = SurrealContributorRepository::new(db.clone());
    let issues = SurrealIssueRepository::new(db.clone());
    let comments = SurrealCommentRepository::new(db.clone());
    let mut summary = SeedSummary::default();

    for seed in PROJECTS {
        let project = projects
            .create(CreateProject {
                tenant_id: tenant.id,
                author_id: id_of(seed.author),
                name: seed.name.into(),
                description: seed.description.into(),
                kind: seed.kind,
            })
            .await
            .with_context(|| format!("creating project {}", seed.name))?;
        let other = match seed.author {
            Member::Alicia => Member::Bob,
            Member::Bob => Member::Alicia,
        };
        contributors
            .add(tenant.id, project.id, id_of(other))
            .await?;
        summary.projects += 1;

        for issue_seed in seed.issues {
            let issue = issues
                .create(CreateIssue {
                    tenant_id: tenant.id,
                    project_id: project.id,
                    name: issue_seed.name.into(),
                    description: issue_seed.description.into(),
                    priority: issue_seed.priority,
                    balise: issue_seed.balise,
                    progression: issue_seed.progression,
                    author_id: id_of(issue_seed.author),
                    attribution_id: id_of(issue_seed.attribution),
                })
                .await
                .with_context(|| format!("creating issue {}", issue_seed.name))?;
            summary.issues += 1;

            for comment_seed in issue_seed.comments {
                comments
                    .create(CreateComment {
                        tenant_id: tenant.id,
                        project_id: project.id,
                        issue_id: issue.id,
                        description: comment_seed.description.into(),
                        author_id: id_of(comment_seed.author),
                    })
                    .await?;
                summary.comments += 1;
            }
        }
    }

    info!(
        tenant_id = %tenant.id,
        projects = summary.projects,
        issues = summary.issues,
        comments = summary.comments,
        "Development fixtures loaded"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use softdesk_core::models::project::ProjectQuery;
    use softdesk_core::repository::Pagination;
    use surrealdb::engine::local::{Db, Mem};

    use super::*;

    async fn memory_db() -> Surreal<Db> {
        let db = Surreal::new::<Mem>(()).await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();
        softdesk_db::run_migrations(&db).await.unwrap();
        db
    }

    #[tokio::test]
    async fn seed_loads_fixtures_and_can_rerun() {
        let db = memory_db().await;

        let first = seed(&db, None).await.unwrap();
        assert_eq!(
            first,
            SeedSummary {
                projects: 11,
                issues: 3,
                comments: 3,
            }
        );
        assert_eq!(seed(&db, None).await.unwrap(), first);

        let tenant = ensure_tenant(&db).await.unwrap();
        let users = SurrealUserRepository::new(db.clone());
        let bob = users.get_by_username(tenant.id, "Bob").await.unwrap();
        let member_of = SurrealProjectRepository::new(db.clone())
            .list(
                ProjectQuery {
                    contributor_id: Some(bob.id),
                    ..ProjectQuery::for_tenant(tenant.id)
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(member_of.total, 11);
    }

    #[tokio::test]
    async fn erase_keeps_only_the_superuser() {
        let db = memory_db().await;
        seed(&db, None).await.unwrap();

        erase(&db, None).await.unwrap();

        let tenant = ensure_tenant(&db).await.unwrap();
        let users = SurrealUserRepository::new(db.clone())
            .list(tenant.id, Pagination::default())
            .await
            .unwrap();
        assert_eq!(users.total, 1);
        assert_eq!(users.items[0].username, SUPERUSER);
        assert!(users.items[0].is_superuser);

        let projects = SurrealProjectRepository::new(db)
            .list(
                ProjectQuery {
                    visible_only: false,
                    ..ProjectQuery::for_tenant(tenant.id)
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(projects.total, 0);
    }
}
