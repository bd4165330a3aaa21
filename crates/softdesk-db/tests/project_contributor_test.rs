//! Integration tests for the project and contributor repositories using
//! in-memory SurrealDB.

use chrono::NaiveDate;
use softdesk_core::error::SoftdeskError;
use softdesk_core::models::project::{CreateProject, ProjectQuery, ProjectType, UpdateProject};
use softdesk_core::models::tenant::CreateTenant;
use softdesk_core::models::user::CreateUser;
use softdesk_core::repository::{
    ContributorRepository, Pagination, ProjectRepository, TenantRepository, UserRepository,
};
use softdesk_db::repository::{
    SurrealContributorRepository, SurrealProjectRepository, SurrealTenantRepository,
    SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

/// Helper: spin up in-memory DB, run migrations, create a tenant + 2 users.
async fn setup() -> (Surreal<Db>, Uuid, Uuid, Uuid) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    softdesk_db::run_migrations(&db).await.unwrap();

    let tenant = SurrealTenantRepository::new(db.clone())
        .create(CreateTenant {
            name: "Acme".into(),
            description: String::new(),
            domain: "acme.com".into(),
        })
        .await
        .unwrap();

    let users = SurrealUserRepository::new(db.clone());
    let mut ids = Vec::new();
    for name in ["alice", "bob"] {
        let user = users
            .create(CreateUser {
                tenant_id: tenant.id,
                username: name.into(),
                email: format!("{name}@acme.com"),
                password: "pass123".into(),
                is_staff: false,
                is_superuser: false,
                date_birth: NaiveDate::from_ymd_opt(1995, 1, 1).unwrap(),
                can_be_contacted: false,
                can_data_be_collected: false,
                can_data_be_shared: false,
            })
            .await
            .unwrap();
        ids.push(user.id);
    }

    (db, tenant.id, ids[0], ids[1])
}

fn project(tenant_id: Uuid, author_id: Uuid, name: &str, kind: ProjectType) -> CreateProject {
    CreateProject {
        tenant_id,
        author_id,
        name: name.into(),
        description: format!("{name} description"),
        kind,
    }
}

#[tokio::test]
async fn create_project_enrolls_author() {
    let (db, tenant_id, alice, _) = setup().await;
    let projects = SurrealProjectRepository::new(db.clone());
    let contributors = SurrealContributorRepository::new(db);

    let p = projects
        .create(project(tenant_id, alice, "GeoNode", ProjectType::Backend))
        .await
        .unwrap();
    assert!(p.is_active);
    assert_eq!(p.author_id, alice);
    assert_eq!(p.kind, ProjectType::Backend);

    assert!(contributors.is_member(tenant_id, p.id, alice).await.unwrap());
    let members = contributors
        .list(tenant_id, p.id, Pagination::default())
        .await
        .unwrap();
    assert_eq!(members.total, 1);
    assert_eq!(members.items[0].contributor_id, alice);
}

#[tokio::test]
async fn duplicate_project_name_in_tenant_is_a_conflict() {
    let (db, tenant_id, alice, bob) = setup().await;
    let projects = SurrealProjectRepository::new(db);

    let first = projects
        .create(project(tenant_id, alice, "GeoNode", ProjectType::Backend))
        .await
        .unwrap();
    assert!(projects.name_taken(tenant_id, "GeoNode", None).await.unwrap());
    assert!(
        !projects
            .name_taken(tenant_id, "GeoNode", Some(first.id))
            .await
            .unwrap()
    );

    let duplicate = projects
        .create(project(tenant_id, bob, "GeoNode", ProjectType::Ios))
        .await;
    assert!(duplicate.is_err(), "unique (tenant_id, name) index rejects the copy");

    // The failed transaction must not leave a membership behind.
    let mine = projects
        .list(
            ProjectQuery {
                contributor_id: Some(bob),
                ..ProjectQuery::for_tenant(tenant_id)
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(mine.total, 0);
}

#[tokio::test]
async fn list_filters_by_membership_kind_and_activity() {
    let (db, tenant_id, alice, bob) = setup().await;
    let projects = SurrealProjectRepository::new(db);

    let a = projects
        .create(project(tenant_id, alice, "A", ProjectType::Backend))
        .await
        .unwrap();
    projects
        .create(project(tenant_id, alice, "B", ProjectType::Android))
        .await
        .unwrap();
    projects
        .create(project(tenant_id, bob, "C", ProjectType::Backend))
        .await
        .unwrap();

    let member = |kind| ProjectQuery {
        contributor_id: Some(alice),
        kind,
        ..ProjectQuery::for_tenant(tenant_id)
    };

    let all = projects.list(member(None), Pagination::default()).await.unwrap();
    assert_eq!(all.total, 2);
    let ids: Vec<Uuid> = all.items.iter().map(|p| p.id).collect();
    let mut sorted = ids.clone();
    sorted.sort_by_key(|id| id.to_string());
    assert_eq!(ids, sorted, "projects are ordered by id");

    let backend = projects
        .list(member(Some(ProjectType::Backend)), Pagination::default())
        .await
        .unwrap();
    assert_eq!(backend.total, 1);
    assert_eq!(backend.items[0].id, a.id);

    projects.deactivate(tenant_id, a.id).await.unwrap();
    let active = projects.list(member(None), Pagination::default()).await.unwrap();
    assert_eq!(active.total, 1);

    let admin = projects
        .list(
            ProjectQuery {
                author_id: Some(alice),
                visible_only: false,
                ..ProjectQuery::for_tenant(tenant_id)
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(admin.total, 2);
}

#[tokio::test]
async fn deactivated_project_is_hidden_unless_requested() {
    let (db, tenant_id, alice, _) = setup().await;
    let projects = SurrealProjectRepository::new(db);
    let p = projects
        .create(project(tenant_id, alice, "GeoNode", ProjectType::Backend))
        .await
        .unwrap();

    let first = projects.deactivate(tenant_id, p.id).await.unwrap();
    assert!(!first.is_active);
    let again = projects.deactivate(tenant_id, p.id).await.unwrap();
    assert!(!again.is_active);

    let err = projects.get_by_id(tenant_id, p.id, true).await.unwrap_err();
    assert!(matches!(err, SoftdeskError::NotFound { .. }));
    let hidden = projects.get_by_id(tenant_id, p.id, false).await.unwrap();
    assert_eq!(hidden.name, "GeoNode");
}

#[tokio::test]
async fn update_and_transfer_author() {
    let (db, tenant_id, alice, bob) = setup().await;
    let projects = SurrealProjectRepository::new(db.clone());
    let contributors = SurrealContributorRepository::new(db);
    let p = projects
        .create(project(tenant_id, alice, "GeoNode", ProjectType::Backend))
        .await
        .unwrap();

    let updated = projects
        .update(
            tenant_id,
            p.id,
            UpdateProject {
                kind: Some(ProjectType::Frontend),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.kind, ProjectType::Frontend);
    assert_eq!(updated.name, "GeoNode");

    let transferred = projects.transfer_author(tenant_id, p.id, bob).await.unwrap();
    assert_eq!(transferred.author_id, bob);
    assert!(contributors.is_member(tenant_id, p.id, bob).await.unwrap());

    // Transferring back must not create a second membership for alice.
    projects.transfer_author(tenant_id, p.id, alice).await.unwrap();
    let members = contributors
        .list(tenant_id, p.id, Pagination::default())
        .await
        .unwrap();
    assert_eq!(members.total, 2);
}

#[tokio::test]
async fn contributor_add_and_remove() {
    let (db, tenant_id, alice, bob) = setup().await;
    let projects = SurrealProjectRepository::new(db.clone());
    let contributors = SurrealContributorRepository::new(db);
    let p = projects
        .create(project(tenant_id, alice, "GeoNode", ProjectType::Backend))
        .await
        .unwrap();

    let record = contributors.add(tenant_id, p.id, bob).await.unwrap();
    assert_eq!(record.project_id, p.id);
    assert_eq!(record.contributor_id, bob);

    let err = contributors.add(tenant_id, p.id, bob).await.unwrap_err();
    assert!(matches!(err, SoftdeskError::DuplicateContributor { .. }));

    contributors.remove(tenant_id, p.id, alice).await.unwrap();
    assert!(!contributors.is_member(tenant_id, p.id, alice).await.unwrap());

    let err = contributors.remove(tenant_id, p.id, alice).await.unwrap_err();
    assert!(matches!(err, SoftdeskError::NotAMember { .. }));

    let err = contributors.remove(tenant_id, p.id, bob).await.unwrap_err();
    assert!(matches!(err, SoftdeskError::LastContributor { .. }));
    assert!(contributors.is_member(tenant_id, p.id, bob).await.unwrap());
}

async fn contributor_count(db: &Surreal<Db>, project_id: Uuid) -> i64 {
    let mut result = db
        .query("SELECT VALUE contributor_count FROM type::record('project', $id)")
        .bind(("id", project_id.to_string()))
        .await
        .unwrap();
    let counts: Vec<i64> = result.take(0).unwrap();
    counts[0]
}

#[tokio::test]
async fn contributor_count_follows_membership_changes() {
    let (db, tenant_id, alice, bob) = setup().await;
    let projects = SurrealProjectRepository::new(db.clone());
    let contributors = SurrealContributorRepository::new(db.clone());
    let p = projects
        .create(project(tenant_id, alice, "GeoNode", ProjectType::Backend))
        .await
        .unwrap();
    assert_eq!(contributor_count(&db, p.id).await, 1);

    projects.transfer_author(tenant_id, p.id, bob).await.unwrap();
    assert_eq!(contributor_count(&db, p.id).await, 2);

    // Bob already contributes; a second transfer adds no seat.
    projects.transfer_author(tenant_id, p.id, bob).await.unwrap();
    assert_eq!(contributor_count(&db, p.id).await, 2);

    contributors.remove(tenant_id, p.id, alice).await.unwrap();
    assert_eq!(contributor_count(&db, p.id).await, 1);

    contributors.add(tenant_id, p.id, alice).await.unwrap();
    assert_eq!(contributor_count(&db, p.id).await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_removals_leave_one_contributor() {
    let (db, tenant_id, alice, bob) = setup().await;
    let projects = SurrealProjectRepository::new(db.clone());
    let contributors = SurrealContributorRepository::new(db.clone());

    for round in 0..25 {
        let p = projects
            .create(project(tenant_id, alice, &format!("Race {round}"), ProjectType::Ios))
            .await
            .unwrap();
        contributors.add(tenant_id, p.id, bob).await.unwrap();

        let (by_alice, by_bob) = tokio::join!(
            contributors.remove(tenant_id, p.id, alice),
            contributors.remove(tenant_id, p.id, bob),
        );

        assert!(
            by_alice.is_ok() != by_bob.is_ok(),
            "round {round}: exactly one removal must succeed"
        );
        let refused = by_alice.err().or(by_bob.err()).unwrap();
        assert!(
            matches!(refused, SoftdeskError::LastContributor { .. }),
            "round {round}: unexpected {refused:?}"
        );

        let members = contributors
            .list(tenant_id, p.id, Pagination::default())
            .await
            .unwrap();
        assert_eq!(members.total, 1, "round {round}");
        assert_eq!(contributor_count(&db, p.id).await, 1, "round {round}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn user_delete_racing_project_creation_never_orphans_the_project() {
    let (db, tenant_id, _, _) = setup().await;
    let users = SurrealUserRepository::new(db.clone());
    let projects = SurrealProjectRepository::new(db.clone());

    for round in 0..25 {
        let name = format!("author{round}");
        let author = users
            .create(CreateUser {
                tenant_id,
                username: name.clone(),
                email: format!("{name}@acme.com"),
                password: "pass123".into(),
                is_staff: false,
                is_superuser: false,
                date_birth: NaiveDate::from_ymd_opt(1995, 1, 1).unwrap(),
                can_be_contacted: false,
                can_data_be_collected: false,
                can_data_be_shared: false,
            })
            .await
            .unwrap();

        let (created, deleted) = tokio::join!(
            projects.create(project(
                tenant_id,
                author.id,
                &format!("Orphan {round}"),
                ProjectType::Android
            )),
            users.delete(tenant_id, author.id),
        );

        match (created, deleted) {
            (Ok(p), Err(SoftdeskError::HasDependentRecords(_))) => {
                let stored = users.get_by_id(tenant_id, p.author_id).await.unwrap();
                assert_eq!(stored.id, author.id, "round {round}");
            }
            (Err(SoftdeskError::NotFound { entity, .. }), Ok(())) => {
                assert_eq!(entity, "user", "round {round}");
                let page = projects
                    .list(
                        ProjectQuery {
                            author_id: Some(author.id),
                            visible_only: false,
                            ..ProjectQuery::for_tenant(tenant_id)
                        },
                        Pagination::default(),
                    )
                    .await
                    .unwrap();
                assert_eq!(page.total, 0, "round {round}");
            }
            other => panic!("round {round}: unexpected outcome {other:?}"),
        }
    }
}
