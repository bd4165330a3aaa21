//! Integration tests for the tenant directory and user administration
//! using in-memory SurrealDB.

use chrono::{Days, Months, NaiveDate, Utc};
use softdesk_authz::{AuthzConfig, Directory, NewUser, ProfileUpdate, SignUp};
use softdesk_core::Principal;
use softdesk_core::error::SoftdeskError;
use softdesk_core::models::tenant::CreateTenant;
use softdesk_core::models::user::CreateUser;
use softdesk_core::repository::{Pagination, TenantRepository, UserRepository};
use softdesk_db::repository::{SurrealTenantRepository, SurrealUserRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

type TestDirectory = Directory<SurrealTenantRepository<Db>, SurrealUserRepository<Db>>;

struct Fixture {
    directory: TestDirectory,
    users: SurrealUserRepository<Db>,
    acme: Uuid,
    globex: Uuid,
    /// Superuser of Acme.
    root: Principal,
    /// Staff member of Acme.
    staff: Principal,
}

async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    softdesk_db::run_migrations(&db).await.unwrap();

    let tenants = SurrealTenantRepository::new(db.clone());
    let mut tenant_ids = Vec::new();
    for (name, domain) in [("Acme", "acme.com"), ("Globex", "globex.com")] {
        let tenant = tenants
            .create(CreateTenant {
                name: name.into(),
                description: String::new(),
                domain: domain.into(),
            })
            .await
            .unwrap();
        tenant_ids.push(tenant.id);
    }
    let (acme, globex) = (tenant_ids[0], tenant_ids[1]);

    let users = SurrealUserRepository::new(db.clone());
    let root = users
        .create(account(acme, "root", true, true))
        .await
        .unwrap();
    let staff = users
        .create(account(acme, "alicia", true, false))
        .await
        .unwrap();

    Fixture {
        directory: Directory::new(tenants, users.clone(), AuthzConfig::default()),
        users,
        acme,
        globex,
        root: Principal::from(&root),
        staff: Principal::from(&staff),
    }
}

fn account(tenant_id: Uuid, username: &str, is_staff: bool, is_superuser: bool) -> CreateUser {
    CreateUser {
        tenant_id,
        username: username.into(),
        email: format!("{username}@acme.com"),
        password: "pass123".into(),
        is_staff,
        is_superuser,
        date_birth: NaiveDate::from_ymd_opt(1990, 3, 12).unwrap(),
        can_be_contacted: false,
        can_data_be_collected: false,
        can_data_be_shared: false,
    }
}

fn sign_up(username: &str, email: &str) -> SignUp {
    SignUp {
        username: username.into(),
        email: email.into(),
        password: "s3cret-pass".into(),
        date_birth: NaiveDate::from_ymd_opt(2001, 7, 4).unwrap(),
        can_be_contacted: true,
        can_data_be_collected: false,
        can_data_be_shared: false,
    }
}

#[tokio::test]
async fn sign_up_joins_tenant_of_email_domain() {
    let f = setup().await;

    let carol = f
        .directory
        .sign_up(sign_up("carol", "carol@ACME.com"))
        .await
        .unwrap();
    assert_eq!(carol.tenant_id, f.acme);
    assert!(!carol.is_staff);
    assert!(!carol.is_superuser);
    assert_ne!(carol.password_hash, "s3cret-pass");

    let dave = f
        .directory
        .sign_up(sign_up("dave", "dave@globex.com"))
        .await
        .unwrap();
    assert_eq!(dave.tenant_id, f.globex);
}

#[tokio::test]
async fn sign_up_with_unregistered_domain_is_rejected() {
    let f = setup().await;

    let err = f
        .directory
        .sign_up(sign_up("eve", "eve@unknown.org"))
        .await
        .unwrap_err();
    assert!(matches!(err, SoftdeskError::UnknownDomain { ref domain } if domain == "unknown.org"));
    assert_eq!(err.field(), "email");

    let err = f
        .directory
        .sign_up(sign_up("eve", "no-at-sign"))
        .await
        .unwrap_err();
    assert!(matches!(err, SoftdeskError::UnknownDomain { .. }));
}

#[tokio::test]
async fn sign_up_one_day_short_of_minimum_age_is_rejected() {
    let f = setup().await;
    let today = Utc::now().date_naive();
    let fifteenth_birthday_tomorrow = today
        .checked_sub_months(Months::new(15 * 12))
        .and_then(|d| d.checked_add_days(Days::new(1)))
        .unwrap();

    let mut input = sign_up("young", "young@acme.com");
    input.date_birth = fifteenth_birthday_tomorrow;
    let err = f.directory.sign_up(input).await.unwrap_err();
    assert_eq!(err.field(), "date_birth");

    let mut input = sign_up("old-enough", "old-enough@acme.com");
    input.date_birth = today.checked_sub_months(Months::new(16 * 12)).unwrap();
    assert!(f.directory.sign_up(input).await.is_ok());
}

#[tokio::test]
async fn username_is_unique_per_tenant_only() {
    let f = setup().await;

    f.directory
        .sign_up(sign_up("sam", "sam@acme.com"))
        .await
        .unwrap();

    let err = f
        .directory
        .sign_up(sign_up("sam", "sam.two@acme.com"))
        .await
        .unwrap_err();
    assert_eq!(err.field(), "username");

    let other = f
        .directory
        .sign_up(sign_up("sam", "sam@globex.com"))
        .await
        .unwrap();
    assert_eq!(other.tenant_id, f.globex);
}

#[tokio::test]
async fn duplicate_email_is_reported_on_the_email_field() {
    let f = setup().await;
    f.directory
        .sign_up(sign_up("tess", "tess@acme.com"))
        .await
        .unwrap();

    let err = f
        .directory
        .sign_up(sign_up("tessa", "tess@acme.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, SoftdeskError::Validation { .. }));
    assert_eq!(err.field(), "email");

    let uma = f
        .directory
        .sign_up(sign_up("uma", "uma@acme.com"))
        .await
        .unwrap();
    let err = f
        .directory
        .update_profile(
            Some(&Principal::from(&uma)),
            uma.id,
            ProfileUpdate {
                email: Some("tess@acme.com".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.field(), "email");
}

#[tokio::test]
async fn create_user_requires_staff() {
    let f = setup().await;
    let bob = f
        .directory
        .sign_up(sign_up("bob", "bob@acme.com"))
        .await
        .unwrap();
    let bob = Principal::from(&bob);

    let input = NewUser {
        account: sign_up("frank", "frank@acme.com"),
        is_staff: false,
    };
    let err = f
        .directory
        .create_user(Some(&bob), input.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, SoftdeskError::AuthorizationDenied { .. }));

    let err = f
        .directory
        .create_user(None, input.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, SoftdeskError::AuthenticationFailed { .. }));

    let frank = f
        .directory
        .create_user(Some(&f.staff), input)
        .await
        .unwrap();
    assert_eq!(frank.tenant_id, f.acme);
}

#[tokio::test]
async fn only_superusers_create_staff_accounts() {
    let f = setup().await;
    let input = NewUser {
        account: sign_up("grace", "grace@acme.com"),
        is_staff: true,
    };

    let err = f
        .directory
        .create_user(Some(&f.staff), input.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, SoftdeskError::AuthorizationDenied { .. }));

    let grace = f
        .directory
        .create_user(Some(&f.root), input)
        .await
        .unwrap();
    assert!(grace.is_staff);
}

#[tokio::test]
async fn staff_cannot_create_users_of_another_tenant() {
    let f = setup().await;
    let input = NewUser {
        account: sign_up("henry", "henry@globex.com"),
        is_staff: false,
    };

    let err = f
        .directory
        .create_user(Some(&f.staff), input)
        .await
        .unwrap_err();
    assert!(matches!(err, SoftdeskError::AuthorizationDenied { .. }));
}

#[tokio::test]
async fn user_listing_is_tenant_scoped() {
    let f = setup().await;
    f.directory
        .sign_up(sign_up("ivy", "ivy@globex.com"))
        .await
        .unwrap();

    let page = f
        .directory
        .list_users(Some(&f.staff), None)
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.limit, AuthzConfig::default().default_page_size);
    assert!(page.items.iter().all(|u| u.tenant_id == f.acme));

    let second = f
        .directory
        .list_users(Some(&f.staff), Some(Pagination { offset: 1, limit: 1 }))
        .await
        .unwrap();
    assert_eq!(second.total, 2);
    assert_eq!(second.items.len(), 1);
}

#[tokio::test]
async fn user_listing_falls_back_to_configured_page_size() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    softdesk_db::run_migrations(&db).await.unwrap();

    let tenants = SurrealTenantRepository::new(db.clone());
    let acme = tenants
        .create(CreateTenant {
            name: "Acme".into(),
            description: String::new(),
            domain: "acme.com".into(),
        })
        .await
        .unwrap();
    let users = SurrealUserRepository::new(db.clone());
    let staff = users
        .create(account(acme.id, "alicia", true, false))
        .await
        .unwrap();
    for name in ["nina", "omar", "pia"] {
        users.create(account(acme.id, name, false, false)).await.unwrap();
    }

    let config = AuthzConfig {
        default_page_size: 2,
        ..AuthzConfig::default()
    };
    let directory = Directory::new(tenants, users, config);
    let page = directory
        .list_users(Some(&Principal::from(&staff)), None)
        .await
        .unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.items.len(), 2);
}

#[tokio::test]
async fn profile_is_readable_and_editable_only_by_its_owner() {
    let f = setup().await;
    let judy = f
        .directory
        .sign_up(sign_up("judy", "judy@acme.com"))
        .await
        .unwrap();
    let judy_principal = Principal::from(&judy);

    let err = f
        .directory
        .read_profile(Some(&f.staff), judy.id)
        .await
        .unwrap_err();
    assert!(matches!(err, SoftdeskError::AuthorizationDenied { .. }));

    let updated = f
        .directory
        .update_profile(
            Some(&judy_principal),
            judy.id,
            ProfileUpdate {
                username: Some("judith".into()),
                can_data_be_shared: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.username, "judith");
    assert!(updated.can_data_be_shared);
    assert!(updated.can_be_contacted);

    let own = f
        .directory
        .read_profile(Some(&judy_principal), judy.id)
        .await
        .unwrap();
    assert_eq!(own.username, "judith");
}

#[tokio::test]
async fn profile_update_cannot_change_tenant() {
    let f = setup().await;
    let kim = f
        .directory
        .sign_up(sign_up("kim", "kim@acme.com"))
        .await
        .unwrap();
    let kim_principal = Principal::from(&kim);

    let err = f
        .directory
        .update_profile(
            Some(&kim_principal),
            kim.id,
            ProfileUpdate {
                tenant_id: Some(f.globex),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.field(), "tenant");

    let err = f
        .directory
        .update_profile(
            Some(&kim_principal),
            kim.id,
            ProfileUpdate {
                email: Some("kim@globex.com".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.field(), "email");

    let stored = f.users.get_by_id(f.acme, kim.id).await.unwrap();
    assert_eq!(stored.tenant_id, f.acme);
    assert_eq!(stored.email, "kim@acme.com");
}

#[tokio::test]
async fn profile_update_rechecks_minimum_age() {
    let f = setup().await;
    let leo = f
        .directory
        .sign_up(sign_up("leo", "leo@acme.com"))
        .await
        .unwrap();

    let err = f
        .directory
        .update_profile(
            Some(&Principal::from(&leo)),
            leo.id,
            ProfileUpdate {
                date_birth: NaiveDate::from_ymd_opt(2020, 1, 1),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.field(), "date_birth");
}

#[tokio::test]
async fn promotion_to_staff_requires_superuser() {
    let f = setup().await;
    let mia = f
        .directory
        .sign_up(sign_up("mia", "mia@acme.com"))
        .await
        .unwrap();

    let err = f
        .directory
        .promote_to_staff(Some(&f.staff), mia.id)
        .await
        .unwrap_err();
    assert!(matches!(err, SoftdeskError::AuthorizationDenied { .. }));

    let promoted = f
        .directory
        .promote_to_staff(Some(&f.root), mia.id)
        .await
        .unwrap();
    assert!(promoted.is_staff);
    assert!(!promoted.is_superuser);
}
