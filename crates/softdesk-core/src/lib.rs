//! SoftDesk Core: domain models, the authenticated principal, the error
//! taxonomy and the repository traits every storage backend implements.

pub mod error;
pub mod models;
pub mod principal;
pub mod repository;
pub mod validation;

pub use error::{DependentKind, ErrorStatus, SoftdeskError, SoftdeskResult};
pub use principal::Principal;
