//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_membership_directory;
mod in_memory_role_store;
mod postgres_audit_repository;
mod postgres_membership_directory;
mod postgres_role_store;

pub use in_memory_membership_directory::InMemoryMembershipDirectory;
pub use in_memory_role_store::InMemoryRoleStore;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_membership_directory::PostgresMembershipDirectory;
pub use postgres_role_store::PostgresRoleStore;
