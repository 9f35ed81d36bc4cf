//! Application services and ports for the workspace role engine.

#![forbid(unsafe_code)]

mod audit;
mod authorization_service;
mod reorder;
mod role_ports;
mod role_service;

pub use audit::{AuditEvent, AuditRepository};
pub use authorization_service::AuthorizationService;
pub use reorder::{ReorderPhase, RoleListView};
pub use role_ports::{
    CreateRoleInput, MembershipDirectory, RoleStore, RoleWriteOperation, UpdateRolePatch,
};
pub use role_service::RoleService;
