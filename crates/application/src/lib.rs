//! Application services and ports for entity-scoped role management.

#![forbid(unsafe_code)]

mod participant_service;
mod rbac_config;
mod role_assignment_service;
mod role_cache_service;
mod role_ports;
mod subject_role_service;

pub use participant_service::ParticipantService;
pub use rbac_config::RbacConfig;
pub use role_assignment_service::RoleAssignmentService;
pub use role_cache_service::RoleCacheService;
pub use role_ports::{RoleCacheBackend, RoleEventPublisher, RoleStore};
pub use subject_role_service::{DirectPermissions, SubjectRoleService};
