//! Application services for project management.

mod projects;

pub use projects::{
    CreateProjectRequest, ProjectsService, ProjectsServiceError, ProjectsServiceResult,
};
