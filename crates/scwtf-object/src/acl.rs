//! ACL, owner and access-key helpers

use crate::types::Acl;

/// Grantee URI for "everyone"
pub const ALL_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

/// Grantee URI for "any authenticated user"
pub const AUTHENTICATED_USERS_URI: &str =
    "http://acs.amazonaws.com/groups/global/AuthenticatedUsers";

/// Owner ID as the API expects it: `<project>:<project>`
pub fn owner_id_for_project(project_id: &str) -> String {
    format!("{project_id}:{project_id}")
}

/// Owner ID back to the project it encodes
pub fn normalize_owner_id(owner_id: &str) -> &str {
    owner_id.split_once(':').map_or(owner_id, |(project, _)| project)
}

/// Project owning the resource, from its ACL
pub fn owner_project(acl: &Acl) -> Option<&str> {
    acl.owner_id.as_deref().map(normalize_owner_id)
}

fn grants_to(acl: &Acl, uri: &str, permission: &str) -> bool {
    acl.grants
        .iter()
        .any(|g| g.grantee_uri.as_deref() == Some(uri) && g.permission == permission)
}

/// True iff everyone may read
pub fn is_public_read(acl: &Acl) -> bool {
    grants_to(acl, ALL_USERS_URI, "READ")
}

/// Canned ACL matching the grants, as reported back to the host
pub fn canned_acl(acl: &Acl) -> &'static str {
    if grants_to(acl, ALL_USERS_URI, "WRITE") {
        "public-read-write"
    } else if is_public_read(acl) {
        "public-read"
    } else if grants_to(acl, AUTHENTICATED_USERS_URI, "READ") {
        "authenticated-read"
    } else {
        "private"
    }
}

/// `{access}@{project}` when a project scopes the key
pub fn build_access_key(access_key: &str, project_id: Option<&str>) -> String {
    match project_id {
        Some(project) if !project.is_empty() => format!("{access_key}@{project}"),
        _ => access_key.to_string(),
    }
}

/// Split a composite access key back into key and project
pub fn split_access_key(composite: &str) -> (&str, Option<&str>) {
    match composite.rsplit_once('@') {
        Some((key, project)) if !key.is_empty() && !project.is_empty() => (key, Some(project)),
        _ => (composite, None),
    }
}
