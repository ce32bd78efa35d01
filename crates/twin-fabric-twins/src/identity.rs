// twin-fabric-twins/src/identity.rs
// ============================================================================
// Module: Identity Twin
// Description: Okta-style directory of users, groups, and applications.
// Purpose: Enforce the user lifecycle and two-sided assignment sets.
// Dependencies: serde, serde_json, twin-fabric-core, twin-fabric-world
// ============================================================================

//! ## Overview
//! User status moves through STAGED/PROVISIONED/ACTIVE/SUSPENDED with
//! DEPROVISIONED terminal. Group and application assignment are set
//! operations maintained on both sides, so `user.groups` and
//! `group.members` can never drift apart.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use twin_fabric_core::FabricError;
use twin_fabric_core::FabricResult;
use twin_fabric_core::JsonMap;
use twin_fabric_core::ToolSpec;
use twin_fabric_core::TwinContext;
use twin_fabric_core::page;
use twin_fabric_world::Scenario;

use crate::ServiceName;
use crate::decode_args;
use crate::unknown_operation;

/// Statuses a password reset is allowed in.
const RESETTABLE: &[&str] = &["ACTIVE", "PROVISIONED", "SUSPENDED"];

// ============================================================================
// SECTION: Entities
// ============================================================================

/// One directory user.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    /// Stable id (`USR-…`).
    id: String,
    /// Primary email.
    email: String,
    /// Login shortname.
    login: String,
    /// Given name.
    first_name: String,
    /// Family name.
    last_name: String,
    /// Job title.
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    /// Department.
    #[serde(skip_serializing_if = "Option::is_none")]
    department: Option<String>,
    /// Lifecycle status.
    status: String,
    /// Group memberships.
    groups: Vec<String>,
    /// Application assignments.
    applications: Vec<String>,
}

impl User {
    fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "email": self.email,
            "login": self.login,
            "display_name": self.display_name(),
            "status": self.status,
            "title": self.title,
            "department": self.department,
        })
    }

    fn detail(&self) -> Value {
        json!({
            "id": self.id,
            "email": self.email,
            "login": self.login,
            "first_name": self.first_name,
            "last_name": self.last_name,
            "display_name": self.display_name(),
            "status": self.status,
            "title": self.title,
            "department": self.department,
            "groups": self.groups,
            "applications": self.applications,
        })
    }
}

/// One directory group.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Group {
    /// Stable id (`GRP-…`).
    id: String,
    /// Display name.
    name: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    /// Member user ids.
    members: Vec<String>,
}

impl Group {
    fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "description": self.description,
            "member_count": self.members.len(),
        })
    }
}

/// One SSO application.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Application {
    /// Stable id (`APP-…`).
    id: String,
    /// Display label.
    label: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    /// Assigned user ids.
    assignments: Vec<String>,
}

impl Application {
    fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "label": self.label,
            "description": self.description,
            "assignments": self.assignments.len(),
        })
    }
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Arguments for `okta.list_users`.
#[derive(Debug, Deserialize)]
struct ListUsersArgs {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    include_groups: bool,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    sort_by: Option<String>,
    #[serde(default)]
    sort_dir: Option<String>,
}

/// Arguments carrying just a user id.
#[derive(Debug, Deserialize)]
struct UserArgs {
    user_id: String,
}

/// Arguments for lifecycle changes with an optional reason.
#[derive(Debug, Deserialize)]
struct UserReasonArgs {
    user_id: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Arguments for `okta.list_groups`.
#[derive(Debug, Deserialize)]
struct ListGroupsArgs {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    include_members: bool,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    sort_by: Option<String>,
    #[serde(default)]
    sort_dir: Option<String>,
}

/// Arguments for group (un)assignment.
#[derive(Debug, Deserialize)]
struct GroupAssignArgs {
    user_id: String,
    group_id: String,
}

/// Arguments for `okta.list_applications`.
#[derive(Debug, Deserialize)]
struct ListApplicationsArgs {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    sort_by: Option<String>,
    #[serde(default)]
    sort_dir: Option<String>,
}

/// Arguments for application (un)assignment.
#[derive(Debug, Deserialize)]
struct AppAssignArgs {
    user_id: String,
    app_id: String,
}

// ============================================================================
// SECTION: Twin
// ============================================================================

/// Deterministic identity directory twin.
#[derive(Debug)]
pub struct OktaTwin {
    /// Users keyed by id.
    users: BTreeMap<String, User>,
    /// Groups keyed by id.
    groups: BTreeMap<String, Group>,
    /// Applications keyed by id.
    apps: BTreeMap<String, Application>,
    /// Next reset-token counter.
    reset_seq: u64,
}

impl OktaTwin {
    /// Seeds the directory from the scenario and syncs both relationship
    /// sides.
    #[must_use]
    pub fn from_scenario(scenario: &Scenario) -> Self {
        let mut users: BTreeMap<String, User> = scenario
            .identity_users
            .iter()
            .map(|(id, seed)| {
                (
                    id.clone(),
                    User {
                        id: id.clone(),
                        email: seed.email.clone(),
                        login: seed
                            .login
                            .clone()
                            .unwrap_or_else(|| seed.email.clone()),
                        first_name: seed.first_name.clone().unwrap_or_default(),
                        last_name: seed.last_name.clone().unwrap_or_default(),
                        title: seed.title.clone(),
                        department: seed.department.clone(),
                        status: seed
                            .status
                            .clone()
                            .unwrap_or_else(|| "ACTIVE".to_string()),
                        groups: seed.groups.clone(),
                        applications: seed.applications.clone(),
                    },
                )
            })
            .collect();
        let groups: BTreeMap<String, Group> = scenario
            .identity_groups
            .iter()
            .map(|(id, seed)| {
                (
                    id.clone(),
                    Group {
                        id: id.clone(),
                        name: seed.name.clone(),
                        description: seed.description.clone(),
                        members: seed.members.clone(),
                    },
                )
            })
            .collect();
        let apps: BTreeMap<String, Application> = scenario
            .identity_applications
            .iter()
            .map(|(id, seed)| {
                (
                    id.clone(),
                    Application {
                        id: id.clone(),
                        label: seed.label.clone(),
                        description: seed.description.clone(),
                        assignments: seed.assignments.clone(),
                    },
                )
            })
            .collect();

        // Membership seeds may name only one side; mirror them.
        let mut groups = groups;
        let mut apps = apps;
        for user in users.values() {
            for group_id in &user.groups {
                if let Some(group) = groups.get_mut(group_id)
                    && !group.members.contains(&user.id)
                {
                    group.members.push(user.id.clone());
                }
            }
            for app_id in &user.applications {
                if let Some(app) = apps.get_mut(app_id)
                    && !app.assignments.contains(&user.id)
                {
                    app.assignments.push(user.id.clone());
                }
            }
        }
        for group in groups.values() {
            for member in &group.members {
                if let Some(user) = users.get_mut(member)
                    && !user.groups.contains(&group.id)
                {
                    user.groups.push(group.id.clone());
                }
            }
        }
        for app in apps.values() {
            for member in &app.assignments {
                if let Some(user) = users.get_mut(member)
                    && !user.applications.contains(&app.id)
                {
                    user.applications.push(app.id.clone());
                }
            }
        }

        Self {
            users,
            groups,
            apps,
            reset_seq: 1,
        }
    }

    /// Dispatches one identity operation.
    ///
    /// # Errors
    ///
    /// Returns `okta.*` entity and lifecycle errors per operation.
    pub fn dispatch(
        &mut self,
        operation: &str,
        args: &JsonMap,
        _ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        match operation {
            "list_users" => self.list_users(decode_args(args)?),
            "get_user" => self.get_user(&decode_args::<UserArgs>(args)?),
            "activate_user" => self.activate_user(&decode_args::<UserArgs>(args)?),
            "deactivate_user" => self.deactivate_user(decode_args(args)?),
            "suspend_user" => self.suspend_user(decode_args(args)?),
            "unsuspend_user" => self.unsuspend_user(&decode_args::<UserArgs>(args)?),
            "reset_password" => self.reset_password(&decode_args::<UserArgs>(args)?),
            "list_groups" => self.list_groups(decode_args(args)?),
            "assign_group" => self.assign_group(&decode_args::<GroupAssignArgs>(args)?),
            "unassign_group" => self.unassign_group(&decode_args::<GroupAssignArgs>(args)?),
            "list_applications" => self.list_applications(decode_args(args)?),
            "assign_application" => self.assign_application(&decode_args::<AppAssignArgs>(args)?),
            "unassign_application" => {
                self.unassign_application(&decode_args::<AppAssignArgs>(args)?)
            }
            other => Err(unknown_operation(ServiceName::Okta, other)),
        }
    }

    fn list_users(&self, args: ListUsersArgs) -> FabricResult<Value> {
        let wanted_status = args.status.as_deref().map(str::to_uppercase);
        let needle = args.query.as_deref().unwrap_or("").trim().to_lowercase();
        let mut rows: Vec<Value> = self
            .users
            .values()
            .filter(|user| {
                wanted_status
                    .as_ref()
                    .is_none_or(|status| &user.status == status)
                    && (needle.is_empty()
                        || user.email.to_lowercase().contains(&needle)
                        || user.display_name().to_lowercase().contains(&needle))
            })
            .map(|user| {
                let mut row = user.summary();
                if args.include_groups
                    && let Some(object) = row.as_object_mut()
                {
                    object.insert("groups".to_string(), json!(user.groups));
                }
                row
            })
            .collect();
        let sort_field = match args.sort_by.as_deref() {
            Some(field @ ("status" | "display_name")) => field,
            _ => "email",
        };
        let descending = args.sort_dir.as_deref() == Some("desc");
        page::sort_rows(&mut rows, sort_field, descending);
        page::paginate(
            rows,
            "users",
            args.limit,
            args.cursor.as_deref(),
            "okta.invalid_cursor",
        )
    }

    fn get_user(&self, args: &UserArgs) -> FabricResult<Value> {
        self.users
            .get(&args.user_id)
            .map(User::detail)
            .ok_or_else(|| user_not_found(&args.user_id))
    }

    fn activate_user(&mut self, args: &UserArgs) -> FabricResult<Value> {
        let user = self
            .users
            .get_mut(&args.user_id)
            .ok_or_else(|| user_not_found(&args.user_id))?;
        if user.status == "ACTIVE" {
            return Ok(json!({"id": user.id, "status": "ACTIVE", "changed": false}));
        }
        if user.status == "DEPROVISIONED" {
            return Err(invalid_state(format!(
                "cannot activate deprovisioned user: {}",
                args.user_id
            )));
        }
        user.status = "ACTIVE".to_string();
        Ok(json!({"id": user.id, "status": "ACTIVE", "changed": true}))
    }

    fn deactivate_user(&mut self, args: UserReasonArgs) -> FabricResult<Value> {
        let user = self
            .users
            .get_mut(&args.user_id)
            .ok_or_else(|| user_not_found(&args.user_id))?;
        if user.status == "DEPROVISIONED" {
            return Err(invalid_state(format!(
                "user already deprovisioned: {}",
                args.user_id
            )));
        }
        user.status = "DEPROVISIONED".to_string();
        Ok(json!({
            "id": user.id,
            "status": "DEPROVISIONED",
            "reason": args.reason.unwrap_or_else(|| "manual".to_string()),
        }))
    }

    fn suspend_user(&mut self, args: UserReasonArgs) -> FabricResult<Value> {
        let user = self
            .users
            .get_mut(&args.user_id)
            .ok_or_else(|| user_not_found(&args.user_id))?;
        if user.status == "DEPROVISIONED" {
            return Err(invalid_state(format!(
                "cannot suspend deprovisioned user: {}",
                args.user_id
            )));
        }
        if user.status == "SUSPENDED" {
            return Ok(json!({"id": user.id, "status": "SUSPENDED", "changed": false}));
        }
        user.status = "SUSPENDED".to_string();
        Ok(json!({
            "id": user.id,
            "status": "SUSPENDED",
            "changed": true,
            "reason": args.reason.unwrap_or_else(|| "manual".to_string()),
        }))
    }

    fn unsuspend_user(&mut self, args: &UserArgs) -> FabricResult<Value> {
        let user = self
            .users
            .get_mut(&args.user_id)
            .ok_or_else(|| user_not_found(&args.user_id))?;
        if user.status != "SUSPENDED" {
            return Err(invalid_state(format!(
                "user is not suspended: {}",
                args.user_id
            )));
        }
        user.status = "ACTIVE".to_string();
        Ok(json!({"id": user.id, "status": "ACTIVE", "changed": true}))
    }

    fn reset_password(&mut self, args: &UserArgs) -> FabricResult<Value> {
        let user = self
            .users
            .get(&args.user_id)
            .ok_or_else(|| user_not_found(&args.user_id))?;
        if !RESETTABLE.contains(&user.status.as_str()) {
            return Err(invalid_state(format!(
                "cannot reset password for {} user",
                user.status.to_lowercase()
            )));
        }
        let token = format!("RST-{:04}-{}", self.reset_seq, user.id);
        self.reset_seq += 1;
        Ok(json!({
            "user_id": user.id,
            "reset_token": token,
            "expires_ms": 3_600_000,
        }))
    }

    fn list_groups(&self, args: ListGroupsArgs) -> FabricResult<Value> {
        let needle = args.query.as_deref().unwrap_or("").trim().to_lowercase();
        let mut rows: Vec<Value> = self
            .groups
            .values()
            .filter(|group| needle.is_empty() || group.name.to_lowercase().contains(&needle))
            .map(|group| {
                let mut row = group.summary();
                if args.include_members
                    && let Some(object) = row.as_object_mut()
                {
                    object.insert("members".to_string(), json!(group.members));
                }
                row
            })
            .collect();
        let sort_field = match args.sort_by.as_deref() {
            Some("member_count") => "member_count",
            _ => "name",
        };
        let descending = args.sort_dir.as_deref() == Some("desc");
        page::sort_rows(&mut rows, sort_field, descending);
        page::paginate(
            rows,
            "groups",
            args.limit,
            args.cursor.as_deref(),
            "okta.invalid_cursor",
        )
    }

    fn assign_group(&mut self, args: &GroupAssignArgs) -> FabricResult<Value> {
        if !self.users.contains_key(&args.user_id) {
            return Err(user_not_found(&args.user_id));
        }
        let group = self
            .groups
            .get_mut(&args.group_id)
            .ok_or_else(|| group_not_found(&args.group_id))?;
        if !group.members.contains(&args.user_id) {
            group.members.push(args.user_id.clone());
        }
        let member_count = group.members.len();
        if let Some(user) = self.users.get_mut(&args.user_id)
            && !user.groups.contains(&args.group_id)
        {
            user.groups.push(args.group_id.clone());
        }
        Ok(json!({
            "group_id": args.group_id,
            "user_id": args.user_id,
            "members": member_count,
        }))
    }

    fn unassign_group(&mut self, args: &GroupAssignArgs) -> FabricResult<Value> {
        let user = self
            .users
            .get_mut(&args.user_id)
            .ok_or_else(|| user_not_found(&args.user_id))?;
        let group = self
            .groups
            .get_mut(&args.group_id)
            .ok_or_else(|| group_not_found(&args.group_id))?;
        user.groups.retain(|id| id != &args.group_id);
        group.members.retain(|id| id != &args.user_id);
        Ok(json!({
            "group_id": args.group_id,
            "user_id": args.user_id,
            "members": group.members.len(),
        }))
    }

    fn list_applications(&self, args: ListApplicationsArgs) -> FabricResult<Value> {
        let needle = args.query.as_deref().unwrap_or("").trim().to_lowercase();
        let mut rows: Vec<Value> = self
            .apps
            .values()
            .filter(|app| needle.is_empty() || app.label.to_lowercase().contains(&needle))
            .map(Application::summary)
            .collect();
        let sort_field = match args.sort_by.as_deref() {
            Some("assignments") => "assignments",
            _ => "label",
        };
        let descending = args.sort_dir.as_deref() == Some("desc");
        page::sort_rows(&mut rows, sort_field, descending);
        page::paginate(
            rows,
            "applications",
            args.limit,
            args.cursor.as_deref(),
            "okta.invalid_cursor",
        )
    }

    fn assign_application(&mut self, args: &AppAssignArgs) -> FabricResult<Value> {
        if !self.users.contains_key(&args.user_id) {
            return Err(user_not_found(&args.user_id));
        }
        let app = self
            .apps
            .get_mut(&args.app_id)
            .ok_or_else(|| app_not_found(&args.app_id))?;
        if !app.assignments.contains(&args.user_id) {
            app.assignments.push(args.user_id.clone());
        }
        let assignment_count = app.assignments.len();
        if let Some(user) = self.users.get_mut(&args.user_id)
            && !user.applications.contains(&args.app_id)
        {
            user.applications.push(args.app_id.clone());
        }
        Ok(json!({
            "user_id": args.user_id,
            "app_id": args.app_id,
            "assignments": assignment_count,
        }))
    }

    fn unassign_application(&mut self, args: &AppAssignArgs) -> FabricResult<Value> {
        let user = self
            .users
            .get_mut(&args.user_id)
            .ok_or_else(|| user_not_found(&args.user_id))?;
        let app = self
            .apps
            .get_mut(&args.app_id)
            .ok_or_else(|| app_not_found(&args.app_id))?;
        user.applications.retain(|id| id != &args.app_id);
        app.assignments.retain(|id| id != &args.user_id);
        Ok(json!({
            "user_id": args.user_id,
            "app_id": args.app_id,
            "assignments": app.assignments.len(),
        }))
    }

    /// One-line summary for observations.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Identity: {} users, {} groups",
            self.users.len(),
            self.groups.len()
        )
    }

    /// Compact state digest.
    #[must_use]
    pub fn digest(&self) -> Value {
        let mut by_status: BTreeMap<&str, u64> = BTreeMap::new();
        for user in self.users.values() {
            *by_status.entry(user.status.as_str()).or_insert(0) += 1;
        }
        json!({
            "user_count": self.users.len(),
            "group_count": self.groups.len(),
            "app_count": self.apps.len(),
            "by_status": by_status,
        })
    }
}

fn user_not_found(id: &str) -> FabricError {
    FabricError::new("okta.user_not_found", format!("unknown user: {id}"))
}

fn group_not_found(id: &str) -> FabricError {
    FabricError::new("okta.group_not_found", format!("unknown group: {id}"))
}

fn app_not_found(id: &str) -> FabricError {
    FabricError::new("okta.app_not_found", format!("unknown application: {id}"))
}

fn invalid_state(message: String) -> FabricError {
    FabricError::new("okta.invalid_state", message)
}

// ============================================================================
// SECTION: Tool Specs
// ============================================================================

/// Tool specs exposed by the identity twin.
#[must_use]
pub fn specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new("okta.list_users", "List directory users by status or query.")
            .with_permissions(&["identity:read"])
            .with_latency(350, 120),
        ToolSpec::new("okta.get_user", "Fetch a single user profile by id.")
            .with_permissions(&["identity:read"])
            .with_latency(320, 90),
        ToolSpec::new("okta.activate_user", "Activate a user profile.")
            .with_permissions(&["identity:write"])
            .with_side_effects(&["identity_mutation"])
            .with_latency(420, 140),
        ToolSpec::new("okta.deactivate_user", "Deprovision a user profile.")
            .with_permissions(&["identity:write"])
            .with_side_effects(&["identity_mutation"])
            .with_latency(450, 150),
        ToolSpec::new("okta.suspend_user", "Suspend a user account.")
            .with_permissions(&["identity:write"])
            .with_side_effects(&["identity_mutation"])
            .with_latency(430, 140),
        ToolSpec::new("okta.unsuspend_user", "Unsuspend a suspended user account.")
            .with_permissions(&["identity:write"])
            .with_side_effects(&["identity_mutation"])
            .with_latency(420, 130),
        ToolSpec::new("okta.reset_password", "Generate a password reset token.")
            .with_permissions(&["identity:write"])
            .with_side_effects(&["identity_mutation"])
            .with_latency(380, 110),
        ToolSpec::new("okta.list_groups", "List identity groups.")
            .with_permissions(&["identity:read"])
            .with_latency(330, 100),
        ToolSpec::new("okta.assign_group", "Add a user to a group.")
            .with_permissions(&["identity:write"])
            .with_side_effects(&["identity_mutation"])
            .with_latency(410, 140),
        ToolSpec::new("okta.unassign_group", "Remove a user from a group.")
            .with_permissions(&["identity:write"])
            .with_side_effects(&["identity_mutation"])
            .with_latency(410, 140),
        ToolSpec::new("okta.list_applications", "List SSO applications.")
            .with_permissions(&["identity:read"])
            .with_latency(300, 80),
        ToolSpec::new("okta.assign_application", "Assign an application to a user.")
            .with_permissions(&["identity:write"])
            .with_side_effects(&["identity_mutation"])
            .with_latency(420, 130),
        ToolSpec::new("okta.unassign_application", "Remove an application assignment.")
            .with_permissions(&["identity:write"])
            .with_side_effects(&["identity_mutation"])
            .with_latency(420, 130),
    ]
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions.
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only output and panic-based assertions are permitted."
    )]

    use twin_fabric_core::DeterministicRng;
    use twin_fabric_world::catalog::multi_channel;

    use super::*;

    fn args(value: Value) -> JsonMap {
        value.as_object().cloned().unwrap_or_default()
    }

    fn twin() -> OktaTwin {
        OktaTwin::from_scenario(&multi_channel())
    }

    #[test]
    fn lifecycle_guards_deprovisioned_users() {
        let mut twin = twin();
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);

        let err = twin
            .dispatch("activate_user", &args(json!({"user_id": "USR-3001"})), &mut ctx)
            .unwrap_err();
        assert_eq!(err.code, "okta.invalid_state");

        let err = twin
            .dispatch("suspend_user", &args(json!({"user_id": "USR-3001"})), &mut ctx)
            .unwrap_err();
        assert_eq!(err.code, "okta.invalid_state");

        let err = twin
            .dispatch("reset_password", &args(json!({"user_id": "USR-3001"})), &mut ctx)
            .unwrap_err();
        assert_eq!(err.code, "okta.invalid_state");
    }

    #[test]
    fn suspend_then_unsuspend_roundtrips() {
        let mut twin = twin();
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);

        let suspended = twin
            .dispatch(
                "suspend_user",
                &args(json!({"user_id": "USR-2001", "reason": "investigation"})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(suspended["status"], "SUSPENDED");

        let unsuspended = twin
            .dispatch("unsuspend_user", &args(json!({"user_id": "USR-2001"})), &mut ctx)
            .unwrap();
        assert_eq!(unsuspended["status"], "ACTIVE");

        let err = twin
            .dispatch("unsuspend_user", &args(json!({"user_id": "USR-2001"})), &mut ctx)
            .unwrap_err();
        assert_eq!(err.code, "okta.invalid_state");
    }

    #[test]
    fn group_assignment_keeps_both_sides_in_sync() {
        let mut twin = twin();
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);

        twin.dispatch(
            "assign_group",
            &args(json!({"user_id": "USR-2001", "group_id": "GRP-procurement"})),
            &mut ctx,
        )
        .unwrap();
        let user = twin
            .dispatch("get_user", &args(json!({"user_id": "USR-2001"})), &mut ctx)
            .unwrap();
        assert!(
            user["groups"]
                .as_array()
                .unwrap()
                .iter()
                .any(|g| g == "GRP-procurement")
        );

        // Assignment is a set: repeating it does not duplicate.
        let repeated = twin
            .dispatch(
                "assign_group",
                &args(json!({"user_id": "USR-2001", "group_id": "GRP-procurement"})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(repeated["members"], 1);

        let removed = twin
            .dispatch(
                "unassign_group",
                &args(json!({"user_id": "USR-2001", "group_id": "GRP-procurement"})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(removed["members"], 0);
    }

    #[test]
    fn user_listing_paginates_with_the_scoped_cursor_code() {
        let mut twin = twin();
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);

        let page = twin
            .dispatch("list_users", &args(json!({"limit": 1, "sort_by": "email"})), &mut ctx)
            .unwrap();
        assert_eq!(page["count"], 1);
        assert!(page["total"].as_u64().unwrap() >= 3);

        let err = twin
            .dispatch("list_users", &args(json!({"cursor": "bogus"})), &mut ctx)
            .unwrap_err();
        assert_eq!(err.code, "okta.invalid_cursor");
    }

    #[test]
    fn reset_tokens_are_sequential_and_scoped_to_the_user() {
        let mut twin = twin();
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let first = twin
            .dispatch("reset_password", &args(json!({"user_id": "USR-9001"})), &mut ctx)
            .unwrap();
        assert_eq!(first["reset_token"], "RST-0001-USR-9001");
        let second = twin
            .dispatch("reset_password", &args(json!({"user_id": "USR-2001"})), &mut ctx)
            .unwrap();
        assert_eq!(second["reset_token"], "RST-0002-USR-2001");
    }

    #[test]
    fn application_assignment_mirrors_user_and_app() {
        let mut twin = twin();
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let apps = twin
            .dispatch("list_applications", &args(json!({"limit": 1})), &mut ctx)
            .unwrap();
        let app_id = apps["applications"][0]["id"].as_str().unwrap().to_string();

        twin.dispatch(
            "assign_application",
            &args(json!({"user_id": "USR-2001", "app_id": app_id})),
            &mut ctx,
        )
        .unwrap();
        let removed = twin
            .dispatch(
                "unassign_application",
                &args(json!({"user_id": "USR-2001", "app_id": app_id})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(removed["app_id"], app_id.as_str());
        let user = twin
            .dispatch("get_user", &args(json!({"user_id": "USR-2001"})), &mut ctx)
            .unwrap();
        assert!(
            !user["applications"]
                .as_array()
                .unwrap()
                .iter()
                .any(|a| a == app_id.as_str())
        );
    }
}
