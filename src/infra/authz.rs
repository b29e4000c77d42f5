use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::{AuthorizationError, RemoteError};

/// Built-in "Owner" role.
pub const OWNER_ROLE_GUID: &str = "8e3af657-a8ff-443c-a75c-2fe8c4bcb635";
/// Built-in "Storage Blob Data Contributor" role.
pub const BLOB_DATA_CONTRIBUTOR_ROLE_GUID: &str = "ba92f5b4-2d11-453d-a403-e96b0029c9fe";

pub fn role_definition_id(subscription_id: &str, role_guid: &str) -> String {
    format!(
        "/subscriptions/{subscription_id}/providers/Microsoft.Authorization/roleDefinitions/{role_guid}"
    )
}

pub fn owner_role_definition_id(subscription_id: &str) -> String {
    role_definition_id(subscription_id, OWNER_ROLE_GUID)
}

pub fn blob_data_contributor_role_definition_id(subscription_id: &str) -> String {
    role_definition_id(subscription_id, BLOB_DATA_CONTRIBUTOR_ROLE_GUID)
}

/// Role assignment names are GUIDs; derive one from its content so a rerun
/// targets the same assignment.
pub fn role_assignment_name(scope: &str, principal_id: &str, role_definition_id: &str) -> String {
    let key = format!(
        "{}|{}|{}",
        scope.to_ascii_lowercase(),
        principal_id.to_ascii_lowercase(),
        role_definition_id.to_ascii_lowercase()
    );
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignmentRecord {
    pub principal_id: String,
    pub role_definition_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct RoleAssignmentPage {
    pub assignments: Vec<RoleAssignmentRecord>,
    /// Absolute URL of the next page, if any
    pub next_link: Option<String>,
}

/// Paged listing of role assignments on a subscription.
#[async_trait]
pub trait RoleAssignmentSource: Send + Sync {
    /// Fetch the first page when `next_link` is `None`, otherwise the page it names.
    async fn list_page(
        &self,
        subscription_id: &str,
        next_link: Option<&str>,
    ) -> Result<RoleAssignmentPage, RemoteError>;
}

/// Confirm `principal_id` holds Owner on the subscription.
///
/// Pages are fetched one at a time and scanning stops at the first match.
pub async fn ensure_owner(
    source: &dyn RoleAssignmentSource,
    subscription_id: &str,
    principal_id: &str,
    principal_display: &str,
) -> Result<(), AuthorizationError> {
    let owner = owner_role_definition_id(subscription_id);
    let mut next_link: Option<String> = None;
    let mut page_count = 0usize;

    loop {
        let page = source
            .list_page(subscription_id, next_link.as_deref())
            .await
            .map_err(|e| AuthorizationError::CheckFailed(e.to_string()))?;
        page_count += 1;
        debug!(
            page = page_count,
            assignments = page.assignments.len(),
            "Scanning role assignments"
        );

        let found = page.assignments.iter().any(|a| {
            a.principal_id.eq_ignore_ascii_case(principal_id)
                && a.role_definition_id.eq_ignore_ascii_case(&owner)
        });
        if found {
            info!("{principal_display} has Owner permissions on subscription - proceeding with provisioning");
            return Ok(());
        }

        match page.next_link {
            Some(link) if !link.is_empty() => next_link = Some(link),
            _ => break,
        }
    }

    Err(AuthorizationError::InsufficientPermissions {
        principal: principal_display.to_string(),
        subscription_id: subscription_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const SUB: &str = "11111111-2222-3333-4444-555555555555";
    const ME: &str = "aaaaaaaa-0000-0000-0000-000000000001";

    /// Serves canned pages; records which pages were requested.
    struct PagedSource {
        pages: Vec<Result<Vec<RoleAssignmentRecord>, RemoteError>>,
        requested: Mutex<Vec<Option<String>>>,
    }

    impl PagedSource {
        fn new(pages: Vec<Result<Vec<RoleAssignmentRecord>, RemoteError>>) -> Self {
            Self {
                pages,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<Option<String>> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RoleAssignmentSource for PagedSource {
        async fn list_page(
            &self,
            _subscription_id: &str,
            next_link: Option<&str>,
        ) -> Result<RoleAssignmentPage, RemoteError> {
            self.requested
                .lock()
                .unwrap()
                .push(next_link.map(str::to_string));
            let idx = match next_link {
                None => 0,
                Some(link) => link.trim_start_matches("page-").parse::<usize>().unwrap(),
            };
            let assignments = self.pages[idx].clone()?;
            let next_link = (idx + 1 < self.pages.len()).then(|| format!("page-{}", idx + 1));
            Ok(RoleAssignmentPage {
                assignments,
                next_link,
            })
        }
    }

    fn record(principal: &str, role: String) -> RoleAssignmentRecord {
        RoleAssignmentRecord {
            principal_id: principal.to_string(),
            role_definition_id: role,
        }
    }

    #[test]
    fn owner_role_definition_is_subscription_scoped() {
        assert_eq!(
            owner_role_definition_id(SUB),
            "/subscriptions/11111111-2222-3333-4444-555555555555/providers/Microsoft.Authorization/roleDefinitions/8e3af657-a8ff-443c-a75c-2fe8c4bcb635"
        );
    }

    #[tokio::test]
    async fn match_on_second_page_is_found() {
        let source = PagedSource::new(vec![
            Ok(vec![
                record("someone-else", owner_role_definition_id(SUB)),
                record(ME, role_definition_id(SUB, "acdd72a7-3385-48ef-bd42-f606fba81ae7")),
            ]),
            Ok(vec![record(ME, owner_role_definition_id(SUB))]),
        ]);

        ensure_owner(&source, SUB, ME, "me@contoso.com").await.unwrap();

        assert_eq!(source.requested(), vec![None, Some("page-1".to_string())]);
    }

    #[tokio::test]
    async fn scanning_stops_at_first_match() {
        let source = PagedSource::new(vec![
            Ok(vec![record(ME, owner_role_definition_id(SUB))]),
            Ok(vec![]),
            Ok(vec![]),
        ]);

        ensure_owner(&source, SUB, ME, "me").await.unwrap();

        assert_eq!(source.requested().len(), 1);
    }

    #[tokio::test]
    async fn no_match_anywhere_is_insufficient_permissions() {
        let source = PagedSource::new(vec![
            Ok(vec![record("someone-else", owner_role_definition_id(SUB))]),
            Ok(vec![record(ME, blob_data_contributor_role_definition_id(SUB))]),
        ]);

        let err = ensure_owner(&source, SUB, ME, "me@contoso.com").await.unwrap_err();

        assert_eq!(source.requested().len(), 2);
        match err {
            AuthorizationError::InsufficientPermissions {
                principal,
                subscription_id,
            } => {
                assert_eq!(principal, "me@contoso.com");
                assert_eq!(subscription_id, SUB);
            }
            other => panic!("expected InsufficientPermissions, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn owner_on_other_subscription_does_not_count() {
        let source = PagedSource::new(vec![Ok(vec![record(
            ME,
            owner_role_definition_id("99999999-0000-0000-0000-000000000000"),
        )])]);

        let err = ensure_owner(&source, SUB, ME, "me").await.unwrap_err();
        assert!(matches!(err, AuthorizationError::InsufficientPermissions { .. }));
    }

    #[tokio::test]
    async fn page_failure_is_not_treated_as_no_match() {
        let source = PagedSource::new(vec![
            Ok(vec![]),
            Err(RemoteError::Transport("connection reset".to_string())),
        ]);

        let err = ensure_owner(&source, SUB, ME, "me").await.unwrap_err();
        assert!(matches!(err, AuthorizationError::CheckFailed(_)));
    }

    #[tokio::test]
    async fn role_definition_comparison_ignores_case() {
        let source = PagedSource::new(vec![Ok(vec![record(
            &ME.to_uppercase(),
            owner_role_definition_id(SUB).to_uppercase(),
        )])]);

        ensure_owner(&source, SUB, ME, "me").await.unwrap();
    }

    #[test]
    fn role_assignment_name_is_stable() {
        let scope = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/a";
        let role = blob_data_contributor_role_definition_id("s");
        let first = role_assignment_name(scope, ME, &role);
        let second = role_assignment_name(&scope.to_uppercase(), ME, &role);

        assert_eq!(first, second);
        assert_ne!(first, role_assignment_name(scope, "other", &role));
        assert!(Uuid::parse_str(&first).is_ok());
    }
}
