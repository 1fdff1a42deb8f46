//! Acceptance test harness
//!
//! A [`SideProject`] is a throwaway project with its own IAM application and
//! API key, used by tests that need credentials scoped to a second project.
//! Everything it creates is undone in reverse order by [`SideProject::terminate`].

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use scwtf_cloud::{ScwClient, is_not_found};
use scwtf_config::Meta;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const PROJECTS_PATH: &str = "/account/v3/projects";
const APPLICATIONS_PATH: &str = "/iam/v1alpha1/applications";
const POLICIES_PATH: &str = "/iam/v1alpha1/policies";
const API_KEYS_PATH: &str = "/iam/v1alpha1/api-keys";

/// Permission set granted to the side project's application
pub const SIDE_PERMISSION_SET: &str = "ObjectStorageFullAccess";

/// One undo step
#[async_trait]
pub trait Cleanup: Send + Sync {
    fn describe(&self) -> String;
    async fn run(&self, client: &ScwClient) -> scwtf_cloud::Result<()>;
}

/// `DELETE path`, where not-found counts as done
#[derive(Debug, Clone)]
pub struct DeleteCall {
    pub path: String,
}

#[async_trait]
impl Cleanup for DeleteCall {
    fn describe(&self) -> String {
        format!("DELETE {}", self.path)
    }

    async fn run(&self, client: &ScwClient) -> scwtf_cloud::Result<()> {
        match client.delete(&self.path).await {
            Err(e) if is_not_found(&e) => Ok(()),
            other => other,
        }
    }
}

/// Undo steps, run last-in first-out
#[derive(Default)]
pub struct CleanupStack {
    steps: Vec<Box<dyn Cleanup>>,
}

impl std::fmt::Debug for CleanupStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|s| s.describe()))
            .finish()
    }
}

impl CleanupStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the position of the step in the stack
    pub fn push(&mut self, step: impl Cleanup + 'static) -> usize {
        self.steps.push(Box::new(step));
        self.steps.len() - 1
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step even when some fail; failures are reported together
    pub async fn terminate(mut self, client: &ScwClient) -> anyhow::Result<()> {
        let mut failures = Vec::new();
        while let Some(step) = self.steps.pop() {
            let what = step.describe();
            match step.run(client).await {
                Ok(()) => info!(step = %what, "Cleanup done"),
                Err(e) => {
                    warn!(step = %what, error = %e, "Cleanup failed");
                    failures.push(format!("{what}: {e}"));
                }
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("{} cleanup step(s) failed: {}", failures.len(), failures.join("; ")))
        }
    }
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiKey {
    access_key: String,
    secret_key: String,
}

/// A temporary project with credentials of its own
#[derive(Debug)]
pub struct SideProject {
    project_id: String,
    meta: Meta,
    client: ScwClient,
    cleanups: CleanupStack,
}

impl SideProject {
    /// Create the project, an application, its policy and an API key
    ///
    /// On failure the steps already done are undone before returning.
    pub async fn create(
        main: &Meta,
        name: &str,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Self> {
        let organization_id = main
            .default_organization_id()
            .context("a side project needs the default organization ID")?
            .to_string();
        let client = main.client(cancel);
        let mut cleanups = CleanupStack::new();

        match Self::provision(&client, &mut cleanups, &organization_id, name).await {
            Ok((project_id, key)) => {
                info!(project = %project_id, "Side project ready");
                Ok(Self {
                    meta: main.side(&key.access_key, &key.secret_key, &project_id),
                    project_id,
                    client,
                    cleanups,
                })
            }
            Err(e) => {
                if let Err(cleanup) = cleanups.terminate(&client).await {
                    warn!(error = %cleanup, "Side project left behind");
                }
                Err(e)
            }
        }
    }

    async fn provision(
        client: &ScwClient,
        cleanups: &mut CleanupStack,
        organization_id: &str,
        name: &str,
    ) -> anyhow::Result<(String, ApiKey)> {
        let project: Created = client
            .post(PROJECTS_PATH, &json!({ "name": name, "organization_id": organization_id }))
            .await
            .context("creating project")?;
        cleanups.push(DeleteCall {
            path: format!("{PROJECTS_PATH}/{}", project.id),
        });

        let application: Created = client
            .post(
                APPLICATIONS_PATH,
                &json!({ "name": name, "organization_id": organization_id }),
            )
            .await
            .context("creating IAM application")?;
        cleanups.push(DeleteCall {
            path: format!("{APPLICATIONS_PATH}/{}", application.id),
        });

        let policy: Created = client
            .post(
                POLICIES_PATH,
                &json!({
                    "name": name,
                    "application_id": application.id,
                    "rules": [{
                        "project_ids": [project.id],
                        "permission_set_names": [SIDE_PERMISSION_SET],
                    }],
                }),
            )
            .await
            .context("creating IAM policy")?;
        cleanups.push(DeleteCall {
            path: format!("{POLICIES_PATH}/{}", policy.id),
        });

        let key: ApiKey = client
            .post(
                API_KEYS_PATH,
                &json!({ "application_id": application.id, "default_project_id": project.id }),
            )
            .await
            .context("creating API key")?;
        cleanups.push(DeleteCall {
            path: format!("{API_KEYS_PATH}/{}", key.access_key),
        });

        Ok((project.id, key))
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Meta acting with the side project's credentials
    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Remove everything, API key first and project last
    pub async fn terminate(self) -> anyhow::Result<()> {
        info!(project = %self.project_id, "Terminating side project");
        self.cleanups.terminate(&self.client).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scwtf_cloud::{CloudError, HttpRequest, HttpResponse, HttpTransport};
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct Offline;

    #[async_trait]
    impl HttpTransport for Offline {
        async fn send(&self, _request: HttpRequest) -> scwtf_cloud::Result<HttpResponse> {
            Ok(HttpResponse::new(503, "offline"))
        }
    }

    struct Step {
        name: &'static str,
        fail: bool,
        ran: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Cleanup for Step {
        fn describe(&self) -> String {
            self.name.to_string()
        }

        async fn run(&self, _client: &ScwClient) -> scwtf_cloud::Result<()> {
            self.ran.lock().unwrap().push(self.name);
            if self.fail {
                return Err(CloudError::Precondition("still in use".into()));
            }
            Ok(())
        }
    }

    fn client() -> ScwClient {
        ScwClient::new(Arc::new(Offline), "https://api.example.test", "sk", "scwtf/test")
    }

    #[tokio::test]
    async fn test_cleanup_runs_last_in_first_out() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let mut stack = CleanupStack::new();
        for name in ["project", "application", "api-key"] {
            stack.push(Step {
                name,
                fail: false,
                ran: ran.clone(),
            });
        }
        assert_eq!(stack.len(), 3);
        stack.terminate(&client()).await.unwrap();
        assert_eq!(*ran.lock().unwrap(), vec!["api-key", "application", "project"]);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_going_after_failure() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let mut stack = CleanupStack::new();
        stack.push(Step {
            name: "project",
            fail: false,
            ran: ran.clone(),
        });
        stack.push(Step {
            name: "policy",
            fail: true,
            ran: ran.clone(),
        });
        let err = stack.terminate(&client()).await.unwrap_err();
        assert!(err.to_string().contains("policy"));
        assert_eq!(*ran.lock().unwrap(), vec!["policy", "project"]);
    }

    #[tokio::test]
    async fn test_delete_call_tolerates_not_found() {
        #[derive(Debug)]
        struct Gone;

        #[async_trait]
        impl HttpTransport for Gone {
            async fn send(&self, _request: HttpRequest) -> scwtf_cloud::Result<HttpResponse> {
                Ok(HttpResponse::new(404, r#"{"type":"not_found","message":"gone"}"#))
            }
        }

        let client = ScwClient::new(Arc::new(Gone), "https://api.example.test", "sk", "scwtf/test");
        let step = DeleteCall {
            path: "/iam/v1alpha1/policies/p".into(),
        };
        step.run(&client).await.unwrap();
        assert!(DeleteCall { path: "/x".into() }.run(&self::client()).await.is_err());
    }
}
