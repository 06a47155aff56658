//! Cloud Foundry v3 platform client.
//!
//! Every call resolves the configured org and space, then the application
//! by name inside that space. Instances are counted as `RUNNING` entries
//! of the app's `web` process, and scaling goes through the process
//! scale action. The bearer token is taken as configured; obtaining or
//! refreshing it is left to whoever provisions the daemon.

use serde::Deserialize;
use tracing::debug;

use qscale_core::config::PlatformConfig;
use qscale_core::{
    ApplicationState, BackendError, BackendFuture, BackendResult, PlatformClient,
};

use crate::http::{HttpClient, encode_path_segment};

/// Paged v3 list response; only the first page is read.
#[derive(Debug, Deserialize)]
struct ResourceList {
    #[serde(default)]
    resources: Vec<NamedResource>,
}

#[derive(Debug, Deserialize)]
struct NamedResource {
    guid: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ProcessStats {
    #[serde(default)]
    resources: Vec<InstanceStats>,
}

#[derive(Debug, Deserialize)]
struct InstanceStats {
    #[serde(default)]
    state: String,
}

/// Platform client for the Cloud Foundry v3 API.
pub struct CloudFoundryClient {
    http: HttpClient,
    api: String,
    org: String,
    space: String,
    authorization: String,
}

impl CloudFoundryClient {
    pub fn new(http: HttpClient, config: &PlatformConfig) -> Self {
        Self {
            http,
            api: config.api.trim_end_matches('/').to_string(),
            org: config.org.clone(),
            space: config.space.clone(),
            authorization: bearer(&config.token),
        }
    }

    /// GET a v3 list and return the guid of the single resource named
    /// `name`.
    async fn find_one(&self, url: &str, kind: &str, name: &str) -> BackendResult<String> {
        let list: ResourceList = self
            .http
            .get(url, &self.authorization)
            .await?
            .error_for_status()?
            .json()?;

        let mut matches = list.resources.into_iter().filter(|r| r.name == name);
        match (matches.next(), matches.next()) {
            (Some(found), None) => Ok(found.guid),
            (None, _) => Err(BackendError::NotFound(format!("{kind} {name}"))),
            (Some(_), Some(_)) => Err(BackendError::Ambiguous(format!(
                "more than one {kind} named {name}"
            ))),
        }
    }

    async fn space_guid(&self) -> BackendResult<String> {
        let url = format!(
            "{}/v3/organizations?names={}",
            self.api,
            encode_path_segment(&self.org)
        );
        let org_guid = self.find_one(&url, "organization", &self.org).await?;

        let url = format!(
            "{}/v3/spaces?names={}&organization_guids={org_guid}",
            self.api,
            encode_path_segment(&self.space)
        );
        self.find_one(&url, "space", &self.space).await
    }

    async fn app_guid(&self, name: &str) -> BackendResult<String> {
        let space_guid = self.space_guid().await?;
        let url = format!(
            "{}/v3/apps?names={}&space_guids={space_guid}",
            self.api,
            encode_path_segment(name)
        );
        self.find_one(&url, "application", name)
            .await
            .map_err(|err| match err {
                BackendError::NotFound(what) => {
                    BackendError::NotFound(format!("{what} in {}/{}", self.org, self.space))
                }
                other => other,
            })
    }

    /// Count the application's running web instances.
    pub async fn running_instances(&self, name: &str) -> BackendResult<ApplicationState> {
        let guid = self.app_guid(name).await?;
        let url = format!("{}/v3/apps/{guid}/processes/web/stats", self.api);
        let stats: ProcessStats = self
            .http
            .get(&url, &self.authorization)
            .await?
            .error_for_status()?
            .json()?;

        let running = stats
            .resources
            .iter()
            .filter(|i| i.state.eq_ignore_ascii_case("RUNNING"))
            .count();
        debug!(
            application = %name,
            %guid,
            running,
            reported = stats.resources.len(),
            "application instances read"
        );

        Ok(ApplicationState {
            name: name.to_string(),
            running_instances: u32::try_from(running).unwrap_or(u32::MAX),
        })
    }

    /// Set the desired instance count of the web process.
    pub async fn scale(&self, name: &str, target_instances: u32) -> BackendResult<()> {
        let guid = self.app_guid(name).await?;
        let url = format!("{}/v3/apps/{guid}/processes/web/actions/scale", self.api);
        let body = serde_json::json!({ "instances": target_instances });

        self.http
            .post_json(&url, &self.authorization, &body)
            .await?
            .error_for_status()?;

        debug!(application = %name, %guid, target_instances, "scale request accepted");
        Ok(())
    }
}

impl PlatformClient for CloudFoundryClient {
    fn get_application<'a>(&'a self, name: &'a str) -> BackendFuture<'a, ApplicationState> {
        Box::pin(self.running_instances(name))
    }

    fn scale_application<'a>(
        &'a self,
        name: &'a str,
        target_instances: u32,
    ) -> BackendFuture<'a, ()> {
        Box::pin(self.scale(name, target_instances))
    }
}

/// `cf oauth-token` prints the token with its scheme; accept either form.
fn bearer(token: &str) -> String {
    let token = token.trim();
    match token.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => {
            format!("bearer {}", token[7..].trim())
        }
        _ => format!("bearer {token}"),
    }
}
