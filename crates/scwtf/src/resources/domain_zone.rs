//! `scaleway_domain_zone`: DNS zone keyed by name
//!
//! The ID is `{subdomain}.{domain}` with no locality. Once a parent subdomain
//! is gone the API answers 403 rather than 404 for its children, so delete
//! treats forbidden like not-found.

use super::schedule;
use crate::context::CallContext;
use crate::engine::{Swallow, read_or_remove, resolve_project};
use crate::resource::Resource;
use async_trait::async_trait;
use scwtf_cloud::wait::wait_for;
use scwtf_cloud::{
    ApiError, Attribute, CloudError, HasStatus, Operation, Presence, ResourceState, Result, Schema,
    ScwClient, StatusSet, WaitConfig,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const ZONES_PATH: &str = "/domain/v2beta1/dns-zones";

pub const STATUSES: StatusSet = StatusSet {
    pending: &["pending"],
    success: &["active"],
    failure: &["error", "locked"],
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainZoneAttrs {
    pub domain: String,
    pub subdomain: String,
    pub ns: Vec<String>,
    pub ns_default: Vec<String>,
    pub ns_master: Vec<String>,
    pub status: String,
    pub message: String,
    pub updated_at: String,
    pub project_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DnsZone {
    domain: String,
    #[serde(default)]
    subdomain: String,
    #[serde(default)]
    ns: Vec<String>,
    #[serde(default)]
    ns_default: Vec<String>,
    #[serde(default)]
    ns_master: Vec<String>,
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    project_id: String,
}

impl DnsZone {
    fn name(&self) -> String {
        zone_name(&self.subdomain, &self.domain)
    }
}

impl HasStatus for DnsZone {
    fn status(&self) -> &str {
        &self.status
    }
}

#[derive(Debug, Clone, Deserialize)]
struct DnsZoneList {
    #[serde(default)]
    dns_zones: Vec<DnsZone>,
}

/// `{subdomain}.{domain}`, or the bare domain for a root zone
pub fn zone_name(subdomain: &str, domain: &str) -> String {
    if subdomain.is_empty() {
        domain.to_string()
    } else {
        format!("{subdomain}.{domain}")
    }
}

async fn find_zone(client: &ScwClient, name: &str) -> Result<DnsZone> {
    let list: DnsZoneList = client
        .get_with_query(ZONES_PATH, &[("dns_zone", name.to_string())])
        .await?;
    list.dns_zones
        .into_iter()
        .find(|zone| zone.name() == name)
        .ok_or_else(|| {
            CloudError::Api(
                ApiError::new(404, format!("DNS zone {name} not found"))
                    .with_type("not_found")
                    .with_resource("dns_zone"),
            )
        })
}

async fn wait_zone(
    client: &ScwClient,
    config: &WaitConfig,
    cancel: &CancellationToken,
    name: &str,
) -> Result<DnsZone> {
    wait_for("dns zone", config, cancel, &STATUSES, || find_zone(client, name)).await
}

#[derive(Debug, Default)]
pub struct DomainZone;

#[async_trait]
impl Resource for DomainZone {
    type Attrs = DomainZoneAttrs;
    const KIND: &'static str = "scaleway_domain_zone";

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("domain", Attribute::required_string().force_new())
            .with_attribute("subdomain", Attribute::required_string().force_new())
            .with_attribute("ns", Attribute::string_list(Presence::Computed))
            .with_attribute("ns_default", Attribute::string_list(Presence::Computed))
            .with_attribute("ns_master", Attribute::string_list(Presence::Computed))
            .with_attribute("status", Attribute::computed_string())
            .with_attribute("message", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
            .with_attribute("project_id", Attribute::project_id())
    }

    async fn create(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<DomainZoneAttrs>,
    ) -> Result<()> {
        let project = resolve_project(Some(state.attrs.project_id.as_str()), ctx.meta())?;
        let client = ctx.client();
        let body = json!({
            "domain": state.attrs.domain,
            "subdomain": state.attrs.subdomain,
            "project_id": project,
        });
        let created: DnsZone = client.post(ZONES_PATH, &body).await?;
        let name = created.name();
        info!(zone = %name, "DNS zone created");
        state.set_id(name.clone());

        let config = schedule(ctx, state, Operation::Create, DEFAULT_TIMEOUT, POLL_INTERVAL);
        wait_zone(&client, &config, ctx.cancel(), &name).await?;
        self.read(ctx, state).await
    }

    async fn read(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<DomainZoneAttrs>,
    ) -> Result<()> {
        let client = ctx.client();
        let result = find_zone(&client, state.id()).await;
        let Some(zone) = read_or_remove(state, result)? else {
            return Ok(());
        };

        let attrs = &mut state.attrs;
        attrs.domain = zone.domain;
        attrs.subdomain = zone.subdomain;
        attrs.ns = zone.ns;
        attrs.ns_default = zone.ns_default;
        attrs.ns_master = zone.ns_master;
        attrs.status = zone.status;
        attrs.message = zone.message.unwrap_or_default();
        attrs.updated_at = zone.updated_at.unwrap_or_default();
        attrs.project_id = zone.project_id;
        Ok(())
    }

    async fn delete(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<DomainZoneAttrs>,
    ) -> Result<()> {
        let client = ctx.client();
        let name = state.id().to_string();
        let config = schedule(ctx, state, Operation::Delete, DEFAULT_TIMEOUT, POLL_INTERVAL);

        let ready = wait_zone(&client, &config, ctx.cancel(), &name).await;
        if Swallow::GONE.apply(Self::KIND, ready)?.is_none() {
            return Ok(());
        }

        let project = resolve_project(Some(state.attrs.project_id.as_str()), ctx.meta()).ok();
        let query: Vec<(&str, String)> = project.into_iter().map(|p| ("project_id", p)).collect();
        let result = client
            .delete_with_query(&format!("{ZONES_PATH}/{name}"), &query)
            .await;
        Swallow::GONE.apply(Self::KIND, result)?;
        info!(zone = %name, "DNS zone deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_name() {
        assert_eq!(zone_name("test", "example.com"), "test.example.com");
        assert_eq!(zone_name("", "example.com"), "example.com");
    }

    #[test]
    fn test_zone_statuses() {
        use scwtf_cloud::wait::StatusClass;
        assert_eq!(STATUSES.classify("active"), StatusClass::Success);
        assert_eq!(STATUSES.classify("pending"), StatusClass::Pending);
        assert_eq!(STATUSES.classify("error"), StatusClass::Failure);
    }
}
