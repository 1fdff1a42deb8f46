//! `scaleway_instance_ip`: flexible IP of the Instance API (zonal)

use super::schedule;
use crate::context::CallContext;
use crate::engine::{Swallow, delete_tolerant, read_or_remove, resolve_project, resolve_zone};
use crate::resource::Resource;
use async_trait::async_trait;
use scwtf_cloud::expand::{
    expand_nullable_string, expand_tags, expand_updated_tags, flatten_nullable_string,
};
use scwtf_cloud::locality::{new_zonal_id, parse_zonal_id};
use scwtf_cloud::wait::retry;
use scwtf_cloud::{
    Attribute, Operation, Presence, ResourceState, Result, Schema, ScwClient, Zone, is_conflict,
    is_transient,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const RETRY_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpAttrs {
    pub address: String,
    pub reverse: String,
    pub server_id: String,
    pub tags: Vec<String>,
    pub zone: String,
    pub project_id: String,
    pub organization_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct IpEnvelope {
    ip: Ip,
}

#[derive(Debug, Clone, Deserialize)]
struct IpList {
    #[serde(default)]
    ips: Vec<Ip>,
}

#[derive(Debug, Clone, Deserialize)]
struct Ip {
    id: String,
    address: String,
    #[serde(default)]
    reverse: Option<String>,
    #[serde(default)]
    server: Option<ServerRef>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    project: String,
    #[serde(default)]
    organization: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ServerRef {
    id: String,
}

fn ips_path(zone: Zone) -> String {
    format!("/instance/v1/zones/{zone}/ips")
}

fn ip_path(zone: Zone, id: &str) -> String {
    format!("/instance/v1/zones/{zone}/ips/{id}")
}

async fn get_ip(client: &ScwClient, zone: Zone, id: &str) -> Result<Ip> {
    let envelope: IpEnvelope = client.get(&ip_path(zone, id)).await?;
    Ok(envelope.ip)
}

#[derive(Debug, Default)]
pub struct InstanceIp;

#[async_trait]
impl Resource for InstanceIp {
    type Attrs = IpAttrs;
    const KIND: &'static str = "scaleway_instance_ip";

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("address", Attribute::computed_string().describe("The IP address"))
            .with_attribute("reverse", Attribute::optional_computed_string())
            .with_attribute("server_id", Attribute::computed_string())
            .with_attribute("tags", Attribute::string_list(Presence::Optional))
            .with_attribute("zone", Attribute::zone())
            .with_attribute("project_id", Attribute::project_id())
            .with_attribute("organization_id", Attribute::computed_string())
    }

    fn has_sweeper(&self) -> bool {
        true
    }

    async fn create(&self, ctx: &CallContext, state: &mut ResourceState<IpAttrs>) -> Result<()> {
        let zone = resolve_zone(Some(state.attrs.zone.as_str()), ctx.meta())?;
        let project = resolve_project(Some(state.attrs.project_id.as_str()), ctx.meta())?;
        let client = ctx.client();

        let body = json!({
            "project": project,
            "tags": expand_tags(&state.attrs.tags),
        });
        let created: IpEnvelope = client.post(&ips_path(zone), &body).await?;
        info!(zone = %zone, id = %created.ip.id, "Flexible IP created");
        state.set_id(new_zonal_id(zone, &created.ip.id));

        if let Some(reverse) = expand_nullable_string(Some(state.attrs.reverse.as_str())) {
            let config = schedule(ctx, state, Operation::Create, DEFAULT_TIMEOUT, RETRY_INTERVAL);
            let path = ip_path(zone, &created.ip.id);
            let body = json!({ "reverse": reverse });
            // the reverse must resolve to the address, which can lag behind creation
            retry(
                "set reverse",
                &config,
                ctx.cancel(),
                |e| is_transient(e) || is_conflict(e),
                || client.patch::<_, IpEnvelope>(&path, &body),
            )
            .await?;
        }

        self.read(ctx, state).await
    }

    async fn read(&self, ctx: &CallContext, state: &mut ResourceState<IpAttrs>) -> Result<()> {
        let (zone, id) = parse_zonal_id(state.id())?;
        let client = ctx.client();
        let Some(ip) = read_or_remove(state, get_ip(&client, zone, &id).await)? else {
            return Ok(());
        };

        let attrs = &mut state.attrs;
        attrs.address = ip.address;
        attrs.reverse = flatten_nullable_string(ip.reverse.as_deref());
        attrs.server_id = ip
            .server
            .map(|s| new_zonal_id(zone, &s.id))
            .unwrap_or_default();
        attrs.tags = ip.tags;
        attrs.zone = zone.to_string();
        attrs.project_id = ip.project;
        attrs.organization_id = ip.organization;
        Ok(())
    }

    async fn update(&self, ctx: &CallContext, state: &mut ResourceState<IpAttrs>) -> Result<()> {
        let (zone, id) = parse_zonal_id(state.id())?;
        let client = ctx.client();

        let mut patch = Map::new();
        if state.has_change(|a| &a.reverse) {
            patch.insert(
                "reverse".into(),
                expand_nullable_string(Some(state.attrs.reverse.as_str()))
                    .map_or(Value::Null, Value::String),
            );
        }
        let (old_tags, new_tags) = state.get_change(|a| &a.tags);
        if let Some(tags) = expand_updated_tags(old_tags.map(Vec::as_slice), new_tags) {
            patch.insert("tags".into(), json!(tags));
        }

        if !patch.is_empty() {
            let _: IpEnvelope = client.patch(&ip_path(zone, &id), &Value::Object(patch)).await?;
            info!(id = %state.id(), "Flexible IP updated");
        }
        self.read(ctx, state).await
    }

    async fn delete(&self, ctx: &CallContext, state: &mut ResourceState<IpAttrs>) -> Result<()> {
        let (zone, id) = parse_zonal_id(state.id())?;
        let result = ctx.client().delete(&ip_path(zone, &id)).await;
        delete_tolerant(Self::KIND, result, Swallow::NONE)
    }

    /// Release every IP not attached to a server
    async fn sweep(&self, ctx: &CallContext) -> Result<usize> {
        let client = ctx.client();
        let mut removed = 0;
        for zone in Zone::ALL {
            let list: IpList = client.get(&ips_path(zone)).await?;
            for ip in list.ips.into_iter().filter(|ip| ip.server.is_none()) {
                let result = client.delete(&ip_path(zone, &ip.id)).await;
                match delete_tolerant(Self::KIND, result, Swallow::NONE) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(zone = %zone, id = %ip.id, error = %e, "Cannot sweep IP"),
                }
            }
        }
        Ok(removed)
    }
}
