//! `scaleway_rdb_instance`: managed database instance (regional)
//!
//! Every mutation is sandwiched between waiters: the API refuses changes while
//! the instance is provisioning, backing up or applying a previous upgrade.
//! Upgrades go through one endpoint that accepts a single change per call, so
//! an update issues one upgrade per changed field, each followed by a wait.

use super::{is_sweepable, schedule};
use crate::context::CallContext;
use crate::engine::{Swallow, delete_tolerant, read_or_remove, resolve_project, resolve_region};
use crate::resource::Resource;
use async_trait::async_trait;
use scwtf_cloud::expand::{bytes_to_gb, expand_tags, expand_updated_tags, gb_to_bytes};
use scwtf_cloud::locality::{new_regional_id, parse_regional_id};
use scwtf_cloud::wait::{DEFAULT_POLL_INTERVAL, wait_for, wait_for_deletion};
use scwtf_cloud::{
    Attribute, CloudError, HasStatus, Operation, Presence, Region, ResourceState, Result, Schema,
    ScwClient, StatusSet, Validator, WaitConfig,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15 * 60);
/// Reads wait for a stable status on a shorter budget
const READ_TIMEOUT: Duration = Duration::from_secs(2 * 60);

pub const STATUSES: StatusSet = StatusSet {
    pending: &[
        "provisioning",
        "configuring",
        "initializing",
        "backuping",
        "snapshotting",
        "restarting",
        "autohealing",
        "deleting",
    ],
    success: &["ready", "disk_full"],
    failure: &["error", "locked"],
};

/// Local SSD; size follows the node type and cannot be set
pub const LOCAL_VOLUME: &str = "lssd";
const BLOCK_VOLUME_SIZE_STEP_GB: u64 = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RdbInstanceAttrs {
    pub name: String,
    pub node_type: String,
    pub engine: String,
    pub is_ha_cluster: bool,
    pub disable_backup: bool,
    pub backup_schedule_frequency: Option<u32>,
    pub backup_schedule_retention: Option<u32>,
    pub user_name: String,
    pub password: String,
    pub tags: Vec<String>,
    pub volume_type: String,
    pub volume_size_in_gb: Option<u64>,
    pub settings: BTreeMap<String, String>,
    pub init_settings: BTreeMap<String, String>,
    pub endpoint_ip: String,
    pub endpoint_port: Option<u16>,
    pub region: String,
    pub project_id: String,
    pub organization_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Instance {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    engine: String,
    #[serde(default)]
    node_type: String,
    #[serde(default)]
    is_ha_cluster: bool,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    project_id: String,
    #[serde(default)]
    organization_id: String,
    #[serde(default)]
    volume: Option<Volume>,
    #[serde(default)]
    backup_schedule: Option<BackupSchedule>,
    #[serde(default)]
    settings: Vec<Setting>,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

impl HasStatus for Instance {
    fn status(&self) -> &str {
        &self.status
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Volume {
    #[serde(rename = "type")]
    kind: String,
    size: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct BackupSchedule {
    frequency: u32,
    retention: u32,
    disabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Setting {
    name: String,
    value: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Endpoint {
    #[serde(default)]
    ip: Option<String>,
    port: u16,
}

#[derive(Debug, Clone, Deserialize)]
struct InstanceList {
    #[serde(default)]
    instances: Vec<Instance>,
}

fn timeout_for(op: Operation) -> Duration {
    match op {
        Operation::Read => READ_TIMEOUT,
        _ => DEFAULT_TIMEOUT,
    }
}

fn instance_schedule(
    ctx: &CallContext,
    state: &ResourceState<RdbInstanceAttrs>,
    op: Operation,
) -> WaitConfig {
    schedule(ctx, state, op, timeout_for(op), DEFAULT_POLL_INTERVAL)
}

pub(crate) fn instances_path(region: Region) -> String {
    format!("/rdb/v1/regions/{region}/instances")
}

pub(crate) fn instance_path(region: Region, id: &str) -> String {
    format!("/rdb/v1/regions/{region}/instances/{id}")
}

/// Wait until the instance accepts changes
pub(crate) async fn wait_instance(
    client: &ScwClient,
    config: &WaitConfig,
    cancel: &CancellationToken,
    region: Region,
    id: &str,
) -> Result<Instance> {
    let path = instance_path(region, id);
    wait_for("rdb instance", config, cancel, &STATUSES, || {
        client.get::<Instance>(&path)
    })
    .await
}

fn settings_body(settings: &BTreeMap<String, String>) -> Vec<Setting> {
    settings
        .iter()
        .map(|(name, value)| Setting {
            name: name.clone(),
            value: value.clone(),
        })
        .collect()
}

/// Volume changes the API cannot apply
fn check_volume_change(state: &ResourceState<RdbInstanceAttrs>) -> Result<()> {
    if !state.has_change(|a| &a.volume_size_in_gb) {
        return Ok(());
    }
    let (old, new) = state.get_change(|a| &a.volume_size_in_gb);
    let Some(new) = *new else {
        return Ok(());
    };
    match old.copied().flatten() {
        Some(old) if new < old => {
            return Err(CloudError::validation(
                "volume_size_in_gb",
                format!("cannot be decreased from {old} to {new} GB"),
            ));
        }
        _ => {}
    }
    if state.attrs.volume_type != LOCAL_VOLUME && new % BLOCK_VOLUME_SIZE_STEP_GB != 0 {
        return Err(CloudError::validation(
            "volume_size_in_gb",
            format!("must be a multiple of {BLOCK_VOLUME_SIZE_STEP_GB}, got {new}"),
        ));
    }
    Ok(())
}

fn flatten(attrs: &mut RdbInstanceAttrs, region: Region, instance: Instance) {
    attrs.name = instance.name;
    attrs.node_type = instance.node_type;
    attrs.engine = instance.engine;
    attrs.is_ha_cluster = instance.is_ha_cluster;
    attrs.tags = instance.tags;
    attrs.region = region.to_string();
    attrs.project_id = instance.project_id;
    attrs.organization_id = instance.organization_id;
    if let Some(volume) = instance.volume {
        attrs.volume_type = volume.kind;
        attrs.volume_size_in_gb = Some(bytes_to_gb(volume.size));
    }
    if let Some(schedule) = instance.backup_schedule {
        attrs.disable_backup = schedule.disabled;
        attrs.backup_schedule_frequency = Some(schedule.frequency);
        attrs.backup_schedule_retention = Some(schedule.retention);
    }
    attrs.settings = instance
        .settings
        .into_iter()
        .map(|s| (s.name, s.value))
        .collect();
    match instance.endpoints.into_iter().next() {
        Some(endpoint) => {
            attrs.endpoint_ip = endpoint.ip.unwrap_or_default();
            attrs.endpoint_port = Some(endpoint.port);
        }
        None => {
            attrs.endpoint_ip.clear();
            attrs.endpoint_port = None;
        }
    }
}

#[derive(Debug, Default)]
pub struct RdbInstance;

impl RdbInstance {
    async fn upgrade(
        &self,
        ctx: &CallContext,
        config: &WaitConfig,
        region: Region,
        id: &str,
        body: Value,
    ) -> Result<()> {
        let client = ctx.client();
        info!(id, upgrade = %body, "Upgrading database instance");
        let _: Instance = client
            .post(&format!("{}/upgrade", instance_path(region, id)), &body)
            .await?;
        wait_instance(&client, config, ctx.cancel(), region, id).await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for RdbInstance {
    type Attrs = RdbInstanceAttrs;
    const KIND: &'static str = "scaleway_rdb_instance";

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("name", Attribute::optional_computed_string())
            .with_attribute("node_type", Attribute::required_string())
            .with_attribute("engine", Attribute::required_string().force_new())
            .with_attribute("is_ha_cluster", Attribute::optional_bool().default_value(false))
            .with_attribute("disable_backup", Attribute::optional_bool().default_value(false))
            .with_attribute(
                "backup_schedule_frequency",
                Attribute::optional_int().validate(Validator::IntRange { min: 1, max: 24 }),
            )
            .with_attribute(
                "backup_schedule_retention",
                Attribute::optional_int().validate(Validator::IntRange { min: 1, max: 365 }),
            )
            .with_attribute("user_name", Attribute::optional_string().force_new())
            .with_attribute("password", Attribute::optional_string().sensitive())
            .with_attribute("tags", Attribute::string_list(Presence::Optional))
            .with_attribute(
                "volume_type",
                Attribute::optional_string()
                    .default_value(LOCAL_VOLUME)
                    .validate(Validator::OneOf(&["lssd", "bssd", "sbs_5k", "sbs_15k"])),
            )
            .with_attribute(
                "volume_size_in_gb",
                Attribute::new(scwtf_cloud::AttributeType::Int, Presence::OptionalComputed),
            )
            .with_attribute("settings", Attribute::string_map(Presence::OptionalComputed))
            .with_attribute("init_settings", Attribute::string_map(Presence::Optional).force_new())
            .with_attribute("endpoint_ip", Attribute::computed_string())
            .with_attribute(
                "endpoint_port",
                Attribute::new(scwtf_cloud::AttributeType::Int, Presence::Computed),
            )
            .with_attribute("region", Attribute::region())
            .with_attribute("project_id", Attribute::project_id())
            .with_attribute("organization_id", Attribute::computed_string())
    }

    fn has_sweeper(&self) -> bool {
        true
    }

    async fn create(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<RdbInstanceAttrs>,
    ) -> Result<()> {
        let region = resolve_region(Some(state.attrs.region.as_str()), ctx.meta())?;
        let project = resolve_project(Some(state.attrs.project_id.as_str()), ctx.meta())?;
        check_volume_change(state)?;
        let client = ctx.client();
        let config = instance_schedule(ctx, state, Operation::Create);
        let attrs = &state.attrs;

        let mut body = json!({
            "project_id": project,
            "name": attrs.name,
            "engine": attrs.engine,
            "user_name": attrs.user_name,
            "password": attrs.password,
            "node_type": attrs.node_type,
            "is_ha_cluster": attrs.is_ha_cluster,
            "disable_backup": attrs.disable_backup,
            "tags": expand_tags(&attrs.tags),
            "volume_type": attrs.volume_type,
            "init_settings": settings_body(&attrs.init_settings),
        });
        if let (Some(size), false) = (attrs.volume_size_in_gb, attrs.volume_type == LOCAL_VOLUME) {
            body["volume_size"] = json!(gb_to_bytes(size));
        }
        if let Some(frequency) = attrs.backup_schedule_frequency {
            body["backup_schedule_frequency"] = json!(frequency);
        }
        if let Some(retention) = attrs.backup_schedule_retention {
            body["backup_schedule_retention"] = json!(retention);
        }

        let created: Instance = client.post(&instances_path(region), &body).await?;
        info!(region = %region, id = %created.id, "Database instance created");
        state.set_id(new_regional_id(region, &created.id));

        wait_instance(&client, &config, ctx.cancel(), region, &created.id).await?;

        if !state.attrs.settings.is_empty() {
            let _: Value = client
                .put(
                    &format!("{}/settings", instance_path(region, &created.id)),
                    &json!({ "settings": settings_body(&state.attrs.settings) }),
                )
                .await?;
            wait_instance(&client, &config, ctx.cancel(), region, &created.id).await?;
        }

        self.read(ctx, state).await
    }

    async fn read(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<RdbInstanceAttrs>,
    ) -> Result<()> {
        let (region, id) = parse_regional_id(state.id())?;
        let client = ctx.client();
        let config = instance_schedule(ctx, state, Operation::Read);
        let result = wait_instance(&client, &config, ctx.cancel(), region, &id).await;
        if let Some(instance) = read_or_remove(state, result)? {
            flatten(&mut state.attrs, region, instance);
        }
        Ok(())
    }

    async fn update(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<RdbInstanceAttrs>,
    ) -> Result<()> {
        let (region, id) = parse_regional_id(state.id())?;
        check_volume_change(state)?;
        if state.has_change(|a| &a.is_ha_cluster) && !state.attrs.is_ha_cluster {
            return Err(CloudError::validation(
                "is_ha_cluster",
                "high availability cannot be disabled on an existing instance",
            ));
        }

        let client = ctx.client();
        let config = instance_schedule(ctx, state, Operation::Update);
        wait_instance(&client, &config, ctx.cancel(), region, &id).await?;

        let mut patch = Map::new();
        if state.has_change(|a| &a.name) {
            patch.insert("name".into(), json!(state.attrs.name));
        }
        let (old_tags, new_tags) = state.get_change(|a| &a.tags);
        if let Some(tags) = expand_updated_tags(old_tags.map(Vec::as_slice), new_tags) {
            patch.insert("tags".into(), json!(tags));
        }
        if state.has_change(|a| &a.disable_backup) {
            patch.insert("is_backup_schedule_disabled".into(), json!(state.attrs.disable_backup));
        }
        if state.has_change(|a| &a.backup_schedule_frequency) {
            patch.insert(
                "backup_schedule_frequency".into(),
                json!(state.attrs.backup_schedule_frequency),
            );
        }
        if state.has_change(|a| &a.backup_schedule_retention) {
            patch.insert(
                "backup_schedule_retention".into(),
                json!(state.attrs.backup_schedule_retention),
            );
        }
        if !patch.is_empty() {
            let _: Instance = client
                .patch(&instance_path(region, &id), &Value::Object(patch))
                .await?;
            wait_instance(&client, &config, ctx.cancel(), region, &id).await?;
        }

        let mut upgrades = Vec::new();
        if state.has_change(|a| &a.node_type) {
            upgrades.push(json!({ "node_type": state.attrs.node_type }));
        }
        if state.has_change(|a| &a.is_ha_cluster) {
            upgrades.push(json!({ "enable_ha": true }));
        }
        if state.has_change(|a| &a.volume_type) {
            upgrades.push(json!({ "volume_type": state.attrs.volume_type }));
        }
        if let (true, Some(size)) = (
            state.has_change(|a| &a.volume_size_in_gb),
            state.attrs.volume_size_in_gb,
        ) {
            upgrades.push(json!({ "volume_size": gb_to_bytes(size) }));
        }
        for body in upgrades {
            self.upgrade(ctx, &config, region, &id, body).await?;
        }

        if state.has_change(|a| &a.password) && !state.attrs.password.is_empty() {
            let path = format!(
                "{}/users/{}",
                instance_path(region, &id),
                state.attrs.user_name
            );
            let _: Value = client
                .patch(&path, &json!({ "password": state.attrs.password }))
                .await?;
            wait_instance(&client, &config, ctx.cancel(), region, &id).await?;
        }

        if state.has_change(|a| &a.settings) && !state.attrs.settings.is_empty() {
            let _: Value = client
                .put(
                    &format!("{}/settings", instance_path(region, &id)),
                    &json!({ "settings": settings_body(&state.attrs.settings) }),
                )
                .await?;
            wait_instance(&client, &config, ctx.cancel(), region, &id).await?;
        }

        self.read(ctx, state).await
    }

    async fn delete(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<RdbInstanceAttrs>,
    ) -> Result<()> {
        let (region, id) = parse_regional_id(state.id())?;
        let client = ctx.client();
        let config = instance_schedule(ctx, state, Operation::Delete);

        let ready = wait_instance(&client, &config, ctx.cancel(), region, &id).await;
        if Swallow::NOT_FOUND.apply(Self::KIND, ready)?.is_none() {
            return Ok(());
        }
        delete_tolerant(
            Self::KIND,
            client.delete(&instance_path(region, &id)).await,
            Swallow::NONE,
        )?;

        let path = instance_path(region, &id);
        wait_for_deletion("rdb instance", &config, ctx.cancel(), &STATUSES, || {
            client.get::<Instance>(&path)
        })
        .await
    }

    /// Delete instances named like test fixtures in every region
    async fn sweep(&self, ctx: &CallContext) -> Result<usize> {
        let client = ctx.client();
        let mut removed = 0;
        for region in Region::ALL {
            let list: InstanceList = client.get(&instances_path(region)).await?;
            for instance in list.instances.into_iter().filter(|i| is_sweepable(&i.name)) {
                let result = client.delete(&instance_path(region, &instance.id)).await;
                match delete_tolerant(Self::KIND, result, Swallow::NONE) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(
                        region = %region,
                        id = %instance.id,
                        error = %e,
                        "Cannot sweep database instance"
                    ),
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(
        old: Option<u64>,
        new: Option<u64>,
        volume_type: &str,
    ) -> ResourceState<RdbInstanceAttrs> {
        let attrs = RdbInstanceAttrs {
            volume_type: volume_type.into(),
            volume_size_in_gb: new,
            ..Default::default()
        };
        let prior = RdbInstanceAttrs {
            volume_size_in_gb: old,
            ..attrs.clone()
        };
        ResourceState::new(attrs).with_id("fr-par/x").with_prior(prior)
    }

    #[test]
    fn test_volume_size_cannot_shrink() {
        let err = check_volume_change(&state(Some(20), Some(15), "bssd")).unwrap_err();
        assert_eq!(err.attribute(), Some("volume_size_in_gb"));
    }

    #[test]
    fn test_block_volume_size_step() {
        let err = check_volume_change(&state(Some(10), Some(12), "bssd")).unwrap_err();
        assert_eq!(err.attribute(), Some("volume_size_in_gb"));
        assert!(check_volume_change(&state(Some(10), Some(15), "bssd")).is_ok());
        assert!(check_volume_change(&state(None, Some(12), "bssd")).is_err());
        assert!(check_volume_change(&state(Some(10), Some(12), "lssd")).is_ok());
    }

    #[test]
    fn test_flatten_instance() {
        let instance: Instance = serde_json::from_value(json!({
            "id": "11111111-1111-1111-1111-111111111111",
            "name": "tf-rdb",
            "status": "ready",
            "engine": "PostgreSQL-15",
            "node_type": "db-dev-s",
            "is_ha_cluster": false,
            "tags": ["a"],
            "project_id": "p",
            "organization_id": "o",
            "volume": { "type": "bssd", "size": 10_000_000_000u64 },
            "backup_schedule": { "frequency": 24, "retention": 7, "disabled": false },
            "settings": [{ "name": "work_mem", "value": "4" }],
            "endpoints": [{ "ip": "51.15.1.2", "port": 5432 }]
        }))
        .unwrap();
        let mut attrs = RdbInstanceAttrs::default();
        flatten(&mut attrs, Region::FrPar, instance);
        assert_eq!(attrs.volume_type, "bssd");
        assert_eq!(attrs.volume_size_in_gb, Some(10));
        assert_eq!(attrs.endpoint_port, Some(5432));
        assert_eq!(attrs.settings.get("work_mem").map(String::as_str), Some("4"));
        assert_eq!(attrs.region, "fr-par");
    }

    #[test]
    fn test_read_waits_less_than_mutations() {
        assert_eq!(timeout_for(Operation::Read), READ_TIMEOUT);
        assert!(timeout_for(Operation::Read) < timeout_for(Operation::Update));
        assert_eq!(timeout_for(Operation::Create), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_statuses() {
        use scwtf_cloud::wait::StatusClass;
        assert_eq!(STATUSES.classify("ready"), StatusClass::Success);
        assert_eq!(STATUSES.classify("backuping"), StatusClass::Pending);
        assert_eq!(STATUSES.classify("locked"), StatusClass::Failure);
    }
}
