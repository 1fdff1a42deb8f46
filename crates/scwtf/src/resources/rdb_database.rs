//! `scaleway_rdb_database`: logical database inside an instance
//!
//! ID shape `{region}/{instance-id}/{name}`. The instance serializes changes,
//! so every call waits for it first and retries while it is busy.

use super::rdb_instance::{instance_path, wait_instance};
use super::schedule;
use crate::context::CallContext;
use crate::engine::{Swallow, delete_tolerant, read_or_remove, resolve_region};
use crate::resource::Resource;
use async_trait::async_trait;
use scwtf_cloud::locality::{
    diff_suppress_locality, expand_id, new_nested_id, new_regional_id, parse_nested_id,
};
use scwtf_cloud::wait::{DEFAULT_POLL_INTERVAL, retry};
use scwtf_cloud::{
    ApiError, Attribute, CloudError, Operation, Region, ResourceState, Result, Schema, ScwClient,
    Validator, is_retryable,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::info;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RdbDatabaseAttrs {
    pub instance_id: String,
    pub name: String,
    pub owner: String,
    pub managed: bool,
    pub size: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Database {
    name: String,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    managed: bool,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseList {
    #[serde(default)]
    databases: Vec<Database>,
}

fn databases_path(region: Region, instance_id: &str) -> String {
    format!("{}/databases", instance_path(region, instance_id))
}

async fn find_database(
    client: &ScwClient,
    region: Region,
    instance_id: &str,
    name: &str,
) -> Result<Database> {
    let list: DatabaseList = client
        .get_with_query(&databases_path(region, instance_id), &[("name", name.to_string())])
        .await?;
    list.databases
        .into_iter()
        .find(|db| db.name == name)
        .ok_or_else(|| {
            CloudError::Api(
                ApiError::new(404, format!("database {name} not found"))
                    .with_type("not_found")
                    .with_resource("rdb_database"),
            )
        })
}

#[derive(Debug, Default)]
pub struct RdbDatabase;

#[async_trait]
impl Resource for RdbDatabase {
    type Attrs = RdbDatabaseAttrs;
    const KIND: &'static str = "scaleway_rdb_database";

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "instance_id",
                Attribute::required_string()
                    .force_new()
                    .validate(Validator::UuidOrLocalized)
                    .suppress_diff(diff_suppress_locality),
            )
            .with_attribute("name", Attribute::required_string().force_new())
            .with_attribute("owner", Attribute::computed_string())
            .with_attribute(
                "managed",
                Attribute::new(scwtf_cloud::AttributeType::Bool, scwtf_cloud::Presence::Computed),
            )
            .with_attribute("size", Attribute::computed_string())
            .with_attribute("region", Attribute::region())
    }

    async fn create(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<RdbDatabaseAttrs>,
    ) -> Result<()> {
        let default_region = resolve_region(Some(state.attrs.region.as_str()), ctx.meta())?;
        let (locality, instance_id) = expand_id(&state.attrs.instance_id, default_region.into())?;
        let region = locality.region();
        let client = ctx.client();
        let config =
            schedule(ctx, state, Operation::Create, DEFAULT_TIMEOUT, DEFAULT_POLL_INTERVAL);

        wait_instance(&client, &config, ctx.cancel(), region, &instance_id).await?;
        let path = databases_path(region, &instance_id);
        let body = json!({ "name": state.attrs.name });
        let _: Value = retry("create database", &config, ctx.cancel(), is_retryable, || {
            client.post::<_, Value>(&path, &body)
        })
        .await?;
        info!(
            region = %region,
            instance = %instance_id,
            name = %state.attrs.name,
            "Database created"
        );

        state.set_id(new_nested_id(region, &instance_id, &state.attrs.name));
        wait_instance(&client, &config, ctx.cancel(), region, &instance_id).await?;
        self.read(ctx, state).await
    }

    async fn read(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<RdbDatabaseAttrs>,
    ) -> Result<()> {
        let (region, instance_id, name) = parse_nested_id(state.id())?;
        let client = ctx.client();
        let result = find_database(&client, region, &instance_id, &name).await;
        let Some(db) = read_or_remove(state, result)? else {
            return Ok(());
        };

        let attrs = &mut state.attrs;
        attrs.instance_id = new_regional_id(region, &instance_id);
        attrs.name = db.name;
        attrs.owner = db.owner;
        attrs.managed = db.managed;
        attrs.size = db.size.to_string();
        attrs.region = region.to_string();
        Ok(())
    }

    async fn delete(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<RdbDatabaseAttrs>,
    ) -> Result<()> {
        let (region, instance_id, name) = parse_nested_id(state.id())?;
        let client = ctx.client();
        let config =
            schedule(ctx, state, Operation::Delete, DEFAULT_TIMEOUT, DEFAULT_POLL_INTERVAL);

        // databases go away with their instance
        let ready = wait_instance(&client, &config, ctx.cancel(), region, &instance_id).await;
        if Swallow::NOT_FOUND.apply(Self::KIND, ready)?.is_none() {
            return Ok(());
        }

        let path = format!("{}/{name}", databases_path(region, &instance_id));
        let result = retry("delete database", &config, ctx.cancel(), is_retryable, || {
            client.delete(&path)
        })
        .await;
        delete_tolerant(Self::KIND, result, Swallow::NONE)?;

        let settled = wait_instance(&client, &config, ctx.cancel(), region, &instance_id).await;
        Swallow::NOT_FOUND.apply(Self::KIND, settled).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_instance_id_accepts_both_forms() {
        let schema = RdbDatabase.schema();
        let bare = json!({ "instance_id": "11111111-1111-1111-1111-111111111111", "name": "db" });
        let localized = json!({
            "instance_id": "fr-par/11111111-1111-1111-1111-111111111111",
            "name": "db",
        });
        assert!(!schema.validate(&bare).has_errors());
        assert!(!schema.validate(&localized).has_errors());

        let attr = schema.attribute("instance_id").unwrap();
        assert!(attr.suppresses(
            "fr-par/11111111-1111-1111-1111-111111111111",
            "11111111-1111-1111-1111-111111111111"
        ));
    }

    #[test]
    fn test_nested_id() {
        let id = new_nested_id(Region::NlAms, "11111111-1111-1111-1111-111111111111", "db");
        assert_eq!(id, "nl-ams/11111111-1111-1111-1111-111111111111/db");
        let (region, instance, name) = parse_nested_id(&id).unwrap();
        assert_eq!(region, Region::NlAms);
        assert_eq!(instance, "11111111-1111-1111-1111-111111111111");
        assert_eq!(name, "db");
    }
}
