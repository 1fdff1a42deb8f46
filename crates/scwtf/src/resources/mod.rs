//! Resource handlers shipped with the provider

pub mod domain_zone;
pub mod instance_ip;
pub mod object;
pub mod object_bucket;
pub mod object_bucket_lock;
pub mod object_bucket_policy;
pub mod rdb_database;
pub mod rdb_instance;

pub use domain_zone::DomainZone;
pub use instance_ip::InstanceIp;
pub use object::Object;
pub use object_bucket::ObjectBucket;
pub use object_bucket_lock::ObjectBucketLockConfiguration;
pub use object_bucket_policy::ObjectBucketPolicy;
pub use rdb_database::RdbDatabase;
pub use rdb_instance::RdbInstance;

use crate::context::CallContext;
use scwtf_cloud::{Operation, ResourceState, WaitConfig};
use std::time::Duration;

/// Prefix of names created by acceptance tests; sweepers only touch these
pub const TEST_NAME_PREFIX: &str = "tf";

/// Waiter schedule for `op`, honouring a user timeout and the provider poll override
pub(crate) fn schedule<A>(
    ctx: &CallContext,
    state: &ResourceState<A>,
    op: Operation,
    default_timeout: Duration,
    poll_interval: Duration,
) -> WaitConfig {
    ctx.wait_config(WaitConfig::new(
        state.timeouts.get(op, default_timeout),
        poll_interval,
    ))
}

pub(crate) fn is_sweepable(name: &str) -> bool {
    name.starts_with(TEST_NAME_PREFIX)
}
