//! Test fixtures for discovery integration tests.

use serde_json::{json, Value};
use sidereal_discovery::{ServiceDescriptor, ServiceState};
use sidereal_node::{NodeConfig, NodeInfo};
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use uuid::Uuid;

pub const ENVIRONMENT: &str = "testingenvironment";
pub const SERVICE_TYPE: &str = "testService";
pub const POOL: &str = "testPool";

/// Ids of the two descriptors in [`service_listing`].
pub static ID_1: LazyLock<Uuid> = LazyLock::new(Uuid::new_v4);
pub static ID_2: LazyLock<Uuid> = LazyLock::new(Uuid::new_v4);
pub static NODE_ID_1: LazyLock<Uuid> = LazyLock::new(Uuid::new_v4);
pub static NODE_ID_2: LazyLock<Uuid> = LazyLock::new(Uuid::new_v4);

pub fn node() -> Arc<NodeInfo> {
    Arc::new(NodeInfo::for_environment(ENVIRONMENT).unwrap())
}

pub fn node_in_pool(environment: &str, pool: &str) -> Arc<NodeInfo> {
    Arc::new(NodeInfo::new(NodeConfig::new(environment).with_pool(pool)).unwrap())
}

fn properties(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

/// The descriptors [`service_listing`] decodes to: one running, one stopped.
pub fn expected_descriptors() -> Vec<ServiceDescriptor> {
    vec![
        ServiceDescriptor {
            id: *ID_1,
            node_id: NODE_ID_1.to_string(),
            service_type: SERVICE_TYPE.to_owned(),
            pool: POOL.to_owned(),
            location: Some("testLocation".to_owned()),
            state: ServiceState::Running,
            properties: properties(&[("property1", "value1"), ("property2", "value2")]),
        },
        ServiceDescriptor {
            id: *ID_2,
            node_id: NODE_ID_2.to_string(),
            service_type: SERVICE_TYPE.to_owned(),
            pool: POOL.to_owned(),
            location: None,
            state: ServiceState::Stopped,
            properties: properties(&[("property3", "value3"), ("property4", "value4")]),
        },
    ]
}

/// Lookup response body for [`expected_descriptors`] in `environment`.
pub fn service_listing(environment: &str) -> Value {
    json!({
        "environment": environment,
        "services": [
            {
                "id": ID_1.to_string(),
                "nodeId": NODE_ID_1.to_string(),
                "type": SERVICE_TYPE,
                "pool": POOL,
                "location": "testLocation",
                "state": "RUNNING",
                "properties": { "property1": "value1", "property2": "value2" }
            },
            {
                "id": ID_2.to_string(),
                "nodeId": NODE_ID_2.to_string(),
                "type": SERVICE_TYPE,
                "pool": POOL,
                "state": "STOPPED",
                "properties": { "property3": "value3", "property4": "value4" }
            }
        ]
    })
}

/// Descriptor for a running instance with the given properties.
pub fn running_descriptor(pairs: &[(&str, &str)]) -> ServiceDescriptor {
    ServiceDescriptor {
        id: Uuid::new_v4(),
        node_id: Uuid::new_v4().to_string(),
        service_type: SERVICE_TYPE.to_owned(),
        pool: POOL.to_owned(),
        location: None,
        state: ServiceState::Running,
        properties: properties(pairs),
    }
}
