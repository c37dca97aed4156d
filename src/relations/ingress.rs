//! `ingress` relation: ask the ingress integrator to route to the Engine.

use super::RelationData;
use crate::engine_config::APPLICATION_CONNECTOR_PORT_HTTP;

pub const SERVICE_HOSTNAME_KEY: &str = "service-hostname";
pub const SERVICE_NAME_KEY: &str = "service-name";
pub const SERVICE_PORT_KEY: &str = "service-port";

pub fn publish_ingress_requirements(bag: &mut RelationData, app_name: &str) {
    bag.insert(SERVICE_HOSTNAME_KEY.to_string(), app_name.to_string());
    bag.insert(SERVICE_NAME_KEY.to_string(), app_name.to_string());
    bag.insert(
        SERVICE_PORT_KEY.to_string(),
        APPLICATION_CONNECTOR_PORT_HTTP.to_string(),
    );
}
