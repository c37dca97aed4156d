//! `legend-engine` relation: Legend Studio consumes the Engine URL.
//!
//! This unit only provides data here; nothing is read back from Studio.

use super::RelationData;

pub const ENGINE_URL_KEY: &str = "engine-url";

pub fn publish_engine_url(bag: &mut RelationData, engine_url: &str) {
    bag.insert(ENGINE_URL_KEY.to_string(), engine_url.to_string());
}
