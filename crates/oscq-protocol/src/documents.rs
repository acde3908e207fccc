//! OSCQuery JSON documents.
//!
//! [`HostInfo`] answers `GET /?HOST_INFO`; [`OscNode`] describes the address
//! space served at `GET /` and is also what a peer's parameter tree parses into.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolResult;

/// Node has no value; it only holds children.
pub const ACCESS_NONE: u8 = 0;
/// Value can be read.
pub const ACCESS_READ: u8 = 1;
/// Value can be written.
pub const ACCESS_WRITE: u8 = 2;
/// Value can be read and written.
pub const ACCESS_READ_WRITE: u8 = 3;

/// Extensions this responder advertises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct Extensions {
    pub access: bool,
    pub clipmode: bool,
    pub range: bool,
    #[serde(rename = "TYPE")]
    pub type_tag: bool,
    pub value: bool,
}

impl Default for Extensions {
    fn default() -> Self {
        Self {
            access: true,
            clipmode: true,
            range: true,
            type_tag: true,
            value: true,
        }
    }
}

/// Host description returned for `?HOST_INFO`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct HostInfo {
    pub name: String,
    pub osc_ip: IpAddr,
    pub osc_port: u16,
    pub osc_transport: String,
    pub extensions: Extensions,
}

impl HostInfo {
    /// Host info for a UDP receiver at `address:port`.
    pub fn new(service_name: impl Into<String>, address: IpAddr, port: u16) -> Self {
        Self {
            name: service_name.into(),
            osc_ip: address,
            osc_port: port,
            osc_transport: "UDP".to_string(),
            extensions: Extensions::default(),
        }
    }

    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// One node of an OSCQuery address space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct OscNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub full_path: String,
    #[serde(default)]
    pub access: u8,
    #[serde(rename = "TYPE", default, skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<BTreeMap<String, OscNode>>,
}

impl OscNode {
    /// A container node.
    pub fn container(full_path: impl Into<String>) -> Self {
        Self {
            full_path: full_path.into(),
            access: ACCESS_NONE,
            contents: Some(BTreeMap::new()),
            ..Self::default()
        }
    }

    /// A leaf node with the given access level and OSC type tag.
    pub fn leaf(full_path: impl Into<String>, access: u8, type_tag: impl Into<String>) -> Self {
        Self {
            full_path: full_path.into(),
            access,
            type_tag: Some(type_tag.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a child under `key`, turning this node into a container.
    #[must_use]
    pub fn with_child(mut self, key: impl Into<String>, child: OscNode) -> Self {
        self.contents
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), child);
        self
    }

    /// Child lookup by key.
    pub fn child(&self, key: &str) -> Option<&OscNode> {
        self.contents.as_ref()?.get(key)
    }

    /// Follows a chain of keys from this node.
    pub fn descend<'a>(&'a self, keys: &[&str]) -> Option<&'a OscNode> {
        keys.iter().try_fold(self, |node, key| node.child(key))
    }

    /// Iterates over children in key order.
    pub fn children(&self) -> impl Iterator<Item = (&String, &OscNode)> {
        self.contents.iter().flat_map(|c| c.iter())
    }

    /// The first element of `VALUE`.
    pub fn first_value(&self) -> Option<&serde_json::Value> {
        self.value.as_ref()?.first()
    }

    pub fn from_json(body: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(body)?)
    }

    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// The address space this process advertises: it accepts `/avatar/change`.
pub fn address_space() -> OscNode {
    let change = OscNode::leaf("/avatar/change", ACCESS_WRITE, "s").with_description("");
    let avatar = OscNode::container("/avatar").with_child("change", change);

    OscNode::container("/")
        .with_description("root node")
        .with_child("avatar", avatar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::net::Ipv4Addr;

    #[test]
    fn host_info_uses_wire_keys() {
        let info = HostInfo::new("oscq-client", IpAddr::V4(Ipv4Addr::LOCALHOST), 9001);
        let value: Value = serde_json::from_str(&info.to_json().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "NAME": "oscq-client",
                "OSC_IP": "127.0.0.1",
                "OSC_PORT": 9001,
                "OSC_TRANSPORT": "UDP",
                "EXTENSIONS": {
                    "ACCESS": true,
                    "CLIPMODE": true,
                    "RANGE": true,
                    "TYPE": true,
                    "VALUE": true
                }
            })
        );
    }

    #[test]
    fn address_space_advertises_avatar_change() {
        let root = address_space();
        let value: Value = serde_json::from_str(&root.to_json().unwrap()).unwrap();

        assert_eq!(value["FULL_PATH"], "/");
        assert_eq!(value["DESCRIPTION"], "root node");
        assert_eq!(value["ACCESS"], 0);
        assert!(value["CONTENTS"]["avatar"].get("DESCRIPTION").is_none());
        let change = &value["CONTENTS"]["avatar"]["CONTENTS"]["change"];
        assert_eq!(change["FULL_PATH"], "/avatar/change");
        assert_eq!(change["ACCESS"], 2);
        assert_eq!(change["TYPE"], "s");
        assert!(change.get("CONTENTS").is_none());
        assert!(change.get("VALUE").is_none());
    }

    #[test]
    fn parses_peer_parameter_tree() {
        let body = r#"{
            "FULL_PATH": "/",
            "ACCESS": 0,
            "CONTENTS": {
                "avatar": {
                    "FULL_PATH": "/avatar",
                    "ACCESS": 0,
                    "CONTENTS": {
                        "parameters": {
                            "FULL_PATH": "/avatar/parameters",
                            "ACCESS": 0,
                            "CONTENTS": {
                                "Grounded": {
                                    "FULL_PATH": "/avatar/parameters/Grounded",
                                    "ACCESS": 3,
                                    "TYPE": "T",
                                    "VALUE": [true]
                                }
                            }
                        }
                    }
                }
            }
        }"#;

        let root = OscNode::from_json(body).unwrap();
        let grounded = root
            .descend(&["avatar", "parameters", "Grounded"])
            .unwrap();
        assert_eq!(grounded.access, ACCESS_READ_WRITE);
        assert_eq!(grounded.type_tag.as_deref(), Some("T"));
        assert_eq!(grounded.first_value(), Some(&Value::Bool(true)));
        assert!(root.descend(&["avatar", "missing"]).is_none());
    }

    #[test]
    fn children_of_leaf_is_empty() {
        let leaf = OscNode::leaf("/x", ACCESS_READ, "i");
        assert_eq!(leaf.children().count(), 0);
    }

    #[test]
    fn host_info_document() {
        let info = HostInfo::new("oscq-test", IpAddr::V4(Ipv4Addr::LOCALHOST), 9001);
        insta::assert_json_snapshot!("host_info", info);
    }

    #[test]
    fn address_space_document() {
        insta::assert_json_snapshot!("address_space", address_space());
    }
}
