use serde::Deserialize;

/// One node in the etcd keyspace, either a key or a directory.
#[derive(Debug, Clone, Deserialize)]
pub struct Node {
    pub key: Option<String>,
    pub value: Option<String>,
    #[serde(default)]
    pub dir: bool,
    pub ttl: Option<i64>,
    #[serde(rename = "modifiedIndex")]
    pub modified_index: Option<u64>,
    #[serde(rename = "createdIndex")]
    pub created_index: Option<u64>,
    #[serde(default)]
    pub nodes: Vec<Node>,
}

impl Node {
    /// The final path segment of this node's key.
    pub fn name(&self) -> &str {
        self.key
            .as_deref()
            .map(|k| k.rsplit('/').next().unwrap_or(k))
            .unwrap_or("")
    }
}

/// Successful response envelope from the v2 keys API.
#[derive(Debug, Clone, Deserialize)]
pub struct KeysResponse {
    pub action: String,
    pub node: Option<Node>,
}

/// Error envelope from the v2 keys API.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiError {
    #[serde(rename = "errorCode")]
    pub error_code: u64,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_directory_listing() {
        let body = r#"{
            "action": "get",
            "node": {
                "key": "/my-service/production",
                "dir": true,
                "modifiedIndex": 12,
                "createdIndex": 12,
                "nodes": [
                    {"key": "/my-service/production/node1", "value": "2", "ttl": 118, "modifiedIndex": 14, "createdIndex": 14},
                    {"key": "/my-service/production/node2", "value": "1", "ttl": 97, "modifiedIndex": 13, "createdIndex": 13}
                ]
            }
        }"#;
        let resp: KeysResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.action, "get");
        let node = resp.node.unwrap();
        assert!(node.dir);
        assert_eq!(node.nodes.len(), 2);
        assert_eq!(node.nodes[0].name(), "node1");
        assert_eq!(node.nodes[0].value.as_deref(), Some("2"));
    }

    #[test]
    fn parses_error_envelope() {
        let body = r#"{"errorCode":100,"message":"Key not found","cause":"/x","index":9}"#;
        let err: ApiError = serde_json::from_str(body).unwrap();
        assert_eq!(err.error_code, 100);
        assert_eq!(err.message, "Key not found");
    }

    #[test]
    fn name_of_bare_key() {
        let node = Node {
            key: Some("node3".into()),
            value: None,
            dir: false,
            ttl: None,
            modified_index: None,
            created_index: None,
            nodes: vec![],
        };
        assert_eq!(node.name(), "node3");
    }
}
