/// MCP server configuration JSON

use crate::error::Result;
use crate::ir::{McpConfigDocument, McpTransport};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

fn string_map(map: &BTreeMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// `{"mcpServers": {...}}` with servers in declaration order
pub fn render_mcp_config(doc: &McpConfigDocument) -> Result<String> {
    let mut servers = Map::new();
    for server in &doc.servers {
        let entry = match &server.transport {
            McpTransport::Stdio { command, args, env } => {
                let mut entry = Map::new();
                entry.insert("command".into(), json!(command));
                if !args.is_empty() {
                    entry.insert("args".into(), json!(args));
                }
                if !env.is_empty() {
                    entry.insert("env".into(), string_map(env));
                }
                entry
            }
            McpTransport::Http { url, headers } | McpTransport::Sse { url, headers } => {
                let kind = match server.transport {
                    McpTransport::Sse { .. } => "sse",
                    _ => "http",
                };
                let mut entry = Map::new();
                entry.insert("type".into(), json!(kind));
                entry.insert("url".into(), json!(url));
                if !headers.is_empty() {
                    entry.insert("headers".into(), string_map(headers));
                }
                entry
            }
        };
        servers.insert(server.name.clone(), Value::Object(entry));
    }
    let root = json!({ "mcpServers": Value::Object(servers) });
    let mut out = serde_json::to_string_pretty(&root)?;
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::McpServer;

    #[test]
    fn test_stdio_and_http_servers() {
        let doc = McpConfigDocument {
            name: "tools".into(),
            description: "Project tools".into(),
            servers: vec![
                McpServer {
                    name: "files".into(),
                    transport: McpTransport::Stdio {
                        command: "npx".into(),
                        args: vec!["-y".into(), "fs-server".into()],
                        env: BTreeMap::new(),
                    },
                },
                McpServer {
                    name: "search".into(),
                    transport: McpTransport::Http {
                        url: "https://example.test/mcp".into(),
                        headers: BTreeMap::from([("Authorization".into(), "Bearer x".into())]),
                    },
                },
            ],
        };
        let out = render_mcp_config(&doc).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["mcpServers"]["files"]["command"], "npx");
        assert_eq!(value["mcpServers"]["files"]["args"][1], "fs-server");
        assert!(value["mcpServers"]["files"].get("env").is_none());
        assert_eq!(value["mcpServers"]["search"]["type"], "http");
        assert_eq!(value["mcpServers"]["search"]["headers"]["Authorization"], "Bearer x");
        assert!(out.find("\"files\"") < out.find("\"search\""));
        assert!(out.ends_with("}\n"));
    }
}
