//! Project file format and operations.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use cardplay_core::{
    AdapterEdge, CardInstance, Containers, Graph, NodeId, ParamValue, Params, PortSet, PortTypeDef,
    ProtocolDef, RegistryError, RegistrySet, Stack,
};

use crate::error::ConfigError;
use crate::settings::EngineSettings;

/// Newest project schema version this build reads and writes.
pub const CURRENT_VERSION: u32 = 1;

fn default_version() -> u32 {
    CURRENT_VERSION
}

/// A card instance in a project file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardConfig {
    /// Instance id; becomes the node id.
    pub id: String,
    /// Card type.
    #[serde(rename = "type")]
    pub card_type: String,
    /// User parameters; missing ones fall back to the card's defaults.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: Params,
    /// Explicit ports for host-defined nodes without a registered card.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<PortSet>,
}

impl CardConfig {
    /// Create a card with default parameters.
    pub fn new(id: impl Into<String>, card_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            card_type: card_type.into(),
            params: Params::new(),
            ports: None,
        }
    }

    /// Set a parameter.
    pub fn with_param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    /// The instance handed to stack compilation.
    pub fn instance(&self) -> CardInstance {
        CardInstance {
            id: self.id.clone(),
            card_type: self.card_type.clone(),
            params: self.params.clone(),
        }
    }
}

/// An edge in a project file, endpoints written as `node:port`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// Producer endpoint.
    pub from: String,
    /// Consumer endpoint.
    pub to: String,
}

impl EdgeConfig {
    /// Create an edge.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for EdgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Splits `node:port` at the last colon. Both halves must be non-empty.
pub fn parse_endpoint(endpoint: &str) -> Option<(&str, &str)> {
    let (node, port) = endpoint.rsplit_once(':')?;
    (!node.is_empty() && !port.is_empty()).then_some((node, port))
}

/// Port types, protocols and adapters a project registers on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Protocols, registered first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<ProtocolDef>,
    /// Port types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub port_types: Vec<PortTypeDef>,
    /// Adapter edges; their cards must already be registered.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adapters: Vec<AdapterEdge>,
}

impl RegistrySnapshot {
    /// Captures the type tables of `registries`.
    pub fn capture(registries: &RegistrySet) -> Self {
        let types = registries.types();
        Self {
            protocols: types.protocols().cloned().collect(),
            port_types: types.port_types().cloned().collect(),
            adapters: types.adapters().cloned().collect(),
        }
    }

    /// Registers everything in dependency order. Entries identical to
    /// existing ones are accepted without change.
    pub fn apply(&self, registries: &mut RegistrySet) -> Result<(), RegistryError> {
        for protocol in &self.protocols {
            registries.register_protocol(protocol.clone())?;
        }
        for port_type in &self.port_types {
            registries.register_port_type(port_type.clone())?;
        }
        for adapter in &self.adapters {
            registries.register_adapter(adapter.clone())?;
        }
        Ok(())
    }
}

/// On-disk project: cards, stacks, edges, containers and engine settings.
///
/// Stored as TOML, or as JSON when the path ends in `.json`.
///
/// # TOML Format
///
/// ```toml
/// name = "Pulse"
/// version = 1
/// packs = ["arp"]
///
/// [engine.transport]
/// bpm = 120.0
///
/// [[cards]]
/// id = "gen"
/// type = "gen.pulse"
/// [cards.params]
/// per_beat = 2
///
/// [[cards]]
/// id = "out"
/// type = "out.events"
///
/// [[edges]]
/// from = "gen:out"
/// to = "out:in"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    /// Project name.
    pub name: String,

    /// Schema version.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Bundled packs to install before building the graph.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packs: Vec<String>,

    /// Engine settings.
    #[serde(default)]
    pub engine: EngineSettings,

    /// Named event containers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub containers: Containers,

    /// Card instances, both free-standing and stack members.
    #[serde(default)]
    pub cards: Vec<CardConfig>,

    /// Stacks over the cards.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stacks: Vec<Stack>,

    /// Explicit edges.
    #[serde(default)]
    pub edges: Vec<EdgeConfig>,

    /// Extra port types, protocols and adapters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistrySnapshot>,
}

/// File encoding, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Toml,
    Json,
}

impl Format {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Toml,
        }
    }
}

impl ProjectFile {
    /// Create an empty project.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: CURRENT_VERSION,
            description: None,
            packs: Vec::new(),
            engine: EngineSettings::default(),
            containers: Containers::new(),
            cards: Vec::new(),
            stacks: Vec::new(),
            edges: Vec::new(),
            registry: None,
        }
    }

    /// Create a project with a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Captures a graph. Stacks are stored flattened, as the cards and
    /// edges they compiled to.
    ///
    /// Fails with [`ConfigError::ProvisionalNodes`] while preview nodes
    /// remain; materialize or discard them first.
    pub fn from_graph(
        name: impl Into<String>,
        graph: &Graph,
        containers: &Containers,
        engine: EngineSettings,
    ) -> Result<Self, ConfigError> {
        let provisional: Vec<NodeId> = graph.nodes().filter(|n| n.provisional).map(|n| n.id.clone()).collect();
        if !provisional.is_empty() {
            return Err(ConfigError::ProvisionalNodes(provisional));
        }

        let mut project = Self::new(name);
        project.engine = engine;
        project.containers = containers.clone();
        project.cards = graph
            .nodes()
            .map(|node| CardConfig {
                id: node.id.to_string(),
                card_type: node.card_type.clone(),
                params: node.params.clone(),
                ports: node.ports.clone(),
            })
            .collect();
        project.edges = graph
            .edges()
            .map(|(_, edge)| {
                EdgeConfig::new(
                    format!("{}:{}", edge.from.node, edge.from.port),
                    format!("{}:{}", edge.to.node, edge.to.port),
                )
            })
            .collect();
        Ok(project)
    }

    /// Load a project, TOML or JSON by extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let project = match Format::of(path) {
            Format::Json => Self::from_json(&content)?,
            Format::Toml => Self::from_toml(&content)?,
        };
        tracing::debug!(path = %path.display(), name = %project.name, cards = project.cards.len(), "project loaded");
        Ok(project)
    }

    /// Parse a project from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let project: ProjectFile = toml::from_str(toml_str)?;
        project.check_version()?;
        Ok(project)
    }

    /// Parse a project from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let project: ProjectFile = serde_json::from_str(json)?;
        project.check_version()?;
        Ok(project)
    }

    /// Save the project, TOML or JSON by extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = match Format::of(path) {
            Format::Json => self.to_json()?,
            Format::Toml => self.to_toml()?,
        };
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        tracing::debug!(path = %path.display(), name = %self.name, "project saved");
        Ok(())
    }

    /// Convert the project to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Convert the project to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Look up a card by id.
    pub fn card(&self, id: &str) -> Option<&CardConfig> {
        self.cards.iter().find(|c| c.id == id)
    }

    /// Instances for stack compilation.
    pub fn instances(&self) -> Vec<CardInstance> {
        self.cards.iter().map(CardConfig::instance).collect()
    }

    fn check_version(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CURRENT_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version,
                supported: CURRENT_VERSION,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardplay_core::{Event, GraphNode, ValueKind};

    #[test]
    fn test_parse_endpoint() {
        assert_eq!(parse_endpoint("gen:out"), Some(("gen", "out")));
        assert_eq!(parse_endpoint("ns:gen:out"), Some(("ns:gen", "out")));
        assert_eq!(parse_endpoint("gen"), None);
        assert_eq!(parse_endpoint(":out"), None);
        assert_eq!(parse_endpoint("gen:"), None);
    }

    #[test]
    fn test_minimal_toml_defaults() {
        let project = ProjectFile::from_toml("name = \"empty\"").unwrap();
        assert_eq!(project, ProjectFile::new("empty"));
    }

    #[test]
    fn test_card_type_is_renamed() {
        let project = ProjectFile::from_toml(
            r#"
            name = "p"

            [[cards]]
            id = "gen"
            type = "gen.pulse"
            params = { per_beat = 2, gate = 0.25 }
            "#,
        )
        .unwrap();
        let card = project.card("gen").unwrap();
        assert_eq!(card.card_type, "gen.pulse");
        assert_eq!(card.params["per_beat"], ParamValue::Int(2));
        assert_eq!(card.params["gate"], ParamValue::Number(0.25));
    }

    #[test]
    fn test_future_version_rejected() {
        let err = ProjectFile::from_toml("name = \"p\"\nversion = 7").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion { found: 7, supported: 1 }));
        let err = ProjectFile::from_json(r#"{"name": "p", "version": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion { found: 0, .. }));
    }

    #[test]
    fn test_toml_and_json_agree() {
        let mut project = ProjectFile::new("both").with_description("two encodings");
        project.cards.push(CardConfig::new("gen", "gen.pulse").with_param("pitch", 64i64));
        project.cards.push(CardConfig::new("out", "out.events"));
        project.edges.push(EdgeConfig::new("gen:out", "out:in"));
        project
            .containers
            .insert("main".to_string(), vec![Event::note("a", 0, 24, 60, 100)]);

        let from_toml = ProjectFile::from_toml(&project.to_toml().unwrap()).unwrap();
        let from_json = ProjectFile::from_json(&project.to_json().unwrap()).unwrap();
        assert_eq!(from_toml, project);
        assert_eq!(from_json, project);
    }

    #[test]
    fn test_from_graph_refuses_provisional_nodes() {
        let mut graph = Graph::new();
        graph.add_node(GraphNode::new("gen", "gen.pulse")).unwrap();
        graph.add_node(GraphNode::new("merge~x", "merge.events").provisional()).unwrap();

        let err = ProjectFile::from_graph("g", &graph, &Containers::new(), EngineSettings::default()).unwrap_err();
        match err {
            ConfigError::ProvisionalNodes(ids) => assert_eq!(ids, vec![NodeId::new("merge~x")]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_graph_keeps_edges_and_ports() {
        let mut graph = Graph::new();
        let ports = PortSet {
            inputs: Vec::new(),
            outputs: vec![cardplay_core::PortSpec::new("out", "notes")],
        };
        graph.add_node(GraphNode::new("ext", "host.input").with_ports(ports.clone())).unwrap();
        graph.add_node(GraphNode::new("out", "out.events")).unwrap();
        graph.connect("ext", "out", "out", "in");

        let project = ProjectFile::from_graph("g", &graph, &Containers::new(), EngineSettings::default()).unwrap();
        assert_eq!(project.cards.len(), 2);
        assert_eq!(project.card("ext").unwrap().ports, Some(ports));
        assert_eq!(project.edges, vec![EdgeConfig::new("ext:out", "out:in")]);
    }

    #[test]
    fn test_snapshot_apply_is_idempotent() {
        let mut registries = RegistrySet::new();
        let snapshot = RegistrySnapshot {
            protocols: vec![ProtocolDef::new("Stream")],
            port_types: vec![PortTypeDef::new("midi", ValueKind::EventStream).implements("Stream")],
            adapters: Vec::new(),
        };
        snapshot.apply(&mut registries).unwrap();
        let generation = registries.generation();
        snapshot.apply(&mut registries).unwrap();
        assert_eq!(registries.generation(), generation);
        assert_eq!(RegistrySnapshot::capture(&registries), snapshot);
    }
}
