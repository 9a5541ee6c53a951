//! Turning a [`ProjectFile`] into live registries and a graph.

use std::collections::{BTreeMap, BTreeSet};

use cardplay_core::{
    Compiler, Containers, Executor, Graph, GraphNode, Issue, IssueKind, RegistrySet, StackInterface,
    StackOptions, TransportState, compile_stack, lint,
};

use crate::error::ConfigError;
use crate::project::{ProjectFile, parse_endpoint};
use crate::settings::EngineSettings;
use crate::validation::ValidationError;

/// A loaded project, ready to compile and evaluate.
#[derive(Debug, Clone)]
pub struct Project {
    /// Project name.
    pub name: String,
    /// Base registries plus the project's packs and types.
    pub registries: RegistrySet,
    /// The flattened graph.
    pub graph: Graph,
    /// Named event containers.
    pub containers: Containers,
    /// Engine settings.
    pub settings: EngineSettings,
    /// Interfaces of the compiled stacks, by stack id.
    pub stacks: BTreeMap<String, StackInterface>,
    /// Problems found while loading that the graph cannot show.
    pub issues: Vec<Issue>,
}

impl ProjectFile {
    /// Builds a [`Project`] on top of `base`.
    ///
    /// Packs are installed first, then the registry snapshot. Free-standing
    /// cards become nodes, stacks are compiled over their member cards, and
    /// edges are added last. Unknown card types, bad parameters and dangling
    /// edges are loaded as written and left for [`Project::lint`]; only a
    /// malformed endpoint, an unknown pack or a registry conflict fails.
    pub fn hydrate(&self, base: RegistrySet) -> Result<Project, ConfigError> {
        let mut registries = base;
        for id in &self.packs {
            let pack = cardplay_registry::bundled_pack(id).ok_or_else(|| ConfigError::UnknownPack(id.clone()))?;
            registries.install_pack(pack)?;
        }
        if let Some(snapshot) = &self.registry {
            snapshot.apply(&mut registries)?;
        }

        let mut graph = Graph::new();
        let mut issues = Vec::new();
        let members: BTreeSet<&str> = self
            .stacks
            .iter()
            .flat_map(|s| s.cards.iter().map(String::as_str))
            .collect();

        for card in self.cards.iter().filter(|c| !members.contains(c.id.as_str())) {
            let mut node = GraphNode::new(card.id.as_str(), &card.card_type);
            node.params = card.params.clone();
            node.ports = card.ports.clone();
            if graph.add_node(node).is_err() {
                issues.push(
                    Issue::new(IssueKind::DuplicateId, format!("Card `{}` is defined more than once", card.id))
                        .node(card.id.as_str()),
                );
            }
        }

        let instances = self.instances();
        let mut stacks = BTreeMap::new();
        for stack in &self.stacks {
            let mut interface = compile_stack(&mut graph, stack, &instances, &registries, StackOptions::default());
            issues.extend(
                interface
                    .issues
                    .drain(..)
                    .filter(|i| i.kind != IssueKind::UnknownCardType),
            );
            stacks.insert(stack.id.clone(), interface);
        }

        for edge in &self.edges {
            let (from_node, from_port) = parse_endpoint(&edge.from)
                .ok_or_else(|| ValidationError::InvalidEndpoint(edge.from.clone()))?;
            let (to_node, to_port) =
                parse_endpoint(&edge.to).ok_or_else(|| ValidationError::InvalidEndpoint(edge.to.clone()))?;
            graph.connect(from_node, from_port, to_node, to_port);
        }

        tracing::debug!(
            project = %self.name,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            stacks = stacks.len(),
            generation = registries.generation(),
            "project hydrated"
        );

        Ok(Project {
            name: self.name.clone(),
            registries,
            graph,
            containers: self.containers.clone(),
            settings: self.engine,
            stacks,
            issues,
        })
    }
}

impl Project {
    /// An executor configured from the engine settings, holding the
    /// project's containers.
    pub fn executor(&self) -> Executor {
        Executor::new(self.settings.executor_config()).with_containers(self.containers.clone())
    }

    /// Transport at tick 0.
    pub fn transport(&self) -> TransportState {
        self.settings.transport_state()
    }

    /// A fresh plan compiler.
    pub fn compiler(&self) -> Compiler {
        Compiler::new()
    }

    /// Loading issues followed by graph lint.
    pub fn lint(&self) -> Vec<Issue> {
        let mut issues = self.issues.clone();
        issues.extend(lint(&self.graph, &self.registries));
        issues
    }

    /// Captures the current graph back into a project file.
    pub fn to_file(&self) -> Result<ProjectFile, ConfigError> {
        ProjectFile::from_graph(self.name.clone(), &self.graph, &self.containers, self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{CardConfig, EdgeConfig};
    use cardplay_core::{Stack, count_kind};

    fn builtins() -> RegistrySet {
        cardplay_registry::builtin_registry().unwrap()
    }

    #[test]
    fn test_free_cards_and_edges() {
        let mut file = ProjectFile::new("p");
        file.cards = vec![CardConfig::new("gen", "gen.pulse"), CardConfig::new("out", "out.events")];
        file.edges = vec![EdgeConfig::new("gen:out", "out:in")];

        let project = file.hydrate(builtins()).unwrap();
        assert_eq!(project.graph.node_count(), 2);
        assert_eq!(project.graph.edge_count(), 1);
        assert!(project.lint().is_empty(), "{:?}", project.lint());
    }

    #[test]
    fn test_stack_members_are_compiled_not_duplicated() {
        let mut file = ProjectFile::new("p");
        file.cards = vec![
            CardConfig::new("gen", "gen.pulse"),
            CardConfig::new("up", "fx.transpose"),
            CardConfig::new("out", "out.events"),
        ];
        file.stacks = vec![Stack::serial("chain", &["gen", "up", "out"])];

        let project = file.hydrate(builtins()).unwrap();
        assert_eq!(project.graph.node_count(), 3);
        assert_eq!(project.graph.edge_count(), 2);
        assert!(project.issues.is_empty());
        assert!(project.stacks.contains_key("chain"));
    }

    #[test]
    fn test_missing_stack_member_is_an_issue() {
        let mut file = ProjectFile::new("p");
        file.cards = vec![CardConfig::new("gen", "gen.pulse")];
        file.stacks = vec![Stack::serial("s", &["gen", "ghost"])];

        let project = file.hydrate(builtins()).unwrap();
        assert_eq!(count_kind(&project.issues, IssueKind::DanglingReference), 1);
        assert_eq!(project.graph.node_count(), 1);
    }

    #[test]
    fn test_duplicate_free_card_is_an_issue() {
        let mut file = ProjectFile::new("p");
        file.cards = vec![CardConfig::new("gen", "gen.pulse"), CardConfig::new("gen", "gen.clip")];

        let project = file.hydrate(builtins()).unwrap();
        assert_eq!(count_kind(&project.lint(), IssueKind::DuplicateId), 1);
        assert_eq!(project.graph.node("gen").unwrap().card_type, "gen.pulse");
    }

    #[test]
    fn test_unknown_card_type_reported_once() {
        let mut file = ProjectFile::new("p");
        file.cards = vec![CardConfig::new("x", "nope.card")];
        file.stacks = vec![Stack::serial("s", &["x"])];

        let project = file.hydrate(builtins()).unwrap();
        assert_eq!(count_kind(&project.lint(), IssueKind::UnknownCardType), 1);
    }

    #[test]
    fn test_packs_are_installed() {
        let mut file = ProjectFile::new("p");
        file.packs = vec!["arp".to_string()];
        file.cards = vec![CardConfig::new("a", "arp.up")];
        let project = file.hydrate(builtins()).unwrap();
        assert!(project.registries.card("arp.up").is_some());

        file.packs = vec!["missing".to_string()];
        let err = file.hydrate(builtins()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPack(ref id) if id == "missing"));
    }

    #[test]
    fn test_malformed_edge_fails() {
        let mut file = ProjectFile::new("p");
        file.edges = vec![EdgeConfig::new("gen.out", "out:in")];
        let err = file.hydrate(builtins()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation(ValidationError::InvalidEndpoint(ref e)) if e == "gen.out"
        ));
    }
}
