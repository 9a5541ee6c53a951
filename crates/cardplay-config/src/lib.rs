//! Project files and engine settings for CardPlay.
//!
//! This crate sits between storage and the engine: it reads and writes
//! project files, turns them into registries plus a graph ready for
//! compilation, and carries the transport and executor settings a host
//! runs them with.
//!
//! # Features
//!
//! - **Project files**: TOML or JSON, chosen by file extension
//! - **Hydration**: packs, registry snapshot, cards, stacks and edges into a [`Project`]
//! - **Validation**: strict pre-load checks with every problem collected
//! - **Engine settings**: `[transport]` and `[executor]` tables
//! - **Factory projects**: built-in demos for each engine feature
//!
//! # Example
//!
//! ```rust,no_run
//! use cardplay_config::ProjectFile;
//! use cardplay_core::TickWindow;
//!
//! let file = ProjectFile::load("groove.toml").unwrap();
//! let project = file.hydrate(cardplay_registry::builtin_registry().unwrap()).unwrap();
//!
//! let plan = project.compiler().compile(&project.graph, &project.registries);
//! let mut executor = project.executor();
//! let eval = executor
//!     .evaluate(&plan, &project.graph, &project.registries, TickWindow::new(0, 384), &project.transport())
//!     .unwrap();
//! println!("{} values", eval.values.len());
//! ```

mod error;
mod hydrate;
mod project;
mod settings;

/// Project and settings validation.
pub mod validation;

/// Factory projects bundled with the library.
pub mod factory_projects;

pub use error::ConfigError;
pub use factory_projects::{
    FACTORY_PROJECT_NAMES, factory_project_names, factory_projects, get_factory_project, is_factory_project,
};
pub use hydrate::Project;
pub use project::{CURRENT_VERSION, CardConfig, EdgeConfig, ProjectFile, RegistrySnapshot, parse_endpoint};
pub use settings::{EngineSettings, ExecutorSettings, TransportSettings};
pub use validation::{ValidationError, ValidationResult, validate_project, validate_settings};
