//! secport-core: isolated security and portability testing environments.
//!
//! Discovers per-language targets in the input sources, synthesizes container
//! build instructions and VM definitions for them, and coordinates the
//! concurrent build/provision/cleanup lifecycle, classifying the external
//! tools' streamed output against known completion markers.

pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod error;
pub mod image;
pub mod instruction;
pub mod orchestrator;
pub mod persist;
pub mod profile;
pub mod results;
pub mod runtime;
pub mod templates;
pub mod toolset;

pub use config::{RunConfig, SecurityPolicy};
pub use coordinator::RunCoordinator;
pub use discovery::{resolve_targets, Target};
pub use error::{Result, SecportError};
pub use instruction::BuildInstructionSet;
pub use orchestrator::Supervisor;
pub use runtime::Language;
