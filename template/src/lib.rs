//! Parameterized AWS resource templates for the IoT device platform
//!
//! A template from the [`Catalog`] plus [`TemplateParameters`] is instantiated
//! into a checked [`ResourceGraph`]. Graphs of one deployment are combined in
//! a [`Deployment`], their cross-stack placeholders filled with [`resolve`],
//! and each is turned into a CloudFormation document with [`render`].

pub mod catalog;
pub mod deployment;
pub mod error;
pub mod graph;
pub mod intrinsic;
pub mod names;
pub mod params;
pub mod render;
pub mod resolve;
pub mod templates;

pub use catalog::{instantiate, instantiate_into, Blueprint, Catalog, ResourceTemplate, TemplateKind};
pub use deployment::Deployment;
pub use error::{CollisionScope, Error, Result};
pub use graph::{
    CrossGraphExport, EdgeTarget, GraphBuilder, RemovalPolicy, ResourceEdge, ResourceGraph,
    ResourceKind, ResourceNode,
};
pub use names::{to_camel, to_lower, to_upper, CasePolicy};
pub use params::{ParameterSpec, TemplateParameters};
pub use render::render;
pub use resolve::{resolve, resolve_known, ExportValues};
