use anyhow::{Context, Result};
use image::ImageReader;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::animation::Action;
use crate::report::{ReportBus, RunReport};
use crate::scene::Vec3Data;

/// World-lighting shader graph description. Built fresh by
/// [`build_environment_graph`] and assigned to the scene wholesale, so user
/// customization of the previous world is replaced, never half-edited.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldNodeGraph {
    #[serde(default)]
    pub nodes: Vec<WorldNode>,
    #[serde(default)]
    pub links: Vec<NodeLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<Action>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldNode {
    pub kind: WorldNodeKind,
    /// Environment texture nodes record the image they sample; absent when
    /// the image failed to load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
    /// Mapping nodes carry a rotation input; ignored by the other kinds.
    #[serde(default)]
    pub rotation: Vec3Data,
}

impl WorldNode {
    fn new(kind: WorldNodeKind) -> Self {
        Self { kind, image: None, rotation: Vec3Data::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldNodeKind {
    TextureCoordinate,
    Mapping,
    EnvironmentTexture,
    Background,
    WorldOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketId {
    Generated,
    Vector,
    Color,
    Background,
    Surface,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NodeLink {
    pub from_node: usize,
    pub from_socket: SocketId,
    pub to_node: usize,
    pub to_socket: SocketId,
}

pub const MAPPING_ROTATION_PATH: &str = "mapping.rotation";

impl WorldNodeGraph {
    pub fn node_of_kind(&self, kind: WorldNodeKind) -> Option<usize> {
        self.nodes.iter().position(|node| node.kind == kind)
    }

    /// True when the environment texture feeds the background shader, i.e.
    /// the HDRI actually lights the render.
    pub fn environment_connected(&self) -> bool {
        let Some(env) = self.node_of_kind(WorldNodeKind::EnvironmentTexture) else {
            return false;
        };
        self.nodes[env].image.is_some()
            && self.links.iter().any(|link| link.from_node == env && link.from_socket == SocketId::Color)
    }

    pub fn animation_mut(&mut self) -> &mut Action {
        self.animation.get_or_insert_with(Action::default)
    }
}

/// Probes the image header so a bad path degrades before the render starts
/// rather than mid-frame inside the host's sampler.
fn probe_image(path: &Path) -> Result<()> {
    ImageReader::open(path)
        .with_context(|| format!("opening environment image {}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("probing environment image {}", path.display()))?
        .into_dimensions()
        .with_context(|| format!("decoding environment image {}", path.display()))?;
    Ok(())
}

/// Builds the fixed five-node chain: texture coordinate → mapping →
/// environment texture → background → world output. A missing or
/// undecodable image is reported and the color link is left out, so the
/// render proceeds without environment lighting.
pub fn build_environment_graph(hdri_path: &Path, reports: &mut ReportBus) -> WorldNodeGraph {
    let mut graph = WorldNodeGraph::default();
    let tex_coord = push_node(&mut graph, WorldNodeKind::TextureCoordinate);
    let mapping = push_node(&mut graph, WorldNodeKind::Mapping);
    let env_tex = push_node(&mut graph, WorldNodeKind::EnvironmentTexture);
    let background = push_node(&mut graph, WorldNodeKind::Background);
    let output = push_node(&mut graph, WorldNodeKind::WorldOutput);

    graph.links.push(NodeLink {
        from_node: tex_coord,
        from_socket: SocketId::Generated,
        to_node: mapping,
        to_socket: SocketId::Vector,
    });
    graph.links.push(NodeLink {
        from_node: mapping,
        from_socket: SocketId::Vector,
        to_node: env_tex,
        to_socket: SocketId::Vector,
    });
    graph.links.push(NodeLink {
        from_node: background,
        from_socket: SocketId::Background,
        to_node: output,
        to_socket: SocketId::Surface,
    });

    if !hdri_path.is_file() {
        reports.push(RunReport::HdriMissing { path: hdri_path.to_path_buf() });
        return graph;
    }
    if let Err(err) = probe_image(hdri_path) {
        reports.push(RunReport::HdriLoadFailed {
            path: hdri_path.to_path_buf(),
            reason: format!("{err:#}"),
        });
        return graph;
    }

    graph.nodes[env_tex].image = Some(hdri_path.to_path_buf());
    graph.links.push(NodeLink {
        from_node: env_tex,
        from_socket: SocketId::Color,
        to_node: background,
        to_socket: SocketId::Color,
    });
    graph
}

fn push_node(graph: &mut WorldNodeGraph, kind: WorldNodeKind) -> usize {
    graph.nodes.push(WorldNode::new(kind));
    graph.nodes.len() - 1
}

/// Keyframes the mapping node's Z rotation input: zero at frame 1, the full
/// rotation at the last frame, linear throughout. The mapping node is
/// located by kind since node identity is not otherwise tracked.
pub fn animate_environment_rotation(graph: &mut WorldNodeGraph, rotation_degrees: f32, frame_count: u32) {
    let Some(mapping) = graph.node_of_kind(WorldNodeKind::Mapping) else {
        return;
    };
    graph.nodes[mapping].rotation.z = rotation_degrees.to_radians();
    let action = graph.animation_mut();
    action.keyframe_insert(MAPPING_ROTATION_PATH, 2, 1, 0.0);
    action.keyframe_insert(MAPPING_ROTATION_PATH, 2, frame_count as i32, rotation_degrees.to_radians());
    action.set_linear_interpolation();
}
