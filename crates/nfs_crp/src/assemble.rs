//! Rebuilding triangle meshes from decoded articles
//!
//! Every level of a mesh article becomes one [`AssembledMesh`]. Parts of a level share the
//! level's vertex and uv tables; each part stores local `u8` indices plus an adjustment that is
//! added before the tables are addressed.

use glam::{Mat4, Vec2, Vec3};
use tracing::{debug, instrument, warn};

use crate::{
    error::{Error, Result},
    material::MaterialRegistry,
    misc::{QuadKind, QuadSet},
    tree::{Article, Level, Part},
    types::TableKind,
};

/// Mesh name of bound plane geometry
pub const BOUND_PLANE_NAME: &str = "BoundPlane";
/// Mesh name of window geometry
pub const WINDOW_NAME: &str = "Wndo";

/// Material bound to a triangle
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MaterialRef {
    /// Material id as stored on the part
    pub id: u32,
    /// Texture page the material samples
    pub texture_page: u32,
    /// Dense slot of the texture page
    pub texture_slot: usize,
}

/// One output vertex
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Vertex {
    /// Position
    pub position: Vec3,
    /// Normal, when the level has a normal table
    pub normal: Option<Vec3>,
}

/// One output triangle
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Triangle {
    /// Indices into the mesh's vertices
    pub indices: [u32; 3],
    /// Texture coordinate of each corner, when the level has a uv table
    pub uvs: Option<[Vec2; 3]>,
    /// Bound material, absent for bound planes and windows
    pub material: Option<MaterialRef>,
}

/// A rebuilt mesh
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledMesh {
    /// Generated name, `({geom},{type}){name}_{suffix}` for article levels
    pub name: String,
    /// Vertices in table order, up to the highest one referenced
    pub vertices: Vec<Vertex>,
    /// Triangles in part order
    pub triangles: Vec<Triangle>,
    /// Whether the mesh is shown by default
    pub visible: bool,
    /// Level transform, not applied to the vertices
    pub transform: Option<Mat4>,
    /// Source article, absent for bound planes and windows
    pub article: Option<usize>,
    /// Source level number, absent for bound planes and windows
    pub level: Option<u32>,
}

/// A level that was left out of the output
#[derive(Debug)]
pub struct SkippedLevel {
    /// Source article
    pub article: usize,
    /// Level number
    pub level: u32,
    /// Name the mesh would have had
    pub name: String,
    /// Why the level was skipped
    pub error: Error,
}

/// An article that was recognised but not rebuilt
#[derive(Debug)]
pub struct UnsupportedArticle {
    /// Source article
    pub article: usize,
    /// Always [`Error::UnsupportedVariant`]
    pub error: Error,
}

/// Output of one article
#[derive(Debug, Default)]
pub struct ArticleMeshes {
    /// Meshes of the levels that assembled
    pub meshes: Vec<AssembledMesh>,
    /// Levels that failed
    pub skipped: Vec<SkippedLevel>,
}

/// Everything rebuilt from one archive
#[derive(Debug, Default)]
pub struct AssembledScene {
    /// Meshes in article then level order, followed by bound planes and windows
    pub meshes: Vec<AssembledMesh>,
    /// Levels that failed
    pub skipped: Vec<SkippedLevel>,
    /// Articles that were not rebuilt
    pub unsupported: Vec<UnsupportedArticle>,
}

impl AssembledScene {
    /// Meshes marked visible
    pub fn visible(&self) -> impl Iterator<Item = &AssembledMesh> {
        self.meshes.iter().filter(|m| m.visible)
    }
}

/// Name of the mesh built from `level` of `article`
pub fn mesh_name(article: &Article, level: &Level) -> String {
    let (geom, ty) = article
        .base()
        .map(|b| (b.geom_index, b.type_index))
        .unwrap_or_default();
    format!("({geom},{ty}){}_{}", article.name(), level.suffix())
}

/// Read one local index and resolve it into a table of `len` items
fn resolve(
    part: &Part,
    kind: TableKind,
    start: u32,
    adjust: u32,
    corner: u32,
    len: usize,
) -> Result<usize> {
    let indices = &part.record.indices;
    let position = start as usize + corner as usize;
    let local = *indices.get(position).ok_or(Error::IndexOutOfRange {
        part: part.index,
        kind,
        index: position,
        len: indices.len(),
    })?;

    let index = local as usize + adjust as usize;
    if index >= len {
        return Err(Error::IndexOutOfRange {
            part: part.index,
            kind,
            index,
            len,
        });
    }
    Ok(index)
}

/// Start and adjustment of a part's table of `kind`
fn table(part: &Part, kind: TableKind) -> Result<(u32, u32)> {
    let start = part
        .record
        .index_table(kind)
        .ok_or(Error::MissingIndexTable {
            part: part.index,
            kind,
        })?;
    let adjust = part
        .record
        .adjustment(kind)
        .ok_or(Error::MissingAdjustment {
            part: part.index,
            kind,
        })?;
    Ok((start, adjust))
}

/// Rebuild one level of a mesh article
///
/// Fails on the first part that cannot be resolved, so a level is either complete or absent.
/// Vertices past the highest index any triangle uses are dropped.
pub fn assemble_level(
    article: &Article,
    level: &Level,
    registry: &MaterialRegistry,
) -> Result<AssembledMesh> {
    let Some(base) = article.base() else {
        return Err(Error::UnsupportedVariant(format!(
            "article {} has no base entry",
            article.index
        )));
    };

    let mut vertices: Vec<Vertex> = level
        .vertices
        .iter()
        .enumerate()
        .map(|(i, &position)| Vertex {
            position,
            normal: level.normals.as_ref().and_then(|n| n.get(i).copied()),
        })
        .collect();

    let mut triangles = Vec::new();
    for part in &level.parts {
        let material = registry.material(part.record.material)?;
        let material = MaterialRef {
            id: material.material,
            texture_page: material.texture_page,
            texture_slot: registry.texture_slot(material.texture_page)?,
        };

        let (vt_start, vt_adjust) = table(part, TableKind::Vertex)?;
        let uv_table = match &level.uvs {
            Some(uvs) => Some((uvs, table(part, TableKind::Uv)?)),
            None => None,
        };

        for k in 0..part.triangle_count() {
            let mut indices = [0u32; 3];
            let mut uvs = [Vec2::ZERO; 3];
            for j in 0..3 {
                let corner = 3 * k + j as u32;
                let index = resolve(
                    part,
                    TableKind::Vertex,
                    vt_start,
                    vt_adjust,
                    corner,
                    vertices.len(),
                )?;
                indices[j] = index as u32;

                if let Some((values, (uv_start, uv_adjust))) = uv_table {
                    let uv = resolve(
                        part,
                        TableKind::Uv,
                        uv_start,
                        uv_adjust,
                        corner,
                        values.len(),
                    )?;
                    uvs[j] = values[uv];
                }
            }

            triangles.push(Triangle {
                indices,
                uvs: uv_table.map(|_| uvs),
                material: Some(material),
            });
        }
    }

    // only the prefix up to the highest referenced index is emitted
    let used = triangles
        .iter()
        .flat_map(|t| t.indices)
        .max()
        .map_or(0, |max| max as usize + 1);
    vertices.truncate(used);

    Ok(AssembledMesh {
        name: mesh_name(article, level),
        vertices,
        triangles,
        visible: level.position == 0 && base.type_index == 0,
        transform: level.transform,
        article: Some(article.index),
        level: Some(level.number),
    })
}

/// Rebuild every level of an article
///
/// Levels that fail are reported in [`ArticleMeshes::skipped`]. Proxy articles are not rebuilt
/// and fail with [`Error::UnsupportedVariant`].
#[instrument(skip_all, fields(article = article.index, name = %article.name()))]
pub fn assemble_article(article: &Article, registry: &MaterialRegistry) -> Result<ArticleMeshes> {
    if article.is_effect() {
        return Err(Error::UnsupportedVariant(format!(
            "effect article {} ({})",
            article.index,
            article.name()
        )));
    }

    let mut out = ArticleMeshes::default();
    for level in article.levels() {
        match assemble_level(article, level, registry) {
            Ok(mesh) => out.meshes.push(mesh),
            Err(error) => {
                let name = mesh_name(article, level);
                warn!(%name, %error, "skipping level");
                out.skipped.push(SkippedLevel {
                    article: article.index,
                    level: level.number,
                    name,
                    error,
                });
            }
        }
    }
    Ok(out)
}

/// Expand quads into a mesh
///
/// Quad `i` uses vertices `4i..4i+4` and is split along the diagonal from its second to its
/// fourth corner.
pub fn assemble_quads(set: &QuadSet) -> AssembledMesh {
    let (name, visible) = match set.kind {
        QuadKind::BoundPlane => (BOUND_PLANE_NAME, false),
        QuadKind::Window => (WINDOW_NAME, true),
    };

    let vertices = set
        .quads
        .iter()
        .flatten()
        .map(|&position| Vertex {
            position,
            normal: None,
        })
        .collect();

    let triangles = (0..set.quads.len() as u32)
        .flat_map(|i| {
            let v = 4 * i;
            [[v, v + 1, v + 3], [v + 1, v + 2, v + 3]]
        })
        .map(|indices| Triangle {
            indices,
            uvs: None,
            material: None,
        })
        .collect();

    AssembledMesh {
        name: name.to_owned(),
        vertices,
        triangles,
        visible,
        transform: None,
        article: None,
        level: None,
    }
}

/// Rebuild every article and quad set of an archive
pub fn assemble_archive(
    articles: &[Article],
    quads: &[QuadSet],
    registry: &MaterialRegistry,
) -> AssembledScene {
    let mut scene = AssembledScene::default();

    for article in articles {
        match assemble_article(article, registry) {
            Ok(out) => {
                scene.meshes.extend(out.meshes);
                scene.skipped.extend(out.skipped);
            }
            Err(error) => scene.unsupported.push(UnsupportedArticle {
                article: article.index,
                error,
            }),
        }
    }
    scene.meshes.extend(quads.iter().map(assemble_quads));

    debug!(
        meshes = scene.meshes.len(),
        skipped = scene.skipped.len(),
        unsupported = scene.unsupported.len(),
        "assembled archive"
    );
    scene
}
