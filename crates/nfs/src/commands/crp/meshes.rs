use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use nfs_crp::AssembledMesh;
use std::{
    io::{BufWriter, Write},
    path::PathBuf,
};
use tracing::info;

#[derive(Args)]
pub struct MeshesArgs {
    /// An input CRP file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Also write meshes that are hidden by default
    #[arg(long, default_value_t = false)]
    hidden: bool,
}

impl MeshesArgs {
    pub fn handle(&self) -> Result<()> {
        let crp = super::open(&self.file)?;
        let root = self.directory.join(super::stem(&self.file)?);
        let scene = crp.assemble();

        for skipped in &scene.skipped {
            info!("skipped {}: {}", skipped.name, skipped.error);
        }

        let mut written = 0;
        for (i, mesh) in scene.meshes.iter().enumerate() {
            if !mesh.visible && !self.hidden {
                continue;
            }

            let p = root.join(format!("{i:03}_{}.obj", super::sanitize(&mesh.name)));
            info!("writing {}", p.display());

            let mut out = BufWriter::new(super::create(&p, self.overwrite)?);
            write_obj(&mut out, mesh)
                .and_then(|_| out.flush())
                .into_diagnostic()
                .context(format!("writing {}", p.display()))?;
            written += 1;
        }

        info!("wrote {written} of {} meshes", scene.meshes.len());
        Ok(())
    }
}

/// Write a mesh as Wavefront OBJ, with one texture coordinate per triangle corner
fn write_obj(out: &mut impl Write, mesh: &AssembledMesh) -> std::io::Result<()> {
    writeln!(out, "o {}", mesh.name)?;

    for v in &mesh.vertices {
        writeln!(out, "v {} {} {}", v.position.x, v.position.y, v.position.z)?;
    }

    let has_normals =
        !mesh.vertices.is_empty() && mesh.vertices.iter().all(|v| v.normal.is_some());
    if has_normals {
        for n in mesh.vertices.iter().filter_map(|v| v.normal) {
            writeln!(out, "vn {} {} {}", n.x, n.y, n.z)?;
        }
    }

    for uv in mesh.triangles.iter().filter_map(|t| t.uvs).flatten() {
        writeln!(out, "vt {} {}", uv.x, 1.0 - uv.y)?;
    }

    let mut material = None;
    let mut next_uv = 1;
    for triangle in &mesh.triangles {
        let id = triangle.material.map(|m| m.texture_slot);
        if id != material {
            if let Some(slot) = id {
                writeln!(out, "usemtl tex{slot}")?;
            }
            material = id;
        }

        write!(out, "f")?;
        for index in triangle.indices {
            let v = index + 1;
            match (triangle.uvs.is_some(), has_normals) {
                (true, true) => write!(out, " {v}/{next_uv}/{v}")?,
                (true, false) => write!(out, " {v}/{next_uv}")?,
                (false, true) => write!(out, " {v}//{v}")?,
                (false, false) => write!(out, " {v}")?,
            }
            if triangle.uvs.is_some() {
                next_uv += 1;
            }
        }
        writeln!(out)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use glam::{Vec2, Vec3};
    use nfs_crp::assemble::{AssembledMesh, MaterialRef, Triangle, Vertex};
    use pretty_assertions::assert_eq;

    use super::write_obj;

    #[test]
    fn write_textured_triangle() {
        let mesh = AssembledMesh {
            name: "(0,0)body_def".to_owned(),
            vertices: [Vec3::ZERO, Vec3::X, Vec3::Y]
                .into_iter()
                .map(|position| Vertex {
                    position,
                    normal: None,
                })
                .collect(),
            triangles: vec![Triangle {
                indices: [0, 1, 2],
                uvs: Some([Vec2::ZERO, Vec2::X, Vec2::Y]),
                material: Some(MaterialRef {
                    id: 4,
                    texture_page: 9,
                    texture_slot: 1,
                }),
            }],
            visible: true,
            transform: None,
            article: Some(0),
            level: Some(0),
        };

        let mut out = Vec::new();
        write_obj(&mut out, &mesh).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "o (0,0)body_def\n\
             v 0 0 0\n\
             v 1 0 0\n\
             v 0 1 0\n\
             vt 0 1\n\
             vt 1 1\n\
             vt 0 0\n\
             usemtl tex1\n\
             f 1/1 2/2 3/3\n"
        );
    }
}
