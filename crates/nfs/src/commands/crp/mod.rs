use std::{
    fs::File,
    io::Cursor,
    path::{Path, PathBuf},
};

use miette::{miette, Context, IntoDiagnostic, Result};
use nfs_crp::CrpArchive;

pub mod info;
pub mod meshes;
pub mod textures;

#[derive(clap::Subcommand)]
pub enum CrpCommands {
    /// Summarise the contents of a CRP file
    Info(info::InfoArgs),
    /// Extract the texture packs of a CRP file into a directory
    Textures(textures::TexturesArgs),
    /// Write the meshes of a CRP file as Wavefront OBJ files
    Meshes(meshes::MeshesArgs),
}

impl CrpCommands {
    pub fn handle(&self) -> Result<()> {
        match self {
            CrpCommands::Info(info) => info.handle(),
            CrpCommands::Textures(textures) => textures.handle(),
            CrpCommands::Meshes(meshes) => meshes.handle(),
        }
    }
}

/// Read a whole archive, decompressing it if needed
pub(crate) fn open(path: &Path) -> Result<CrpArchive<Cursor<Vec<u8>>>> {
    let data = std::fs::read(path)
        .into_diagnostic()
        .context(format!("path: {}", path.display()))?;
    Ok(CrpArchive::from_bytes(data)?)
}

/// File name of the archive without its extension
pub(crate) fn stem(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| miette!("path has no file name: {}", path.display()))
}

/// Create a file, refusing to replace an existing one unless `overwrite` is set
pub(crate) fn create(path: &PathBuf, overwrite: bool) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .into_diagnostic()
            .context(format!("creating {}", parent.display()))?;
    }

    if !overwrite {
        File::create_new(path)
            .into_diagnostic()
            .context(format!("creating {}", path.display()))
    } else {
        File::create(path)
            .into_diagnostic()
            .context(format!("creating {}", path.display()))
    }
}

/// Replace characters that would escape the target directory
pub(crate) fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}
