use clap::Args;
use image::{ImageFormat, RgbaImage};
use miette::{miette, Context, IntoDiagnostic, Result};
use std::{io::Write, path::PathBuf};
use tracing::{info, warn};

#[derive(Args)]
pub struct TexturesArgs {
    /// An input CRP file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Only write the packs as stored, without decoding their images
    #[arg(long, default_value_t = false)]
    raw: bool,
}

impl TexturesArgs {
    pub fn handle(&self) -> Result<()> {
        let mut crp = super::open(&self.file)?;
        let stem = super::stem(&self.file)?;
        let root = self.directory.join("textures");

        for i in 0..crp.pack_count() {
            let name = crp.texture_packs()[i].file_name(&stem);
            let data = crp.extract(i)?;

            let p = root.join(format!("{name}.fsh"));
            info!("writing {}", p.display());
            super::create(&p, self.overwrite)?
                .write_all(&data)
                .into_diagnostic()?;

            if self.raw {
                continue;
            }

            let fsh = nfs_fsh::FshArchive::parse(&data)
                .into_diagnostic()
                .context(format!("decoding {name}"))?;

            for image in fsh.images() {
                let Some(rgba) = image.rgba() else {
                    warn!("{name}/{} is {:?}, leaving it packed", image.name, image.format);
                    continue;
                };

                let p = root
                    .join(&name)
                    .join(format!("{}.png", super::sanitize(&image.name)));
                info!("writing {}", p.display());

                let buffer = RgbaImage::from_raw(image.width, image.height, rgba.to_vec())
                    .ok_or_else(|| miette!("{name}/{} has a short pixel buffer", image.name))?;
                let mut out = super::create(&p, self.overwrite)?;
                buffer
                    .write_to(&mut std::io::BufWriter::new(&mut out), ImageFormat::Png)
                    .into_diagnostic()
                    .context(format!("encoding {}", p.display()))?;
            }
        }
        Ok(())
    }
}
