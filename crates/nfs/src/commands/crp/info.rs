use clap::Args;
use miette::Result;
use nfs_crp::misc::MiscRecord;
use owo_colors::OwoColorize;
use std::path::PathBuf;

#[derive(Args)]
pub struct InfoArgs {
    /// An input CRP file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl InfoArgs {
    pub fn handle(&self) -> Result<()> {
        let crp = super::open(&self.file)?;

        println!("{} articles", crp.len().bold());
        for article in crp.articles() {
            if let Some(effect) = article.effect() {
                let mirrored = if effect.mirrored { ", mirrored" } else { "" };
                println!(
                    "  {:>3} {} {}",
                    article.index,
                    article.name(),
                    format!("(effect{mirrored})").dimmed()
                );
                continue;
            }

            let levels: Vec<&str> = article.levels().iter().map(|l| l.suffix()).collect();
            let (geom, ty) = article
                .base()
                .map(|b| (b.geom_index, b.type_index))
                .unwrap_or_default();
            println!(
                "  {:>3} {} ({geom},{ty}) [{}]",
                article.index,
                article.name(),
                levels.join(", ")
            );
        }

        let misc = crp.misc();
        let generic = misc
            .records()
            .iter()
            .filter(|r| matches!(r, MiscRecord::Generic(_)))
            .count();
        println!(
            "{} misc records: {} materials, {} texture packs, {} generic",
            misc.len().bold(),
            crp.materials().len(),
            crp.pack_count(),
            generic
        );

        let stem = super::stem(&self.file)?;
        for pack in crp.texture_packs() {
            println!(
                "  {} at {:#x}, {} bytes",
                pack.file_name(&stem),
                pack.offset,
                pack.length
            );
        }

        let scene = crp.assemble();
        println!(
            "{} meshes, {} visible",
            scene.meshes.len().bold(),
            scene.visible().count()
        );
        for skipped in &scene.skipped {
            println!("  ❌ {}: {}", skipped.name.red(), skipped.error);
        }
        for unsupported in &scene.unsupported {
            println!("  {}", unsupported.error.to_string().dimmed());
        }

        Ok(())
    }
}
