//! Material and texture page lookup

use indexmap::IndexMap;
use tracing::warn;

use crate::{
    error::{Error, Result},
    misc::{MaterialRecord, MiscTable},
};

/// Material lookup built once per archive from its misc table
///
/// Texture pages are remapped to dense slots in ascending page order, so slot `0` is the lowest
/// page any material refers to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialRegistry {
    materials: IndexMap<u32, MaterialRecord>,
    pages: Vec<u32>,
}

impl MaterialRegistry {
    /// Build the registry from every material record of `table`
    ///
    /// When two records share a material id the first one wins.
    pub fn new(table: &MiscTable) -> Self {
        let mut materials = IndexMap::new();
        for material in table.materials() {
            if materials.contains_key(&material.material) {
                warn!(id = material.material, "ignoring duplicate material");
                continue;
            }
            materials.insert(material.material, *material);
        }

        let mut pages: Vec<u32> = materials.values().map(|m| m.texture_page).collect();
        pages.sort_unstable();
        pages.dedup();

        MaterialRegistry { materials, pages }
    }

    /// Number of materials
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Whether there are no materials
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Look up a material by id
    pub fn material(&self, id: u32) -> Result<&MaterialRecord> {
        self.materials.get(&id).ok_or(Error::MaterialNotFound(id))
    }

    /// Dense slot of a texture page
    pub fn texture_slot(&self, page: u32) -> Result<usize> {
        self.pages
            .binary_search(&page)
            .map_err(|_| Error::TextureNotFound(page))
    }

    /// Texture pages referenced by any material, ascending
    pub fn texture_pages(&self) -> &[u32] {
        &self.pages
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::error::{Error, Result};
    use crate::material::MaterialRegistry;
    use crate::misc::{MiscRecord, MiscTable};
    use crate::types::MiscRecordRaw;

    fn table(materials: &[(u32, u32)]) -> MiscTable {
        let records = materials
            .iter()
            .enumerate()
            .map(|(i, &(id, page))| {
                let raw = MiscRecordRaw {
                    id: *b"Matl",
                    info: MiscRecordRaw::pack_info(2, id),
                    a: page,
                    b: 0,
                };
                MiscRecord::classify(&raw, i, 0x10).unwrap()
            })
            .collect();
        MiscTable::from_records(records)
    }

    #[test]
    fn texture_slots_are_dense() -> Result<()> {
        let registry = MaterialRegistry::new(&table(&[(1, 40), (2, 7), (3, 40), (4, 12)]));

        assert_eq!(registry.len(), 4);
        assert_eq!(registry.texture_pages(), &[7, 12, 40]);
        assert_eq!(registry.texture_slot(7)?, 0);
        assert_eq!(registry.texture_slot(12)?, 1);
        assert_eq!(registry.texture_slot(40)?, 2);
        assert!(matches!(
            registry.texture_slot(8),
            Err(Error::TextureNotFound(8))
        ));

        Ok(())
    }

    #[test]
    fn first_material_wins() -> Result<()> {
        let registry = MaterialRegistry::new(&table(&[(1, 3), (1, 5)]));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.material(1)?.texture_page, 3);
        assert!(matches!(
            registry.material(2),
            Err(Error::MaterialNotFound(2))
        ));

        Ok(())
    }
}
