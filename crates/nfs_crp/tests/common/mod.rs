#![allow(dead_code)]

use std::io::Cursor;

use binrw::BinWrite;
use byteorder::{LittleEndian, WriteBytesExt};
use nfs_crp::types::{
    ArticleRecord, BaseRecord, CrpHeader, EffectRecord, EntryKind, EntryRecord, MiscRecordRaw,
    PartRecord, TableRef,
};

pub struct LevelDef {
    pub number: u32,
    pub vertices: Vec<[f32; 4]>,
    pub normals: Option<Vec<[f32; 4]>>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub transform: Option<[f32; 16]>,
    /// (record, indices per table)
    pub parts: Vec<(PartRecord, u32)>,
}

impl LevelDef {
    pub fn new(number: u32, vertices: Vec<[f32; 4]>) -> Self {
        LevelDef {
            number,
            vertices,
            normals: None,
            uvs: None,
            transform: None,
            parts: Vec::new(),
        }
    }
}

pub struct ArticleDef {
    pub name: &'static str,
    pub geom_index: u32,
    pub type_index: u32,
    pub effect: Option<EffectRecord>,
    pub levels: Vec<LevelDef>,
}

impl ArticleDef {
    pub fn mesh(
        name: &'static str,
        geom_index: u32,
        type_index: u32,
        levels: Vec<LevelDef>,
    ) -> Self {
        ArticleDef {
            name,
            geom_index,
            type_index,
            effect: None,
            levels,
        }
    }

    pub fn effect(name: &'static str) -> Self {
        ArticleDef {
            name,
            geom_index: 0,
            type_index: 0,
            effect: Some(EffectRecord {
                transform: IDENTITY,
                flags: 1,
            }),
            levels: Vec::new(),
        }
    }
}

pub enum MiscDef {
    Material { id: u32, page: u32 },
    Pack { index: u32, data: Vec<u8> },
    Quads { id: [u8; 4], quads: Vec<[[f32; 4]; 4]> },
    Raw(MiscRecordRaw),
}

pub const IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
];

/// Part with one vertex table at 0 and, if `uv_adjust` is given, a uv table right after it
pub fn part(
    material: u32,
    local: &[u8],
    vertex_adjust: u32,
    uv_adjust: Option<u32>,
) -> (PartRecord, u32) {
    let mut index_tables = vec![TableRef {
        kind: *b"Vert",
        value: 0,
    }];
    let mut adjustments = vec![TableRef {
        kind: *b"Vert",
        value: vertex_adjust,
    }];
    let mut indices = local.to_vec();

    if let Some(uv_adjust) = uv_adjust {
        index_tables.push(TableRef {
            kind: *b"UV  ",
            value: local.len() as u32,
        });
        adjustments.push(TableRef {
            kind: *b"UV  ",
            value: uv_adjust,
        });
        indices.extend_from_slice(local);
    }

    (
        PartRecord {
            material,
            index_tables,
            adjustments,
            indices,
        },
        local.len() as u32,
    )
}

pub fn quad(z: f32) -> [[f32; 4]; 4] {
    [
        [0.0, 0.0, z, 1.0],
        [1.0, 0.0, z, 1.0],
        [1.0, 1.0, z, 1.0],
        [0.0, 1.0, z, 1.0],
    ]
}

/// Minimal FSH pack holding one 1×1 32-bit image
pub fn fsh_pack(name: &[u8; 4], bgra: [u8; 4]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"SHPI");
    out.write_u32::<LittleEndian>(16 + 8 + 16 + 4).unwrap();
    out.write_u32::<LittleEndian>(1).unwrap();
    out.extend_from_slice(b"GIMX");
    out.extend_from_slice(name);
    out.write_u32::<LittleEndian>(24).unwrap();
    out.write_u32::<LittleEndian>(0x7D).unwrap();
    out.write_u16::<LittleEndian>(1).unwrap();
    out.write_u16::<LittleEndian>(1).unwrap();
    out.extend_from_slice(&[0u8; 8]);
    out.extend_from_slice(&bgra);
    out
}

struct Payload {
    kind: EntryKind,
    level: u32,
    index: u32,
    count: u32,
    bytes: Vec<u8>,
}

fn encode<T: for<'a> BinWrite<Args<'a> = ()>>(value: &T) -> Vec<u8> {
    let mut buf = Vec::new();
    value.write_le(&mut Cursor::new(&mut buf)).unwrap();
    buf
}

fn put<T: for<'a> BinWrite<Args<'a> = ()>>(out: &mut [u8], position: usize, value: &T) {
    let bytes = encode(value);
    out[position..position + bytes.len()].copy_from_slice(&bytes);
}

fn floats<const N: usize>(items: &[[f32; N]]) -> Vec<u8> {
    let mut out = Vec::new();
    for v in items.iter().flatten() {
        out.write_f32::<LittleEndian>(*v).unwrap();
    }
    out
}

fn payloads(article: &ArticleDef) -> Vec<Payload> {
    let mut out = vec![Payload {
        kind: EntryKind::Name,
        level: 0,
        index: 0,
        count: article.name.len() as u32 + 1,
        bytes: [article.name.as_bytes(), &[0]].concat(),
    }];

    if let Some(effect) = &article.effect {
        out.push(Payload {
            kind: EntryKind::Effect,
            level: 0,
            index: 0,
            count: 1,
            bytes: encode(effect),
        });
        return out;
    }

    let base = BaseRecord {
        geom_index: article.geom_index,
        type_index: article.type_index,
        level_index: 0,
        levels: article.levels.iter().map(|l| l.number).collect(),
    };
    out.push(Payload {
        kind: EntryKind::Base,
        level: 0,
        index: 0,
        count: base.levels.len() as u32,
        bytes: encode(&base),
    });

    for level in &article.levels {
        let number = level.number;
        out.push(Payload {
            kind: EntryKind::Vertex,
            level: number,
            index: 0,
            count: level.vertices.len() as u32,
            bytes: floats(&level.vertices),
        });
        if let Some(normals) = &level.normals {
            out.push(Payload {
                kind: EntryKind::Normal,
                level: number,
                index: 0,
                count: normals.len() as u32,
                bytes: floats(normals),
            });
        }
        if let Some(uvs) = &level.uvs {
            out.push(Payload {
                kind: EntryKind::Uv,
                level: number,
                index: 0,
                count: uvs.len() as u32,
                bytes: floats(uvs),
            });
        }
        if let Some(transform) = &level.transform {
            out.push(Payload {
                kind: EntryKind::Transform,
                level: number,
                index: 0,
                count: 1,
                bytes: floats(&[*transform]),
            });
        }
        for (i, (record, count)) in level.parts.iter().enumerate() {
            out.push(Payload {
                kind: EntryKind::Part,
                level: number,
                index: i as u32,
                count: *count,
                bytes: encode(record),
            });
        }
    }

    out
}

fn align(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

/// Lay out a complete archive
pub fn build_crp(articles: &[ArticleDef], misc: &[MiscDef]) -> Vec<u8> {
    let article_table_end = 16 + 16 * articles.len();
    let mut out = vec![0u8; article_table_end + 16 * misc.len()];

    put(
        &mut out,
        0,
        &CrpHeader {
            article_count: articles.len() as u32,
            misc_count: misc.len() as u32,
            reserved: 0,
        },
    );

    for (i, article) in articles.iter().enumerate() {
        let record_position = 16 + 16 * i;
        let payloads = payloads(article);

        let table_start = out.len();
        out.resize(table_start + 16 * payloads.len(), 0);

        for (j, payload) in payloads.iter().enumerate() {
            let entry_position = table_start + 16 * j;
            let data_position = out.len();
            out.extend_from_slice(&payload.bytes);
            align(&mut out);

            put(
                &mut out,
                entry_position,
                &EntryRecord {
                    id: payload.kind.fourcc(),
                    info: EntryRecord::pack_info(payload.level, payload.index),
                    count: payload.count,
                    offset: (data_position - entry_position) as u32,
                },
            );
        }

        put(
            &mut out,
            record_position,
            &ArticleRecord {
                entry_count: payloads.len() as u32,
                entry_offset: (table_start - record_position) as u32,
                reserved: 0,
            },
        );
    }

    for (k, record) in misc.iter().enumerate() {
        let position = article_table_end + 16 * k;
        let raw = match record {
            MiscDef::Material { id, page } => MiscRecordRaw {
                id: *b"Matl",
                info: MiscRecordRaw::pack_info(2, *id),
                a: *page,
                b: 0,
            },
            MiscDef::Pack { index, data } => {
                let data_position = out.len();
                out.extend_from_slice(data);
                align(&mut out);
                MiscRecordRaw {
                    id: *b"fsh ",
                    info: MiscRecordRaw::pack_info(3, *index),
                    a: data.len() as u32,
                    b: (data_position - position) as u32,
                }
            }
            MiscDef::Quads { id, quads } => {
                let data_position = out.len();
                for quad in quads {
                    out.extend_from_slice(&floats(quad));
                }
                MiscRecordRaw {
                    id: *id,
                    info: MiscRecordRaw::pack_info(1, k as u32),
                    a: quads.len() as u32,
                    b: (data_position - position) as u32,
                }
            }
            MiscDef::Raw(raw) => *raw,
        };
        put(&mut out, position, &raw);
    }

    out
}
