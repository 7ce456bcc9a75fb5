use std::{io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use super::{forest::Tree, forest::Vectors, lookup::LookupTable};
use crate::{
    definitions::{INDEX_FORMAT_VERSION, INDEX_MAGIC},
    utils::fs_ops::save_atomically,
    Error, HasherKind, VideoHashResult,
};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(super) struct IndexHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub dimension: u32,
    pub num_trees: u32,
    pub seed: u64,
    /// Name of the hasher whose fingerprints were indexed, if it was given at build time.
    pub hasher: Option<String>,
}

impl IndexHeader {
    pub fn new(dimension: usize, num_trees: usize, seed: u64, hasher: Option<HasherKind>) -> Self {
        Self {
            magic: INDEX_MAGIC,
            version: INDEX_FORMAT_VERSION,
            dimension: dimension as u32,
            num_trees: num_trees as u32,
            seed,
            hasher: hasher.map(|kind| kind.name().to_string()),
        }
    }
}

// The header is serialized first, so it can be validated before the (large) remainder
// of the file is trusted.
#[derive(Serialize)]
struct IndexFileRef<'a> {
    header: &'a IndexHeader,
    trees: &'a [Tree],
    vectors: &'a Vectors,
    lookup: &'a LookupTable,
}

pub(super) struct IndexFile {
    pub header: IndexHeader,
    pub trees: Vec<Tree>,
    pub vectors: Vectors,
    pub lookup: LookupTable,
}

pub(super) fn save(
    path: &Path,
    header: &IndexHeader,
    trees: &[Tree],
    vectors: &Vectors,
    lookup: &LookupTable,
) -> VideoHashResult<()> {
    let io_err = |src| Error::IndexFileIo {
        src,
        path: path.to_path_buf(),
    };

    let contents = IndexFileRef {
        header,
        trees,
        vectors,
        lookup,
    };

    save_atomically(path, io_err, |buf| {
        bincode::serialize_into(buf, &contents).map_err(|e| Error::Serialization {
            src: format!("{e}"),
            path: path.to_path_buf(),
        })
    })
}

pub(super) fn load(path: &Path) -> VideoHashResult<IndexFile> {
    let file = std::fs::File::open(path).map_err(|src| Error::IndexFileIo {
        src,
        path: path.to_path_buf(),
    })?;
    let mut reader = BufReader::new(file);

    let deser_err = |src: String| Error::Deserialization {
        src,
        path: path.to_path_buf(),
    };

    let header: IndexHeader =
        bincode::deserialize_from(&mut reader).map_err(|e| deser_err(format!("{e}")))?;
    if header.magic != INDEX_MAGIC {
        return Err(deser_err("not a vector index file".to_string()));
    }
    if header.version != INDEX_FORMAT_VERSION {
        return Err(deser_err(format!(
            "unsupported index format version {} (expected {INDEX_FORMAT_VERSION})",
            header.version
        )));
    }

    let trees: Vec<Tree> =
        bincode::deserialize_from(&mut reader).map_err(|e| deser_err(format!("{e}")))?;
    let vectors: Vectors =
        bincode::deserialize_from(&mut reader).map_err(|e| deser_err(format!("{e}")))?;
    let lookup: LookupTable =
        bincode::deserialize_from(&mut reader).map_err(|e| deser_err(format!("{e}")))?;

    Ok(IndexFile {
        header,
        trees,
        vectors,
        lookup,
    })
}
