//! Defines the on-disk container format and the file-backed target store.
//!
//! Layout: `MAGIC | version(u16 LE) | column pages... | footer JSON |
//! footer_len(u64 LE)`. The footer carries the schema, the row count, and a
//! page manifest with each page's physical location and the codec actually
//! used. Leaf columns write one values page (sequences additionally write one
//! offsets page); pages are zstd-compressed when the opaque compression
//! setting selects zstd and stored raw otherwise.
//!
//! Container (named-type) columns are rejected at `add_column` time: their
//! values are opaque to this crate and cannot be serialized here.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PivotError;
use crate::row::RowView;
use crate::schema::SchemaField;
use crate::target::{ColumnStore, TargetStore};
use crate::types::TypeSpec;

//==================================================================================
// I. File-level format
//==================================================================================

/// The magic number identifying the start of a rowpivot store file.
pub const FILE_MAGIC: &[u8; 4] = b"RPVT";
/// The current version of the file format.
pub const FILE_FORMAT_VERSION: u16 = 1;

/// The codec actually applied to one page.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PageCodec {
    Stored,
    Zstd,
}

/// What a page holds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    /// Packed element bytes.
    Values,
    /// Row-framing element-count offsets, encoded as u64 LE.
    Offsets,
}

/// Metadata for a single physical page stored within the file.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PageManifestEntry {
    pub column_idx: u32,
    pub kind: PageKind,
    pub codec: PageCodec,
    pub offset_in_file: u64,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

/// The file footer: schema, totals, and the page manifest.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FileFooter {
    pub table_name: String,
    pub fields: Vec<SchemaField>,
    pub total_rows: u64,
    pub page_manifest: Vec<PageManifestEntry>,
    pub writer_version: String,
}

//==================================================================================
// II. Page codecs
//==================================================================================

/// Compresses one page with the Zstandard streaming encoder.
fn zstd_encode(input: &[u8], level: i32) -> Result<Vec<u8>, PivotError> {
    let mut output = Vec::with_capacity(input.len());
    let mut encoder = zstd::stream::Encoder::new(&mut output, level)
        .map_err(|e| PivotError::ZstdError(e.to_string()))?;
    encoder
        .write_all(input)
        .map_err(|e| PivotError::ZstdError(e.to_string()))?;
    // `finish` is essential to finalize the Zstd frame.
    encoder
        .finish()
        .map_err(|e| PivotError::ZstdError(e.to_string()))?;
    Ok(output)
}

/// Decompresses one page, verifying the manifest's uncompressed size.
fn zstd_decode(input: &[u8], expected_len: usize) -> Result<Vec<u8>, PivotError> {
    let mut output = Vec::with_capacity(expected_len);
    zstd::stream::copy_decode(input, &mut output)
        .map_err(|e| PivotError::ZstdError(e.to_string()))?;
    if output.len() != expected_len {
        return Err(PivotError::ZstdError(format!(
            "decompressed size does not match the manifest: expected {expected_len}, got {}",
            output.len()
        )));
    }
    Ok(output)
}

//==================================================================================
// III. FileStore
//==================================================================================

/// A file-backed target store. Rows accumulate in an in-memory column store;
/// `finalize` writes the container file in one pass.
pub struct FileStore {
    path: PathBuf,
    table_name: String,
    inner: ColumnStore,
}

impl FileStore {
    pub fn create<P: AsRef<Path>>(path: P, table_name: &str) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            table_name: table_name.to_string(),
            inner: ColumnStore::new(),
        }
    }

    /// The zstd level selected by the opaque setting, if any. Settings follow
    /// `algo_code * 100 + level`; only the zstd code (5) maps to a codec this
    /// backend can encode.
    fn zstd_level(&self) -> Option<i32> {
        let setting = self.inner.compression_setting();
        if setting / 100 == 5 {
            Some(setting % 100)
        } else {
            None
        }
    }

    fn write_page(
        file: &mut File,
        column_idx: u32,
        kind: PageKind,
        raw: &[u8],
        zstd_level: Option<i32>,
        manifest: &mut Vec<PageManifestEntry>,
    ) -> Result<(), PivotError> {
        let offset_in_file = file.stream_position()?;
        let (codec, encoded) = match zstd_level {
            Some(level) => (PageCodec::Zstd, zstd_encode(raw, level)?),
            None => (PageCodec::Stored, raw.to_vec()),
        };
        file.write_all(&encoded)?;
        manifest.push(PageManifestEntry {
            column_idx,
            kind,
            codec,
            offset_in_file,
            compressed_size: encoded.len() as u64,
            uncompressed_size: raw.len() as u64,
        });
        Ok(())
    }
}

impl TargetStore for FileStore {
    fn set_compression(&mut self, setting: i32) {
        self.inner.set_compression(setting);
        if setting != 0 && setting / 100 != 5 {
            log::debug!(
                "compression setting {setting} has no file-backend codec; pages will be stored raw"
            );
        }
    }

    fn add_column(&mut self, name: &str, type_spec: &str) -> Result<(), PivotError> {
        let spec = TypeSpec::parse(type_spec)
            .map_err(|e| PivotError::SchemaError(format!("column '{name}': {e}")))?;
        if matches!(spec, TypeSpec::Named { .. }) {
            return Err(PivotError::SchemaError(format!(
                "column '{name}': the file backend cannot store opaque container type '{type_spec}'"
            )));
        }
        self.inner.add_column(name, type_spec)
    }

    fn freeze_schema(&mut self) -> Result<(), PivotError> {
        self.inner.freeze_schema()
    }

    fn commit_row(&mut self, row: RowView<'_>) -> Result<(), PivotError> {
        self.inner.commit_row(row)
    }

    fn finalize(&mut self) -> Result<(), PivotError> {
        let mut file = File::create(&self.path)?;
        file.write_all(FILE_MAGIC)?;
        file.write_all(&FILE_FORMAT_VERSION.to_le_bytes())?;

        let zstd_level = self.zstd_level();
        let mut manifest = Vec::new();
        for (idx, name) in self.inner.column_names().iter().enumerate() {
            let (values, offsets) = self.inner.column_pages(name)?;
            Self::write_page(
                &mut file,
                idx as u32,
                PageKind::Values,
                &values,
                zstd_level,
                &mut manifest,
            )?;
            if let Some(offsets) = offsets {
                let mut raw = Vec::with_capacity(offsets.len() * 8);
                for offset in &offsets {
                    raw.extend_from_slice(&(*offset as u64).to_le_bytes());
                }
                Self::write_page(
                    &mut file,
                    idx as u32,
                    PageKind::Offsets,
                    &raw,
                    zstd_level,
                    &mut manifest,
                )?;
            }
        }

        let footer = FileFooter {
            table_name: self.table_name.clone(),
            fields: self.inner.fields(),
            total_rows: self.inner.row_count(),
            page_manifest: manifest,
            writer_version: crate::VERSION.to_string(),
        };
        let footer_json = serde_json::to_vec(&footer)?;
        file.write_all(&footer_json)?;
        file.write_all(&(footer_json.len() as u64).to_le_bytes())?;
        file.sync_all()?;

        self.inner.finalize()?;
        log::info!(
            "wrote {} ({} columns, {} rows)",
            self.path.display(),
            footer.fields.len(),
            footer.total_rows
        );
        Ok(())
    }
}

//==================================================================================
// IV. Read-back
//==================================================================================

/// Reads and validates the footer of a store file.
pub fn read_footer<P: AsRef<Path>>(path: P) -> Result<FileFooter, PivotError> {
    let mut file = File::open(path.as_ref()).map_err(|e| {
        PivotError::SourceError(format!("cannot open '{}': {e}", path.as_ref().display()))
    })?;
    let mut magic = [0_u8; 4];
    file.read_exact(&mut magic)?;
    if &magic != FILE_MAGIC {
        return Err(PivotError::SourceError(format!(
            "'{}' is not a rowpivot store file",
            path.as_ref().display()
        )));
    }
    let mut version = [0_u8; 2];
    file.read_exact(&mut version)?;
    let version = u16::from_le_bytes(version);
    if version != FILE_FORMAT_VERSION {
        return Err(PivotError::SourceError(format!(
            "unsupported file format version {version}"
        )));
    }

    let file_len = file.seek(SeekFrom::End(0))?;
    file.seek(SeekFrom::End(-8))?;
    let mut len_bytes = [0_u8; 8];
    file.read_exact(&mut len_bytes)?;
    let footer_len = u64::from_le_bytes(len_bytes);
    if footer_len.saturating_add(8 + 6) > file_len {
        return Err(PivotError::SourceError(format!(
            "'{}' is truncated",
            path.as_ref().display()
        )));
    }
    file.seek(SeekFrom::Start(file_len - 8 - footer_len))?;
    let mut footer_json = vec![0_u8; footer_len as usize];
    file.read_exact(&mut footer_json)?;
    Ok(serde_json::from_slice(&footer_json)?)
}

/// Reads and decodes one page described by a manifest entry.
pub fn read_page<P: AsRef<Path>>(
    path: P,
    entry: &PageManifestEntry,
) -> Result<Vec<u8>, PivotError> {
    let mut file = File::open(path.as_ref())?;
    file.seek(SeekFrom::Start(entry.offset_in_file))?;
    let mut encoded = vec![0_u8; entry.compressed_size as usize];
    file.read_exact(&mut encoded)?;
    match entry.codec {
        PageCodec::Stored => Ok(encoded),
        PageCodec::Zstd => zstd_decode(&encoded, entry.uncompressed_size as usize),
    }
}

//==================================================================================
// V. Unit tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::ColumnValue;
    use crate::types::ElementType;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("rowpivot_{name}_{}", std::process::id()))
    }

    fn write_sample(path: &Path, setting: i32) {
        let mut store = FileStore::create(path, "events");
        store.set_compression(setting);
        store.add_column("a", "i32").unwrap();
        store.add_column("z", "vec<f64; 3>").unwrap();
        store.freeze_schema().unwrap();
        for i in 0..4_i32 {
            let a_bytes = i.to_ne_bytes();
            let z: Vec<f64> = (0..(i as usize % 3)).map(|j| j as f64).collect();
            let z_bytes: Vec<u8> = bytemuck::cast_slice(&z).to_vec();
            store
                .commit_row(RowView::new(vec![
                    (
                        "a",
                        ColumnValue::Fixed { elem: ElementType::Int32, len: 1, bytes: &a_bytes },
                    ),
                    (
                        "z",
                        ColumnValue::Sequence {
                            elem: ElementType::Float64,
                            len: z.len(),
                            bytes: &z_bytes,
                        },
                    ),
                ]))
                .unwrap();
        }
        store.finalize().unwrap();
    }

    #[test]
    fn footer_roundtrip_uncompressed() {
        let path = temp_path("footer");
        write_sample(&path, 0);

        let footer = read_footer(&path).unwrap();
        assert_eq!(footer.table_name, "events");
        assert_eq!(footer.total_rows, 4);
        assert_eq!(footer.fields.len(), 2);
        // One values page for 'a', values + offsets pages for 'z'.
        assert_eq!(footer.page_manifest.len(), 3);
        assert!(footer.page_manifest.iter().all(|p| p.codec == PageCodec::Stored));

        let a_page = read_page(&path, &footer.page_manifest[0]).unwrap();
        let a: Vec<i32> = a_page
            .chunks_exact(4)
            .map(|c| i32::from_ne_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(a, vec![0, 1, 2, 3]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn zstd_pages_roundtrip() {
        let path = temp_path("zstd");
        write_sample(&path, 505);

        let footer = read_footer(&path).unwrap();
        assert!(footer.page_manifest.iter().all(|p| p.codec == PageCodec::Zstd));
        for entry in &footer.page_manifest {
            let page = read_page(&path, entry).unwrap();
            assert_eq!(page.len() as u64, entry.uncompressed_size);
        }
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn container_columns_are_rejected() {
        let mut store = FileStore::create(temp_path("reject"), "t");
        let err = store.add_column("obj", "SimpleEvent").unwrap_err();
        assert!(matches!(err, PivotError::SchemaError(_)), "{err}");
    }

    #[test]
    fn non_store_files_are_rejected() {
        let path = temp_path("bogus");
        std::fs::write(&path, b"definitely not a store").unwrap();
        let err = read_footer(&path).unwrap_err();
        assert!(matches!(err, PivotError::SourceError(_)), "{err}");
        std::fs::remove_file(&path).ok();
    }
}
