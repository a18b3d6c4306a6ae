//! Readers for the metadata table embedded in adapter containers.
//!
//! Each reader declares a `supports` predicate over file paths and a `read`
//! function returning the table as an ordered JSON object.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde_json::Value as JsonValue;

use crate::error::MetadataError;

/// String-keyed metadata as read from an adapter file.
pub type Metadata = serde_json::Map<String, JsonValue>;

/// Headers larger than this are rejected without being read.
pub const MAX_HEADER_BYTES: u64 = 100_000_000;

/// Reader trait implemented per container format.
pub trait MetadataReader {
    fn supports(path: &Path) -> bool;
    fn read(path: &Path, max_bytes: u64) -> Result<Metadata, MetadataError>;
}

/// Reader for `.safetensors` files (`__metadata__` header table).
///
/// Only the 8-byte little-endian length prefix and the JSON header are read;
/// tensor data is never touched, so a truncated payload still yields its
/// metadata.
pub struct SafetensorsReader;

impl MetadataReader for SafetensorsReader {
    fn supports(path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("safetensors"))
            .unwrap_or(false)
    }

    fn read(path: &Path, max_bytes: u64) -> Result<Metadata, MetadataError> {
        let mut file = File::open(path)?;
        let size = file.metadata()?.len();
        if size > max_bytes {
            return Err(MetadataError::TooLarge {
                path: path.to_path_buf(),
                size,
                limit: max_bytes,
            });
        }
        if size < 8 {
            return Err(MetadataError::Parse(format!(
                "file is {size} bytes, too short for a header length"
            )));
        }

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let header_len = u64::from_le_bytes(len_bytes);
        if header_len > MAX_HEADER_BYTES || header_len > size - 8 {
            return Err(MetadataError::Parse(format!(
                "header length {header_len} does not fit in a {size} byte file"
            )));
        }
        let header_len = usize::try_from(header_len)
            .map_err(|e| MetadataError::Parse(e.to_string()))?;
        let mut header = vec![0u8; header_len];
        file.read_exact(&mut header)?;

        let header: JsonValue =
            serde_json::from_slice(&header).map_err(|e| MetadataError::Parse(e.to_string()))?;
        let JsonValue::Object(mut header) = header else {
            return Err(MetadataError::Parse("header is not a JSON object".to_string()));
        };
        match header.remove("__metadata__") {
            Some(JsonValue::Object(table)) if !table.is_empty() => Ok(table),
            Some(JsonValue::Object(_)) | Some(JsonValue::Null) | None => {
                Err(MetadataError::NoMetadata(path.to_path_buf()))
            }
            Some(_) => Err(MetadataError::Parse(
                "__metadata__ is not a JSON object".to_string(),
            )),
        }
    }
}

/// Read metadata with whichever reader supports `path`.
pub fn read_metadata(path: &Path, max_bytes: u64) -> Result<Metadata, MetadataError> {
    if SafetensorsReader::supports(path) {
        return SafetensorsReader::read(path, max_bytes);
    }
    Err(MetadataError::UnsupportedFormat(path.to_path_buf()))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::HashMap;
    use std::path::Path;

    use safetensors::tensor::{Dtype, TensorView};

    /// Write a one-tensor safetensors file with the given header metadata.
    pub fn write_safetensors(path: &Path, metadata: Option<HashMap<String, String>>) {
        let data: Vec<u8> = [0.5f32, -0.5f32]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let view = TensorView::new(Dtype::F32, vec![2], &data).expect("tensor view");
        let bytes = safetensors::serialize(vec![("lora_up.weight", view)], metadata)
            .expect("serialize");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(path, bytes).expect("write");
    }

    /// Write a length-prefixed header followed by `payload` bytes.
    pub fn write_raw_header(path: &Path, header: &str, payload: &[u8]) {
        let mut bytes = (header.len() as u64).to_le_bytes().to_vec();
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(payload);
        std::fs::write(path, bytes).expect("write");
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{write_raw_header, write_safetensors};
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn reads_header_metadata() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("anime.safetensors");
        let mut meta = HashMap::new();
        meta.insert("ss_output_name".to_string(), "anime".to_string());
        meta.insert(
            "ss_tag_frequency".to_string(),
            r#"{"10_anime": {"anime": 3}}"#.to_string(),
        );
        write_safetensors(&path, Some(meta));

        let table = read_metadata(&path, u64::MAX).expect("read ok");
        assert_eq!(table.len(), 2);
        assert_eq!(table["ss_output_name"], JsonValue::String("anime".into()));
        assert!(table["ss_tag_frequency"].is_string());
    }

    #[test]
    fn truncated_payload_keeps_header_metadata_in_file_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("partial.safetensors");
        // Declares 8 bytes of tensor data but carries only 2.
        write_raw_header(
            &path,
            r#"{"w":{"dtype":"F32","shape":[2],"data_offsets":[0,8]},"__metadata__":{"zeta":"1","trigger_words":"fox, den"}}"#,
            &[0, 0],
        );

        let table = read_metadata(&path, u64::MAX).expect("read ok");
        let keys: Vec<&String> = table.keys().collect();
        assert_eq!(keys, vec!["zeta", "trigger_words"]);
        assert_eq!(table["trigger_words"], JsonValue::String("fox, den".into()));
    }

    #[test]
    fn oversized_header_length_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("liar.safetensors");
        let mut bytes = (MAX_HEADER_BYTES + 1).to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        std::fs::write(&path, bytes).expect("write");
        assert!(matches!(
            read_metadata(&path, u64::MAX),
            Err(MetadataError::Parse(_))
        ));

        let short = dir.path().join("short.safetensors");
        std::fs::write(&short, b"abc").expect("write");
        assert!(matches!(
            read_metadata(&short, u64::MAX),
            Err(MetadataError::Parse(_))
        ));
    }

    #[test]
    fn header_without_object_metadata() {
        let dir = tempfile::tempdir().expect("tempdir");
        let empty = dir.path().join("empty.safetensors");
        write_raw_header(&empty, r#"{"__metadata__":{}}"#, &[]);
        assert!(matches!(
            read_metadata(&empty, u64::MAX),
            Err(MetadataError::NoMetadata(_))
        ));

        let odd = dir.path().join("odd.safetensors");
        write_raw_header(&odd, r#"{"__metadata__":["a"]}"#, &[]);
        assert!(matches!(
            read_metadata(&odd, u64::MAX),
            Err(MetadataError::Parse(_))
        ));
    }

    #[test]
    fn missing_metadata_table_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bare.safetensors");
        write_safetensors(&path, None);
        assert!(matches!(
            read_metadata(&path, u64::MAX),
            Err(MetadataError::NoMetadata(_))
        ));
    }

    #[test]
    fn other_containers_are_unsupported() {
        let path = Path::new("/tmp/legacy.ckpt");
        assert!(!SafetensorsReader::supports(path));
        assert!(matches!(
            read_metadata(path, u64::MAX),
            Err(MetadataError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn garbage_and_size_limits_are_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.SafeTensors");
        std::fs::write(&path, b"definitely not a header").expect("write");
        assert!(matches!(
            read_metadata(&path, u64::MAX),
            Err(MetadataError::Parse(_))
        ));
        assert!(matches!(
            read_metadata(&path, 4),
            Err(MetadataError::TooLarge { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gone.safetensors");
        assert!(matches!(
            read_metadata(&path, u64::MAX),
            Err(MetadataError::Io(_))
        ));
    }
}
