//! Vector-store collection naming for the File Handler: one collection per uploaded
//! file, named from a hash of its id so the name is stable, short, and safe to use
//! as a store identifier regardless of the original file name.

use md5::{Digest, Md5};
use uuid::Uuid;

/// `<type_tag>_<first 12 hex chars of md5(file_id)>`, the File Handler's per-file
/// vector-store collection name. Recreating it for the same `file_id` always
/// yields the same name, so re-processing a file (e.g. after a retry) targets the
/// same collection rather than leaking an orphaned one.
pub fn file_collection_name(type_tag: &str, file_id: Uuid) -> String {
    let digest = Md5::digest(file_id.as_bytes());
    let hex = format!("{digest:x}");
    format!("{type_tag}_{}", &hex[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_name_is_deterministic() {
        let id = Uuid::new_v4();
        assert_eq!(file_collection_name("file", id), file_collection_name("file", id));
    }

    #[test]
    fn collection_name_has_twelve_hex_chars_after_tag() {
        let name = file_collection_name("file", Uuid::new_v4());
        let suffix = name.strip_prefix("file_").unwrap();
        assert_eq!(suffix.len(), 12);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_ids_produce_different_names() {
        let a = file_collection_name("file", Uuid::new_v4());
        let b = file_collection_name("file", Uuid::new_v4());
        assert_ne!(a, b);
    }
}
