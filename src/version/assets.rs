use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{UpdaterError, UpdaterResult};
use crate::version::version_file::AssetIndexRef;

pub const DEFAULT_RESOURCES_BASE: &str = "https://resources.download.minecraft.net";

/// Asset index document: logical path → content-addressed object.
#[derive(Debug, Deserialize)]
pub struct AssetIndex {
    pub objects: HashMap<String, AssetObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetIndex {
    /// Fetch the index document, persist it under `assets/indexes/` and
    /// return the parsed form.
    pub async fn fetch_and_save(
        client: &reqwest::Client,
        index_ref: &AssetIndexRef,
        assets_dir: &Path,
    ) -> UpdaterResult<Self> {
        let resp = client.get(&index_ref.url).send().await?;
        if !resp.status().is_success() {
            return Err(UpdaterError::DownloadFailed {
                url: index_ref.url.clone(),
                status: resp.status().as_u16(),
            });
        }
        let text = resp.text().await?;
        let index: AssetIndex = serde_json::from_str(&text)?;

        let indexes_dir = assets_dir.join("indexes");
        tokio::fs::create_dir_all(&indexes_dir)
            .await
            .map_err(|e| UpdaterError::io(&indexes_dir, e))?;

        let file_name = match &index_ref.id {
            Some(id) => format!("{id}.json"),
            // No id in the descriptor: fall back to the URL's last segment.
            None => index_ref
                .url
                .rsplit('/')
                .next()
                .unwrap_or("index.json")
                .to_string(),
        };
        let index_path = indexes_dir.join(file_name);
        tokio::fs::write(&index_path, &text)
            .await
            .map_err(|e| UpdaterError::io(index_path, e))?;

        Ok(index)
    }
}

/// Path of one object below `assets/objects/`: `<first two hash chars>/<hash>`.
pub fn object_rel_path(hash: &str) -> PathBuf {
    PathBuf::from(&hash[..2.min(hash.len())]).join(hash)
}

/// Download URL of one object under the resources base.
pub fn object_url(base: &str, hash: &str) -> String {
    format!(
        "{}/{}/{}",
        base.trim_end_matches('/'),
        &hash[..2.min(hash.len())],
        hash
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_are_content_addressed_by_hash_prefix() {
        let hash = "19a772561ec3bd6efbd6d4ed6f64b381a23ba294";
        assert_eq!(object_rel_path(hash), PathBuf::from("19").join(hash));
        assert_eq!(
            object_url(DEFAULT_RESOURCES_BASE, hash),
            format!("https://resources.download.minecraft.net/19/{hash}")
        );
    }

    #[test]
    fn index_document_parses_objects() {
        let index: AssetIndex = serde_json::from_value(serde_json::json!({
            "objects": {
                "minecraft/sounds/ambient/cave/cave1.ogg": {
                    "hash": "19a772561ec3bd6efbd6d4ed6f64b381a23ba294",
                    "size": 58679
                }
            }
        }))
        .unwrap();
        assert_eq!(index.objects.len(), 1);
        let obj = index
            .objects
            .get("minecraft/sounds/ambient/cave/cave1.ogg")
            .unwrap();
        assert_eq!(obj.size, 58679);
    }
}
