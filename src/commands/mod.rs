pub mod plan;
pub mod run;

use std::path::PathBuf;

use anyhow::Result;

use crate::manifest::Herd;

/// Load every manifest in a directory into one herd.
///
/// Files are taken in name order so repeated runs see the same herd.
pub(crate) fn load_herd(dir: &str) -> Result<Herd> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml" | "yml")
            )
        })
        .collect();
    files.sort();

    log::debug!("manifest files: {files:?}");

    Ok(Herd::load(&files)?)
}
