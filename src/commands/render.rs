//! Command: turn a schema document back into dump text.
use std::path::Path;

use anyhow::{Context as _, Result};

use crate::systemd::render::render_dump;
use crate::systemd::schema::{from_json, tree_from_schema};

/// Read a schema document and render it as dump text.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the document is rejected.
pub fn render_file(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schema: {}", path.display()))?;
    let doc = from_json(&text).with_context(|| format!("failed to load {}", path.display()))?;
    let tree = tree_from_schema(&doc).with_context(|| format!("failed to load {}", path.display()))?;
    Ok(render_dump(&tree))
}

/// Run the render command.
///
/// # Errors
///
/// Returns an error if the schema document cannot be loaded.
pub fn run(schema: &Path) -> Result<()> {
    print!("{}", render_file(schema)?);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::systemd::parser::parse_dump;
    use crate::systemd::schema::{render_schema, to_json};

    #[test]
    fn renders_saved_schema() {
        let dump = "# /etc/systemd/journald.conf\n\n[Journal]\nStorage=persistent\n#Compress=yes\n";
        let json = to_json(&render_schema(&parse_dump(dump).unwrap())).unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("schema.json");
        std::fs::write(&path, json).unwrap();
        assert_eq!(render_file(&path).unwrap(), dump);
    }

    #[test]
    fn rejects_unknown_version() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("schema.json");
        std::fs::write(&path, r#"{"version": 99, "files": []}"#).unwrap();
        let err = render_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("unsupported schema version 99"));
    }
}
