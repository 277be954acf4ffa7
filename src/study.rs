use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

pub const STUDY_NOT_FOUND_TEXT: &str = "Study not found";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Study {
    pub id: String,
    #[serde(default)]
    pub patient_name: String,
    #[serde(default)]
    pub scan_date: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub comments: String,
    /// Background first, then the segmentation mask.
    #[serde(default)]
    pub volumes: Vec<PathBuf>,
}

impl Study {
    pub fn title(&self) -> String {
        if self.patient_name.is_empty() {
            self.id.clone()
        } else {
            format!("{} ({})", self.patient_name, self.scan_date)
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    study: Vec<Study>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudyCatalog {
    studies: Vec<Study>,
}

impl StudyCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Could not read study catalog {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::parse(&text, base)
            .with_context(|| format!("Invalid study catalog {}", path.display()))
    }

    /// Relative volume paths resolve against `base`.
    pub fn parse(text: &str, base: &Path) -> Result<Self> {
        let file: CatalogFile = toml::from_str(text)?;
        let mut studies: Vec<Study> = Vec::with_capacity(file.study.len());
        for mut study in file.study {
            if study.id.trim().is_empty() {
                bail!("study with an empty id");
            }
            if studies.iter().any(|existing| existing.id == study.id) {
                bail!("duplicate study id {}", study.id);
            }
            for volume in &mut study.volumes {
                if volume.is_relative() {
                    *volume = base.join(&*volume);
                }
            }
            studies.push(study);
        }
        Ok(Self { studies })
    }

    pub fn studies(&self) -> &[Study] {
        &self.studies
    }

    pub fn find(&self, id: &str) -> Option<&Study> {
        self.studies.iter().find(|study| study.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
[[study]]
id = "s-001"
patient_name = "Jane Roe"
scan_date = "2024-03-02"
status = "pending"
kind = "MRI"
priority = "high"
comments = "Follow-up"
volumes = ["brain.nii", "/data/mask.seg.nii"]

[[study]]
id = "s-002"
"#;

    #[test]
    fn find_resolves_volumes_against_catalog_dir() {
        let catalog = StudyCatalog::parse(CATALOG, Path::new("/studies")).expect("catalog should parse");
        let study = catalog.find("s-001").expect("study should exist");
        assert_eq!(study.patient_name, "Jane Roe");
        assert_eq!(
            study.volumes,
            vec![
                PathBuf::from("/studies/brain.nii"),
                PathBuf::from("/data/mask.seg.nii")
            ]
        );
        assert_eq!(study.title(), "Jane Roe (2024-03-02)");

        let bare = catalog.find("s-002").expect("study should exist");
        assert!(bare.volumes.is_empty());
        assert_eq!(bare.title(), "s-002");
        assert!(catalog.find("missing").is_none());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let text = "[[study]]\nid = \"a\"\n[[study]]\nid = \"a\"\n";
        let err = StudyCatalog::parse(text, Path::new("")).expect_err("duplicates should fail");
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("studies.toml");
        assert!(StudyCatalog::load(&path).is_err());

        fs::write(&path, CATALOG).expect("should write catalog");
        let catalog = StudyCatalog::load(&path).expect("catalog should load");
        assert_eq!(catalog.studies().len(), 2);
        assert_eq!(
            catalog.find("s-001").map(|study| study.volumes[0].clone()),
            Some(dir.path().join("brain.nii"))
        );
    }
}
