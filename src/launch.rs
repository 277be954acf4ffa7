use std::path::{Path, PathBuf};

use clap::Parser;

use crate::settings::ViewerSettings;

pub const DEFAULT_VOLUME_DIR: &str = "default";
pub const DEFAULT_BACKGROUND_FILE: &str = "brain.nii";
pub const DEFAULT_MASK_FILE: &str = "mask.seg.nii";

#[derive(Debug, Clone, PartialEq, Parser)]
#[command(name = "segview", version, about = "NIfTI viewer with segmentation editing")]
pub struct LaunchArgs {
    /// Background volume, optionally followed by its segmentation mask.
    #[arg(value_name = "VOLUME")]
    pub volumes: Vec<PathBuf>,

    /// Open a study from the catalog by id.
    #[arg(long, value_name = "ID", conflicts_with = "volumes")]
    pub study: Option<String>,

    /// Study catalog (TOML with [[study]] tables).
    #[arg(long, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Scroll down moves toward lower slice numbers.
    #[arg(long)]
    pub invert_scroll: bool,

    /// Slice step per wheel notch, as a fraction of the volume.
    #[arg(long, value_name = "FRACTION", value_parser = parse_step)]
    pub step: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchRequest {
    Volumes(Vec<PathBuf>),
    Study(String),
}

impl LaunchArgs {
    pub fn launch_request(&self) -> Option<LaunchRequest> {
        if let Some(id) = self.study.as_ref() {
            return Some(LaunchRequest::Study(id.clone()));
        }
        if self.volumes.is_empty() {
            return None;
        }
        Some(LaunchRequest::Volumes(self.volumes.clone()))
    }

    /// Flags win over the settings file.
    pub fn apply_to(&self, settings: &mut ViewerSettings) {
        if self.invert_scroll {
            settings.invert_scroll = true;
        }
        if let Some(step) = self.step {
            settings.step_size = step;
        }
        if let Some(catalog) = self.catalog.as_ref() {
            settings.catalog_path = Some(catalog.clone());
        }
    }
}

/// The bundled sample pair under `root`, when the background exists.
pub fn default_launch_request(root: &Path) -> Option<LaunchRequest> {
    let dir = root.join(DEFAULT_VOLUME_DIR);
    let background = dir.join(DEFAULT_BACKGROUND_FILE);
    if !background.is_file() {
        return None;
    }
    let mut volumes = vec![background];
    let mask = dir.join(DEFAULT_MASK_FILE);
    if mask.is_file() {
        volumes.push(mask);
    }
    Some(LaunchRequest::Volumes(volumes))
}

pub fn is_nifti_path(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    name.ends_with(".nii") || name.ends_with(".nii.gz")
}

fn parse_step(value: &str) -> Result<f32, String> {
    let step = value
        .parse::<f32>()
        .map_err(|err| format!("invalid step '{value}': {err}"))?;
    if !step.is_finite() || step <= 0.0 || step > 1.0 {
        return Err(format!("step {step} must be in (0, 1]"));
    }
    Ok(step)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<LaunchArgs, clap::Error> {
        LaunchArgs::try_parse_from(std::iter::once("segview").chain(args.iter().copied()))
    }

    #[test]
    fn positional_paths_open_volumes() {
        let args = parse(&["brain.nii", "mask.seg.nii"]).expect("args should parse");
        assert_eq!(
            args.launch_request(),
            Some(LaunchRequest::Volumes(vec![
                PathBuf::from("brain.nii"),
                PathBuf::from("mask.seg.nii"),
            ]))
        );
        assert_eq!(parse(&[]).expect("args should parse").launch_request(), None);
    }

    #[test]
    fn study_flag_conflicts_with_paths() {
        let args = parse(&["--study", "s-001"]).expect("args should parse");
        assert_eq!(
            args.launch_request(),
            Some(LaunchRequest::Study("s-001".to_string()))
        );
        assert!(parse(&["--study", "s-001", "brain.nii"]).is_err());
    }

    #[test]
    fn step_must_be_a_fraction() {
        assert!(parse(&["--step", "0"]).is_err());
        assert!(parse(&["--step", "2"]).is_err());
        assert!(parse(&["--step", "abc"]).is_err());
        let args = parse(&["--step", "0.1"]).expect("args should parse");
        assert_eq!(args.step, Some(0.1));
    }

    #[test]
    fn flags_override_settings() {
        let args = parse(&["--invert-scroll", "--step", "0.2", "--catalog", "studies.toml"])
            .expect("args should parse");
        let mut settings = ViewerSettings::default();
        args.apply_to(&mut settings);
        assert!(settings.invert_scroll);
        assert_eq!(settings.step_size, 0.2);
        assert_eq!(settings.catalog_path, Some(PathBuf::from("studies.toml")));

        let mut untouched = ViewerSettings {
            invert_scroll: true,
            ..ViewerSettings::default()
        };
        parse(&[]).expect("args should parse").apply_to(&mut untouched);
        assert!(untouched.invert_scroll);
    }

    #[test]
    fn default_volumes_need_background_file() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        assert_eq!(default_launch_request(dir.path()), None);

        let default_dir = dir.path().join(DEFAULT_VOLUME_DIR);
        std::fs::create_dir_all(&default_dir).expect("should create default dir");
        std::fs::write(default_dir.join(DEFAULT_BACKGROUND_FILE), b"").expect("should write");
        assert_eq!(
            default_launch_request(dir.path()),
            Some(LaunchRequest::Volumes(vec![default_dir.join(DEFAULT_BACKGROUND_FILE)]))
        );

        std::fs::write(default_dir.join(DEFAULT_MASK_FILE), b"").expect("should write");
        assert_eq!(
            default_launch_request(dir.path()),
            Some(LaunchRequest::Volumes(vec![
                default_dir.join(DEFAULT_BACKGROUND_FILE),
                default_dir.join(DEFAULT_MASK_FILE),
            ]))
        );
    }

    #[test]
    fn nifti_paths_are_recognised() {
        assert!(is_nifti_path(Path::new("a/brain.nii")));
        assert!(is_nifti_path(Path::new("SEG.NII.GZ")));
        assert!(!is_nifti_path(Path::new("scan.dcm")));
        assert!(!is_nifti_path(Path::new("")));
    }
}
