use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;

use anyhow::{bail, Context, Result};
use ndarray::{Array3, Axis, Ix3, ShapeBuilder};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::adapter::VolumeRef;
use crate::segmentation::MaskVolume;

#[derive(Debug, Clone)]
pub struct ScalarVolume {
    pub path: PathBuf,
    pub header: NiftiHeader,
    pub dims: [usize; 3],
    pub spacing: [f32; 3],
    pub min_value: f32,
    pub max_value: f32,
    data: Vec<f32>,
}

impl ScalarVolume {
    pub fn value(&self, x: usize, y: usize, z: usize) -> f32 {
        let [nx, ny, _] = self.dims;
        self.data
            .get(x + nx * (y + ny * z))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn voxel_count(&self) -> usize {
        self.data.len()
    }

    pub fn default_window(&self) -> (f32, f32) {
        let (low, high) = if self.header.cal_max > self.header.cal_min {
            (self.header.cal_min, self.header.cal_max)
        } else {
            (self.min_value, self.max_value)
        };
        ((low + high) / 2.0, (high - low).max(1.0))
    }
}

#[cfg(test)]
impl ScalarVolume {
    pub fn zeros(dims: [usize; 3]) -> Self {
        Self {
            path: PathBuf::from("zeros.nii"),
            header: NiftiHeader::default(),
            dims,
            spacing: [1.0; 3],
            min_value: 0.0,
            max_value: 0.0,
            data: vec![0.0; dims.iter().product()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct OverlayVolume {
    pub path: PathBuf,
    pub mask: MaskVolume,
}

#[derive(Debug, Clone)]
pub struct LoadedVolumes {
    pub background: ScalarVolume,
    pub overlay: Option<OverlayVolume>,
}

impl LoadedVolumes {
    pub fn count(&self) -> usize {
        1 + usize::from(self.overlay.is_some())
    }
}

pub type VolumeLoadMessage = (u64, Result<LoadedVolumes, String>);

pub fn read_volume(path: &Path) -> Result<ScalarVolume> {
    let obj = ReaderOptions::new()
        .read_file(path)
        .with_context(|| format!("Could not read NIfTI file {}", path.display()))?;
    let header = obj.header().clone();
    let data = obj
        .into_volume()
        .into_ndarray::<f32>()
        .with_context(|| format!("Could not decode voxels of {}", path.display()))?;

    let data = match data.ndim() {
        3 => data,
        4 if data.shape()[3] == 1 => data.index_axis_move(Axis(3), 0),
        other => bail!(
            "{} has {other} dimensions (only 3-D volumes are supported)",
            path.display()
        ),
    };
    let data = data.into_dimensionality::<Ix3>()?;
    let (nx, ny, nz) = data.dim();
    if nx == 0 || ny == 0 || nz == 0 {
        bail!("{} has an empty dimension ({nx}x{ny}x{nz})", path.display());
    }

    // Reversing the axes makes logical iteration x-fastest, matching the file layout.
    let flat = data.view().reversed_axes().iter().copied().collect::<Vec<_>>();
    let (min_value, max_value) = flat
        .iter()
        .filter(|value| value.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(low, high), value| {
            (low.min(*value), high.max(*value))
        });
    let (min_value, max_value) = if min_value <= max_value {
        (min_value, max_value)
    } else {
        (0.0, 0.0)
    };
    let spacing = [
        spacing_or_unit(header.pixdim[1]),
        spacing_or_unit(header.pixdim[2]),
        spacing_or_unit(header.pixdim[3]),
    ];

    Ok(ScalarVolume {
        path: path.to_path_buf(),
        header,
        dims: [nx, ny, nz],
        spacing,
        min_value,
        max_value,
        data: flat,
    })
}

pub fn read_overlay(path: &Path, background_dims: [usize; 3]) -> Result<OverlayVolume> {
    let volume = read_volume(path)?;
    if volume.dims != background_dims {
        bail!(
            "{} is {}x{}x{} but the background is {}x{}x{}",
            path.display(),
            volume.dims[0],
            volume.dims[1],
            volume.dims[2],
            background_dims[0],
            background_dims[1],
            background_dims[2]
        );
    }
    let labels = volume
        .data
        .iter()
        .map(|value| if value.is_finite() { value.round() as i32 } else { 0 })
        .collect();
    Ok(OverlayVolume {
        path: volume.path,
        mask: MaskVolume::new(volume.dims, labels)?,
    })
}

pub fn load_volume_set(refs: &[VolumeRef]) -> Result<LoadedVolumes> {
    let Some((first, rest)) = refs.split_first() else {
        bail!("No volumes requested");
    };
    if rest.len() > 1 {
        log::warn!(
            "Only a background and one segmentation are shown; ignoring {} extra volume(s)",
            rest.len() - 1
        );
    }

    let background = read_volume(&first.path)?;
    let overlay = rest
        .first()
        .map(|volume| read_overlay(&volume.path, background.dims))
        .transpose()?;
    Ok(LoadedVolumes {
        background,
        overlay,
    })
}

/// Loads on a worker thread. A closed receiver means the viewer went away;
/// the result is dropped.
pub fn spawn_volume_set_load(generation: u64, refs: Vec<VolumeRef>, tx: Sender<VolumeLoadMessage>) {
    thread::spawn(move || {
        let result = load_volume_set(&refs).map_err(|err| format!("{err:#}"));
        if tx.send((generation, result)).is_err() {
            log::debug!("Volume load {generation} finished after the viewer closed; dropped");
        }
    });
}

/// Writes the mask with the background geometry. A `.gz` suffix compresses.
pub fn write_mask(mask: &MaskVolume, reference: &NiftiHeader, path: &Path) -> Result<()> {
    let [nx, ny, nz] = mask.dims();
    let array = Array3::from_shape_vec((nx, ny, nz).f(), mask.labels().to_vec())?;
    let mut header = reference.clone();
    header.scl_slope = 1.0;
    header.scl_inter = 0.0;
    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(&array)
        .with_context(|| format!("Could not write segmentation {}", path.display()))?;
    Ok(())
}

fn spacing_or_unit(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        1.0
    }
}
