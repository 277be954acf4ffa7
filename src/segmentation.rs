use crate::adapter::RenderSurface;
use crate::error::{Result, ViewerError};
use crate::state::EditAction;

/// Size of the NIfTI-1 preamble (348-byte header plus the 4-byte extension
/// flag) that precedes voxel data in an edit buffer. Voxel `i` is always at
/// `EDIT_BUFFER_HEADER_BYTES + i`.
pub const EDIT_BUFFER_HEADER_BYTES: usize = 352;

const NIFTI1_HEADER_SIZE: i32 = 348;
const NIFTI1_MAGIC_OFFSET: usize = 344;
const NIFTI1_MAGIC: &[u8; 4] = b"n+1\0";

/// Label written by an append.
pub const MASK_LABEL: i32 = 1;

/// Segmentation labels, one per voxel, stored x-fastest like the NIfTI data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskVolume {
    dims: [usize; 3],
    labels: Vec<i32>,
}

impl MaskVolume {
    pub fn new(dims: [usize; 3], labels: Vec<i32>) -> Result<Self> {
        let expected = voxel_count(dims);
        if labels.len() != expected {
            return Err(ViewerError::invalid(format!(
                "mask has {} labels but dimensions {}x{}x{} need {expected}",
                labels.len(),
                dims[0],
                dims[1],
                dims[2]
            )));
        }
        Ok(Self { dims, labels })
    }

    #[cfg(test)]
    pub fn zeros(dims: [usize; 3]) -> Self {
        Self {
            dims,
            labels: vec![0; voxel_count(dims)],
        }
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn voxel_count(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    fn linear_index(&self, x: usize, y: usize, z: usize) -> Option<usize> {
        let [nx, ny, nz] = self.dims;
        if x >= nx || y >= ny || z >= nz {
            return None;
        }
        Some(x + nx * (y + ny * z))
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<i32> {
        self.linear_index(x, y, z).map(|index| self.labels[index])
    }

    pub fn labelled_count(&self) -> usize {
        self.labels.iter().filter(|label| **label != 0).count()
    }
}

/// Transient per-voxel stroke flags produced by the draw surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBuffer {
    bytes: Vec<u8>,
}

impl EditBuffer {
    pub fn blank(voxel_count: usize) -> Self {
        let mut bytes = vec![0u8; EDIT_BUFFER_HEADER_BYTES + voxel_count];
        bytes[..4].copy_from_slice(&NIFTI1_HEADER_SIZE.to_le_bytes());
        bytes[NIFTI1_MAGIC_OFFSET..NIFTI1_MAGIC_OFFSET + 4].copy_from_slice(NIFTI1_MAGIC);
        Self { bytes }
    }

    #[cfg(test)]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[cfg(test)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn voxel_count(&self) -> usize {
        self.bytes.len().saturating_sub(EDIT_BUFFER_HEADER_BYTES)
    }

    pub fn voxels(&self) -> &[u8] {
        self.bytes.get(EDIT_BUFFER_HEADER_BYTES..).unwrap_or_default()
    }

    pub fn flag(&self, voxel: usize) -> u8 {
        self.bytes
            .get(EDIT_BUFFER_HEADER_BYTES + voxel)
            .copied()
            .unwrap_or(0)
    }

    pub fn set_flag(&mut self, voxel: usize, value: u8) -> bool {
        match self.bytes.get_mut(EDIT_BUFFER_HEADER_BYTES + voxel) {
            Some(slot) if *slot != value => {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    pub fn marked_count(&self) -> usize {
        self.voxels().iter().filter(|flag| **flag > 0).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Discarded,
    NothingToUndo,
    Committed { action: EditAction, changed: usize },
}

/// Union: every marked voxel becomes `MASK_LABEL`.
pub fn append(mask: &mut MaskVolume, buffer: &EditBuffer) -> Result<usize> {
    write_marked(mask, buffer, MASK_LABEL)
}

/// Subtraction: every marked voxel becomes background.
pub fn remove(mask: &mut MaskVolume, buffer: &EditBuffer) -> Result<usize> {
    write_marked(mask, buffer, 0)
}

fn write_marked(mask: &mut MaskVolume, buffer: &EditBuffer, label: i32) -> Result<usize> {
    if buffer.voxel_count() != mask.voxel_count() {
        return Err(ViewerError::EditBufferMismatch {
            expected: mask.voxel_count(),
            actual: buffer.voxel_count(),
        });
    }

    let mut changed = 0;
    for (slot, flag) in mask.labels.iter_mut().zip(buffer.voxels()) {
        if *flag > 0 && *slot != label {
            *slot = label;
            changed += 1;
        }
    }
    Ok(changed)
}

/// Runs one edit-action selection against the surface. Undo drops the pending
/// strokes; append and remove fold them into the mask and close the drawing.
pub fn apply_edit_action<S: RenderSurface + ?Sized>(
    surface: &mut S,
    action: EditAction,
    pen_ever_enabled: bool,
) -> Result<EditOutcome> {
    match action {
        EditAction::None | EditAction::Undo => {
            if !surface.has_edit_buffer() {
                return Ok(EditOutcome::NothingToUndo);
            }
            surface.discard_edit();
            surface.redraw();
            Ok(EditOutcome::Discarded)
        }
        EditAction::Append | EditAction::Remove => {
            // The current mask is replaced when a pending load lands.
            if surface.is_loading() || surface.volume_count() < 2 {
                return Err(ViewerError::NoSegmentationLoaded);
            }
            if !pen_ever_enabled {
                return Err(ViewerError::NoActivePen);
            }
            let buffer = surface.edit_buffer().ok_or(ViewerError::NoActivePen)?;
            log::debug!(
                "{} of {} marked voxel(s)",
                action.label(),
                buffer.marked_count()
            );
            let mask = surface
                .mask_volume_mut()
                .ok_or(ViewerError::NoSegmentationLoaded)?;
            let changed = if action == EditAction::Append {
                append(mask, &buffer)?
            } else {
                remove(mask, &buffer)?
            };

            surface.discard_edit();
            surface.redraw();
            surface.set_pen_enabled(false);
            Ok(EditOutcome::Committed { action, changed })
        }
    }
}

fn voxel_count(dims: [usize; 3]) -> usize {
    dims[0].saturating_mul(dims[1]).saturating_mul(dims[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::VolumeRef;
    use crate::testing::{FakeSurface, SurfaceCall};

    fn buffer_marking(voxel_count: usize, marked: &[usize]) -> EditBuffer {
        let mut buffer = EditBuffer::blank(voxel_count);
        for voxel in marked {
            buffer.set_flag(*voxel, 2);
        }
        buffer
    }

    #[test]
    fn blank_buffer_carries_nifti_preamble() {
        let buffer = EditBuffer::blank(8);
        assert_eq!(buffer.as_bytes().len(), EDIT_BUFFER_HEADER_BYTES + 8);
        assert_eq!(&buffer.as_bytes()[..4], &348i32.to_le_bytes());
        assert_eq!(&buffer.as_bytes()[344..348], b"n+1\0");
        assert_eq!(buffer.voxel_count(), 8);
        assert_eq!(buffer.marked_count(), 0);
    }

    #[test]
    fn flags_are_read_after_the_header() {
        let mut bytes = vec![9u8; EDIT_BUFFER_HEADER_BYTES];
        bytes.extend_from_slice(&[0, 1, 0, 5]);
        let buffer = EditBuffer::from_bytes(bytes);
        let mut mask = MaskVolume::zeros([2, 2, 1]);

        let changed = append(&mut mask, &buffer).expect("append should succeed");
        assert_eq!(changed, 2);
        assert_eq!(mask.labels(), &[0, 1, 0, 1]);
    }

    #[test]
    fn append_unions_and_is_idempotent() {
        let mut mask = MaskVolume::new([3, 2, 1], vec![0, 1, 0, 0, 7, 0]).expect("valid mask");
        let buffer = buffer_marking(6, &[0, 1, 3]);

        append(&mut mask, &buffer).expect("first append should succeed");
        let once = mask.clone();
        let changed = append(&mut mask, &buffer).expect("second append should succeed");

        assert_eq!(changed, 0);
        assert_eq!(mask, once);
        assert_eq!(mask.labels(), &[1, 1, 0, 1, 7, 0]);
    }

    #[test]
    fn remove_subtracts_regardless_of_prior_label() {
        let mut mask = MaskVolume::new([3, 2, 1], vec![1, 1, 0, 3, 1, 0]).expect("valid mask");
        let buffer = buffer_marking(6, &[0, 2, 3]);

        let changed = remove(&mut mask, &buffer).expect("remove should succeed");
        assert_eq!(changed, 2);
        assert_eq!(mask.labels(), &[0, 1, 0, 0, 1, 0]);
    }

    #[test]
    fn remove_inverts_append_on_disjoint_voxels() {
        let original = MaskVolume::new([2, 2, 2], vec![1, 0, 0, 0, 0, 1, 0, 0]).expect("valid mask");
        let buffer = buffer_marking(8, &[1, 2, 6]);

        let mut mask = original.clone();
        append(&mut mask, &buffer).expect("append should succeed");
        assert_eq!(mask.labelled_count(), 5);
        remove(&mut mask, &buffer).expect("remove should succeed");
        assert_eq!(mask, original);
    }

    #[test]
    fn mismatched_buffer_leaves_mask_untouched() {
        let mut mask = MaskVolume::zeros([2, 2, 2]);
        let buffer = buffer_marking(7, &[0, 1]);

        let err = append(&mut mask, &buffer).expect_err("short buffer should be rejected");
        assert_eq!(
            err,
            ViewerError::EditBufferMismatch {
                expected: 8,
                actual: 7
            }
        );
        assert_eq!(mask.labelled_count(), 0);
    }

    #[test]
    fn mask_indexing_is_x_fastest() {
        let mask = MaskVolume::new([2, 3, 2], (0..12).collect()).expect("valid mask");
        assert_eq!(mask.get(1, 0, 0), Some(1));
        assert_eq!(mask.get(0, 1, 0), Some(2));
        assert_eq!(mask.get(0, 0, 1), Some(6));
        assert_eq!(mask.get(2, 0, 0), None);
        assert!(MaskVolume::new([2, 2, 2], vec![0; 7]).is_err());
    }

    #[test]
    fn undo_discards_buffer_without_touching_mask() {
        let mut surface = FakeSurface::with_volumes([2, 2, 1], 2);
        surface.set_edit_buffer(buffer_marking(4, &[0, 3]));
        let before = surface.mask.clone();

        let outcome = apply_edit_action(&mut surface, EditAction::Undo, true)
            .expect("undo should succeed");
        assert_eq!(outcome, EditOutcome::Discarded);
        assert!(!surface.has_edit_buffer());
        assert_eq!(surface.mask, before);

        let outcome = apply_edit_action(&mut surface, EditAction::Undo, false)
            .expect("undo without buffer should succeed");
        assert_eq!(outcome, EditOutcome::NothingToUndo);
        assert_eq!(surface.mask, before);
    }

    #[test]
    fn append_with_single_volume_reports_missing_segmentation() {
        let mut surface = FakeSurface::with_volumes([2, 2, 1], 1);
        surface.set_edit_buffer(buffer_marking(4, &[0]));

        let err = apply_edit_action(&mut surface, EditAction::Append, true)
            .expect_err("append without mask should fail");
        assert_eq!(err, ViewerError::NoSegmentationLoaded);
        assert!(surface.has_edit_buffer());
        assert!(!surface.calls.contains(&SurfaceCall::DiscardEdit));
    }

    #[test]
    fn append_while_loading_reports_missing_segmentation() {
        let mut surface = FakeSurface::with_volumes([2, 2, 1], 2);
        surface
            .load_volumes(&[VolumeRef::new("brain.nii"), VolumeRef::new("mask.seg.nii")])
            .expect("load should start");
        surface.set_edit_buffer(buffer_marking(4, &[0, 1]));

        let err = apply_edit_action(&mut surface, EditAction::Remove, true)
            .expect_err("remove during a load should fail");
        assert_eq!(err, ViewerError::NoSegmentationLoaded);
        assert!(surface.has_edit_buffer());
        assert_eq!(surface.mask.as_ref().map(MaskVolume::labelled_count), Some(0));
    }

    #[test]
    fn append_without_pen_reports_missing_drawing() {
        let mut surface = FakeSurface::with_volumes([2, 2, 1], 2);

        let err = apply_edit_action(&mut surface, EditAction::Remove, false)
            .expect_err("remove without pen should fail");
        assert_eq!(err, ViewerError::NoActivePen);

        let err = apply_edit_action(&mut surface, EditAction::Remove, true)
            .expect_err("remove without buffer should fail");
        assert_eq!(err, ViewerError::NoActivePen);
    }

    #[test]
    fn commit_closes_drawing_on_surface() {
        let mut surface = FakeSurface::with_volumes([2, 2, 1], 2);
        surface.set_edit_buffer(buffer_marking(4, &[1, 2]));

        let outcome = apply_edit_action(&mut surface, EditAction::Append, true)
            .expect("append should succeed");
        assert_eq!(
            outcome,
            EditOutcome::Committed {
                action: EditAction::Append,
                changed: 2
            }
        );
        let mask = surface.mask.as_ref().expect("fake mask should exist");
        assert_eq!(mask.labels(), &[0, 1, 1, 0]);
        assert!(!surface.has_edit_buffer());
        assert!(surface.calls.ends_with(&[
            SurfaceCall::DiscardEdit,
            SurfaceCall::Redraw,
            SurfaceCall::PenEnabled(false),
        ]));
    }
}
