//! Identity classifier backed by the enrollment gallery.

use crate::embedder::FaceEmbedder;
use crate::gallery::FaceGallery;
use guard_core::{Frame, GuardResult, IdentityClassifier, Label};
use tracing::debug;

pub struct GalleryClassifier {
    gallery: FaceGallery,
    embedder: Box<dyn FaceEmbedder>,
    tolerance: f32,
}

impl GalleryClassifier {
    pub fn new(gallery: FaceGallery, embedder: Box<dyn FaceEmbedder>, tolerance: f32) -> Self {
        Self {
            gallery,
            embedder,
            tolerance,
        }
    }

    pub fn gallery(&self) -> &FaceGallery {
        &self.gallery
    }
}

impl IdentityClassifier for GalleryClassifier {
    /// One label per detected face, in detection order.
    fn classify(&self, frame: &Frame) -> GuardResult<Vec<Label>> {
        let faces = self.embedder.embed(&frame.data, &frame.content_type)?;
        let labels: Vec<Label> = faces
            .iter()
            .map(|embedding| self.gallery.identify(embedding, self.tolerance))
            .collect();
        if !labels.is_empty() {
            debug!(?labels, "Faces classified");
        }
        Ok(labels)
    }
}
