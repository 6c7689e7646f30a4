//! Enrolled identities and nearest-neighbour matching.
//!
//! Layout on disk: one subdirectory per person, named after them, holding one or more
//! photos. Each photo contributes the first face the embedder finds in it.
//!
//! ```text
//! data/faces/
//!   alice/  front.jpg  side.png
//!   bob/    bob.jpg
//! ```

use crate::embedder::FaceEmbedder;
use crate::error::{VisionError, VisionResult};
use guard_core::Label;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Euclidean distance at or under which two embeddings are the same person.
pub const DEFAULT_MATCH_TOLERANCE: f32 = 0.6;

#[derive(Debug, Clone)]
struct Enrollment {
    name: String,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct FaceGallery {
    entries: Vec<Enrollment>,
}

fn image_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "bmp" => Some("image/bmp"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

impl FaceGallery {
    /// Enroll every person directory under `dir`.
    ///
    /// A missing directory is an error. Unreadable photos, photos with no face, and
    /// embedder failures are skipped with a warning.
    pub fn enroll(dir: &Path, embedder: &dyn FaceEmbedder) -> VisionResult<Self> {
        if !dir.is_dir() {
            return Err(VisionError::Enrollment(format!(
                "faces directory {} does not exist",
                dir.display()
            )));
        }
        info!(dir = %dir.display(), "Enrolling known faces");

        let mut gallery = Self::default();
        let people = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir());

        for person in people {
            let name = person.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let photos = WalkDir::new(person.path())
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file());

            for photo in photos {
                let path = photo.path();
                let Some(content_type) = image_content_type(path) else {
                    debug!(path = %path.display(), "Not an image, skipped");
                    continue;
                };
                let bytes = match std::fs::read(path) {
                    Ok(b) => b,
                    Err(e) => {
                        warn!(path = %path.display(), "Unreadable photo: {}", e);
                        continue;
                    }
                };
                match embedder.embed(&bytes, content_type) {
                    Ok(faces) => match faces.into_iter().next() {
                        Some(embedding) => {
                            info!(%name, file = %photo.file_name().to_string_lossy(), "Enrolled");
                            gallery.add(name.clone(), embedding);
                        }
                        None => warn!(path = %path.display(), "No face found, skipped"),
                    },
                    Err(e) => warn!(path = %path.display(), "Face service failed: {}", e),
                }
            }
        }

        if gallery.is_empty() {
            warn!("No faces enrolled; every visitor will be treated as unknown");
        } else {
            info!(count = gallery.len(), people = gallery.names().len(), "Faces enrolled");
        }
        Ok(gallery)
    }

    pub fn add(&mut self, name: impl Into<String>, embedding: Vec<f32>) {
        self.entries.push(Enrollment {
            name: name.into(),
            embedding,
        });
    }

    /// Number of enrolled embeddings (a person may have several).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct enrolled names, in enrollment order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for e in &self.entries {
            if !names.contains(&e.name.as_str()) {
                names.push(&e.name);
            }
        }
        names
    }

    /// Closest enrolled embedding and its distance. Ties keep the earliest enrollment.
    /// Non-finite distances (NaN components, mismatched dimensions) are never candidates.
    pub fn nearest(&self, embedding: &[f32]) -> Option<(&str, f32)> {
        let mut best: Option<(&str, f32)> = None;
        for e in &self.entries {
            let d = euclidean(&e.embedding, embedding);
            if !d.is_finite() {
                continue;
            }
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((&e.name, d));
            }
        }
        best
    }

    /// Known when the nearest enrollment is within `tolerance` (inclusive), else Unknown.
    pub fn identify(&self, embedding: &[f32], tolerance: f32) -> Label {
        match self.nearest(embedding) {
            Some((name, d)) if d <= tolerance => Label::known(name),
            _ => Label::Unknown,
        }
    }
}
