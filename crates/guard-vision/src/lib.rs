//! # Guard Vision - camera and identity adapters for the room guard
//!
//! [`HttpSnapshotCamera`] supplies frames; [`GalleryClassifier`] sends each frame to a
//! face-embedding service and matches every face against the enrolled [`FaceGallery`].

pub mod camera;
pub mod classifier;
pub mod embedder;
pub mod error;
pub mod gallery;

pub use camera::HttpSnapshotCamera;
pub use classifier::GalleryClassifier;
pub use embedder::{FaceEmbedder, HttpFaceEmbedder};
pub use error::{VisionError, VisionResult};
pub use gallery::{FaceGallery, DEFAULT_MATCH_TOLERANCE};
