//! Client for the face-embedding service.
//!
//! `POST {base_url}/embed` with the raw image as the body. The service answers
//! `{"faces": [{"embedding": [f32, ...]}, ...]}`, one entry per detected face, in the
//! order it found them. No faces is an empty list, not an error.

use crate::error::{VisionError, VisionResult};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::Duration;

/// Image bytes → one embedding per detected face.
pub trait FaceEmbedder: Send + Sync {
    fn embed(&self, image: &[u8], content_type: &str) -> VisionResult<Vec<Vec<f32>>>;
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    faces: Vec<FaceEntry>,
}

#[derive(Debug, Deserialize)]
struct FaceEntry {
    embedding: Vec<f32>,
}

pub struct HttpFaceEmbedder {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpFaceEmbedder {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> VisionResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VisionError::Embedding(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/embed", self.base_url.trim_end_matches('/'))
    }
}

fn parse_faces(body: &str) -> VisionResult<Vec<Vec<f32>>> {
    let parsed: EmbedResponse = serde_json::from_str(body)
        .map_err(|e| VisionError::Embedding(format!("bad response: {}", e)))?;
    Ok(parsed.faces.into_iter().map(|f| f.embedding).collect())
}

impl FaceEmbedder for HttpFaceEmbedder {
    fn embed(&self, image: &[u8], content_type: &str) -> VisionResult<Vec<Vec<f32>>> {
        let res = self
            .client
            .post(self.endpoint())
            .header(CONTENT_TYPE, content_type)
            .body(image.to_vec())
            .send()
            .map_err(|e| VisionError::Embedding(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(VisionError::Embedding(format!("{}: {}", status, body)));
        }
        let body = res.text().map_err(|e| VisionError::Embedding(e.to_string()))?;
        parse_faces(&body)
    }
}
