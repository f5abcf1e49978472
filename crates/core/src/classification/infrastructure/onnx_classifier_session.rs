//! Shared ONNX Runtime plumbing for the Caffe-derived age and gender
//! GoogLeNet models.
//!
//! Both models take a `[1, 3, H, W]` BGR tensor with per-channel mean
//! subtraction and emit one score per class.
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::shared::error::ClassificationError;
use crate::shared::frame::Frame;

/// Fallback input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: usize = 224;

/// Per-channel means in B, G, R order.
const BGR_MEAN: [f32; 3] = [104.0, 117.0, 123.0];

/// Return the preferred ONNX execution providers for the current platform.
///
/// Falls back to CPU if the platform-specific provider is unavailable.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Sessions that can each serve one inference at a time.
///
/// A caller takes the first free slot, starting from a rotating index, and
/// only blocks when every slot is busy.
pub(crate) struct SessionPool<T> {
    slots: Vec<Mutex<T>>,
    next: AtomicUsize,
}

impl<T> SessionPool<T> {
    pub(crate) fn new(sessions: Vec<T>) -> Self {
        Self {
            slots: sessions.into_iter().map(Mutex::new).collect(),
            next: AtomicUsize::new(0),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, ClassificationError> {
        let n = self.slots.len();
        if n == 0 {
            return Err(ClassificationError::Inference("no model sessions loaded".into()));
        }
        let start = self.next.fetch_add(1, Ordering::Relaxed);
        for i in 0..n {
            if let Ok(mut session) = self.slots[(start + i) % n].try_lock() {
                return Ok(f(&mut session));
            }
        }
        let mut session = self.slots[start % n]
            .lock()
            .map_err(|e| ClassificationError::Inference(format!("Lock poisoned: {e}")))?;
        Ok(f(&mut session))
    }
}

/// A classification model loaded into one or more ONNX Runtime sessions.
///
/// `run` needs `&mut Session`, so each session serves one face at a time.
/// Loading as many sessions as there are classification workers lets faces
/// of the same frame run in parallel, at the cost of one model copy each.
pub struct OnnxClassifierSession {
    sessions: SessionPool<ort::session::Session>,
    input_size: usize,
}

impl OnnxClassifierSession {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_sessions(model_path, 1)
    }

    pub fn with_sessions(model_path: &Path, count: usize) -> Result<Self, Box<dyn std::error::Error>> {
        let sessions = (0..count.max(1))
            .map(|_| build_session(model_path))
            .collect::<Result<Vec<_>, _>>()?;

        // NCHW: [1, 3, H, W]
        let input_size = sessions[0]
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as usize)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        let sessions = SessionPool::new(sessions);
        log::info!(
            "Loaded classifier {} ({}x{} input, {} session(s))",
            model_path.display(),
            input_size,
            input_size,
            sessions.len()
        );

        Ok(Self { sessions, input_size })
    }

    /// Runs the model on one face crop and returns its raw class scores.
    pub fn scores(&self, face: &Frame) -> Result<Vec<f32>, ClassificationError> {
        let tensor = preprocess(face, self.input_size)?;
        let input_value = ort::value::Tensor::from_array(tensor)
            .map_err(|e| ClassificationError::Inference(e.to_string()))?;

        self.sessions.with(|session| -> Result<Vec<f32>, ClassificationError> {
            let outputs = session
                .run(ort::inputs![input_value])
                .map_err(|e| ClassificationError::Inference(e.to_string()))?;
            if outputs.len() == 0 {
                return Err(ClassificationError::Inference(
                    "model produced no outputs".into(),
                ));
            }
            let scores = outputs[0]
                .try_extract_array::<f32>()
                .map_err(|e| ClassificationError::Inference(e.to_string()))?;
            Ok(scores.iter().copied().collect())
        })?
    }
}

fn build_session(model_path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    Ok(ort::session::Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_inter_threads(1)?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(model_path)?)
}

/// Nearest-neighbour resize to `size` x `size`, BGR mean-subtracted, NCHW.
pub(crate) fn preprocess(
    face: &Frame,
    size: usize,
) -> Result<ndarray::Array4<f32>, ClassificationError> {
    if face.is_empty() {
        return Err(ClassificationError::EmptyCrop);
    }
    let src_w = face.width() as usize;
    let src_h = face.height() as usize;
    let channels = face.channels() as usize;
    if !matches!(channels, 1 | 3 | 4) {
        return Err(ClassificationError::Inference(format!(
            "unsupported crop layout: {channels} channels"
        )));
    }
    let data = face.data();

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / size as f64) as usize).min(src_h - 1);
        for x in 0..size {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / size as f64) as usize).min(src_w - 1);
            let offset = (src_y * src_w + src_x) * channels;
            let (r, g, b) = if channels == 1 {
                (data[offset], data[offset], data[offset])
            } else {
                (data[offset], data[offset + 1], data[offset + 2])
            };
            tensor[[0, 0, y, x]] = b as f32 - BGR_MEAN[0];
            tensor[[0, 1, y, x]] = g as f32 - BGR_MEAN[1];
            tensor[[0, 2, y, x]] = r as f32 - BGR_MEAN[2];
        }
    }
    Ok(tensor)
}

/// Index of the highest score. Ties go to the lowest index.
pub(crate) fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
}
