use crate::classification::domain::age_classifier::AgeClassifier;
use crate::classification::domain::classification::Classification;
use crate::classification::domain::gender_classifier::GenderClassifier;
use crate::detection::domain::face_region::FaceRegion;
use crate::shared::error::ClassificationError;
use crate::shared::frame::Frame;

/// Runs both classifiers over the faces of one frame.
///
/// Faces are independent, so a frame with several faces is fanned out over
/// at most `workers` scoped threads. Results always come back in the order
/// of the input faces, whatever order the workers finish in.
///
/// Parallelism is bounded by the classifiers too: a classifier that
/// serializes its calls (one ONNX session behind a lock) runs one face at a
/// time. Give the ONNX classifiers as many sessions as workers with
/// `with_sessions` to avoid that.
pub struct FaceClassifier {
    age: Box<dyn AgeClassifier>,
    gender: Box<dyn GenderClassifier>,
    workers: usize,
}

impl FaceClassifier {
    pub fn new(
        age: Box<dyn AgeClassifier>,
        gender: Box<dyn GenderClassifier>,
        workers: usize,
    ) -> Self {
        Self {
            age,
            gender,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Classifies one face. Pure with respect to `self`: nothing is
    /// remembered between calls.
    pub fn classify_face(
        &self,
        face: &FaceRegion,
        context: &Frame,
    ) -> Result<Classification, ClassificationError> {
        if face.crop().is_empty() {
            return Err(ClassificationError::EmptyCrop);
        }
        let age = self.age.predict(face.crop(), context)?;
        let gender = self.gender.predict(face.crop(), context)?;
        Ok(Classification::new(age, gender))
    }

    /// Classifies every face; element `i` of the result belongs to
    /// `faces[i]`.
    pub fn classify_all(
        &self,
        faces: &[FaceRegion],
        context: &Frame,
    ) -> Vec<Result<Classification, ClassificationError>> {
        let pool = self.workers.min(faces.len());
        if pool <= 1 {
            return faces
                .iter()
                .map(|face| self.classify_face(face, context))
                .collect();
        }

        let (job_tx, job_rx) = crossbeam_channel::bounded::<usize>(faces.len());
        let (result_tx, result_rx) = crossbeam_channel::bounded(faces.len());
        for index in 0..faces.len() {
            // Capacity equals the job count, so this never blocks.
            let _ = job_tx.send(index);
        }
        drop(job_tx);

        std::thread::scope(|scope| {
            for _ in 0..pool {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for index in job_rx {
                        let result = self.classify_face(&faces[index], context);
                        if result_tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut slots: Vec<Option<Result<Classification, ClassificationError>>> =
            (0..faces.len()).map(|_| None).collect();
        for (index, result) in result_rx {
            slots[index] = Some(result);
        }
        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(ClassificationError::Inference(
                        "classification worker exited early".into(),
                    ))
                })
            })
            .collect()
    }
}
