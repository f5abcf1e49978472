pub mod onnx_age_classifier;
pub mod onnx_classifier_session;
pub mod onnx_gender_classifier;
