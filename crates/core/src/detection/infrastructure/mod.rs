pub mod cascade_face_detector;
pub mod cascade_loader;
mod math;
