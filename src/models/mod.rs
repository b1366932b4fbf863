//! Model loading and inference

pub mod classifier;
pub mod onnx;

pub use classifier::{Classifier, Prediction};
pub use onnx::OnnxClassifier;
