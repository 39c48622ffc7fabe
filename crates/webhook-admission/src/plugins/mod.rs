//! Admission plugins that do not call webhooks.

mod protect_annotation;

pub use protect_annotation::ProtectAnnotation;
