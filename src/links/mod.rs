//! Link registry and URL templates

pub mod registry;
pub mod template;

pub use registry::{LinkContext, LinkRegistry, LinkRegistryBuilder, RELATION_PARAM, SELF_RELATION};
pub use template::LinkTemplate;
