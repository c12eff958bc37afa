pub mod ai_client;
pub mod db;
pub mod error;
pub mod export;
pub mod flatten;
pub mod hierarchy;
pub mod layout;
pub mod pdf_extractor;
pub mod service;
pub mod settings;
pub mod utils;

pub use error::{CogmapError, Result};
pub use flatten::{flatten, FlatRow};
pub use hierarchy::{build_hierarchy, build_hierarchy_with_report, FlatNode, TreeNode};
pub use layout::{layout, LayoutConfig, TreeLayout};
pub use service::MindMapService;
