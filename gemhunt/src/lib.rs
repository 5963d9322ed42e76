// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used helpers for convenience
pub use handlers::{
    Credentials, build_image_sources, default_metadata_paths, expand_path,
    load_categories_from_file, parse_list, target_path, walker_config_from_args,
};
