pub mod dataset_loader;

pub use dataset_loader::{load_dataset, load_dataset_dir, load_dataset_file};
