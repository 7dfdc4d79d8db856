mod download;
mod filename;
mod quality;

pub use download::{FetchOutcome, PARTIAL_SUFFIX, download_file, partial_path};
pub use filename::{
    VIDEO_EXTENSION, generate_dirname, generate_filename, generate_name, local_date,
    sanitize_title,
};
pub use quality::{Quality, QualityVariant, UnknownQuality, select_url};
