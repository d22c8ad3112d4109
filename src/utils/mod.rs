pub mod atomic_io;
pub mod text;

pub use atomic_io::{remove_file_if_exists, write_text_atomic};
pub use text::truncate_to_limit;
