pub mod buffer;
pub mod color;
pub mod edge_detect;
pub mod exif_orientation;
pub mod flood_fill;
pub mod history;
pub mod pipeline;
pub mod preprocess;
pub mod session;
pub mod source;
pub mod surface;

pub use buffer::{BufferError, PixelBuffer};
pub use color::{Color, ParseColorError};
pub use flood_fill::{flood_fill, FillError, FillReport};
pub use history::{History, Snapshot, DEFAULT_HISTORY_CAPACITY};
pub use pipeline::{generate_line_art, Bitmap, CancelFlag, LineArtParams, ProcessingError};
pub use session::{Session, SessionError, Tool, ToolState};
pub use source::{FetchError, ImageSource};
pub use surface::{DrawingSurface, RasterSurface, SurfaceError};

#[cfg(feature = "directory-source")]
pub use source::DirectorySource;
