pub mod error;
pub mod quality;
pub mod options;
pub mod record;
pub mod compression;
pub mod config;
pub mod sniff;
pub mod stream;
pub mod plugin;
pub mod registry;
pub mod pipeline;
pub mod facade;
pub mod formats;

pub use error::{IoError, Result};
pub use quality::{QualityVariant, guess_variant};
pub use options::{OptionSpec, OptionValue, Options};
pub use record::{DistanceMatrix, Record, SequenceRecord, TreeRecord};
pub use compression::Compression;
pub use config::IoConfig;
pub use sniff::EMPTY_FILE_MARKER;
pub use stream::{Destination, RecordStream, RecordWriter, SharedBuffer, Source, WriteSummary};
pub use plugin::{FormatPlugin, SniffVerdict};
pub use registry::{IoWarning, ReadRequest, Registry, WriteRequest};
pub use pipeline::{convert, convert_many, ConvertJob, ConvertSummary};
pub use facade::IoObject;
pub use formats::default_registry;

/// Crate version, as reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
