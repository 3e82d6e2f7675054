//! Format registry: explicit plugin catalog plus read/write/sniff dispatch.
//!
//! A [`Registry`] is built once, then shared by reference.  It owns every
//! registered plugin and the [`IoConfig`] that governs sniffing, option
//! defaults and output compression.
//!
//! ```no_run
//! use bioreg::formats::default_registry;
//! use bioreg::registry::{ReadRequest, WriteRequest};
//!
//! let registry = default_registry();
//! let stream = registry.read("reads.fastq", ReadRequest::new())?;
//! registry.write_stream(stream, "reads.fasta", "fasta", WriteRequest::new())?;
//! # Ok::<(), bioreg::error::IoError>(())
//! ```

use std::fmt;

use tracing::{debug, warn};

use crate::compression::{decompress, Compression, CompressedWriter};
use crate::config::IoConfig;
use crate::error::{IoError, Result};
use crate::options::{resolve, OptionSpec, OptionValue, Options};
use crate::plugin::FormatPlugin;
use crate::record::Record;
use crate::sniff::{capture, SniffResult, SnifferEngine};
use crate::stream::{
    AuxChannels, Destination, Input, Output, RecordStream, RecordWriter, Source, WriteSummary,
};

// ── Warnings ─────────────────────────────────────────────────────────────────

/// Non-fatal condition raised while opening a reader.
#[derive(Debug, Clone, PartialEq)]
pub enum IoWarning {
    /// The caller's value replaced a different sniffer recommendation.
    ArgumentOverride {
        format:      &'static str,
        option:      String,
        user:        OptionValue,
        recommended: OptionValue,
    },
    /// The requested format's sniffer did not recognise the input.
    FormatMismatch { format: &'static str, input: String },
}

impl IoWarning {
    fn emit(&self) {
        warn!(warning = %self, "format io warning");
    }
}

impl fmt::Display for IoWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoWarning::ArgumentOverride { format, option, user, recommended } => write!(
                f,
                "{format}: best guess for '{option}' is {recommended}, using {user} as requested"
            ),
            IoWarning::FormatMismatch { format, input } => {
                write!(f, "{input} does not look like {format}; reading it as {format} anyway")
            }
        }
    }
}

// ── Requests ─────────────────────────────────────────────────────────────────

/// Parameters of [`Registry::read`].
#[derive(Debug, Default)]
pub struct ReadRequest {
    /// Format to read as; `None` sniffs.
    pub format:      Option<String>,
    pub options:     Options,
    /// Run the named format's sniffer to fill unset options.  `None` takes
    /// [`IoConfig::verify`].  Ignored when `format` is `None`.
    pub verify:      Option<bool>,
    /// Auxiliary inputs keyed by channel name.
    pub aux:         Vec<(String, Source)>,
    /// `None` auto-detects zstd and lz4 frames.
    pub compression: Option<Compression>,
}

impl ReadRequest {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    #[must_use]
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn option(mut self, name: &str, value: impl Into<OptionValue>) -> Self {
        self.options.insert(name, value);
        self
    }

    #[must_use]
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = Some(verify);
        self
    }

    #[must_use]
    pub fn aux(mut self, channel: impl Into<String>, source: impl Into<Source>) -> Self {
        self.aux.push((channel.into(), source.into()));
        self
    }

    #[must_use]
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }
}

/// Parameters of [`Registry::write`] and [`Registry::open_writer`].
#[derive(Debug, Default)]
pub struct WriteRequest {
    pub options:     Options,
    /// Auxiliary outputs keyed by channel name.
    pub aux:         Vec<(String, Destination)>,
    /// `None` takes [`IoConfig::write_compression`].
    pub compression: Option<Compression>,
}

impl WriteRequest {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn option(mut self, name: &str, value: impl Into<OptionValue>) -> Self {
        self.options.insert(name, value);
        self
    }

    #[must_use]
    pub fn aux(mut self, channel: impl Into<String>, destination: impl Into<Destination>) -> Self {
        self.aux.push((channel.into(), destination.into()));
        self
    }

    #[must_use]
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }
}

/// Listing entry for one registered plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatInfo {
    pub name:         &'static str,
    pub description:  &'static str,
    pub options:      Vec<OptionSpec>,
    pub aux_channels: &'static [&'static str],
    pub can_read:     bool,
    pub can_write:    bool,
}

// ── Registry ─────────────────────────────────────────────────────────────────

pub struct Registry {
    plugins: Vec<Box<dyn FormatPlugin>>,
    config:  IoConfig,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Empty registry with the default configuration.
    pub fn new() -> Self {
        Self::with_config(IoConfig::default())
    }

    pub fn with_config(config: IoConfig) -> Self {
        Self { plugins: Vec::new(), config }
    }

    pub fn config(&self) -> &IoConfig {
        &self.config
    }

    /// Add a plugin.  Names are unique case-insensitively, and configured
    /// defaults for the format must name options the plugin declares.
    pub fn register<P: FormatPlugin + 'static>(&mut self, plugin: P) -> Result<()> {
        if self.find(plugin.name()).is_some() {
            return Err(IoError::DuplicateFormat(plugin.name().to_owned()));
        }
        if let Some(defaults) = self.config.defaults_for(plugin.name()) {
            defaults
                .validate(plugin.name(), &plugin.option_specs())
                .map_err(|e| IoError::Config(format!("format_defaults.{}: {e}", plugin.name())))?;
        }
        debug!(format = plugin.name(), "format registered");
        self.plugins.push(Box::new(plugin));
        Ok(())
    }

    fn find(&self, name: &str) -> Option<&dyn FormatPlugin> {
        self.plugins
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .map(|p| p.as_ref())
    }

    /// Look up a plugin by name, ignoring case.
    pub fn plugin(&self, name: &str) -> Result<&dyn FormatPlugin> {
        self.find(name).ok_or_else(|| IoError::UnknownFormat(name.to_owned()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    fn engine(&self) -> SnifferEngine<'_> {
        SnifferEngine::new(self.plugins.iter().map(|p| p.as_ref()))
    }

    // ── Listing ──────────────────────────────────────────────────────────────

    pub fn formats(&self) -> Vec<FormatInfo> {
        self.plugins
            .iter()
            .map(|p| FormatInfo {
                name:         p.name(),
                description:  p.description(),
                options:      p.option_specs(),
                aux_channels: p.aux_channels(),
                can_read:     p.can_read(),
                can_write:    p.can_write(),
            })
            .collect()
    }

    pub fn list_read_formats(&self) -> Vec<&'static str> {
        self.plugins.iter().filter(|p| p.can_read()).map(|p| p.name()).collect()
    }

    pub fn list_write_formats(&self) -> Vec<&'static str> {
        self.plugins.iter().filter(|p| p.can_write()).map(|p| p.name()).collect()
    }

    // ── Sniff ────────────────────────────────────────────────────────────────

    /// Identify the format of `source` and the options to read it with.
    ///
    /// An empty input yields [`crate::sniff::EMPTY_FILE_MARKER`] and no options.
    pub fn sniff(&self, source: impl Into<Source>) -> Result<(String, Options)> {
        let source = source.into();
        let input  = source.describe();
        let (decoded, _) = decompress(source.open()?, None)?;
        let captured = capture(decoded, self.config.sniff_prefix_len)?;
        self.engine()
            .identify(&input, &captured.view())?
            .into_pair()
            .ok_or(IoError::UnrecognizedFormat { input })
    }

    // ── Read ─────────────────────────────────────────────────────────────────

    /// Open a lazy record stream over `source`.
    pub fn read(&self, source: impl Into<Source>, request: ReadRequest) -> Result<RecordStream> {
        let source = source.into();
        let input  = source.describe();
        let ReadRequest { format, options, verify, aux, compression } = request;

        // Reject bad arguments before touching any stream.
        let named = match format.as_deref() {
            Some(name) => {
                let plugin = self.readable(name)?;
                options.validate(plugin.name(), &plugin.option_specs())?;
                check_channels(plugin, aux.iter().map(|(n, _)| n.as_str()))?;
                Some(plugin)
            }
            None => None,
        };

        let (decoded, applied) = decompress(source.open()?, compression)?;
        if applied != Compression::None {
            debug!(input = %input, compression = %applied, "decompressing input");
        }

        let mut warnings = Vec::new();
        let (plugin, recommended, stream) = match named {
            Some(plugin) if verify.unwrap_or(self.config.verify) => {
                let captured = capture(decoded, self.config.sniff_prefix_len)?;
                let recommended = match SnifferEngine::sniff_one(plugin, &captured.view()) {
                    SniffResult::Matched(_, opts) => Some(opts),
                    SniffResult::EmptyFile        => None,
                    SniffResult::NoMatch => {
                        warnings.push(IoWarning::FormatMismatch { format: plugin.name(), input: input.clone() });
                        None
                    }
                };
                (plugin, recommended, captured.stream)
            }
            Some(plugin) => (plugin, None, decoded),
            None => {
                let captured = capture(decoded, self.config.sniff_prefix_len)?;
                match self.engine().identify(&input, &captured.view())? {
                    SniffResult::Matched(name, opts) => {
                        let plugin = self.plugin(name)?;
                        options.validate(plugin.name(), &plugin.option_specs())?;
                        check_channels(plugin, aux.iter().map(|(n, _)| n.as_str()))?;
                        (plugin, Some(opts), captured.stream)
                    }
                    SniffResult::EmptyFile => return Err(IoError::EmptyFile { input }),
                    SniffResult::NoMatch   => return Err(IoError::UnrecognizedFormat { input }),
                }
            }
        };

        let specs = plugin.option_specs();
        let (resolved, overrides) = resolve(
            &specs,
            self.config.defaults_for(plugin.name()),
            recommended.as_ref(),
            &options,
        );
        warnings.extend(overrides.into_iter().map(|o| IoWarning::ArgumentOverride {
            format:      plugin.name(),
            option:      o.option,
            user:        o.user,
            recommended: o.recommended,
        }));
        for w in &warnings {
            w.emit();
        }

        let mut aux_inputs = Vec::with_capacity(aux.len());
        for (channel, source) in aux {
            let name = source.describe();
            let (decoded, _) = decompress(source.open()?, None)?;
            aux_inputs.push((channel, Input::new(name, decoded)));
        }

        let reader = plugin.open_reader(
            Input::new(input.clone(), stream),
            AuxChannels::new(aux_inputs),
            &resolved,
        )?;
        Ok(RecordStream::new(plugin.name(), input, resolved, warnings, reader))
    }

    fn readable(&self, name: &str) -> Result<&dyn FormatPlugin> {
        let plugin = self.plugin(name)?;
        if !plugin.can_read() {
            return Err(IoError::Unsupported { format: plugin.name().to_owned(), operation: "read" });
        }
        Ok(plugin)
    }

    // ── Write ────────────────────────────────────────────────────────────────

    /// Open an incremental writer for `format` over `destination`.
    pub fn open_writer(
        &self,
        destination: impl Into<Destination>,
        format:      &str,
        request:     WriteRequest,
    ) -> Result<RecordWriter> {
        let plugin = self.plugin(format)?;
        if !plugin.can_write() {
            return Err(IoError::Unsupported { format: plugin.name().to_owned(), operation: "write" });
        }
        let WriteRequest { options, aux, compression } = request;
        let specs = plugin.option_specs();
        options.validate(plugin.name(), &specs)?;
        check_channels(plugin, aux.iter().map(|(n, _)| n.as_str()))?;

        let (resolved, _) = resolve(&specs, self.config.defaults_for(plugin.name()), None, &options);
        let compression = compression.unwrap_or(self.config.write_compression);
        let level = self.config.compression_level;

        let destination = destination.into();
        let mut names = vec![destination.describe()];
        let output = Output::new(
            destination.describe(),
            CompressedWriter::new(destination.open()?, compression, level)?,
        );
        let mut aux_outputs = Vec::with_capacity(aux.len());
        for (channel, dest) in aux {
            let name = dest.describe();
            names.push(name.clone());
            let writer = CompressedWriter::new(dest.open()?, compression, level)?;
            aux_outputs.push((channel, Output::new(name, writer)));
        }

        let sink = plugin.open_writer(output, AuxChannels::new(aux_outputs), &resolved)?;
        Ok(RecordWriter::new(plugin.name(), names, sink))
    }

    /// Serialise `records` as `format` into `destination`.
    pub fn write<I>(
        &self,
        records:     I,
        destination: impl Into<Destination>,
        format:      &str,
        request:     WriteRequest,
    ) -> Result<WriteSummary>
    where
        I: IntoIterator,
        I::Item: Into<Record>,
    {
        let mut writer = self.open_writer(destination, format, request)?;
        for record in records {
            writer.write(&record.into())?;
        }
        writer.finish()
    }

    /// Drain a record stream into `destination`, stopping at the first read error.
    pub fn write_stream(
        &self,
        stream:      RecordStream,
        destination: impl Into<Destination>,
        format:      &str,
        request:     WriteRequest,
    ) -> Result<WriteSummary> {
        let mut writer = self.open_writer(destination, format, request)?;
        for record in stream {
            writer.write(&record?)?;
        }
        writer.finish()
    }
}

fn check_channels<'a>(plugin: &dyn FormatPlugin, mut names: impl Iterator<Item = &'a str>) -> Result<()> {
    let declared = plugin.aux_channels();
    match names.find(|n| !declared.contains(n)) {
        Some(channel) => Err(IoError::UnknownChannel {
            format:  plugin.name().to_owned(),
            channel: channel.to_owned(),
        }),
        None => Ok(()),
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("formats", &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}
