//! Capability interface implemented by every format plugin.
//!
//! A plugin is a self-contained descriptor: one format name, the options it
//! accepts, a sniffer, a reader factory and a writer factory.  Plugins are
//! registered explicitly with [`crate::registry::Registry::register`]; there
//! is no discovery.
//!
//! # Contract
//! - `name` is unique within a registry (case-insensitively) and never
//!   changes.  A registered plugin is never mutated.
//! - `sniff` inspects only the bounded [`SniffView`] it is given.  It must
//!   not assume the view holds the whole input; check
//!   [`SniffView::is_complete`] before treating a short prefix as final.
//! - `open_reader` receives options already validated against
//!   `option_specs` and layered with defaults, so every declared option is
//!   present.  The same holds for `open_writer`.
//! - Auxiliary channels (`aux_channels`) are optional extra streams, keyed
//!   by name.  A plugin must accept any subset of the channels it declares.
//! - Plugins are shared across threads through `&Registry` and must hold no
//!   mutable state of their own.

use crate::error::{IoError, Result};
use crate::options::{OptionSpec, Options};
use crate::sniff::SniffView;
use crate::stream::{AuxChannels, Input, Output, RecordReader, RecordSink};

/// What one plugin's sniffer concluded about a prefix.
#[derive(Debug, Clone, PartialEq)]
pub enum SniffVerdict {
    NoMatch,
    /// The input looks like this format; options to read it with.
    Matched(Options),
}

pub trait FormatPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-line description for listings.
    fn description(&self) -> &'static str {
        ""
    }

    fn option_specs(&self) -> Vec<OptionSpec> {
        Vec::new()
    }

    fn aux_channels(&self) -> &'static [&'static str] {
        &[]
    }

    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        true
    }

    fn sniff(&self, view: &SniffView<'_>) -> SniffVerdict;

    fn open_reader(
        &self,
        input:   Input,
        aux:     AuxChannels<Input>,
        options: &Options,
    ) -> Result<Box<dyn RecordReader>>;

    fn open_writer(
        &self,
        _output:  Output,
        _aux:     AuxChannels<Output>,
        _options: &Options,
    ) -> Result<Box<dyn RecordSink>> {
        Err(IoError::Unsupported { format: self.name().to_owned(), operation: "write" })
    }
}
