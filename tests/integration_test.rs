use bioreg::compression::Compression;
use bioreg::error::IoError;
use bioreg::facade::IoObject;
use bioreg::formats::default_registry;
use bioreg::options::{OptionSpec, Options};
use bioreg::pipeline::{convert, convert_many, ConvertJob};
use bioreg::plugin::{FormatPlugin, SniffVerdict};
use bioreg::record::{DistanceMatrix, Record, SequenceRecord, TreeRecord};
use bioreg::registry::{IoWarning, ReadRequest, Registry, WriteRequest};
use bioreg::sniff::{SniffView, EMPTY_FILE_MARKER};
use bioreg::stream::{AuxChannels, Input, Output, RecordReader, RecordSink, SharedBuffer};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;

const FASTQ: &str = "@r1 first read\nACGTN\n+\nIIII#\n@r2\nGGCA\n+r2\n5?I(\n";

fn sample_sequences() -> Vec<SequenceRecord> {
    vec![
        SequenceRecord::new("r1", "ACGTN").with_description("first read").with_quality(vec![40, 40, 40, 40, 2]),
        SequenceRecord::new("r2", "GGCA").with_quality(vec![20, 30, 40, 7]),
    ]
}

fn temp_path() -> (NamedTempFile, std::path::PathBuf) {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_path_buf();
    (file, path)
}

// ── Instrumented plugin ──────────────────────────────────────────────────────

#[derive(Default)]
struct Probe {
    sniff_calls:  AtomicUsize,
    produced:     AtomicUsize,
    consumed:     AtomicUsize,
    max_inflight: AtomicUsize,
}

/// `#probe` header, then one tree per line.
struct ProbeFormat(Arc<Probe>);

struct ProbeReader {
    input: Input,
    probe: Arc<Probe>,
}

impl RecordReader for ProbeReader {
    fn next_record(&mut self) -> bioreg::Result<Option<Record>> {
        while let Some(line) = self.input.next_non_blank()? {
            if line.starts_with('#') {
                continue;
            }
            let produced = self.probe.produced.fetch_add(1, Ordering::SeqCst) + 1;
            let inflight = produced - self.probe.consumed.load(Ordering::SeqCst);
            self.probe.max_inflight.fetch_max(inflight, Ordering::SeqCst);
            return Ok(Some(TreeRecord::new(line).into()));
        }
        Ok(None)
    }
}

struct ProbeSink {
    output: Output,
    probe:  Arc<Probe>,
}

impl RecordSink for ProbeSink {
    fn write_record(&mut self, record: &Record) -> bioreg::Result<()> {
        if let Record::Tree(t) = record {
            self.output.commit(format!("{}\n", t.newick).as_bytes())?;
        }
        self.probe.consumed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn finish(self: Box<Self>) -> bioreg::Result<()> {
        self.output.finish()?;
        Ok(())
    }
}

impl FormatPlugin for ProbeFormat {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn option_specs(&self) -> Vec<OptionSpec> {
        vec![OptionSpec::str("mode", "default")]
    }

    fn sniff(&self, view: &SniffView<'_>) -> SniffVerdict {
        self.0.sniff_calls.fetch_add(1, Ordering::SeqCst);
        if view.text().starts_with("#probe") {
            SniffVerdict::Matched(Options::new().with("mode", "sniffed"))
        } else {
            SniffVerdict::NoMatch
        }
    }

    fn open_reader(&self, input: Input, _aux: AuxChannels<Input>, _options: &Options) -> bioreg::Result<Box<dyn RecordReader>> {
        Ok(Box::new(ProbeReader { input, probe: self.0.clone() }))
    }

    fn open_writer(&self, output: Output, _aux: AuxChannels<Output>, _options: &Options) -> bioreg::Result<Box<dyn RecordSink>> {
        Ok(Box::new(ProbeSink { output, probe: self.0.clone() }))
    }
}

fn probe_registry() -> (Registry, Arc<Probe>) {
    let probe = Arc::new(Probe::default());
    let mut registry = default_registry();
    registry.register(ProbeFormat(probe.clone())).unwrap();
    (registry, probe)
}

// ── Sniffing ─────────────────────────────────────────────────────────────────

#[test]
fn test_written_output_sniffs_back() {
    let registry = default_registry();
    let seqs = sample_sequences();
    let matrix = DistanceMatrix::new(vec!["a".into(), "b".into()], vec![vec![0.0, 0.25], vec![0.25, 0.0]]);

    let cases: Vec<(&str, Vec<Record>)> = vec![
        ("fasta",  seqs.iter().cloned().map(Record::from).collect()),
        ("fastq",  seqs.iter().cloned().map(Record::from).collect()),
        ("newick", vec![TreeRecord::new("((a:1,b:2)c,d);").into()]),
        ("newick", vec![TreeRecord::new("a;").into()]),
        ("newick", vec![TreeRecord::new("[note](a,b);").into(), TreeRecord::new("'x;y':0.5;").into()]),
        ("lsmat",  vec![matrix.into()]),
    ];
    for format in registry.list_write_formats() {
        assert!(cases.iter().any(|(f, _)| *f == format), "{format} not covered");
    }

    for (format, records) in cases {
        let (_file, path) = temp_path();
        registry.write(records, path.as_path(), format, WriteRequest::new()).unwrap();
        let (sniffed, _) = registry.sniff(path.as_path()).unwrap();
        assert_eq!(sniffed, format);
    }
}

#[test]
fn test_empty_input() {
    let registry = default_registry();
    let (_file, path) = temp_path();
    let (format, options) = registry.sniff(path.as_path()).unwrap();
    assert_eq!(format, EMPTY_FILE_MARKER);
    assert!(options.is_empty());

    assert!(matches!(registry.read(path.as_path(), ReadRequest::new()), Err(IoError::EmptyFile { .. })));

    // With a format named, an empty file is simply zero records.
    let stream = registry.read(path.as_path(), ReadRequest::new().format("fasta")).unwrap();
    assert_eq!(stream.count(), 0);
}

#[test]
fn test_unknown_input_and_format() {
    let registry = default_registry();
    assert!(matches!(
        registry.read(b"just some prose\n".as_slice(), ReadRequest::new()),
        Err(IoError::UnrecognizedFormat { .. })
    ));
    assert!(matches!(
        registry.read(b"(a);".as_slice(), ReadRequest::new().format("nexus")),
        Err(IoError::UnknownFormat(_))
    ));
    assert!(registry.read(b"(a);".as_slice(), ReadRequest::new().format("NEWICK")).is_ok());
}

#[test]
fn test_ambiguous_sniff() {
    let mut registry = default_registry();

    struct Greedy;
    impl FormatPlugin for Greedy {
        fn name(&self) -> &'static str { "greedy" }
        fn sniff(&self, _view: &SniffView<'_>) -> SniffVerdict { SniffVerdict::Matched(Options::new()) }
        fn open_reader(&self, _: Input, _: AuxChannels<Input>, _: &Options) -> bioreg::Result<Box<dyn RecordReader>> {
            unreachable!("never selected")
        }
    }
    registry.register(Greedy).unwrap();

    match registry.sniff(b"(a,b);".to_vec()) {
        Err(IoError::AmbiguousFormat { candidates, .. }) => {
            assert!(candidates.contains(&"newick".to_string()));
            assert!(candidates.contains(&"greedy".to_string()));
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }
}

// ── Verification and options ─────────────────────────────────────────────────

#[test]
fn test_no_verify_never_sniffs() {
    let (registry, probe) = probe_registry();
    let data = b"#probe\n(a);\n(b);\n".to_vec();

    let stream = registry.read(data.clone(), ReadRequest::new().format("probe").verify(false)).unwrap();
    assert_eq!(probe.sniff_calls.load(Ordering::SeqCst), 0);
    assert_eq!(stream.options().get_str("mode"), Some("default"));
    assert!(stream.warnings().is_empty());

    let stream = registry.read(data, ReadRequest::new().format("probe")).unwrap();
    assert_eq!(probe.sniff_calls.load(Ordering::SeqCst), 1);
    assert_eq!(stream.options().get_str("mode"), Some("sniffed"));
}

#[test]
fn test_config_default_verify_and_option_defaults() {
    use bioreg::config::IoConfig;
    use bioreg::formats::default_registry_with;

    let config = IoConfig::default().verify(false).format_default("fasta", "max_width", 2);
    let registry = default_registry_with(config).unwrap();

    let buf = SharedBuffer::new();
    registry
        .write(vec![SequenceRecord::new("s", "ACGTA")], buf.clone(), "fasta", WriteRequest::new())
        .unwrap();
    assert_eq!(buf.to_string_lossy(), ">s\nAC\nGT\nA\n");

    // verify=false from config: a FASTQ read under "fasta" raises no mismatch warning.
    let stream = registry.read(FASTQ.as_bytes(), ReadRequest::new().format("fasta")).unwrap();
    assert!(stream.warnings().is_empty());
}

#[test]
fn test_bad_configured_defaults_are_rejected() {
    use bioreg::config::IoConfig;
    use bioreg::formats::default_registry_with;

    let config = IoConfig::from_json(r#"{"format_defaults": {"fasta": {"max_width": "wide"}}}"#).unwrap();
    assert!(matches!(default_registry_with(config), Err(IoError::Config(_))));

    let config = IoConfig::from_json(r#"{"format_defaults": {"FASTA": {"bogus": 1}}}"#).unwrap();
    assert!(matches!(default_registry_with(config), Err(IoError::Config(_))));

    let config = IoConfig::from_json(r#"{"format_defaults": {"fastq": {"variant": "Illumina1.8"}}}"#).unwrap();
    let registry = default_registry_with(config).unwrap();
    let stream = registry.read(b"@r\nA\n+\n5\n".as_slice(), ReadRequest::new().format("fastq").verify(false)).unwrap();
    assert_eq!(stream.options().get_str("variant"), Some("illumina1.8"));
}

#[test]
fn test_zero_sniff_prefix_is_not_empty() {
    use bioreg::config::IoConfig;
    use bioreg::formats::default_registry_with;

    let registry = default_registry_with(IoConfig::default().sniff_prefix_len(0)).unwrap();
    let err = registry.sniff(b"@r\nA\n+\nI\n".as_slice()).unwrap_err();
    assert!(matches!(err, IoError::UnrecognizedFormat { .. }));
    assert_eq!(registry.sniff(Vec::new()).unwrap().0, EMPTY_FILE_MARKER);
}

#[test]
fn test_format_mismatch_warning() {
    let registry = default_registry();
    let mut stream = registry.read(FASTQ.as_bytes(), ReadRequest::new().format("fasta")).unwrap();
    assert!(matches!(stream.warnings(), [IoWarning::FormatMismatch { format: "fasta", .. }]));
    assert!(matches!(stream.next(), Some(Err(IoError::Format { format: "fasta", line: 1, .. }))));
    assert!(stream.next().is_none());
}

#[test]
fn test_comma_lsmat_override() {
    let registry = default_registry();
    let csv = b",a,b\na,0,1\nb,1,0\n".to_vec();

    let (format, options) = registry.sniff(csv.clone()).unwrap();
    assert_eq!(format, "lsmat");
    assert_eq!(options.get_str("delimiter"), Some(","));

    let mut stream = registry
        .read(csv, ReadRequest::new().format("lsmat").option("delimiter", "\t"))
        .unwrap();
    match stream.warnings() {
        [IoWarning::ArgumentOverride { option, user, recommended, .. }] => {
            assert_eq!(option, "delimiter");
            assert_eq!(user.as_str(), Some("\t"));
            assert_eq!(recommended.as_str(), Some(","));
        }
        other => panic!("expected one override, got {other:?}"),
    }
    assert!(matches!(stream.next(), Some(Err(IoError::Format { format: "lsmat", .. }))));
}

#[test]
fn test_invalid_options_are_rejected() {
    let registry = default_registry();
    let err = registry
        .read(FASTQ.as_bytes(), ReadRequest::new().format("fastq").option("variant", "solexa"))
        .unwrap_err();
    assert!(matches!(err, IoError::InvalidOption { .. }));

    let err = registry
        .open_writer(SharedBuffer::new(), "newick", WriteRequest::new().option("max_width", 3))
        .unwrap_err();
    assert!(matches!(err, IoError::UnknownOption { .. }));

    let err = registry
        .open_writer(SharedBuffer::new(), "fastq", WriteRequest::new().aux("qual", SharedBuffer::new()))
        .unwrap_err();
    assert!(matches!(err, IoError::UnknownChannel { .. }));

    let err = registry.open_writer(SharedBuffer::new(), "qseq", WriteRequest::new()).unwrap_err();
    assert!(matches!(err, IoError::Unsupported { operation: "write", .. }));
}

// ── Streaming and conversion ─────────────────────────────────────────────────

#[test]
fn test_pipeline_holds_one_record() {
    let (registry, probe) = probe_registry();
    let mut data = String::from("#probe\n");
    for i in 0..500 {
        data.push_str(&format!("(t{i});\n"));
    }

    let buf = SharedBuffer::new();
    let summary = convert(&registry, data.into_bytes(), ReadRequest::new(), buf.clone(), "probe", WriteRequest::new()).unwrap();
    assert_eq!(summary.records, 500);
    assert_eq!(probe.produced.load(Ordering::SeqCst), 500);
    assert_eq!(probe.consumed.load(Ordering::SeqCst), 500);
    assert_eq!(probe.max_inflight.load(Ordering::SeqCst), 1);
}

#[test]
fn test_streaming_equals_materialised() {
    let registry = default_registry();

    let streamed = SharedBuffer::new();
    let summary = convert(&registry, FASTQ.as_bytes(), ReadRequest::new(), streamed.clone(), "fasta", WriteRequest::new()).unwrap();
    assert_eq!(summary.from, "fastq");
    assert_eq!(summary.records, 2);

    let seqs = Vec::<SequenceRecord>::read_from(&registry, FASTQ.as_bytes(), ReadRequest::new()).unwrap();
    assert_eq!(seqs, sample_sequences());
    let materialised = SharedBuffer::new();
    seqs.write_to(&registry, materialised.clone(), "fasta", WriteRequest::new()).unwrap();

    assert_eq!(streamed.contents(), materialised.contents());
}

#[test]
fn test_fastq_fasta_qual_round_trip() {
    let registry = default_registry();
    let (_fa, fasta) = temp_path();
    let (_q, qual) = temp_path();
    let (_fq, fastq) = temp_path();

    let summary = convert(
        &registry,
        FASTQ.as_bytes(),
        ReadRequest::new(),
        fasta.as_path(),
        "fasta",
        WriteRequest::new().aux("qual", qual.as_path()),
    )
    .unwrap();
    assert_eq!(summary.destinations.len(), 2);
    assert_eq!(fs::read_to_string(&qual).unwrap(), ">r1 first read\n40 40 40 40 2\n>r2\n20 30 40 7\n");

    convert(
        &registry,
        fasta.as_path(),
        ReadRequest::new().format("fasta").aux("qual", qual.as_path()),
        fastq.as_path(),
        "fastq",
        WriteRequest::new(),
    )
    .unwrap();
    assert_eq!(fs::read_to_string(&fastq).unwrap(), "@r1 first read\nACGTN\n+\nIIII#\n@r2\nGGCA\n+\n5?I(\n");
}

#[test]
fn test_phred_40_between_offsets() {
    let registry = default_registry();
    let buf = SharedBuffer::new();
    convert(
        &registry,
        b"@r\nA\n+\nI\n".as_slice(),
        ReadRequest::new().format("fastq").option("variant", "sanger"),
        buf.clone(),
        "fastq",
        WriteRequest::new().option("variant", "illumina1.3"),
    )
    .unwrap();
    assert_eq!(buf.to_string_lossy(), "@r\nA\n+\nh\n");

    let back = Vec::<SequenceRecord>::read_from(
        &registry,
        buf.contents(),
        ReadRequest::new().format("fastq").option("phred_offset", 64),
    )
    .unwrap();
    assert_eq!(back[0].quality.as_deref(), Some(&[40u8][..]));
}

#[test]
fn test_qseq_to_fastq() {
    let registry = default_registry();
    let qseq = "M1\t7\t1\t2\t100\t200\t0\t1\tAC.T\thhhB\t1\nM1\t7\t1\t2\t5\t6\t0\t1\tGGGG\thhhh\t0\n";
    let buf = SharedBuffer::new();
    let summary = convert(&registry, qseq.as_bytes(), ReadRequest::new(), buf.clone(), "fastq", WriteRequest::new()).unwrap();
    assert_eq!(summary.from, "qseq");
    assert_eq!(summary.records, 1);
    assert_eq!(buf.to_string_lossy(), "@M1_7:1:2:100:200#0/1\nACNT\n+\nIII#\n");
}

#[test]
fn test_write_stream_stops_at_read_error() {
    let registry = default_registry();
    let stream = registry.read(b"(a);\n(b));\n(c);\n".as_slice(), ReadRequest::new()).unwrap();
    let buf = SharedBuffer::new();
    let err = registry.write_stream(stream, buf.clone(), "newick", WriteRequest::new()).unwrap_err();
    assert!(matches!(err, IoError::Format { format: "newick", line: 2, .. }));
}

#[test]
fn test_compressed_round_trip() {
    let registry = default_registry();
    for compression in [Compression::Gzip, Compression::Zstd, Compression::Lz4] {
        let (_file, path) = temp_path();
        let request = WriteRequest::new().compression(compression);
        registry.write(sample_sequences(), path.as_path(), "fastq", request).unwrap();
        assert_eq!(Compression::detect(&fs::read(&path).unwrap()), compression);

        assert_eq!(registry.sniff(path.as_path()).unwrap().0, "fastq");
        let back = Vec::<SequenceRecord>::read_from(&registry, path.as_path(), ReadRequest::new()).unwrap();
        assert_eq!(back, sample_sequences());
    }

    let (_file, path) = temp_path();
    registry
        .write(vec![TreeRecord::new("(a,b);")], path.as_path(), "newick", WriteRequest::new().compression(Compression::Brotli))
        .unwrap();
    let tree = TreeRecord::read_from(&registry, path.as_path(), ReadRequest::new().compression(Compression::Brotli)).unwrap();
    assert_eq!(tree.newick, "(a,b);");
}

#[test]
fn test_convert_many_keeps_job_order() {
    let registry = default_registry();
    let good = SharedBuffer::new();
    let jobs = vec![
        ConvertJob::new(FASTQ.as_bytes(), good.clone(), "fasta"),
        ConvertJob::new(b"not a format".as_slice(), SharedBuffer::new(), "fasta"),
        ConvertJob::new(b"(x,y);".as_slice(), SharedBuffer::new(), "newick"),
    ];
    let results = convert_many(&registry, jobs);
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().records, 2);
    assert!(matches!(results[1], Err(IoError::UnrecognizedFormat { .. })));
    assert_eq!(results[2].as_ref().unwrap().from, "newick");
    assert!(good.to_string_lossy().starts_with(">r1 first read\n"));
}

#[test]
fn test_registry_is_shareable() {
    fn assert_sync<T: Send + Sync>() {}
    assert_sync::<Registry>();

    let registry = default_registry();
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let n = registry.read(FASTQ.as_bytes(), ReadRequest::new()).unwrap().count();
                assert_eq!(n, 2);
            });
        }
    });
}
