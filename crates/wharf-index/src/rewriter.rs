//! Single-pass, line-oriented rewriting of `index.yaml`.
//!
//! A full parse-and-redump would rewrite quoting, key order and flow style
//! across the whole document, and costs memory proportional to the number of
//! version records. This module instead copies the document line by line,
//! understanding just enough YAML structure to locate the `entries:` block,
//! recognise chart-name headers and version records, and splice changes in
//! place. Every line the algorithm does not have to touch is copied
//! byte-for-byte; the only modified line in an otherwise unaffected document
//! is `generated:`.

use crate::chart_name::ParsedChartName;
use crate::misc::{leading_spaces, time_now};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use wharf_api_types::index::{IndexError, IndexResult};

const ENTRIES: &str = "entries:";
const GENERATED: &str = "generated:";
const FALLBACK_INDENT: usize = 2;

/// Charts waiting to be spliced into the index, deduplicated by
/// `(name, version)`. Records are the archive metadata (`urls`, `digest`,
/// manifest fields); `created` is stamped when the record is written.
#[derive(Default)]
pub struct PendingCharts {
    charts: BTreeMap<String, Vec<Mapping>>,
}

impl PendingCharts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }

    pub fn insert(&mut self, name: &str, record: Mapping) {
        let versions = self.charts.entry(name.to_owned()).or_default();
        let version = record_field(&record, "version").map(str::to_owned);
        let collides = versions
            .iter()
            .any(|r| record_field(r, "version").map(str::to_owned) == version);
        if !collides {
            versions.push(record);
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.charts.contains_key(name)
    }

    fn take(&mut self, name: &str) -> Option<Vec<Mapping>> {
        self.charts.remove(name)
    }
}

/// What a delete pass removes: whole charts, or single versions of a chart.
#[derive(Default)]
pub struct DeleteSet {
    names: HashSet<String>,
    versions: HashMap<String, HashSet<String>>,
}

impl DeleteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chart(&mut self, name: &str) {
        self.names.insert(name.to_owned());
    }

    pub fn version(&mut self, name: &str, version: &str) {
        self.versions
            .entry(name.to_owned())
            .or_default()
            .insert(version.to_owned());
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.versions.is_empty()
    }

    fn whole_chart(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    fn versions_of(&self, name: &str) -> Option<&HashSet<String>> {
        self.versions.get(name)
    }
}

pub(crate) fn record_field<'a>(record: &'a Mapping, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

/// Copy the index at `source` to `out`, inserting the pending charts.
///
/// Charts whose name already has a block get their new versions appended
/// right after the existing ones; the rest become fresh blocks at the end of
/// `entries:`. A pending version that is already indexed is skipped when the
/// digests agree and rejected with [`IndexError::AlreadyPresent`] otherwise.
pub fn add_charts(source: &Path, out: &Path, mut pending: PendingCharts) -> IndexResult<()> {
    let mut reader = BufReader::new(File::open(source)?);
    let mut out = LineWriter::new(BufWriter::new(File::create(out)?));

    let mut saw_entries = false;
    let mut in_entries = false;
    let mut child_indent: Option<usize> = None;
    let mut tracked: Option<TrackedChart> = None;

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let content = line.trim_end_matches(['\n', '\r']);
        let indent = leading_spaces(content);
        let trimmed = content.trim();

        if !in_entries {
            if indent == 0 && trimmed == ENTRIES {
                saw_entries = true;
                in_entries = true;
                out.copy(&line)?;
            } else if indent == 0 && trimmed == "entries: {}" && !saw_entries {
                // a flow-style empty block cannot be spliced into; reopen it
                saw_entries = true;
                in_entries = true;
                out.emit_line(ENTRIES)?;
            } else if indent == 0 && trimmed.starts_with(GENERATED) {
                out.emit_line(&format!("generated: {}", time_now()))?;
            } else {
                out.copy(&line)?;
            }
            continue;
        }

        if trimmed.is_empty() {
            out.copy(&line)?;
            continue;
        }

        if indent == 0 {
            // a root key ends the entries block
            let ci = child_indent.unwrap_or(FALLBACK_INDENT);
            if let Some(t) = tracked.as_mut() {
                flush_tracked(&mut out, t, &mut pending, ci)?;
            }
            tracked = None;
            flush_new_charts(&mut out, &mut pending, ci)?;
            in_entries = false;
            if trimmed.starts_with(GENERATED) {
                out.emit_line(&format!("generated: {}", time_now()))?;
            } else {
                out.copy(&line)?;
            }
            continue;
        }

        let ci = *child_indent.get_or_insert(indent);
        if indent == ci && !trimmed.starts_with('-') && ParsedChartName::new(content).valid() {
            if let Some(t) = tracked.as_mut() {
                flush_tracked(&mut out, t, &mut pending, ci)?;
            }
            let name = ParsedChartName::new(content).name();
            tracked = pending.contains(name).then(|| TrackedChart::new(name));
            out.copy(&line)?;
            continue;
        }

        if let Some(t) = tracked.as_mut() {
            t.observe(indent, trimmed);
        }
        out.copy(&line)?;
    }

    let ci = child_indent.unwrap_or(FALLBACK_INDENT);
    if in_entries {
        if let Some(t) = tracked.as_mut() {
            flush_tracked(&mut out, t, &mut pending, ci)?;
        }
        flush_new_charts(&mut out, &mut pending, ci)?;
    } else if !saw_entries {
        if !out.wrote_anything() {
            out.emit_line("apiVersion: v1")?;
        }
        out.emit_line(ENTRIES)?;
        flush_new_charts(&mut out, &mut pending, FALLBACK_INDENT)?;
    }
    out.flush()?;
    Ok(())
}

/// Copy the index at `source` to `out`, leaving out the targeted records.
///
/// A chart whose last remaining record is removed loses its header as well.
/// Targets not present in the index are silently ignored; callers decide
/// whether that is an error before staging the rewrite.
pub fn delete_charts(source: &Path, out: &Path, targets: &DeleteSet) -> IndexResult<()> {
    let mut reader = BufReader::new(File::open(source)?);
    let mut out = LineWriter::new(BufWriter::new(File::create(out)?));

    let mut in_entries = false;
    let mut child_indent: Option<usize> = None;
    let mut mode = Mode::Pass;

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let content = line.trim_end_matches(['\n', '\r']);
        let indent = leading_spaces(content);
        let trimmed = content.trim();

        if !in_entries {
            if indent == 0 && trimmed == ENTRIES {
                in_entries = true;
                out.copy(&line)?;
            } else if indent == 0 && trimmed.starts_with(GENERATED) {
                out.emit_line(&format!("generated: {}", time_now()))?;
            } else {
                out.copy(&line)?;
            }
            continue;
        }

        if trimmed.is_empty() {
            match &mut mode {
                Mode::Pass => out.copy(&line)?,
                Mode::Skip => {}
                Mode::Filter(f) => f.hold(&line),
            }
            continue;
        }

        if indent == 0 {
            mode.close(&mut out)?;
            mode = Mode::Pass;
            in_entries = false;
            if trimmed.starts_with(GENERATED) {
                out.emit_line(&format!("generated: {}", time_now()))?;
            } else {
                out.copy(&line)?;
            }
            continue;
        }

        let ci = *child_indent.get_or_insert(indent);
        if indent == ci && !trimmed.starts_with('-') && ParsedChartName::new(content).valid() {
            mode.close(&mut out)?;
            let name = ParsedChartName::new(content).name();
            mode = if targets.whole_chart(name) {
                Mode::Skip
            } else if let Some(versions) = targets.versions_of(name) {
                Mode::Filter(FilterChart::open(&line, versions.clone()))
            } else {
                out.copy(&line)?;
                Mode::Pass
            };
            continue;
        }

        match &mut mode {
            Mode::Pass => out.copy(&line)?,
            Mode::Skip => {}
            Mode::Filter(f) => f.push(&mut out, &line, indent, trimmed)?,
        }
    }

    mode.close(&mut out)?;
    out.flush()?;
    Ok(())
}

/// Per-chart state of the delete pass.
enum Mode {
    Pass,
    Skip,
    Filter(FilterChart),
}

impl Mode {
    fn close<W: Write>(&mut self, out: &mut LineWriter<W>) -> IndexResult<()> {
        if let Mode::Filter(f) = self {
            f.close(out)?;
        }
        *self = Mode::Pass;
        Ok(())
    }
}

/// A chart some versions of which are being removed. The header is withheld
/// until a record survives, so a chart losing its last version loses the
/// header too.
struct FilterChart {
    header: Option<String>,
    targets: HashSet<String>,
    dash_indent: Option<usize>,
    field_indent: Option<usize>,
    buffer: Vec<String>,
    cur_version: Option<String>,
}

impl FilterChart {
    fn open(header: &str, targets: HashSet<String>) -> Self {
        Self {
            header: Some(header.to_owned()),
            targets,
            dash_indent: None,
            field_indent: None,
            buffer: Vec::new(),
            cur_version: None,
        }
    }

    fn push<W: Write>(
        &mut self,
        out: &mut LineWriter<W>,
        raw: &str,
        indent: usize,
        trimmed: &str,
    ) -> IndexResult<()> {
        let starts_record = trimmed.starts_with("- ")
            && match self.dash_indent {
                None => true,
                Some(di) => di == indent,
            };
        if starts_record {
            self.flush_record(out)?;
            self.dash_indent.get_or_insert(indent);
            self.capture(trimmed[2..].trim_start());
        } else if self.dash_indent.is_some() {
            let fi = *self.field_indent.get_or_insert(indent);
            if indent == fi {
                self.capture(trimmed);
            }
        }
        self.hold(raw);
        Ok(())
    }

    fn hold(&mut self, raw: &str) {
        self.buffer.push(raw.to_owned());
    }

    fn capture(&mut self, field: &str) {
        if let Some(v) = field.strip_prefix("version:") {
            self.cur_version = Some(unquote(v.trim()).to_owned());
        }
    }

    fn flush_record<W: Write>(&mut self, out: &mut LineWriter<W>) -> IndexResult<()> {
        let targeted = self
            .cur_version
            .take()
            .is_some_and(|v| self.targets.contains(&v));
        if !targeted && !self.buffer.is_empty() {
            if let Some(header) = self.header.take() {
                out.copy(&header)?;
            }
            for held in self.buffer.drain(..) {
                out.copy(&held)?;
            }
        }
        self.buffer.clear();
        Ok(())
    }

    fn close<W: Write>(&mut self, out: &mut LineWriter<W>) -> IndexResult<()> {
        self.flush_record(out)
    }
}

/// A chart the add pass is inside of: collects the versions (and digests)
/// already present so pending additions can be collision-checked.
struct TrackedChart {
    name: String,
    dash_indent: Option<usize>,
    field_indent: Option<usize>,
    seen: Vec<(String, String)>,
    cur_version: Option<String>,
    cur_digest: Option<String>,
}

impl TrackedChart {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            dash_indent: None,
            field_indent: None,
            seen: Vec::new(),
            cur_version: None,
            cur_digest: None,
        }
    }

    fn observe(&mut self, indent: usize, trimmed: &str) {
        let starts_record = trimmed.starts_with("- ")
            && match self.dash_indent {
                None => true,
                Some(di) => di == indent,
            };
        if starts_record {
            self.finish_record();
            self.dash_indent.get_or_insert(indent);
            self.capture(trimmed[2..].trim_start());
        } else if self.dash_indent.is_some() {
            let fi = *self.field_indent.get_or_insert(indent);
            if indent == fi {
                self.capture(trimmed);
            }
        }
    }

    fn capture(&mut self, field: &str) {
        if let Some(v) = field.strip_prefix("version:") {
            self.cur_version = Some(unquote(v.trim()).to_owned());
        } else if let Some(v) = field.strip_prefix("digest:") {
            self.cur_digest = Some(unquote(v.trim()).to_owned());
        }
    }

    fn finish_record(&mut self) {
        if self.cur_version.is_some() || self.cur_digest.is_some() {
            self.seen.push((
                self.cur_version.take().unwrap_or_default(),
                self.cur_digest.take().unwrap_or_default(),
            ));
        }
    }
}

fn flush_tracked<W: Write>(
    out: &mut LineWriter<W>,
    tracked: &mut TrackedChart,
    pending: &mut PendingCharts,
    child_indent: usize,
) -> IndexResult<()> {
    tracked.finish_record();
    let records = pending.take(&tracked.name).unwrap_or_default();
    for record in records {
        let version = record_field(&record, "version").unwrap_or_default();
        if let Some((_, digest)) = tracked.seen.iter().find(|(v, _)| v == version) {
            if Some(digest.as_str()) == record_field(&record, "digest") {
                // the identical archive is already indexed
                continue;
            }
            return Err(IndexError::AlreadyPresent(format!(
                "{}-{version}",
                tracked.name
            )));
        }
        write_record(out, &record, tracked.dash_indent.unwrap_or(child_indent))?;
    }
    Ok(())
}

fn flush_new_charts<W: Write>(
    out: &mut LineWriter<W>,
    pending: &mut PendingCharts,
    child_indent: usize,
) -> IndexResult<()> {
    let pad = " ".repeat(child_indent);
    for (name, records) in std::mem::take(&mut pending.charts) {
        out.emit_line(&format!("{pad}{name}:"))?;
        for record in records {
            write_record(out, &record, child_indent)?;
        }
    }
    Ok(())
}

fn write_record<W: Write>(
    out: &mut LineWriter<W>,
    record: &Mapping,
    indent: usize,
) -> IndexResult<()> {
    let mut full = Mapping::new();
    full.insert(Value::from("created"), Value::from(time_now()));
    for (k, v) in record {
        full.insert(k.clone(), v.clone());
    }
    let yaml = serde_yaml::to_string(&full)?;
    let pad = " ".repeat(indent);
    for (i, body) in yaml.lines().enumerate() {
        if i == 0 {
            out.emit_line(&format!("{pad}- {body}"))?;
        } else {
            out.emit_line(&format!("{pad}  {body}"))?;
        }
    }
    Ok(())
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| s.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(s)
}

/// Wraps the output stream so spliced-in lines always begin at a line start,
/// even when the copied input lacked a trailing newline.
struct LineWriter<W: Write> {
    inner: W,
    line_open: bool,
    wrote: bool,
}

impl<W: Write> LineWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            line_open: false,
            wrote: false,
        }
    }

    fn copy(&mut self, raw: &str) -> io::Result<()> {
        self.inner.write_all(raw.as_bytes())?;
        self.wrote = true;
        self.line_open = !raw.ends_with('\n');
        Ok(())
    }

    fn emit_line(&mut self, line: &str) -> io::Result<()> {
        if self.line_open {
            self.inner.write_all(b"\n")?;
            self.line_open = false;
        }
        self.inner.write_all(line.as_bytes())?;
        self.inner.write_all(b"\n")?;
        self.wrote = true;
        Ok(())
    }

    fn wrote_anything(&self) -> bool {
        self.wrote
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
