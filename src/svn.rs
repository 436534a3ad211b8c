// src/svn.rs

//! [`HistorySource`] backed by the `svn` command-line client.
//!
//! `svn log --xml -v` output is parsed while the client is still producing
//! it. Once the caller's stop predicate fires the child process is killed,
//! so deep histories are never fetched past the point the walk needs.

use crate::error::QueryError;
use crate::model::{normalize_path, ChangeAction, ChangedPath, CopyFrom, DirEntry, LogEntry, NodeKind};
use crate::source::HistorySource;
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::process::{Command, Stdio};
use tracing::debug;

pub struct SvnClient {
    root_url: String,
    program: String,
}

impl SvnClient {
    pub fn new(root_url: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into().trim_end_matches('/').to_string(),
            program: "svn".to_string(),
        }
    }

    /// Use a different client binary, e.g. an absolute path
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn url(&self, path: &str, revision: u64) -> String {
        let path = normalize_path(path);
        if path == "/" {
            format!("{}@{revision}", self.root_url)
        } else {
            format!("{}{path}@{revision}", self.root_url)
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("--non-interactive").args(args);
        command
    }

    fn run(&self, args: &[&str]) -> Result<Vec<u8>, QueryError> {
        debug!("svn {}", args.join(" "));
        let output = self.command(args).output()?;
        if !output.status.success() {
            return Err(QueryError::Command {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

impl HistorySource for SvnClient {
    fn youngest_revision(&self) -> Result<u64, QueryError> {
        let stdout = self.run(&["info", "--show-item", "revision", &self.root_url])?;
        let text = String::from_utf8_lossy(&stdout);
        text.trim()
            .parse()
            .map_err(|_| QueryError::Xml(format!("unexpected revision '{}'", text.trim())))
    }

    fn log_entries(
        &self,
        path: &str,
        from: u64,
        to: u64,
        stop: &mut dyn FnMut(&LogEntry) -> bool,
    ) -> Result<Vec<LogEntry>, QueryError> {
        let range = format!("{from}:{to}");
        let url = self.url(path, from);
        let args = ["log", "--xml", "-v", "--stop-on-copy", "-r", range.as_str(), url.as_str()];
        debug!("svn {}", args.join(" "));

        let mut child = self
            .command(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| QueryError::Xml("svn log produced no output stream".to_string()))?;

        let mut entries = Vec::new();
        let stopped = parse_log(std::io::BufReader::new(stdout), &mut |entry| {
            let done = stop(&entry);
            entries.push(entry);
            done
        });

        match stopped {
            Ok(true) => {
                // Cancel the remote scan; the exit status of a killed client is meaningless.
                let _ = child.kill();
                let _ = child.wait();
                Ok(entries)
            }
            Ok(false) => {
                let output = child.wait_with_output()?;
                if output.status.success() {
                    Ok(entries)
                } else {
                    Err(QueryError::Command {
                        command: args.join(" "),
                        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    })
                }
            }
            Err(e) => {
                let _ = child.kill();
                let output = child.wait_with_output()?;
                if output.status.success() || output.stderr.is_empty() {
                    Err(e)
                } else {
                    Err(QueryError::Command {
                        command: args.join(" "),
                        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    })
                }
            }
        }
    }

    fn list_directory(&self, path: &str, revision: u64) -> Result<Vec<DirEntry>, QueryError> {
        let url = self.url(path, revision);
        let stdout = self.run(&["list", "--xml", &url])?;
        parse_list(stdout.as_slice())
    }
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, QueryError> {
    let attr = element
        .try_get_attribute(name)
        .map_err(|e| QueryError::Xml(e.to_string()))?;
    match attr {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn parse_kind(kind: Option<&str>) -> NodeKind {
    match kind {
        Some("dir") => NodeKind::Dir,
        _ => NodeKind::File,
    }
}

#[derive(Default)]
struct PendingPath {
    kind: Option<String>,
    action: Option<String>,
    copy_path: Option<String>,
    copy_rev: Option<String>,
}

impl PendingPath {
    fn finish(self, text: &str) -> Result<(String, ChangedPath), QueryError> {
        let action = self
            .action
            .as_deref()
            .and_then(ChangeAction::from_code)
            .ok_or_else(|| QueryError::Xml(format!("path {text} has no valid action")))?;
        let copied_from = match (self.copy_path, self.copy_rev) {
            (Some(path), Some(rev)) => Some(CopyFrom {
                path: normalize_path(&path),
                revision: rev
                    .parse()
                    .map_err(|_| QueryError::Xml(format!("bad copyfrom-rev '{rev}'")))?,
            }),
            _ => None,
        };
        // older repositories log kind=""; copies there are taken to be directory copies
        let kind = match self.kind.as_deref() {
            None | Some("") if copied_from.is_some() => NodeKind::Dir,
            kind => parse_kind(kind),
        };
        Ok((
            normalize_path(text),
            ChangedPath {
                kind,
                action,
                copied_from,
            },
        ))
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    None,
    Author,
    Date,
    Msg,
    Path,
}

/// Streams `<logentry>` elements to `on_entry`. Returns `Ok(true)` when `on_entry` asked to stop.
pub(crate) fn parse_log<R: BufRead>(
    input: R,
    on_entry: &mut dyn FnMut(LogEntry) -> bool,
) -> Result<bool, QueryError> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut revision: Option<u64> = None;
    let mut author = None;
    let mut date = None;
    let mut message = String::new();
    let mut changed_paths = BTreeMap::new();
    let mut pending = PendingPath::default();
    let mut field = Field::None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                text.clear();
                field = match e.name().as_ref() {
                    b"logentry" => {
                        let rev = attribute(&e, b"revision")?
                            .ok_or_else(|| QueryError::Xml("logentry without revision".to_string()))?;
                        revision = Some(
                            rev.parse()
                                .map_err(|_| QueryError::Xml(format!("bad revision '{rev}'")))?,
                        );
                        author = None;
                        date = None;
                        message.clear();
                        changed_paths = BTreeMap::new();
                        Field::None
                    }
                    b"path" => {
                        pending = PendingPath {
                            kind: attribute(&e, b"kind")?,
                            action: attribute(&e, b"action")?,
                            copy_path: attribute(&e, b"copyfrom-path")?,
                            copy_rev: attribute(&e, b"copyfrom-rev")?,
                        };
                        Field::Path
                    }
                    b"author" => Field::Author,
                    b"date" => Field::Date,
                    b"msg" => Field::Msg,
                    _ => Field::None,
                };
            }
            Event::Text(t) if field != Field::None => {
                text.push_str(&t.unescape()?);
            }
            Event::End(e) => {
                match e.name().as_ref() {
                    b"author" => author = Some(std::mem::take(&mut text)),
                    b"date" => date = Some(std::mem::take(&mut text)),
                    b"msg" => message = std::mem::take(&mut text),
                    b"path" => {
                        let (path, change) = std::mem::take(&mut pending).finish(&text)?;
                        changed_paths.insert(path, change);
                    }
                    b"logentry" => {
                        let rev = revision
                            .take()
                            .ok_or_else(|| QueryError::Xml("unbalanced logentry".to_string()))?;
                        let timestamp = match date.take() {
                            Some(d) => DateTime::parse_from_rfc3339(&d)
                                .map_err(|e| QueryError::Xml(format!("bad date '{d}': {e}")))?
                                .with_timezone(&Utc),
                            None => DateTime::<Utc>::default(),
                        };
                        let entry = LogEntry {
                            revision: rev,
                            timestamp,
                            author: author.take(),
                            message: std::mem::take(&mut message),
                            changed_paths: std::mem::take(&mut changed_paths),
                        };
                        if on_entry(entry) {
                            return Ok(true);
                        }
                    }
                    _ => {}
                }
                field = Field::None;
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(false)
}

pub(crate) fn parse_list<R: BufRead>(input: R) -> Result<Vec<DirEntry>, QueryError> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut kind = NodeKind::File;
    let mut in_name = false;
    let mut name = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"entry" => kind = parse_kind(attribute(&e, b"kind")?.as_deref()),
                b"name" => {
                    in_name = true;
                    name.clear();
                }
                _ => {}
            },
            Event::Text(t) if in_name => name.push_str(&t.unescape()?),
            Event::End(e) => match e.name().as_ref() {
                b"name" => in_name = false,
                b"entry" => entries.push(DirEntry {
                    name: std::mem::take(&mut name),
                    kind,
                }),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(entries)
}
