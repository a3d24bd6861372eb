//! FileSink - writes events to disk, one file per run
//!
//! Each file is a plain sequence of bincode-encoded [`AssembledEvent`]s.
//! A BeginRun event opens `run-NNNN.evb`; events seen outside a run go to
//! `orphans.evb`.

use contracts::{AssembledEvent, ContractError, EventBody, EventSink, TransitionKind};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument};

const ORPHAN_FILE: &str = "orphans.evb";

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Base output directory
    pub base_path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));

        Self { base_path }
    }
}

struct OpenFile {
    path: PathBuf,
    writer: BufWriter<File>,
    events: u64,
}

/// Sink that writes events to disk files
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    current: Option<OpenFile>,
    files_written: Vec<PathBuf>,
}

impl FileSink {
    /// Create a new FileSink
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> io::Result<Self> {
        fs::create_dir_all(&config.base_path)?;

        Ok(Self {
            name: name.into(),
            config,
            current: None,
            files_written: Vec::new(),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(name: impl Into<String>, params: &HashMap<String, String>) -> io::Result<Self> {
        Self::new(name, FileSinkConfig::from_params(params))
    }

    /// Every file opened so far, in order
    pub fn files_written(&self) -> &[PathBuf] {
        &self.files_written
    }

    fn open(&mut self, file_name: &str) -> io::Result<()> {
        self.close_current()?;
        let path = self.config.base_path.join(file_name);
        let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(sink = %self.name, path = %path.display(), "event file opened");
        self.files_written.push(path.clone());
        self.current = Some(OpenFile {
            path,
            writer: BufWriter::new(file),
            events: 0,
        });
        Ok(())
    }

    fn close_current(&mut self) -> io::Result<()> {
        if let Some(mut open) = self.current.take() {
            open.writer.flush()?;
            info!(
                sink = %self.name,
                path = %open.path.display(),
                events = open.events,
                "event file closed"
            );
        }
        Ok(())
    }

    fn write_event_to_disk(&mut self, event: &AssembledEvent) -> io::Result<()> {
        let transition = match &event.body {
            EventBody::StateTransition {
                transition,
                run_number,
                ..
            } => Some((*transition, *run_number)),
            _ => None,
        };

        if let Some((TransitionKind::Begin, run_number)) = transition {
            self.open(&format!("run-{run_number:04}.evb"))?;
        } else if self.current.is_none() {
            self.open(ORPHAN_FILE)?;
        }

        if let Some(open) = self.current.as_mut() {
            bincode::serialize_into(&mut open.writer, event).map_err(io::Error::other)?;
            open.events += 1;
        }

        if let Some((TransitionKind::End, _)) = transition {
            self.close_current()?;
        }
        Ok(())
    }

    fn persist_event(&mut self, event: &AssembledEvent) -> Result<(), ContractError> {
        self.write_event_to_disk(event).map_err(|e| {
            error!(sink = %self.name, event_id = event.event_id, error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }
}

/// Read back every event of a file written by [`FileSink`].
pub fn read_event_file(path: impl AsRef<Path>) -> io::Result<Vec<AssembledEvent>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut events = Vec::new();
    loop {
        match bincode::deserialize_from::<_, AssembledEvent>(&mut reader) {
            Ok(event) => events.push(event),
            Err(err) => {
                if let bincode::ErrorKind::Io(io_err) = err.as_ref() {
                    if io_err.kind() == io::ErrorKind::UnexpectedEof {
                        break;
                    }
                }
                return Err(io::Error::new(io::ErrorKind::InvalidData, err));
            }
        }
    }
    Ok(events)
}

impl EventSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, event),
        fields(sink = %self.name, event_id = event.event_id)
    )]
    async fn write(&mut self, event: &AssembledEvent) -> Result<(), ContractError> {
        self.persist_event(event)
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        if let Some(open) = self.current.as_mut() {
            open.writer.flush()?;
        }
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.close_current()?;
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}
