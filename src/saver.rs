//! # Data Saver Module
//!
//! Persists captured images, report images and report metadata. The threaded saver hands jobs
//! to a dedicated writer thread so the frame loop never waits on image encoding, while the
//! synchronous saver writes immediately, giving deterministic output when evaluating files.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use image::RgbImage;
use log::{debug, error};

use crate::error::{Error, Result};
use crate::store::{write_jpg, write_png};

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

/// Common interface of the threaded and synchronous savers.
pub trait DataSaver: Send {
    /// Persist (or queue) a single job.
    fn save(&mut self, job: SaveJob) -> Result<()>;

    /// Block until every job handed to this saver has been written.
    fn flush(&mut self) -> Result<()>;

    /// Flush and release any resources, the saver can't be used afterwards.
    fn close(&mut self) -> Result<()>;

    fn is_threaded(&self) -> bool;
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Writes every job on the calling thread.
#[derive(Debug, Default)]
pub struct SyncSaver {}

/// Writes jobs on a background thread, in the order they were queued.
pub struct ThreadedSaver {
    name: String,

    tx: Option<Sender<SaverCmd>>,
    jh: Option<JoinHandle<()>>
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// A single unit of data to write to disk.
#[derive(Debug, Clone)]
pub enum SaveJob {
    Png {
        path: PathBuf,
        image: RgbImage,
        compression_0_to_9: u8
    },

    Jpg {
        path: PathBuf,
        image: RgbImage,
        quality_0_to_100: u8
    },

    Json {
        path: PathBuf,
        data: serde_json::Value
    }
}

/// Commands that can be sent by the engine to the saver thread.
enum SaverCmd {
    /// Write a job
    Save(SaveJob),

    /// Acknowledge once every earlier job is written
    Flush(Sender<()>),

    /// Stop the thread once the queue is drained
    Stop
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl SaveJob {
    pub fn path(&self) -> &PathBuf {
        match self {
            SaveJob::Png { path, .. } => path,
            SaveJob::Jpg { path, .. } => path,
            SaveJob::Json { path, .. } => path
        }
    }

    /// Write the job to disk on the current thread.
    pub fn execute(self) -> Result<()> {
        match self {
            SaveJob::Png { path, image, compression_0_to_9 } => {
                write_png(&path, &image, compression_0_to_9)
            },
            SaveJob::Jpg { path, image, quality_0_to_100 } => {
                write_jpg(&path, &image, quality_0_to_100)
            },
            SaveJob::Json { path, data } => {
                if let Some(dir) = path.parent() {
                    fs::create_dir_all(dir).map_err(|e| Error::IoError(dir.to_path_buf(), e))?;
                }
                let text = serde_json::to_string_pretty(&data)
                    .map_err(|e| Error::MetadataError(e))?;
                fs::write(&path, text).map_err(|e| Error::IoError(path.clone(), e))
            }
        }
    }
}

impl SyncSaver {
    pub fn new() -> Self {
        Self {}
    }
}

impl DataSaver for SyncSaver {
    fn save(&mut self, job: SaveJob) -> Result<()> {
        job.execute()
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_threaded(&self) -> bool {
        false
    }
}

impl ThreadedSaver {
    /// Start a new saver thread, `name` is used for the thread name and in logs.
    pub fn new(name: &str) -> Result<Self> {
        let (tx, rx) = channel();
        let jh = saver_thread(name, rx)?;

        Ok(Self {
            name: name.to_string(),
            tx: Some(tx),
            jh: Some(jh)
        })
    }

    fn send(&self, cmd: SaverCmd) -> Result<()> {
        match self.tx {
            Some(ref tx) => tx.send(cmd).map_err(|_| Error::ChannelSendError),
            None => Err(Error::ChannelSendError)
        }
    }
}

impl DataSaver for ThreadedSaver {
    fn save(&mut self, job: SaveJob) -> Result<()> {
        self.send(SaverCmd::Save(job))
    }

    fn flush(&mut self) -> Result<()> {
        let (ack_tx, ack_rx) = channel();
        self.send(SaverCmd::Flush(ack_tx))?;

        ack_rx.recv().map_err(|_| Error::ThreadJoinError)
    }

    fn close(&mut self) -> Result<()> {
        if self.tx.is_none() {
            return Ok(());
        }

        self.send(SaverCmd::Stop)?;
        self.tx = None;

        if let Some(jh) = self.jh.take() {
            jh.join().map_err(|_| Error::ThreadJoinError)?;
        }
        debug!("Closed {} saver", self.name);

        Ok(())
    }

    fn is_threaded(&self) -> bool {
        true
    }
}

impl Drop for ThreadedSaver {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("Failed to close {} saver: {}", self.name, e);
        }
    }
}

// -----------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Create either a threaded or synchronous saver.
pub fn new_saver(threaded: bool, name: &str) -> Result<Box<dyn DataSaver>> {
    if threaded {
        Ok(Box::new(ThreadedSaver::new(name)?))
    }
    else {
        Ok(Box::new(SyncSaver::new()))
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Write queued jobs in a separate thread until told to stop.
fn saver_thread(name: &str, cmd_rx: Receiver<SaverCmd>) -> Result<JoinHandle<()>> {
    let name = name.to_string();

    thread::Builder::new()
        .name(format!("{}-saver", name))
        .spawn(move || {
            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    SaverCmd::Save(job) => {
                        let path = job.path().clone();
                        match job.execute() {
                            Ok(()) => debug!("Saved {:?}", path),
                            Err(e) => error!("{} saver failed to write {:?}: {}", name, path, e)
                        }
                    },
                    SaverCmd::Flush(ack) => {
                        // The engine may have stopped waiting, nothing to do then
                        let _ = ack.send(());
                    },
                    SaverCmd::Stop => {
                        break
                    }
                }
            }
        })
        .map_err(|e| Error::WorkerSpawnError(e))
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use super::*;
    use image::Rgb;

    fn png_job(path: PathBuf, value: u8) -> SaveJob {
        SaveJob::Png {
            path,
            image: RgbImage::from_pixel(4, 4, Rgb([value, value, value])),
            compression_0_to_9: 0
        }
    }

    /// After a flush every queued job is on disk
    #[test]
    fn test_threaded_flush() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = ThreadedSaver::new("test").unwrap();

        for i in 0..5 {
            saver.save(png_job(dir.path().join(format!("{}.png", i)), i)).unwrap();
        }
        saver.flush().unwrap();

        for i in 0..5 {
            assert!(dir.path().join(format!("{}.png", i)).exists());
        }

        saver.close().unwrap();
        assert!(saver.save(png_job(dir.path().join("late.png"), 0)).is_err());
    }

    /// Closing drains the queue before the thread exits
    #[test]
    fn test_threaded_close_drains() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta").join("bggen-1.json");

        let mut saver = new_saver(true, "report").unwrap();
        assert!(saver.is_threaded());
        saver
            .save(SaveJob::Json {
                path: path.clone(),
                data: serde_json::json!({ "name": "bggen-1", "frame_index": 12 })
            })
            .unwrap();
        saver.close().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["frame_index"], 12);
    }

    #[test]
    fn test_sync_saver() {
        let dir = tempfile::tempdir().unwrap();
        let mut saver = new_saver(false, "capture").unwrap();

        assert!(!saver.is_threaded());
        saver.save(png_job(dir.path().join("0.png"), 3)).unwrap();
        assert!(dir.path().join("0.png").exists());

        let bad_dir_file = dir.path().join("0.png").join("nested.png");
        assert!(saver.save(png_job(bad_dir_file, 3)).is_err());
    }
}
