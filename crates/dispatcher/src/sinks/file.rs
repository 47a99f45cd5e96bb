//! FileSink - records bus traffic on disk
//!
//! Layout under `base_path`, one directory per topic (`/` becomes `_`):
//! - `messages.jsonl`: one JSON object per non-image message
//! - `{seq:06}.png`: image frames (Mono8 as L8, Mono16 as L16)

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use contracts::{ContractError, DataSink, Envelope, ImageEncoding, ImageMessage, Message};
use image::{ImageBuffer, Luma};
use serde::Serialize;
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    pub base_path: PathBuf,
    /// Keep every n-th image per topic
    pub image_stride: u64,
}

impl FileSinkConfig {
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));
        let image_stride = params
            .get("image_stride")
            .and_then(|s| s.parse().ok())
            .filter(|&n| n > 0)
            .unwrap_or(1);

        Self {
            base_path,
            image_stride,
        }
    }
}

#[derive(Serialize)]
struct Record<'a> {
    received_at: String,
    topic: &'a str,
    #[serde(flatten)]
    message: &'a Message,
}

/// Sink that writes messages to disk
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    created_dirs: HashSet<PathBuf>,
    writers: HashMap<String, BufWriter<File>>,
    image_seq: HashMap<String, u64>,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.base_path)?;

        Ok(Self {
            name: name.into(),
            config,
            created_dirs: HashSet::new(),
            writers: HashMap::new(),
            image_seq: HashMap::new(),
        })
    }

    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, FileSinkConfig::from_params(params))
    }

    fn topic_dir(&mut self, topic: &str) -> std::io::Result<PathBuf> {
        let dir = self.config.base_path.join(topic.replace('/', "_"));
        if !self.created_dirs.contains(&dir) {
            fs::create_dir_all(&dir)?;
            self.created_dirs.insert(dir.clone());
        }
        Ok(dir)
    }

    fn write_envelope(&mut self, envelope: &Envelope) -> std::io::Result<()> {
        let dir = self.topic_dir(&envelope.topic)?;
        match &envelope.message {
            Message::Image(img) => self.write_image(&envelope.topic, &dir, img),
            message => self.append_record(&envelope.topic, &dir, message),
        }
    }

    fn append_record(&mut self, topic: &str, dir: &Path, message: &Message) -> std::io::Result<()> {
        let writer = match self.writers.entry(topic.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(dir.join("messages.jsonl"))?;
                entry.insert(BufWriter::new(file))
            }
        };
        let record = Record {
            received_at: chrono::Utc::now().to_rfc3339(),
            topic,
            message,
        };
        serde_json::to_writer(&mut *writer, &record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writer.write_all(b"\n")
    }

    fn write_image(&mut self, topic: &str, dir: &Path, img: &ImageMessage) -> std::io::Result<()> {
        let seq = self.image_seq.entry(topic.to_string()).or_insert(0);
        let current = *seq;
        *seq += 1;
        if current % self.config.image_stride != 0 {
            return Ok(());
        }

        let path = dir.join(format!("{current:06}.png"));
        save_image(&path, img)
    }

    fn persist(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
        self.write_envelope(envelope).map_err(|e| {
            error!(sink = %self.name, topic = %envelope.topic, error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }
}

fn save_image(path: &Path, img: &ImageMessage) -> std::io::Result<()> {
    let invalid = || {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "{}x{} {:?} frame has {} bytes",
                img.width,
                img.height,
                img.encoding,
                img.data.len()
            ),
        )
    };
    match img.encoding {
        ImageEncoding::Mono8 => {
            let buffer: ImageBuffer<Luma<u8>, Vec<u8>> =
                ImageBuffer::from_raw(img.width, img.height, img.data.to_vec()).ok_or_else(invalid)?;
            buffer.save(path).map_err(std::io::Error::other)
        }
        ImageEncoding::Mono16 => {
            let pixels: Vec<u16> = img
                .data
                .chunks_exact(2)
                .map(|px| u16::from_le_bytes([px[0], px[1]]))
                .collect();
            let buffer: ImageBuffer<Luma<u16>, Vec<u16>> =
                ImageBuffer::from_raw(img.width, img.height, pixels).ok_or_else(invalid)?;
            buffer.save(path).map_err(std::io::Error::other)
        }
    }
}

impl DataSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        level = "trace",
        name = "file_sink_write",
        skip(self, envelope),
        fields(sink = %self.name, topic = %envelope.topic)
    )]
    async fn write(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
        self.persist(envelope)
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        for writer in self.writers.values_mut() {
            writer
                .flush()
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        }
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush().await?;
        self.writers.clear();
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Header, InterruptLevel, InterruptMessage, RangeScan, IMAGE_HEIGHT, IMAGE_WIDTH};
    use tempfile::tempdir;

    fn sink_in(dir: &Path, stride: u64) -> FileSink {
        FileSink::new(
            "test_file",
            FileSinkConfig {
                base_path: dir.to_path_buf(),
                image_stride: stride,
            },
        )
        .unwrap()
    }

    fn image(fill: u8) -> Envelope {
        Envelope::new(
            "uav_nav/guidance/left_image",
            Message::Image(ImageMessage {
                header: Header::now("front"),
                width: IMAGE_WIDTH,
                height: IMAGE_HEIGHT,
                encoding: ImageEncoding::Mono8,
                data: vec![fill; (IMAGE_WIDTH * IMAGE_HEIGHT) as usize].into(),
            }),
        )
    }

    #[tokio::test]
    async fn test_jsonl_per_topic() {
        let dir = tempdir().unwrap();
        let mut sink = sink_in(dir.path(), 1);
        for level in [InterruptLevel::Clear, InterruptLevel::Stale] {
            let envelope = Envelope::new(
                "uav_nav/signal_interrupt",
                Message::Interrupt(InterruptMessage::now(level)),
            );
            sink.write(&envelope).await.unwrap();
        }
        let scan = Envelope::new(
            "uav_nav/guidance/ultrasonic",
            Message::Range(RangeScan {
                header: Header::now("front"),
                ranges: vec![1.5],
                intensities: vec![1.0],
            }),
        );
        sink.write(&scan).await.unwrap();
        sink.close().await.unwrap();

        let text =
            fs::read_to_string(dir.path().join("uav_nav_signal_interrupt/messages.jsonl")).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["type"], "interrupt");
        assert_eq!(lines[1]["level"], "stale");
        assert!(dir
            .path()
            .join("uav_nav_guidance_ultrasonic/messages.jsonl")
            .exists());
    }

    #[tokio::test]
    async fn test_images_saved_with_stride() {
        let dir = tempdir().unwrap();
        let mut sink = sink_in(dir.path(), 2);
        for i in 0..4 {
            sink.write(&image(i)).await.unwrap();
        }
        sink.close().await.unwrap();

        let image_dir = dir.path().join("uav_nav_guidance_left_image");
        let mut names: Vec<String> = fs::read_dir(&image_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["000000.png", "000002.png"]);

        let decoded = image::open(image_dir.join("000002.png")).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (IMAGE_WIDTH, IMAGE_HEIGHT));
        assert_eq!(decoded.get_pixel(0, 0).0[0], 2);
    }

    #[tokio::test]
    async fn test_truncated_image_is_write_error() {
        let dir = tempdir().unwrap();
        let mut sink = sink_in(dir.path(), 1);
        let envelope = Envelope::new(
            "img",
            Message::Image(ImageMessage {
                header: Header::now("front"),
                width: 4,
                height: 4,
                encoding: ImageEncoding::Mono16,
                data: vec![0u8; 10].into(),
            }),
        );
        let err = sink.write(&envelope).await.unwrap_err();
        assert!(matches!(err, ContractError::SinkWrite { .. }));
    }

    #[test]
    fn test_config_from_params() {
        let mut params = HashMap::new();
        params.insert("base_path".to_string(), "/tmp/guard".to_string());
        params.insert("image_stride".to_string(), "0".to_string());
        let config = FileSinkConfig::from_params(&params);
        assert_eq!(config.base_path, PathBuf::from("/tmp/guard"));
        assert_eq!(config.image_stride, 1);
    }
}
