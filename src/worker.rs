use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::spectrum::{ConfigPatch, ProcessedFrame, SpectrumConfig, SpectrumProcessor};

/// Messages into the analysis worker. Processed strictly in arrival order;
/// all data crosses the boundary by value.
#[derive(Debug)]
pub enum WorkerRequest {
    Init {
        fft_size: usize,
        sample_rate: u32,
    },
    Config(ConfigPatch),
    Sample {
        seq: u64,
        data: Vec<u8>,
        now_ms: u64,
    },
    Stop,
    /// Terminates the worker thread. Only sent when the handle is dropped.
    Shutdown,
}

#[derive(Debug)]
pub enum WorkerReply {
    InitComplete {
        fft_size: usize,
        sample_rate: u32,
        frequency_bins: usize,
    },
    Processed {
        seq: u64,
        frame: ProcessedFrame,
    },
    Stopped,
    Error {
        message: String,
    },
}

/// Owning handle to the worker thread. Samples are tagged with a sequence
/// number and `stop()` records a fence, so replies that were in flight when
/// playback stopped are discarded instead of leaking into the next session.
pub struct WorkerHandle {
    requests: Sender<WorkerRequest>,
    replies: Receiver<WorkerReply>,
    thread: Option<JoinHandle<()>>,
    next_seq: u64,
    fence_seq: u64,
}

impl WorkerHandle {
    pub fn spawn(config: SpectrumConfig) -> Result<WorkerHandle, String> {
        let (request_tx, request_rx) = unbounded();
        let (reply_tx, reply_rx) = unbounded();

        let thread = thread::Builder::new()
            .name("Spectrum".to_string())
            .spawn(move || worker_loop(config, request_rx, reply_tx))
            .map_err(|err| format!("Failed to create worker thread: {}", err))?;

        let handle = WorkerHandle {
            requests: request_tx,
            replies: reply_rx,
            thread: Some(thread),
            next_seq: 0,
            fence_seq: 0,
        };
        handle.send(WorkerRequest::Init {
            fft_size: config.fft_size,
            sample_rate: config.sample_rate,
        });
        Ok(handle)
    }

    pub fn update_config(&self, patch: ConfigPatch) {
        self.send(WorkerRequest::Config(patch));
    }

    pub fn send_sample(&mut self, data: &[u8], now_ms: u64) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.send(WorkerRequest::Sample {
            seq,
            data: data.to_vec(),
            now_ms,
        });
        seq
    }

    /// Sends a stop and fences out every sample sent so far. Replies for
    /// those samples are dropped by `poll`.
    pub fn stop(&mut self) {
        self.fence_seq = self.next_seq;
        self.send(WorkerRequest::Stop);
    }

    /// Drains pending replies without blocking and returns the most recent
    /// processed frame that passed the stop fence.
    pub fn poll(&mut self) -> Option<ProcessedFrame> {
        let mut latest = None;
        loop {
            match self.replies.try_recv() {
                Ok(WorkerReply::Processed { seq, frame }) => {
                    if seq >= self.fence_seq {
                        latest = Some(frame);
                    } else {
                        log::debug!("Dropping stale frame {} (fence {})", seq, self.fence_seq);
                    }
                }
                Ok(WorkerReply::InitComplete {
                    fft_size,
                    sample_rate,
                    frequency_bins,
                }) => {
                    log::info!(
                        "Worker ready: fft_size={} sample_rate={} bins={}",
                        fft_size,
                        sample_rate,
                        frequency_bins
                    );
                }
                Ok(WorkerReply::Stopped) => log::debug!("Worker acknowledged stop"),
                Ok(WorkerReply::Error { message }) => log::warn!("Worker error: {}", message),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::warn!("Worker reply channel disconnected");
                    break;
                }
            }
        }
        latest
    }

    fn send(&self, request: WorkerRequest) {
        if self.requests.send(request).is_err() {
            log::warn!("Worker request channel disconnected");
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.requests.send(WorkerRequest::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Worker thread panicked");
            }
        }
    }
}

fn worker_loop(
    config: SpectrumConfig,
    requests: Receiver<WorkerRequest>,
    replies: Sender<WorkerReply>,
) {
    let mut processor = SpectrumProcessor::new(config);

    for request in requests.iter() {
        match request {
            WorkerRequest::Init {
                fft_size,
                sample_rate,
            } => {
                processor.apply_patch(&ConfigPatch {
                    fft_size: Some(fft_size),
                    sample_rate: Some(sample_rate),
                    ..ConfigPatch::default()
                });
                let reply = WorkerReply::InitComplete {
                    fft_size,
                    sample_rate,
                    frequency_bins: processor.frequency_bins(),
                };
                if replies.send(reply).is_err() {
                    break;
                }
            }
            WorkerRequest::Config(patch) => processor.apply_patch(&patch),
            WorkerRequest::Sample { seq, data, now_ms } => {
                if data.len() != processor.frequency_bins() {
                    let message = format!(
                        "Sample length {} does not match {} frequency bins",
                        data.len(),
                        processor.frequency_bins()
                    );
                    if replies.send(WorkerReply::Error { message }).is_err() {
                        break;
                    }
                }
                if let Some(frame) = processor.process(&data, now_ms) {
                    if replies.send(WorkerReply::Processed { seq, frame }).is_err() {
                        break;
                    }
                }
            }
            WorkerRequest::Stop => {
                processor.reset_buffers();
                if replies.send(WorkerReply::Stopped).is_err() {
                    break;
                }
            }
            WorkerRequest::Shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn loud_sample() -> Vec<u8> {
        let mut sample = vec![0u8; 1024];
        for v in sample.iter_mut().take(105).skip(70) {
            *v = 220;
        }
        sample
    }

    fn poll_until_frame(handle: &mut WorkerHandle) -> Option<ProcessedFrame> {
        for _ in 0..100 {
            if let Some(frame) = handle.poll() {
                return Some(frame);
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        None
    }

    #[test]
    fn sample_round_trip() {
        let mut handle = WorkerHandle::spawn(SpectrumConfig::default()).unwrap();
        handle.send_sample(&loud_sample(), 100);
        let frame = poll_until_frame(&mut handle).expect("no frame received");
        assert!(frame.beat.detected);
        assert_eq!(frame.timestamp_ms, 100);
    }

    #[test]
    fn config_patch_reaches_processor() {
        let mut handle = WorkerHandle::spawn(SpectrumConfig::default()).unwrap();
        handle.update_config(ConfigPatch {
            beat_threshold: Some(250.0),
            ..ConfigPatch::default()
        });
        handle.send_sample(&loud_sample(), 100);
        let frame = poll_until_frame(&mut handle).expect("no frame received");
        // 220 average no longer crosses the raised threshold.
        assert!(!frame.beat.detected);
    }

    #[test]
    fn stop_fences_in_flight_results() {
        let mut handle = WorkerHandle::spawn(SpectrumConfig::default()).unwrap();
        handle.send_sample(&loud_sample(), 100);
        // Stop before draining: the reply for seq 0 must be discarded.
        handle.stop();
        std::thread::sleep(Duration::from_millis(50));
        assert!(handle.poll().is_none());

        // The next session's samples pass the fence again.
        handle.send_sample(&loud_sample(), 200);
        assert!(poll_until_frame(&mut handle).is_some());
    }

    #[test]
    fn mismatched_sample_length_reports_error_but_continues() {
        let mut handle = WorkerHandle::spawn(SpectrumConfig::default()).unwrap();
        handle.send_sample(&[0u8; 16], 100);
        std::thread::sleep(Duration::from_millis(50));
        // Error is logged, not surfaced; the worker keeps serving.
        handle.send_sample(&loud_sample(), 200);
        assert!(poll_until_frame(&mut handle).is_some());
    }
}
