//! Dedicated-thread driver for one session
//!
//! A [`CodecContext`] is not thread-safe, so async callers hand it to a
//! [`SessionWorker`]. Input is queued on a command channel and processed in
//! order on the worker thread; decoded frames or encoded packets come back
//! on an output [`Stream`](futures::Stream).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{self, Receiver, Sender};
use futures::channel::mpsc;
use tokio::sync::oneshot;

use super::{CodecContext, CodecError, CodecResult, CodecType, Frame, Packet};

/// One unit of worker output
#[derive(Debug)]
pub enum SessionOutput {
  Frame(Frame),
  Packet(Packet),
}

/// Output side of a worker; ends when the worker stops
pub type OutputStream = mpsc::UnboundedReceiver<CodecResult<SessionOutput>>;

enum WorkerCommand {
  Packet(Packet),
  Frame(Frame),
  /// Drain everything, then reset the session for new input
  Flush(oneshot::Sender<CodecResult<()>>),
  /// Discard buffered state without draining
  Reset,
}

/// Runs a session on its own thread
pub struct SessionWorker {
  role: CodecType,
  command_sender: Option<Sender<WorkerCommand>>,
  worker_handle: Option<JoinHandle<CodecContext>>,
  queue_size: Arc<AtomicUsize>,
}

impl SessionWorker {
  /// Move an open session onto a worker thread
  pub fn spawn(ctx: CodecContext) -> CodecResult<(Self, OutputStream)> {
    if !ctx.is_open() {
      return Err(CodecError::InvalidState(
        "only an open session can be moved to a worker".into(),
      ));
    }
    let role = ctx.codec_type();
    let (command_tx, command_rx) = channel::unbounded();
    let (output_tx, output_rx) = mpsc::unbounded();
    let queue_size = Arc::new(AtomicUsize::new(0));

    let counter = queue_size.clone();
    let handle = std::thread::Builder::new()
      .name("codec-session-worker".into())
      .spawn(move || Self::worker_loop(ctx, command_rx, output_tx, counter))
      .map_err(|e| CodecError::ResourceExhausted(format!("failed to spawn worker: {}", e)))?;

    Ok((
      Self {
        role,
        command_sender: Some(command_tx),
        worker_handle: Some(handle),
        queue_size,
      },
      output_rx,
    ))
  }

  fn worker_loop(
    mut ctx: CodecContext,
    receiver: Receiver<WorkerCommand>,
    output: mpsc::UnboundedSender<CodecResult<SessionOutput>>,
    queue_size: Arc<AtomicUsize>,
  ) -> CodecContext {
    while let Ok(command) = receiver.recv() {
      match command {
        WorkerCommand::Packet(packet) => {
          let result = ctx.decode(Some(&packet));
          queue_size.fetch_sub(1, Ordering::AcqRel);
          Self::forward(&output, result, SessionOutput::Frame);
        }
        WorkerCommand::Frame(frame) => {
          let result = ctx.encode(Some(&frame));
          queue_size.fetch_sub(1, Ordering::AcqRel);
          Self::forward(&output, result, SessionOutput::Packet);
        }
        WorkerCommand::Flush(reply) => {
          let result = Self::process_flush(&mut ctx, &output);
          let _ = reply.send(result);
        }
        WorkerCommand::Reset => {
          if let Err(e) = ctx.flush() {
            tracing::warn!(target: "codec_session", error = %e, "worker reset failed");
          }
        }
      }
    }
    tracing::debug!(target: "codec_session", frames = ctx.frame_num(), "session worker stopped");
    ctx
  }

  fn forward<T>(
    output: &mpsc::UnboundedSender<CodecResult<SessionOutput>>,
    result: CodecResult<Vec<T>>,
    wrap: fn(T) -> SessionOutput,
  ) {
    match result {
      Ok(items) => {
        for item in items {
          let _ = output.unbounded_send(Ok(wrap(item)));
        }
      }
      Err(e) => {
        tracing::debug!(target: "codec_session", error = %e, "worker input rejected");
        let _ = output.unbounded_send(Err(e));
      }
    }
  }

  fn process_flush(
    ctx: &mut CodecContext,
    output: &mpsc::UnboundedSender<CodecResult<SessionOutput>>,
  ) -> CodecResult<()> {
    match ctx.codec_type() {
      CodecType::Decoder => {
        for frame in ctx.flush_decoder()? {
          let _ = output.unbounded_send(Ok(SessionOutput::Frame(frame)));
        }
      }
      CodecType::Encoder => {
        for packet in ctx.flush_encoder()? {
          let _ = output.unbounded_send(Ok(SessionOutput::Packet(packet)));
        }
      }
    }
    // Ready for a new stream
    ctx.flush()
  }

  fn send(&self, command: WorkerCommand) -> CodecResult<()> {
    self
      .command_sender
      .as_ref()
      .ok_or_else(|| CodecError::InvalidState("session worker stopped".into()))?
      .send(command)
      .map_err(|_| CodecError::InvalidState("session worker stopped".into()))
  }

  /// Queue a packet for decoding
  pub fn send_packet(&self, packet: Packet) -> CodecResult<()> {
    if self.role != CodecType::Decoder {
      return Err(CodecError::InvalidState("not a decoder".into()));
    }
    self.queue_size.fetch_add(1, Ordering::AcqRel);
    self.send(WorkerCommand::Packet(packet)).inspect_err(|_| {
      self.queue_size.fetch_sub(1, Ordering::AcqRel);
    })
  }

  /// Queue a frame for encoding
  pub fn send_frame(&self, frame: Frame) -> CodecResult<()> {
    if self.role != CodecType::Encoder {
      return Err(CodecError::InvalidState("not an encoder".into()));
    }
    self.queue_size.fetch_add(1, Ordering::AcqRel);
    self.send(WorkerCommand::Frame(frame)).inspect_err(|_| {
      self.queue_size.fetch_sub(1, Ordering::AcqRel);
    })
  }

  /// Drain all queued input; resolves once every output has been emitted
  pub async fn flush(&self) -> CodecResult<()> {
    let (tx, rx) = oneshot::channel();
    self.send(WorkerCommand::Flush(tx))?;
    rx.await
      .map_err(|_| CodecError::InvalidState("session worker stopped".into()))?
  }

  /// Drop buffered state once the queued input ahead of it is processed
  pub fn reset(&self) -> CodecResult<()> {
    self.send(WorkerCommand::Reset)
  }

  /// Inputs queued but not yet processed
  pub fn queue_size(&self) -> usize {
    self.queue_size.load(Ordering::Acquire)
  }

  /// Stop the worker and take the session back
  pub fn into_inner(mut self) -> Option<CodecContext> {
    self.stop()
  }

  fn stop(&mut self) -> Option<CodecContext> {
    // Closing the command channel ends the worker loop
    self.command_sender = None;
    self.worker_handle.take().and_then(|handle| handle.join().ok())
  }
}

impl Drop for SessionWorker {
  fn drop(&mut self) {
    if let Some(mut ctx) = self.stop() {
      ctx.close();
    }
  }
}
