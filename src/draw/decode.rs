use crate::draw::error::DrawError;
use crate::draw::layers::{LayerId, LayerStack};
use crate::draw::surface::PixelSurface;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::{Duration, Instant};

/// Where a decoded image goes once it is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeedSlot {
    NewLayer,
    Layer(LayerId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedImage {
    Bytes(Vec<u8>),
    DataUrl(String),
}

impl EncodedImage {
    pub fn decode(&self) -> Result<PixelSurface, DrawError> {
        match self {
            EncodedImage::Bytes(bytes) => decode_image(bytes),
            EncodedImage::DataUrl(url) => decode_data_url(url),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodeCompletion {
    pub slot: SeedSlot,
    pub ticket: u64,
    pub result: Result<PixelSurface, DrawError>,
}

pub fn decode_image(bytes: &[u8]) -> Result<PixelSurface, DrawError> {
    let image = image::load_from_memory(bytes)
        .map_err(|err| DrawError::DecodeFailure(err.to_string()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    PixelSurface::from_pixels(width, height, image.into_raw())
        .map_err(|err| DrawError::DecodeFailure(err.to_string()))
}

/// Decodes a `data:<mime>;base64,<payload>` URL.
pub fn decode_data_url(url: &str) -> Result<PixelSurface, DrawError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| DrawError::DecodeFailure("not a data url".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| DrawError::DecodeFailure("data url has no payload".to_string()))?;
    if !meta.ends_with(";base64") {
        return Err(DrawError::DecodeFailure(format!(
            "unsupported data url encoding: {meta}"
        )));
    }
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|err| DrawError::DecodeFailure(format!("invalid base64: {err}")))?;
    decode_image(&bytes)
}

/// Decodes images off the caller's thread.
///
/// Every submission gets a ticket. Only the newest ticket per slot is
/// delivered; older completions for that slot are dropped when they arrive,
/// so two decodes never race into the same layer.
pub struct DecodeQueue {
    tx: Sender<DecodeCompletion>,
    rx: Receiver<DecodeCompletion>,
    latest: HashMap<SeedSlot, u64>,
    next_ticket: u64,
}

impl Default for DecodeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeQueue {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            tx,
            rx,
            latest: HashMap::new(),
            next_ticket: 1,
        }
    }

    pub fn submit(&mut self, slot: SeedSlot, image: EncodedImage) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        if let Some(previous) = self.latest.insert(slot, ticket) {
            tracing::debug!(?slot, previous, ticket, "decode superseded");
        }

        let tx = self.tx.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("decode-{ticket}"))
            .spawn(move || {
                let result = image.decode();
                let _ = tx.send(DecodeCompletion {
                    slot,
                    ticket,
                    result,
                });
            });
        if let Err(err) = spawned {
            tracing::warn!(?slot, ticket, error = %err, "failed to start decode worker");
            let _ = self.tx.send(DecodeCompletion {
                slot,
                ticket,
                result: Err(DrawError::DecodeFailure(format!(
                    "could not start decode worker: {err}"
                ))),
            });
        }
        ticket
    }

    /// Forgets the outstanding request for `slot`; its completion is dropped.
    pub fn cancel(&mut self, slot: SeedSlot) -> bool {
        self.latest.remove(&slot).is_some()
    }

    /// Whether a decode is still outstanding for `slot`. Callers should hold
    /// raster edits on that layer until this turns false.
    pub fn is_pending(&self, slot: SeedSlot) -> bool {
        self.latest.contains_key(&slot)
    }

    pub fn pending_count(&self) -> usize {
        self.latest.len()
    }

    /// Current completions without blocking.
    pub fn poll(&mut self) -> Vec<DecodeCompletion> {
        let mut ready = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(completion) => {
                    if let Some(completion) = self.accept(completion) {
                        ready.push(completion);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        ready
    }

    /// Blocks for the next current completion, up to `timeout`.
    pub fn wait(&mut self, timeout: Duration) -> Option<DecodeCompletion> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(completion) => {
                    if let Some(completion) = self.accept(completion) {
                        return Some(completion);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }

    fn accept(&mut self, completion: DecodeCompletion) -> Option<DecodeCompletion> {
        if self.latest.get(&completion.slot) != Some(&completion.ticket) {
            tracing::debug!(
                slot = ?completion.slot,
                ticket = completion.ticket,
                "dropping stale decode"
            );
            return None;
        }
        self.latest.remove(&completion.slot);
        Some(completion)
    }
}

/// Hands a finished decode to the stack: a new layer seeded with the image,
/// or the image drawn into an existing layer. Failed decodes change nothing.
pub fn apply_completion(
    stack: &mut LayerStack,
    completion: DecodeCompletion,
) -> Result<LayerId, DrawError> {
    let slot = completion.slot;
    let image = completion.result.map_err(|err| {
        tracing::warn!(?slot, error = %err, "decode failed");
        err
    })?;
    match slot {
        SeedSlot::NewLayer => Ok(stack.add_layer(Some(&image))),
        SeedSlot::Layer(id) => {
            stack
                .layer_mut(id)
                .ok_or(DrawError::UnknownLayer(id))?
                .replace_content(&image)?;
            Ok(id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        apply_completion, decode_data_url, decode_image, DecodeCompletion, DecodeQueue,
        EncodedImage, SeedSlot,
    };
    use crate::draw::error::DrawError;
    use crate::draw::layers::LayerStack;
    use crate::draw::model::Color;
    use crate::draw::save::{encode_png, to_data_url};
    use crate::draw::surface::PixelSurface;
    use std::time::Duration;

    const RED: Color = Color::rgb(255, 0, 0);
    const BLUE: Color = Color::rgb(0, 0, 255);
    const WAIT: Duration = Duration::from_secs(10);

    fn png(width: u32, height: u32, color: Color) -> Vec<u8> {
        encode_png(&PixelSurface::new(width, height, color)).expect("encode")
    }

    #[test]
    fn png_bytes_decode_to_matching_surface() {
        let mut source = PixelSurface::new(3, 2, RED);
        source
            .set_pixel(2, 1, Color::rgba(1, 2, 3, 4))
            .expect("in bounds");
        let decoded = decode_image(&encode_png(&source).expect("encode")).expect("decode");
        assert_eq!(decoded, source);
    }

    #[test]
    fn garbage_bytes_report_decode_failure() {
        assert!(matches!(
            decode_image(b"definitely not an image"),
            Err(DrawError::DecodeFailure(_))
        ));
    }

    #[test]
    fn data_urls_must_be_base64() {
        let url = to_data_url(&png(2, 2, BLUE));
        assert!(decode_data_url(&url).expect("decode").is_uniform(BLUE));

        assert!(matches!(
            decode_data_url("data:image/png,abc"),
            Err(DrawError::DecodeFailure(_))
        ));
        assert!(matches!(
            decode_data_url("http://example.com/a.png"),
            Err(DrawError::DecodeFailure(_))
        ));
        assert!(matches!(
            decode_data_url("data:image/png;base64,@@@"),
            Err(DrawError::DecodeFailure(_))
        ));
    }

    #[test]
    fn newer_request_supersedes_older_one_for_same_slot() {
        let mut queue = DecodeQueue::new();
        let first = queue.submit(SeedSlot::NewLayer, EncodedImage::Bytes(png(2, 2, RED)));
        let second = queue.submit(SeedSlot::NewLayer, EncodedImage::Bytes(png(2, 2, BLUE)));
        assert_ne!(first, second);
        assert!(queue.is_pending(SeedSlot::NewLayer));
        assert_eq!(queue.pending_count(), 1);

        let completion = queue.wait(WAIT).expect("completion");
        assert_eq!(completion.ticket, second);
        assert!(!queue.is_pending(SeedSlot::NewLayer));

        let mut stack = LayerStack::new(4, 4).expect("canvas size");
        let id = apply_completion(&mut stack, completion).expect("apply");
        assert_eq!(stack.len(), 1);
        let surface = stack.layer(id).expect("layer").surface();
        assert_eq!(surface.get_pixel(1, 1), Ok(BLUE));
        assert_eq!(surface.get_pixel(3, 3), Ok(Color::WHITE));

        // The superseded decode never shows up.
        assert!(queue.wait(Duration::from_millis(200)).is_none());
    }

    #[test]
    fn cancelled_requests_are_not_delivered() {
        let mut queue = DecodeQueue::new();
        queue.submit(SeedSlot::Layer(3), EncodedImage::Bytes(png(1, 1, RED)));
        assert!(queue.cancel(SeedSlot::Layer(3)));
        assert!(!queue.cancel(SeedSlot::Layer(3)));
        assert!(queue.wait(Duration::from_millis(200)).is_none());
    }

    #[test]
    fn failed_decode_leaves_stack_untouched() {
        let mut queue = DecodeQueue::new();
        queue.submit(
            SeedSlot::NewLayer,
            EncodedImage::DataUrl("data:image/png;base64,AAAA".to_string()),
        );
        let completion = queue.wait(WAIT).expect("completion");
        let mut stack = LayerStack::new(4, 4).expect("canvas size");
        assert!(matches!(
            apply_completion(&mut stack, completion),
            Err(DrawError::DecodeFailure(_))
        ));
        assert!(stack.is_empty());
    }

    #[test]
    fn completion_for_existing_layer_replaces_content_with_history() {
        let mut stack = LayerStack::new(4, 4).expect("canvas size");
        let id = stack.add_layer(None);
        let completion = DecodeCompletion {
            slot: SeedSlot::Layer(id),
            ticket: 1,
            result: Ok(PixelSurface::new(2, 2, RED)),
        };
        assert_eq!(apply_completion(&mut stack, completion), Ok(id));
        let layer = stack.layer(id).expect("layer");
        assert_eq!(layer.surface().get_pixel(0, 0), Ok(RED));
        assert_eq!(layer.history().len(), 2);

        let missing = DecodeCompletion {
            slot: SeedSlot::Layer(99),
            ticket: 2,
            result: Ok(PixelSurface::new(2, 2, RED)),
        };
        assert_eq!(
            apply_completion(&mut stack, missing),
            Err(DrawError::UnknownLayer(99))
        );
    }

    #[test]
    fn poll_returns_immediately() {
        let mut queue = DecodeQueue::new();
        assert!(queue.poll().is_empty());
    }
}
