use super::{Channel, ChannelError, Datagram};
use async_trait::async_trait;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Fault-injection settings for a [`NoisyChannel`]. All rates are
/// probabilities in `[0, 1]`, rolled independently for every transmission.
#[derive(Debug, Clone, Copy)]
pub struct NoiseConfig {
    /// Probability that a datagram disappears entirely.
    pub loss_rate: f64,
    /// Probability that one bit of the datagram is flipped in flight.
    pub corruption_rate: f64,
    /// Probability that a datagram is held back and released late, letting
    /// later traffic overtake it.
    pub reorder_rate: f64,
    /// How long a held-back datagram is delayed.
    pub reorder_delay: Duration,
    /// Seed for the fault generator, fixed so runs are repeatable.
    pub seed: u64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            corruption_rate: 0.0,
            reorder_rate: 0.0,
            reorder_delay: Duration::from_millis(50),
            seed: 0xBAD5EED,
        }
    }
}

/// Wraps a channel and damages outbound traffic according to a
/// [`NoiseConfig`].
///
/// Reception is a pass-through: corruption on the way in is somebody
/// else's outbound corruption. Layering the noise on `transmit` mirrors
/// how every station in this system sends through the same lossy medium.
pub struct NoisyChannel {
    inner: Arc<dyn Channel>,
    config: NoiseConfig,
    rng: Mutex<SmallRng>,
}

impl NoisyChannel {
    pub fn new(inner: Arc<dyn Channel>, config: NoiseConfig) -> Self {
        Self {
            inner,
            config,
            rng: Mutex::new(SmallRng::seed_from_u64(config.seed)),
        }
    }
}

#[async_trait]
impl Channel for NoisyChannel {
    async fn transmit(&self, mut bytes: Vec<u8>, to: SocketAddr) -> Result<(), ChannelError> {
        let (lost, flip, held) = {
            let mut rng = self.rng.lock().unwrap();
            let lost = rng.gen_bool(self.config.loss_rate);
            let flip = if rng.gen_bool(self.config.corruption_rate) && !bytes.is_empty() {
                Some((rng.gen_range(0..bytes.len()), rng.gen_range(0..8u8)))
            } else {
                None
            };
            let held = rng.gen_bool(self.config.reorder_rate);
            (lost, flip, held)
        };

        if lost {
            tracing::warn!(target: "channel", %to, "datagram lost in transit");
            return Ok(());
        }
        if let Some((index, bit)) = flip {
            bytes[index] ^= 1 << bit;
            tracing::warn!(target: "channel", %to, index, "bit flipped in transit");
        }
        if held {
            tracing::warn!(
                target: "channel",
                %to,
                delay_ms = self.config.reorder_delay.as_millis() as u64,
                "datagram held back"
            );
            let inner = self.inner.clone();
            let delay = self.config.reorder_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                // A failure this late is indistinguishable from loss.
                let _ = inner.transmit(bytes, to).await;
            });
            return Ok(());
        }
        self.inner.transmit(bytes, to).await
    }

    async fn receive(&self) -> Result<Datagram, ChannelError> {
        self.inner.receive().await
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr()
    }
}
