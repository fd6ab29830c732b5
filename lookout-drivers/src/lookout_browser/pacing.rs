use std::time::Duration;

use lookout_common::DelayWindow;
use rand::rngs::OsRng;
use rand::Rng;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy, Default)]
/// Sleeps for a uniformly drawn interval to imitate human pacing.
pub struct Pacer;

impl Pacer {
    pub fn new() -> Self {
        Self
    }

    /// Draw a delay from `window`, bounds inclusive. Reversed bounds are swapped.
    pub fn draw(&self, window: DelayWindow) -> Duration {
        let lo = window.min_ms.min(window.max_ms);
        let hi = window.min_ms.max(window.max_ms);
        if hi == 0 {
            return Duration::ZERO;
        }
        let mut rng = OsRng;
        Duration::from_millis(rng.gen_range(lo..=hi))
    }

    pub async fn pause(&self, window: DelayWindow) {
        let delay = self.draw(window);
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}
