// Tile effects: fading and spinning numbers, veiled (reset) tiles
// All timing is a pure function of elapsed time so the renderer can sample it per frame

use rand::Rng;
use std::time::{Duration, Instant};

use crate::xtf_game::Level;

/// Length of one fade direction and of one full spin
pub const CYCLE: Duration = Duration::from_millis(3000);
/// Upper bound (exclusive) for the random start delay of each effect
pub const MAX_START_DELAY_MS: u64 = 4000;
pub const FADE_FROM: f32 = 0.4;
pub const FADE_TO: f32 = 0.0;

/// Ease-in/ease-out: quadratic ramps over the first and last fifth, linear in between
pub fn ease_both(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.2 {
        3.125 * t * t
    } else if t > 0.8 {
        -3.125 * t * t + 6.25 * t - 2.125
    } else {
        1.25 * t - 0.125
    }
}

/// Position within the current cycle (0..1) and the cycle number,
/// or None while the start delay is still running
fn cycle_phase(elapsed: Duration, delay: Duration) -> Option<(u128, f32)> {
    let t = elapsed.checked_sub(delay)?;
    let cycle = CYCLE.as_millis();
    let ms = t.as_millis();
    Some((ms / cycle, (ms % cycle) as f32 / cycle as f32))
}

/// Text opacity of a fading number; fully opaque before its delay
pub fn fade_opacity(elapsed: Duration, delay: Duration) -> f32 {
    match cycle_phase(elapsed, delay) {
        None => 1.0,
        Some((n, frac)) => {
            // odd cycles run backwards
            let pos = if n % 2 == 0 { frac } else { 1.0 - frac };
            FADE_FROM + (FADE_TO - FADE_FROM) * ease_both(pos)
        }
    }
}

/// Rotation angle of a spinning number in degrees (0..360)
pub fn spin_angle(elapsed: Duration, delay: Duration) -> f32 {
    match cycle_phase(elapsed, delay) {
        None => 0.0,
        Some((_, frac)) => 360.0 * ease_both(frac),
    }
}

/// Pick one of the four spinner frames for an angle
pub fn spin_frame(angle: f32) -> usize {
    (((angle + 22.5) / 45.0) as usize) % 4
}

/// Cosmetic reset state of an opened tile
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Veil {
    /// Background blending towards the unopened colour
    Falling { since: Instant },
    /// Drawn as an unopened tile until opened again
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileFx {
    pub opened_at: Instant,
    pub fade_delay: Duration,
    pub spin_delay: Option<Duration>,
    pub veil: Option<Veil>,
}

/// Effects for every tile of one board
#[derive(Debug, Clone)]
pub struct Effects {
    width: usize,
    tiles: Vec<Option<TileFx>>,
    veil_fade: Duration,
}

impl Effects {
    pub fn new(width: usize, height: usize, veil_fade: Duration) -> Self {
        Effects {
            width,
            tiles: vec![None; width * height],
            veil_fade,
        }
    }

    fn slot(&self, x: usize, y: usize) -> Option<usize> {
        let i = y * self.width + x;
        (x < self.width && i < self.tiles.len()).then_some(i)
    }

    pub fn tile(&self, x: usize, y: usize) -> Option<&TileFx> {
        self.slot(x, y).and_then(|i| self.tiles[i].as_ref())
    }

    /// Start effects for freshly opened tiles, each with its own random delays
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        cells: &[(usize, usize)],
        level: Level,
        now: Instant,
        rng: &mut R,
    ) {
        for &(x, y) in cells {
            let Some(i) = self.slot(x, y) else { continue };
            let fade_delay = Duration::from_millis(rng.gen_range(0..MAX_START_DELAY_MS));
            let spin_delay = level
                .spins()
                .then(|| Duration::from_millis(rng.gen_range(0..MAX_START_DELAY_MS)));
            self.tiles[i] = Some(TileFx {
                opened_at: now,
                fade_delay,
                spin_delay,
                veil: None,
            });
        }
    }

    /// Begin resetting an opened tile; returns false when there is nothing to veil
    pub fn veil(&mut self, x: usize, y: usize, now: Instant) -> bool {
        let Some(i) = self.slot(x, y) else { return false };
        match self.tiles[i].as_mut() {
            Some(fx) if fx.veil.is_none() => {
                fx.veil = Some(Veil::Falling { since: now });
                true
            }
            _ => false,
        }
    }

    /// Lift the veil of a tile, returns true if it was veiled
    pub fn lift(&mut self, x: usize, y: usize) -> bool {
        let Some(i) = self.slot(x, y) else { return false };
        match self.tiles[i].as_mut() {
            Some(fx) if fx.veil.is_some() => {
                fx.veil = None;
                true
            }
            _ => false,
        }
    }

    /// Promote finished veil transitions
    pub fn tick(&mut self, now: Instant) {
        let fade = self.veil_fade;
        for fx in self.tiles.iter_mut().flatten() {
            if let Some(Veil::Falling { since }) = fx.veil {
                if now.saturating_duration_since(since) >= fade {
                    fx.veil = Some(Veil::Down);
                }
            }
        }
    }

    pub fn is_veiled(&self, x: usize, y: usize) -> bool {
        matches!(self.tile(x, y).and_then(|fx| fx.veil), Some(Veil::Down))
    }

    /// Progress (0..1) of a running veil transition
    pub fn veil_progress(&self, x: usize, y: usize, now: Instant) -> Option<f32> {
        match self.tile(x, y)?.veil? {
            Veil::Falling { since } => {
                if self.veil_fade.is_zero() {
                    return Some(1.0);
                }
                let t = now.saturating_duration_since(since).as_secs_f32() / self.veil_fade.as_secs_f32();
                Some(t.min(1.0))
            }
            Veil::Down => Some(1.0),
        }
    }

    pub fn opacity(&self, x: usize, y: usize, now: Instant) -> f32 {
        match self.tile(x, y) {
            Some(fx) => fade_opacity(now.saturating_duration_since(fx.opened_at), fx.fade_delay),
            None => 1.0,
        }
    }

    /// Spinner frame of a rotating number, None when the tile does not spin
    pub fn spinner(&self, x: usize, y: usize, now: Instant) -> Option<usize> {
        let fx = self.tile(x, y)?;
        let delay = fx.spin_delay?;
        Some(spin_frame(spin_angle(now.saturating_duration_since(fx.opened_at), delay)))
    }
}
