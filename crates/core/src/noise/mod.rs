//! 1D gradient and value noise primitives for the noise layer.

use std::sync::OnceLock;

use rand::seq::SliceRandom;
use rand::Rng;

struct PerlinTables {
    // 256-entry permutation, doubled so `perm[perm[x] ..]` style lookups
    // never need a second wrap.
    perm: [usize; 512],
    grads: [f32; 256],
}

// Shared process-wide tables. Seeded once on first use; every Perlin-backed
// layer samples the same field.
fn perlin_tables() -> &'static PerlinTables {
    static TABLES: OnceLock<PerlinTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut rng = rand::thread_rng();

        let mut base: [usize; 256] = [0; 256];
        for (i, slot) in base.iter_mut().enumerate() {
            *slot = i;
        }
        base.shuffle(&mut rng);

        let mut perm = [0usize; 512];
        perm[..256].copy_from_slice(&base);
        perm[256..].copy_from_slice(&base);

        let mut grads = [0.0f32; 256];
        for slot in grads.iter_mut() {
            *slot = rng.gen_range(-1.0..1.0);
        }

        PerlinTables { perm, grads }
    })
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Quintic fade curve `t^3 (t (6t - 15) + 10)`.
pub fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

/// 1D Perlin gradient noise. Raw range is roughly [-0.5, 0.5]; the +0.5
/// shift normalizes the output to roughly [0, 1].
pub fn perlin_1d(x: f32) -> f32 {
    let tables = perlin_tables();

    let xf = x.floor();
    let x0 = (xf as i64).rem_euclid(256) as usize;
    let x1 = (x0 + 1) & 255;

    let tx = x - xf;
    let u = fade(tx);

    let ga = tables.grads[tables.perm[x0]];
    let gb = tables.grads[tables.perm[x1]];

    let val = lerp(ga * tx, gb * (tx - 1.0), u);
    val + 0.5
}

/// 1D value noise over a caller-owned 256-entry seed table. Unlike Perlin,
/// every layer owns its own table so two noise layers animate differently.
pub fn value_noise_1d(x: f32, seed_table: &[f32; 256]) -> f32 {
    let xf = x.floor();
    let idx = (xf as i64).rem_euclid(256) as usize;
    let next_idx = (idx + 1) & 255;
    let t = fade(x - xf);
    lerp(seed_table[idx], seed_table[next_idx], t)
}

/// Generates a fresh uniform [0, 1) seed table for value noise.
pub fn random_seed_table() -> [f32; 256] {
    let mut rng = rand::thread_rng();
    let mut table = [0.0f32; 256];
    for slot in table.iter_mut() {
        *slot = rng.gen_range(0.0..1.0);
    }
    table
}
