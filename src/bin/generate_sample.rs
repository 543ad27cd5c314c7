//! Generates deterministic electronic-nose recordings as CSV files:
//! drifting per-sensor baselines with gas-exposure pulses on top, plus
//! a text column marking the exposure phase.

use std::fs::File;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Raised-cosine pulse covering rows `[start, start + width)`.
fn pulse(row: usize, start: usize, width: usize) -> f64 {
    if row < start || row >= start + width {
        return 0.0;
    }
    let t = (row - start) as f64 / width as f64;
    0.5 * (1.0 - (2.0 * std::f64::consts::PI * t).cos())
}

/// One sensor's response profile: resting resistance, drift per row and
/// sensitivity to each of the two gases.
struct Sensor {
    name: &'static str,
    baseline: f64,
    drift: f64,
    sensitivities: [f64; 2],
}

fn main() {
    let sensors = [
        Sensor { name: "MQ2", baseline: 120.0, drift: 0.020, sensitivities: [40.0, 8.0] },
        Sensor { name: "MQ3", baseline: 95.0, drift: -0.012, sensitivities: [12.0, 35.0] },
        Sensor { name: "MQ7", baseline: 210.0, drift: 0.035, sensitivities: [25.0, 20.0] },
        Sensor { name: "MQ135", baseline: 60.0, drift: 0.008, sensitivities: [30.0, 15.0] },
    ];

    // Two exposures per recording: (start, width, strength per gas).
    let recordings: [(&str, u64, [(usize, usize, [f64; 2]); 2]); 2] = [
        (
            "nose_run1.csv",
            42,
            [
                (60, 40, [1.0, 0.2]),  // gas A dominant
                (160, 40, [0.1, 1.0]), // gas B dominant
            ],
        ),
        (
            "nose_run2.csv",
            7,
            [
                (50, 50, [0.8, 0.3]),
                (150, 50, [0.2, 0.9]),
            ],
        ),
    ];
    let n_rows = 250;

    for (path, seed, exposures) in &recordings {
        let mut rng = SimpleRng::new(*seed);
        let file = File::create(path).expect("Failed to create output file");
        let mut writer = csv::Writer::from_writer(file);

        let mut header = vec!["t".to_string()];
        header.extend(sensors.iter().map(|s| s.name.to_string()));
        header.push("phase".to_string());
        writer.write_record(&header).expect("Failed to write header");

        for row in 0..n_rows {
            let mut record = vec![row.to_string()];
            for sensor in &sensors {
                let mut value = sensor.baseline + sensor.drift * row as f64;
                for &(start, width, strengths) in exposures.iter() {
                    let shape = pulse(row, start, width);
                    for (gas, &strength) in strengths.iter().enumerate() {
                        value += strength * sensor.sensitivities[gas] * shape;
                    }
                }
                value += rng.gauss(0.0, 0.4);
                record.push(format!("{value:.4}"));
            }

            let phase = exposures
                .iter()
                .enumerate()
                .find(|(_, &(start, width, _))| row >= start && row < start + width)
                .map(|(i, _)| if i == 0 { "exposure_a" } else { "exposure_b" })
                .unwrap_or("baseline");
            record.push(phase.to_string());

            writer.write_record(&record).expect("Failed to write row");
        }
        writer.flush().expect("Failed to flush writer");

        println!("Wrote {n_rows} rows x {} sensors to {path}", sensors.len());
    }
}
