//! Default distribution bucket bounds

/// Byte size buckets: 1KiB up to 4GiB
pub const DEFAULT_BYTES_DISTRIBUTION: &[f64] = &[
    1024.0,
    2048.0,
    4096.0,
    16384.0,
    65536.0,
    262_144.0,
    1_048_576.0,
    4_194_304.0,
    16_777_216.0,
    67_108_864.0,
    268_435_456.0,
    1_073_741_824.0,
    4_294_967_296.0,
];

/// gRPC latency buckets in milliseconds
pub const DEFAULT_MILLISECONDS_DISTRIBUTION: &[f64] = &[
    0.01, 0.05, 0.1, 0.3, 0.6, 0.8, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0, 13.0, 16.0, 20.0,
    25.0, 30.0, 40.0, 50.0, 65.0, 80.0, 100.0, 130.0, 160.0, 200.0, 250.0, 300.0, 400.0, 500.0,
    650.0, 800.0, 1000.0, 2000.0, 5000.0, 10000.0, 20000.0, 50000.0, 100000.0,
];

/// HTTP latency buckets in milliseconds
pub const DEFAULT_LATENCY_DISTRIBUTION: &[f64] = &[
    1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0, 13.0, 16.0, 20.0, 25.0, 30.0, 40.0, 50.0, 65.0, 80.0,
    100.0, 130.0, 160.0, 200.0, 250.0, 300.0, 400.0, 500.0, 650.0, 800.0, 1000.0, 2000.0, 5000.0,
    10000.0, 20000.0, 50000.0, 100000.0,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_strictly_increasing() {
        for bounds in [
            DEFAULT_BYTES_DISTRIBUTION,
            DEFAULT_MILLISECONDS_DISTRIBUTION,
            DEFAULT_LATENCY_DISTRIBUTION,
        ] {
            assert!(bounds.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
