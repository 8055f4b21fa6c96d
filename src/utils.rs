//! Small helpers shared by tests: log initialization and synthetic data
//! generation, so integration tests don't each reinvent a random-row
//! generator.

use rand::Rng;

use crate::record::Record;
use crate::types::Value;

/// Initializes `env_logger` from `RUST_LOG`, matching the format the rest
/// of the workspace's binaries use. Safe to call more than once; only the
/// first call takes effect.
pub fn init_log() {
    use env_logger::Builder;
    use std::io::Write;

    let _ = Builder::from_default_env()
        .format_timestamp_secs()
        .format(|buf, record| writeln!(buf, "[{} - {}] {}", record.level(), record.target(), record.args()))
        .is_test(true)
        .try_init();
}

/// Generates `rows` single-int-column records with values in `0..max_value`,
/// for tests that need a heap full of plausible data without hand-writing
/// each row.
pub fn random_int_records(rows: usize, max_value: i32) -> Vec<Record> {
    let mut rng = rand::thread_rng();
    (0..rows)
        .map(|_| Record::new(vec![Value::Int(rng.gen_range(0, max_value))]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_int_records_produces_requested_count() {
        let records = random_int_records(10, 100);
        assert_eq!(records.len(), 10);
        for record in &records {
            assert_eq!(record.values.len(), 1);
        }
    }
}
